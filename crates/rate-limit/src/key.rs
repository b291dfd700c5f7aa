use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use http::header::{HeaderMap, HeaderName};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Identity a bucket is keyed on: an authenticated user, a network address,
/// or the shared `UNKNOWN` fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn user(id: &str) -> Self {
        Self(format!("USER_{}", id))
    }

    pub fn ip(address: &str) -> Self {
        Self(format!("IP_{}", address))
    }

    /// Shared by every caller whose identity and address are both unknown.
    pub fn unknown() -> Self {
        Self("UNKNOWN".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage identity of a bucket: the caller key scoped to one operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub operation: Arc<str>,
    pub caller: RateLimitKey,
}

impl BucketKey {
    pub fn new(operation: Arc<str>, caller: RateLimitKey) -> Self {
        Self { operation, caller }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.operation, self.caller)
    }
}

/// What the boundary layer knows about the current caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    /// Authenticated user id, if the authentication layer resolved one.
    pub user_id: Option<String>,
    /// Raw client-supplied forwarded-address list.
    pub forwarded_for: Option<String>,
    /// Address of the directly connected peer.
    pub peer_ip: Option<IpAddr>,
}

impl CallerContext {
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn anonymous(peer_ip: IpAddr) -> Self {
        Self {
            peer_ip: Some(peer_ip),
            ..Self::default()
        }
    }

    /// The authenticated user id, ignoring blank values.
    pub fn user(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Derives the [`RateLimitKey`] for a call.
///
/// Precedence: authenticated user id, then the first entry of the
/// forwarded-for list, then the peer address, then `UNKNOWN`.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    identity_header: HeaderName,
}

impl KeyResolver {
    /// `identity_header` names the trusted header carrying the authenticated
    /// user id. Invalid names fall back to `x-user-id`.
    pub fn new(identity_header: &str) -> Self {
        let identity_header = HeaderName::try_from(identity_header.to_ascii_lowercase())
            .unwrap_or_else(|_| {
                tracing::warn!(header = identity_header, "invalid identity header name, using x-user-id");
                HeaderName::from_static("x-user-id")
            });
        Self { identity_header }
    }

    pub fn identity_header(&self) -> &HeaderName {
        &self.identity_header
    }

    /// Build the caller context from request headers and the peer address.
    pub fn caller_from_parts(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> CallerContext {
        let header_str = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        CallerContext {
            user_id: header_str(self.identity_header.as_str()),
            forwarded_for: header_str(FORWARDED_FOR),
            peer_ip: peer.map(|addr| addr.ip()),
        }
    }

    pub fn resolve(&self, caller: &CallerContext) -> RateLimitKey {
        if let Some(user) = caller.user() {
            return RateLimitKey::user(user);
        }

        let forwarded = caller
            .forwarded_for
            .as_deref()
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(addr) = forwarded {
            return RateLimitKey::ip(addr);
        }

        match caller.peer_ip {
            Some(ip) => RateLimitKey::ip(&ip.to_string()),
            None => RateLimitKey::unknown(),
        }
    }
}

impl Default for KeyResolver {
    fn default() -> Self {
        Self::new("x-user-id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn authenticated_user_wins() {
        let caller = CallerContext {
            user_id: Some("42".into()),
            forwarded_for: Some("203.0.113.9".into()),
            peer_ip: Some("10.0.0.1".parse().unwrap()),
        };
        assert_eq!(KeyResolver::default().resolve(&caller).as_str(), "USER_42");
    }

    #[test]
    fn first_forwarded_entry_is_trimmed() {
        let caller = CallerContext {
            user_id: None,
            forwarded_for: Some("  203.0.113.9 , 10.1.1.1".into()),
            peer_ip: Some("10.0.0.1".parse().unwrap()),
        };
        assert_eq!(KeyResolver::default().resolve(&caller).as_str(), "IP_203.0.113.9");
    }

    #[test]
    fn blank_identity_and_forwarded_fall_back_to_peer() {
        let caller = CallerContext {
            user_id: Some("   ".into()),
            forwarded_for: Some("".into()),
            peer_ip: Some("192.0.2.7".parse().unwrap()),
        };
        assert_eq!(KeyResolver::default().resolve(&caller).as_str(), "IP_192.0.2.7");
    }

    #[test]
    fn nothing_known_is_unknown() {
        let key = KeyResolver::default().resolve(&CallerContext::default());
        assert_eq!(key, RateLimitKey::unknown());
        assert_eq!(key.as_str(), "UNKNOWN");
    }

    #[test]
    fn reads_configured_identity_header() {
        let resolver = KeyResolver::new("X-Account-Id");
        let mut headers = HeaderMap::new();
        headers.insert("x-account-id", HeaderValue::from_static("7"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1"));

        let peer: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        let caller = resolver.caller_from_parts(&headers, Some(peer));

        assert_eq!(caller.user_id.as_deref(), Some("7"));
        assert_eq!(caller.forwarded_for.as_deref(), Some("198.51.100.1"));
        assert_eq!(caller.peer_ip, Some(peer.ip()));
        assert_eq!(resolver.resolve(&caller).as_str(), "USER_7");
    }

    #[test]
    fn peer_key_ignores_port() {
        let resolver = KeyResolver::default();
        let a = resolver.caller_from_parts(&HeaderMap::new(), Some("192.0.2.1:1000".parse().unwrap()));
        let b = resolver.caller_from_parts(&HeaderMap::new(), Some("192.0.2.1:2000".parse().unwrap()));
        assert_eq!(resolver.resolve(&a), resolver.resolve(&b));
    }
}
