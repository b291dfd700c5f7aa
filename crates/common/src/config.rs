use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Identifiers of every rate-limited operation exposed by the booking API.
///
/// Each identifier selects a policy from [`RateLimitConfig::policy_for`] and
/// scopes the buckets of that operation, so two operations never share quota
/// for the same caller.
pub mod operations {
    pub const BOOK_APPOINTMENT: &str = "book_appointment";
    pub const CANCEL_APPOINTMENT: &str = "cancel_appointment";
    pub const UPDATE_APPOINTMENT_STATUS: &str = "update_appointment_status";
    pub const LIST_MY_APPOINTMENTS: &str = "list_my_appointments";
    pub const LIST_PROVIDER_APPOINTMENTS: &str = "list_provider_appointments";
    pub const DECLARE_SCHEDULE: &str = "declare_schedule";
    pub const GET_SCHEDULE: &str = "get_schedule";
    pub const LIST_DAY_SCHEDULES: &str = "list_day_schedules";
    pub const CHECK_AVAILABILITY: &str = "check_availability";

    pub const ALL: &[&str] = &[
        BOOK_APPOINTMENT,
        CANCEL_APPOINTMENT,
        UPDATE_APPOINTMENT_STATUS,
        LIST_MY_APPOINTMENTS,
        LIST_PROVIDER_APPOINTMENTS,
        DECLARE_SCHEDULE,
        GET_SCHEDULE,
        LIST_DAY_SCHEDULES,
        CHECK_AVAILABILITY,
    ];
}

/// Top-level slotgate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub catalog: Vec<CatalogEntryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Trusted header carrying the authenticated user id, set by the
    /// authentication layer in front of this service.
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
    #[serde(default = "default_true")]
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            identity_header: default_identity_header(),
            cors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Upper bound on live buckets before least-recently-used ones are evicted.
    #[serde(default = "default_max_buckets")]
    pub max_buckets: usize,
    /// Buckets untouched for this long are dropped by the cleanup thread.
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    /// Per-operation overrides; operations not listed use the built-in policy.
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyConfig>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_buckets: default_max_buckets(),
            idle_ttl_secs: default_idle_ttl(),
            cleanup_interval_secs: default_cleanup_interval(),
            policies: BTreeMap::new(),
        }
    }
}

impl RateLimitConfig {
    /// Policy for `operation`: the configured override if present, otherwise
    /// the built-in default for that operation.
    pub fn policy_for(&self, operation: &str) -> PolicyConfig {
        self.policies
            .get(operation)
            .cloned()
            .unwrap_or_else(|| default_policy_for(operation))
    }
}

/// Token-bucket policy attached to one protected operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub capacity: u32,
    pub refill_tokens: u32,
    pub refill_duration_secs: u64,
    #[serde(default = "default_rate_limit_message")]
    pub message: String,
}

impl PolicyConfig {
    /// Seconds for an empty bucket to refill to capacity.
    pub fn full_refill_secs(&self) -> u64 {
        let refill = u64::from(self.refill_tokens.max(1));
        let periods = u64::from(self.capacity).div_ceil(refill);
        periods.saturating_mul(self.refill_duration_secs)
    }

    pub fn new(capacity: u32, refill_tokens: u32, refill_duration_secs: u64) -> Self {
        Self {
            capacity,
            refill_tokens,
            refill_duration_secs,
            message: default_rate_limit_message(),
        }
    }
}

/// One bookable individual service and the provider that performs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntryConfig {
    pub id: u64,
    pub provider_id: u64,
    pub name: String,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
}

/// Built-in policy table, matching the per-endpoint limits the booking API
/// has always shipped with. Tighter on mutations than on listings.
pub fn default_policy_for(operation: &str) -> PolicyConfig {
    match operation {
        operations::BOOK_APPOINTMENT
        | operations::CANCEL_APPOINTMENT
        | operations::UPDATE_APPOINTMENT_STATUS => PolicyConfig::new(10, 3, 60),
        operations::LIST_MY_APPOINTMENTS | operations::LIST_PROVIDER_APPOINTMENTS => {
            PolicyConfig::new(15, 5, 60)
        }
        operations::DECLARE_SCHEDULE => PolicyConfig::new(5, 1, 60),
        operations::GET_SCHEDULE => PolicyConfig::new(10, 2, 60),
        operations::LIST_DAY_SCHEDULES => PolicyConfig::new(15, 3, 60),
        operations::CHECK_AVAILABILITY => PolicyConfig::new(20, 5, 60),
        _ => PolicyConfig::new(10, 2, 60),
    }
}

// Default value helpers
fn default_listen() -> String {
    "0.0.0.0:8085".to_string()
}
fn default_identity_header() -> String {
    "x-user-id".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_buckets() -> usize {
    100_000
}
fn default_idle_ttl() -> u64 {
    3600
}
fn default_cleanup_interval() -> u64 {
    60
}
fn default_duration_minutes() -> u32 {
    30
}
pub fn default_rate_limit_message() -> String {
    "Too many requests, please try again later!".to_string()
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen.is_empty() {
            anyhow::bail!("server.listen must not be empty");
        }
        if self.server.identity_header.is_empty() {
            anyhow::bail!("server.identity_header must not be empty");
        }

        let rl = &self.rate_limit;
        if rl.max_buckets == 0 {
            anyhow::bail!("rate_limit.max_buckets must be greater than zero");
        }
        if rl.cleanup_interval_secs == 0 {
            anyhow::bail!("rate_limit.cleanup_interval_secs must be greater than zero");
        }
        if rl.idle_ttl_secs == 0 {
            anyhow::bail!("rate_limit.idle_ttl_secs must be greater than zero");
        }

        for (name, policy) in &rl.policies {
            if !operations::ALL.contains(&name.as_str()) {
                anyhow::bail!("rate_limit.policies references unknown operation '{}'", name);
            }
            if policy.capacity == 0 || policy.refill_tokens == 0 || policy.refill_duration_secs == 0
            {
                anyhow::bail!(
                    "policy '{}' must have positive capacity, refill_tokens and refill_duration_secs",
                    name
                );
            }
        }

        // A bucket dropped before it could refill would come back full.
        for operation in operations::ALL {
            let needed = rl.policy_for(operation).full_refill_secs();
            if rl.idle_ttl_secs < needed {
                anyhow::bail!(
                    "rate_limit.idle_ttl_secs ({}) is shorter than the {}s '{}' needs to refill",
                    rl.idle_ttl_secs,
                    needed,
                    operation
                );
            }
        }

        let mut seen = HashSet::new();
        for entry in &self.catalog {
            if !seen.insert(entry.id) {
                anyhow::bail!("catalog entry id {} is declared more than once", entry.id);
            }
            if entry.duration_minutes == 0 {
                anyhow::bail!("catalog entry {} has a zero duration", entry.id);
            }
        }

        Ok(())
    }
}
