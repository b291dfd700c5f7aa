//! Per-route rate limiting and caller identity extraction.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use slotgate_common::SlotgateError;
use slotgate_rate_limit::{CallerContext, OperationPolicy};

use crate::error::ApiError;
use crate::state::SharedState;

/// State for one rate-limited route: the shared app state plus the policy
/// enforced on that route.
#[derive(Clone)]
pub struct PolicyGuard {
    pub state: SharedState,
    pub policy: OperationPolicy,
}

/// Caller context from the identity header, `X-Forwarded-For` and the
/// connection's peer address when the server was started with connect info.
pub fn caller_context(state: &SharedState, req: &Request) -> CallerContext {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    state
        .interceptor
        .resolver()
        .caller_from_parts(req.headers(), peer)
}

/// Consume a token for the route's operation before running the handler.
/// Rejected requests never reach the handler.
pub async fn rate_limit(State(guard): State<PolicyGuard>, req: Request, next: Next) -> Response {
    let operation = guard.policy.operation().clone();
    let metrics = &guard.state.metrics;
    metrics.requests_total.inc();
    metrics
        .requests_by_operation
        .with_label_values(&[&*operation])
        .inc();
    let timer = metrics
        .request_duration
        .with_label_values(&[&*operation])
        .start_timer();

    let caller = caller_context(&guard.state, &req);
    let response = match guard
        .state
        .interceptor
        .guard_async(&guard.policy, &caller, next.run(req))
        .await
    {
        Ok(response) => response,
        Err(err) => {
            if matches!(err, SlotgateError::RateLimitExceeded { .. }) {
                metrics.rate_limited_total.inc();
                metrics
                    .rate_limited_by_operation
                    .with_label_values(&[&*operation])
                    .inc();
            }
            ApiError::from(err).into_response()
        }
    };

    timer.observe_duration();
    response
}

/// The authenticated user id, read from the trusted identity header.
///
/// Requests without a numeric id in that header are rejected with 401.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub u64);

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header = state.interceptor.resolver().identity_header();
        parts
            .headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(CurrentUser)
            .ok_or(ApiError::Domain(SlotgateError::Unauthenticated))
    }
}
