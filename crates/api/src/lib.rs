pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{delete, get, post, put, MethodRouter};
use axum::Router;
use slotgate_common::operations;
use slotgate_common::{AppConfig, SlotgateResult};
use tower_http::cors::{Any, CorsLayer};

use crate::middleware::PolicyGuard;
use crate::state::SharedState;

pub use error::{ApiError, ApiResult, ErrorBody};
pub use state::{AppState, SlotgateMetrics};

/// Wrap `route` with the rate-limit layer for `operation`.
fn limited(
    state: &SharedState,
    operation: &str,
    route: MethodRouter<SharedState>,
) -> SlotgateResult<MethodRouter<SharedState>> {
    let guard = PolicyGuard {
        state: Arc::clone(state),
        policy: state.policy(operation)?,
    };
    tracing::debug!(
        operation,
        capacity = guard.policy.policy().capacity(),
        refill_tokens = guard.policy.policy().refill_tokens(),
        refill_secs = guard.policy.policy().refill_period().as_secs(),
        "rate limit policy attached"
    );
    Ok(route.route_layer(axum::middleware::from_fn_with_state(
        guard,
        middleware::rate_limit,
    )))
}

/// Build the router with every booking route behind its rate-limit policy.
pub fn build_router(state: SharedState) -> SlotgateResult<Router> {
    use routes::{appointments, schedules};

    let s = &state;
    let router = Router::new()
        // Operational endpoints, not rate limited
        .route("/api/health", get(routes::health::health_check))
        .route("/api/metrics", get(routes::metrics::get_metrics))
        .route("/api/stats", get(routes::stats::get_stats))
        // Appointments
        .route(
            "/api/appointments",
            limited(s, operations::BOOK_APPOINTMENT, post(appointments::book_appointment))?,
        )
        .route(
            "/api/appointments/my",
            limited(s, operations::LIST_MY_APPOINTMENTS, get(appointments::my_appointments))?,
        )
        .route(
            "/api/appointments/{id}",
            limited(s, operations::CANCEL_APPOINTMENT, delete(appointments::cancel_appointment))?,
        )
        .route(
            "/api/appointments/{id}/status",
            limited(s, operations::UPDATE_APPOINTMENT_STATUS, put(appointments::update_status))?,
        )
        .route(
            "/api/appointments/provider",
            limited(
                s,
                operations::LIST_PROVIDER_APPOINTMENTS,
                get(appointments::provider_appointments),
            )?,
        )
        .route(
            "/api/appointments/provider/upcoming",
            limited(
                s,
                operations::LIST_PROVIDER_APPOINTMENTS,
                get(appointments::upcoming_appointments),
            )?,
        )
        .route(
            "/api/appointments/provider/date",
            limited(
                s,
                operations::LIST_PROVIDER_APPOINTMENTS,
                get(appointments::appointments_on_date),
            )?,
        )
        // Schedules
        .route(
            "/api/schedules",
            limited(s, operations::DECLARE_SCHEDULE, post(schedules::declare_schedule))?,
        )
        .route(
            "/api/schedules/available",
            limited(s, operations::CHECK_AVAILABILITY, get(schedules::check_availability))?,
        )
        .route(
            "/api/schedules/day",
            limited(s, operations::LIST_DAY_SCHEDULES, get(schedules::schedules_on_day))?,
        )
        .route(
            "/api/schedules/{provider_id}",
            limited(s, operations::GET_SCHEDULE, get(schedules::provider_schedule))?,
        );

    let cors_enabled = state.config.server.cors;
    let router = router.with_state(state);

    if cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        Ok(router.layer(cors))
    } else {
        Ok(router)
    }
}

/// Serve the booking API on `listen_addr` until `shutdown` resolves.
///
/// Peer addresses are recorded so anonymous callers are keyed by IP.
pub async fn run_server<F>(state: SharedState, listen_addr: &str, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state)?;

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("booking API listening on {}", listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    Ok(())
}

/// Convenience function to create shared state from configuration.
pub fn new_shared_state(config: AppConfig) -> anyhow::Result<SharedState> {
    Ok(Arc::new(AppState::new(config)?))
}
