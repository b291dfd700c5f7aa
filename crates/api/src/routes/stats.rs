use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/stats
///
/// Request and booking counters plus the limiter's live bucket count.
pub async fn get_stats(State(state): State<SharedState>) -> Json<Value> {
    let uptime_secs = state.start_time.elapsed().as_secs();
    let metrics = &state.metrics;
    let total_requests = metrics.requests_total.get();

    let requests_per_second = if uptime_secs > 0 {
        total_requests as f64 / uptime_secs as f64
    } else {
        0.0
    };

    let store = state.interceptor.store();
    Json(json!({
        "total_requests": total_requests,
        "rate_limited_requests": metrics.rate_limited_total.get(),
        "bookings_created": metrics.bookings_created.get(),
        "booking_conflicts": metrics.booking_conflicts.get(),
        "provider_unavailable": metrics.provider_unavailable.get(),
        "active_buckets": store.len(),
        "max_buckets": store.max_buckets(),
        "uptime_secs": uptime_secs,
        "requests_per_second": requests_per_second
    }))
}
