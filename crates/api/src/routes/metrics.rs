use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::Encoder;

use crate::state::SharedState;

/// GET /api/metrics
///
/// All registered Prometheus metrics in the text exposition format.
pub async fn get_metrics(State(state): State<SharedState>) -> impl IntoResponse {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = state.metrics.registry.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            String::from_utf8(buffer).unwrap_or_default(),
        ),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                "failed to encode metrics".to_string(),
            )
        }
    }
}
