use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/health
pub async fn health_check(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "rate_limit_enabled": state.interceptor.is_enabled(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
