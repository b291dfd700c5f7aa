pub mod appointments;
pub mod health;
pub mod metrics;
pub mod schedules;
pub mod stats;

use serde::Serialize;

/// Success envelope shared by the booking routes.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}
