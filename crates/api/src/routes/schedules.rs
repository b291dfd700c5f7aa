use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use slotgate_booking::{AvailabilitySlot, AvailabilityStatus, ProviderId};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::SharedState;

/// A provider declaring their availability for one weekday. The provider is
/// the authenticated caller.
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub day_of_week: Weekday,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    pub status: AvailabilityStatus,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub provider_id: ProviderId,
    pub time: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub day: Weekday,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityView {
    pub provider_id: ProviderId,
    pub time: NaiveDateTime,
    pub available: bool,
}

/// POST /api/schedules
pub async fn declare_schedule(
    State(state): State<SharedState>,
    CurrentUser(provider_id): CurrentUser,
    ApiJson(request): ApiJson<ScheduleRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AvailabilitySlot>>)> {
    let slot = AvailabilitySlot {
        provider_id,
        day_of_week: request.day_of_week,
        start_time: request.start_time,
        end_time: request.end_time,
        status: request.status,
    };
    let slot = state.bookings.availability().declare(slot)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(slot, "Schedule declared successfully.")),
    ))
}

/// GET /api/schedules/{provider_id}
pub async fn provider_schedule(
    State(state): State<SharedState>,
    ApiPath(provider_id): ApiPath<ProviderId>,
) -> Json<ApiResponse<Vec<AvailabilitySlot>>> {
    let slots = state.bookings.availability().schedule_for(provider_id);
    Json(ApiResponse::ok(slots, "Fetched provider schedule."))
}

/// GET /api/schedules/day?day=MONDAY
pub async fn schedules_on_day(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<DayQuery>,
) -> Json<ApiResponse<Vec<AvailabilitySlot>>> {
    let slots = state.bookings.availability().schedules_on(query.day);
    Json(ApiResponse::ok(
        slots,
        format!("Fetched schedules for {}.", query.day),
    ))
}

/// GET /api/schedules/available?provider_id=..&time=..
pub async fn check_availability(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> Json<ApiResponse<AvailabilityView>> {
    let available = state.bookings.availability().is_available(
        query.provider_id,
        query.time.weekday(),
        query.time.time(),
    );
    let message = if available {
        "Provider is available."
    } else {
        "Provider is not available."
    };
    Json(ApiResponse::ok(
        AvailabilityView {
            provider_id: query.provider_id,
            time: query.time,
            available,
        },
        message,
    ))
}
