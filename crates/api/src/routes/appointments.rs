use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use slotgate_booking::{Booking, BookingId, BookingStatus, ProviderId, ServiceId};

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct AppointmentRequest {
    pub individual_service_id: ServiceId,
    pub appointment_time: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

/// Booking as returned to callers, with the service name resolved.
#[derive(Debug, Serialize)]
pub struct AppointmentView {
    pub id: BookingId,
    pub customer_id: u64,
    pub individual_service_id: ServiceId,
    pub individual_service_name: Option<String>,
    pub provider_id: ProviderId,
    pub appointment_time: NaiveDateTime,
    pub status: BookingStatus,
}

fn view(state: &SharedState, booking: Booking) -> AppointmentView {
    let individual_service_name = state
        .bookings
        .catalog()
        .get(booking.individual_service_id)
        .ok()
        .map(|entry| entry.name.clone());
    AppointmentView {
        id: booking.id,
        customer_id: booking.customer_id,
        individual_service_id: booking.individual_service_id,
        individual_service_name,
        provider_id: booking.provider_id,
        appointment_time: booking.appointment_time,
        status: booking.status,
    }
}

fn views(state: &SharedState, bookings: Vec<Booking>) -> Vec<AppointmentView> {
    bookings.into_iter().map(|b| view(state, b)).collect()
}

/// POST /api/appointments
pub async fn book_appointment(
    State(state): State<SharedState>,
    CurrentUser(customer_id): CurrentUser,
    ApiJson(request): ApiJson<AppointmentRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AppointmentView>>)> {
    let result = state.bookings.book(
        customer_id,
        request.individual_service_id,
        request.appointment_time,
    );
    state.metrics.record_booking(&result);
    let booking = result?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            view(&state, booking),
            "Appointment booked successfully.",
        )),
    ))
}

/// GET /api/appointments/my
pub async fn my_appointments(
    State(state): State<SharedState>,
    CurrentUser(customer_id): CurrentUser,
) -> Json<ApiResponse<Vec<AppointmentView>>> {
    let bookings = state.bookings.bookings_for_customer(customer_id);
    Json(ApiResponse::ok(
        views(&state, bookings),
        "Fetched your appointments.",
    ))
}

/// DELETE /api/appointments/{id}
pub async fn cancel_appointment(
    State(state): State<SharedState>,
    CurrentUser(customer_id): CurrentUser,
    ApiPath(id): ApiPath<BookingId>,
) -> ApiResult<Json<ApiResponse<AppointmentView>>> {
    let booking = state.bookings.cancel(customer_id, id)?;
    Ok(Json(ApiResponse::ok(
        view(&state, booking),
        "Appointment cancelled successfully.",
    )))
}

/// PUT /api/appointments/{id}/status
pub async fn update_status(
    State(state): State<SharedState>,
    CurrentUser(provider_id): CurrentUser,
    ApiPath(id): ApiPath<BookingId>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> ApiResult<Json<ApiResponse<AppointmentView>>> {
    let booking = state.bookings.update_status(provider_id, id, update.status)?;
    Ok(Json(ApiResponse::ok(
        view(&state, booking),
        "Appointment status updated.",
    )))
}

/// GET /api/appointments/provider
pub async fn provider_appointments(
    State(state): State<SharedState>,
    CurrentUser(provider_id): CurrentUser,
) -> Json<ApiResponse<Vec<AppointmentView>>> {
    let bookings = state.bookings.bookings_for_provider(provider_id);
    Json(ApiResponse::ok(
        views(&state, bookings),
        "Fetched provider appointments.",
    ))
}

/// GET /api/appointments/provider/upcoming
pub async fn upcoming_appointments(
    State(state): State<SharedState>,
    CurrentUser(provider_id): CurrentUser,
) -> Json<ApiResponse<Vec<AppointmentView>>> {
    let now = Utc::now().naive_utc();
    let bookings = state.bookings.upcoming_for_provider(provider_id, now);
    Json(ApiResponse::ok(
        views(&state, bookings),
        "Fetched upcoming appointments.",
    ))
}

/// GET /api/appointments/provider/date?date=YYYY-MM-DD
pub async fn appointments_on_date(
    State(state): State<SharedState>,
    CurrentUser(provider_id): CurrentUser,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Json<ApiResponse<Vec<AppointmentView>>> {
    let bookings = state.bookings.bookings_on(provider_id, query.date);
    Json(ApiResponse::ok(
        views(&state, bookings),
        format!("Fetched appointments on {}.", query.date),
    ))
}
