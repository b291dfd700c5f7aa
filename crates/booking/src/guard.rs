use std::sync::Arc;

use chrono::Datelike;
use slotgate_common::{SlotgateError, SlotgateResult};
use tracing::{info, warn};

use crate::availability::AvailabilityValidator;
use crate::model::{Booking, NewBooking};
use crate::repository::BookingRepository;

/// Commits a booking only if the provider is available at the requested time
/// and no active booking holds that exact provider and timestamp.
///
/// Availability is checked first, so a request failing both checks reports
/// `ProviderUnavailable`. Conflicts are exact-timestamp matches; bookings
/// with different start times never conflict, whatever their duration.
#[derive(Clone)]
pub struct BookingConflictGuard {
    availability: AvailabilityValidator,
    bookings: Arc<dyn BookingRepository>,
}

impl BookingConflictGuard {
    pub fn new(availability: AvailabilityValidator, bookings: Arc<dyn BookingRepository>) -> Self {
        Self {
            availability,
            bookings,
        }
    }

    pub fn reserve(&self, request: NewBooking) -> SlotgateResult<Booking> {
        let when = request.appointment_time;
        if !self
            .availability
            .is_available(request.provider_id, when.weekday(), when.time())
        {
            warn!(provider_id = request.provider_id, time = %when, "provider not available");
            return Err(SlotgateError::ProviderUnavailable(
                "The provider is not available at the requested time.".into(),
            ));
        }

        let provider_id = request.provider_id;
        match self.bookings.insert_if_vacant(request) {
            Ok(booking) => {
                info!(booking_id = booking.id, provider_id, time = %when, "appointment booked");
                Ok(booking)
            }
            Err(SlotgateError::ScheduleConflict(_)) => {
                warn!(provider_id, time = %when, "provider already booked");
                Err(SlotgateError::ScheduleConflict(
                    "The provider already has an appointment at this time.".into(),
                ))
            }
            Err(e) => Err(e),
        }
    }
}
