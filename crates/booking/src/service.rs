use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use slotgate_common::{SlotgateError, SlotgateResult};
use tracing::{info, warn};

use crate::availability::AvailabilityValidator;
use crate::catalog::ServiceCatalog;
use crate::guard::BookingConflictGuard;
use crate::model::{Booking, BookingId, BookingStatus, CustomerId, NewBooking, ProviderId, ServiceId};
use crate::repository::{BookingRepository, InMemoryBookingRepository, InMemoryScheduleRepository};

/// The booking lifecycle: book through the conflict guard, cancel as the
/// owning customer, update status as the booking's provider.
#[derive(Clone)]
pub struct BookingService {
    catalog: Arc<ServiceCatalog>,
    guard: BookingConflictGuard,
    bookings: Arc<dyn BookingRepository>,
    availability: AvailabilityValidator,
}

impl BookingService {
    pub fn new(
        catalog: Arc<ServiceCatalog>,
        availability: AvailabilityValidator,
        bookings: Arc<dyn BookingRepository>,
    ) -> Self {
        let guard = BookingConflictGuard::new(availability.clone(), bookings.clone());
        Self {
            catalog,
            guard,
            bookings,
            availability,
        }
    }

    /// Service backed by the in-memory repositories.
    pub fn in_memory(catalog: ServiceCatalog) -> Self {
        Self::new(
            Arc::new(catalog),
            AvailabilityValidator::new(Arc::new(InMemoryScheduleRepository::new())),
            Arc::new(InMemoryBookingRepository::new()),
        )
    }

    pub fn availability(&self) -> &AvailabilityValidator {
        &self.availability
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn book(
        &self,
        customer_id: CustomerId,
        individual_service_id: ServiceId,
        appointment_time: NaiveDateTime,
    ) -> SlotgateResult<Booking> {
        let provider_id = self.catalog.get(individual_service_id)?.provider_id;
        self.guard.reserve(NewBooking {
            customer_id,
            individual_service_id,
            provider_id,
            appointment_time,
        })
    }

    /// Cancel a booking owned by `customer_id`. Cancelling an already
    /// cancelled booking succeeds without changes.
    pub fn cancel(&self, customer_id: CustomerId, booking_id: BookingId) -> SlotgateResult<Booking> {
        let booking = self.find(booking_id)?;
        if booking.customer_id != customer_id {
            warn!(booking_id, customer_id, "cancel attempted by non-owner");
            return Err(SlotgateError::Forbidden(
                "You can only cancel your own appointments.".into(),
            ));
        }
        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        let cancelled = self.bookings.set_status(booking_id, BookingStatus::Cancelled)?;
        info!(booking_id, customer_id, "appointment cancelled");
        Ok(cancelled)
    }

    pub fn update_status(
        &self,
        provider_id: ProviderId,
        booking_id: BookingId,
        status: BookingStatus,
    ) -> SlotgateResult<Booking> {
        let booking = self.find(booking_id)?;
        if booking.provider_id != provider_id {
            warn!(booking_id, provider_id, "status update attempted by another provider");
            return Err(SlotgateError::Forbidden(
                "You can only update your own appointments.".into(),
            ));
        }
        if booking.status == status {
            return Ok(booking);
        }

        let updated = self.bookings.set_status(booking_id, status)?;
        info!(booking_id, provider_id, from = ?booking.status, to = ?status, "appointment status updated");
        Ok(updated)
    }

    pub fn get(&self, booking_id: BookingId) -> SlotgateResult<Booking> {
        self.find(booking_id)
    }

    pub fn bookings_for_customer(&self, customer_id: CustomerId) -> Vec<Booking> {
        self.bookings.for_customer(customer_id)
    }

    pub fn bookings_for_provider(&self, provider_id: ProviderId) -> Vec<Booking> {
        self.bookings.for_provider(provider_id)
    }

    /// Active bookings of `provider_id` at or after `now`.
    pub fn upcoming_for_provider(&self, provider_id: ProviderId, now: NaiveDateTime) -> Vec<Booking> {
        self.bookings
            .for_provider(provider_id)
            .into_iter()
            .filter(|b| b.appointment_time >= now && b.status.is_active())
            .collect()
    }

    /// All bookings of `provider_id` on the calendar day `date`.
    pub fn bookings_on(&self, provider_id: ProviderId, date: NaiveDate) -> Vec<Booking> {
        let start = date.and_time(NaiveTime::default());
        let end = match NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999) {
            Some(t) => date.and_time(t),
            None => start,
        };
        self.bookings.for_provider_between(provider_id, start, end)
    }

    fn find(&self, booking_id: BookingId) -> SlotgateResult<Booking> {
        self.bookings
            .get(booking_id)
            .ok_or_else(|| SlotgateError::NotFound(format!("appointment {} not found", booking_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::model::AvailabilitySlot;
    use chrono::Weekday;

    fn monday(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn service() -> BookingService {
        let service = BookingService::in_memory(ServiceCatalog::new([CatalogEntry {
            id: 1,
            provider_id: 7,
            name: "Haircut".into(),
            duration_minutes: 30,
        }]));
        service
            .availability()
            .declare(
                AvailabilitySlot::available(
                    7,
                    Weekday::Mon,
                    NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                )
                .unwrap(),
            )
            .unwrap();
        service
    }

    #[test]
    fn book_resolves_provider_from_catalog() {
        let booking = service().book(100, 1, monday(10, 0)).unwrap();
        assert_eq!(booking.provider_id, 7);
        assert_eq!(booking.customer_id, 100);
    }

    #[test]
    fn unknown_service_is_not_found() {
        assert!(matches!(
            service().book(100, 42, monday(10, 0)),
            Err(SlotgateError::NotFound(_))
        ));
    }

    #[test]
    fn only_owner_may_cancel() {
        let service = service();
        let booking = service.book(100, 1, monday(10, 0)).unwrap();

        assert!(matches!(
            service.cancel(200, booking.id),
            Err(SlotgateError::Forbidden(_))
        ));
        let cancelled = service.cancel(100, booking.id).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        // second cancel is a no-op
        assert_eq!(service.cancel(100, booking.id).unwrap().status, BookingStatus::Cancelled);
    }

    #[test]
    fn cancelled_time_can_be_rebooked() {
        let service = service();
        let booking = service.book(100, 1, monday(10, 0)).unwrap();
        service.cancel(100, booking.id).unwrap();

        assert!(service.book(200, 1, monday(10, 0)).is_ok());
    }

    #[test]
    fn only_the_provider_may_update_status() {
        let service = service();
        let booking = service.book(100, 1, monday(10, 0)).unwrap();

        assert!(matches!(
            service.update_status(8, booking.id, BookingStatus::Confirmed),
            Err(SlotgateError::Forbidden(_))
        ));
        let confirmed = service
            .update_status(7, booking.id, BookingStatus::Confirmed)
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
    }

    #[test]
    fn upcoming_skips_past_and_cancelled() {
        let service = service();
        let early = service.book(100, 1, monday(9, 0)).unwrap();
        let cancelled = service.book(100, 1, monday(11, 0)).unwrap();
        let later = service.book(100, 1, monday(15, 0)).unwrap();
        service.cancel(100, cancelled.id).unwrap();

        let upcoming = service.upcoming_for_provider(7, monday(10, 0));
        let ids: Vec<_> = upcoming.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![later.id]);
        assert!(!ids.contains(&early.id));
    }

    #[test]
    fn bookings_on_is_limited_to_one_day() {
        let service = service();
        service.book(100, 1, monday(9, 0)).unwrap();
        service.book(100, 1, monday(16, 59)).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(service.bookings_on(7, date).len(), 2);
        assert!(service.bookings_on(7, date.succ_opt().unwrap()).is_empty());
    }
}
