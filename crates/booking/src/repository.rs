//! Persistence boundary for schedules and bookings, with in-memory
//! implementations.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDateTime, Utc, Weekday};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use slotgate_common::{SlotgateError, SlotgateResult};

use crate::model::{
    AvailabilitySlot, Booking, BookingId, BookingStatus, CustomerId, NewBooking, ProviderId,
};

pub trait ScheduleRepository: Send + Sync {
    /// Point lookup by provider and day.
    fn slot(&self, provider_id: ProviderId, day: Weekday) -> Option<AvailabilitySlot>;

    /// Store `slot`, replacing any slot for the same provider and day.
    /// Returns the replaced slot.
    fn upsert(&self, slot: AvailabilitySlot) -> Option<AvailabilitySlot>;

    fn slots_for_provider(&self, provider_id: ProviderId) -> Vec<AvailabilitySlot>;

    fn slots_on(&self, day: Weekday) -> Vec<AvailabilitySlot>;
}

pub trait BookingRepository: Send + Sync {
    /// Insert `booking` as PENDING unless an active booking already holds the
    /// same provider and exact appointment time. The check and the insert are
    /// one atomic step.
    fn insert_if_vacant(&self, booking: NewBooking) -> SlotgateResult<Booking>;

    fn get(&self, id: BookingId) -> Option<Booking>;

    /// Change a booking's status. Cancelling releases the booking's time;
    /// reactivating a cancelled booking reclaims it and fails with
    /// `ScheduleConflict` if another booking took it meanwhile.
    fn set_status(&self, id: BookingId, status: BookingStatus) -> SlotgateResult<Booking>;

    /// Whether an active booking holds `provider_id` at exactly `time`.
    fn is_taken(&self, provider_id: ProviderId, time: NaiveDateTime) -> bool;

    fn for_customer(&self, customer_id: CustomerId) -> Vec<Booking>;

    fn for_provider(&self, provider_id: ProviderId) -> Vec<Booking>;

    /// Bookings of `provider_id` with `start <= appointment_time <= end`.
    fn for_provider_between(
        &self,
        provider_id: ProviderId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Vec<Booking>;
}

#[derive(Debug, Default)]
pub struct InMemoryScheduleRepository {
    slots: DashMap<(ProviderId, Weekday), AvailabilitySlot>,
}

impl InMemoryScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleRepository for InMemoryScheduleRepository {
    fn slot(&self, provider_id: ProviderId, day: Weekday) -> Option<AvailabilitySlot> {
        self.slots.get(&(provider_id, day)).map(|s| s.value().clone())
    }

    fn upsert(&self, slot: AvailabilitySlot) -> Option<AvailabilitySlot> {
        self.slots.insert((slot.provider_id, slot.day_of_week), slot)
    }

    fn slots_for_provider(&self, provider_id: ProviderId) -> Vec<AvailabilitySlot> {
        let mut slots: Vec<_> = self
            .slots
            .iter()
            .filter(|e| e.key().0 == provider_id)
            .map(|e| e.value().clone())
            .collect();
        slots.sort_by_key(|s| s.day_of_week.num_days_from_monday());
        slots
    }

    fn slots_on(&self, day: Weekday) -> Vec<AvailabilitySlot> {
        let mut slots: Vec<_> = self
            .slots
            .iter()
            .filter(|e| e.key().1 == day)
            .map(|e| e.value().clone())
            .collect();
        slots.sort_by_key(|s| s.provider_id);
        slots
    }
}

/// Bookings plus a unique index of active `(provider, exact time)` pairs.
///
/// Every write that can claim or release an index slot runs under that
/// slot's index entry lock, then touches the booking row. The lock order is
/// always index before rows.
#[derive(Debug)]
pub struct InMemoryBookingRepository {
    bookings: DashMap<BookingId, Booking>,
    taken: DashMap<(ProviderId, NaiveDateTime), BookingId>,
    next_id: AtomicU64,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self {
            bookings: DashMap::new(),
            taken: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    fn collect(&self, pred: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut found: Vec<_> = self
            .bookings
            .iter()
            .filter(|e| pred(e.value()))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|b| (b.appointment_time, b.id));
        found
    }
}

impl Default for InMemoryBookingRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict(provider_id: ProviderId, time: NaiveDateTime) -> SlotgateError {
    SlotgateError::ScheduleConflict(format!(
        "provider {} already has an appointment at {}",
        provider_id, time
    ))
}

fn not_found(id: BookingId) -> SlotgateError {
    SlotgateError::NotFound(format!("appointment {} not found", id))
}

impl BookingRepository for InMemoryBookingRepository {
    fn insert_if_vacant(&self, new: NewBooking) -> SlotgateResult<Booking> {
        match self.taken.entry((new.provider_id, new.appointment_time)) {
            Entry::Occupied(_) => Err(conflict(new.provider_id, new.appointment_time)),
            Entry::Vacant(vacant) => {
                let now = Utc::now().naive_utc();
                let booking = Booking {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed),
                    customer_id: new.customer_id,
                    individual_service_id: new.individual_service_id,
                    provider_id: new.provider_id,
                    appointment_time: new.appointment_time,
                    status: BookingStatus::Pending,
                    created_at: now,
                    updated_at: now,
                };
                self.bookings.insert(booking.id, booking.clone());
                vacant.insert(booking.id);
                Ok(booking)
            }
        }
    }

    fn get(&self, id: BookingId) -> Option<Booking> {
        self.bookings.get(&id).map(|b| b.value().clone())
    }

    fn set_status(&self, id: BookingId, status: BookingStatus) -> SlotgateResult<Booking> {
        let (provider_id, time) = {
            let booking = self.bookings.get(&id).ok_or_else(|| not_found(id))?;
            (booking.provider_id, booking.appointment_time)
        };

        let apply = |booking: &mut Booking| {
            booking.status = status;
            booking.updated_at = Utc::now().naive_utc();
            booking.clone()
        };

        match self.taken.entry((provider_id, time)) {
            Entry::Occupied(held) => {
                let mut booking = self.bookings.get_mut(&id).ok_or_else(|| not_found(id))?;
                if *held.get() == id {
                    if !status.is_active() {
                        held.remove();
                    }
                } else if status.is_active() {
                    // Only a cancelled booking can be displaced from its time.
                    return Err(conflict(provider_id, time));
                }
                Ok(apply(booking.value_mut()))
            }
            Entry::Vacant(vacant) => {
                let mut booking = self.bookings.get_mut(&id).ok_or_else(|| not_found(id))?;
                if status.is_active() {
                    vacant.insert(id);
                }
                Ok(apply(booking.value_mut()))
            }
        }
    }

    fn is_taken(&self, provider_id: ProviderId, time: NaiveDateTime) -> bool {
        self.taken.contains_key(&(provider_id, time))
    }

    fn for_customer(&self, customer_id: CustomerId) -> Vec<Booking> {
        self.collect(|b| b.customer_id == customer_id)
    }

    fn for_provider(&self, provider_id: ProviderId) -> Vec<Booking> {
        self.collect(|b| b.provider_id == provider_id)
    }

    fn for_provider_between(
        &self,
        provider_id: ProviderId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Vec<Booking> {
        self.collect(|b| {
            b.provider_id == provider_id && b.appointment_time >= start && b.appointment_time <= end
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn new_booking(customer_id: CustomerId, provider_id: ProviderId, time: NaiveDateTime) -> NewBooking {
        NewBooking {
            customer_id,
            individual_service_id: 1,
            provider_id,
            appointment_time: time,
        }
    }

    #[test]
    fn second_insert_at_same_time_conflicts() {
        let repo = InMemoryBookingRepository::new();
        let first = repo.insert_if_vacant(new_booking(1, 7, at(10, 30))).unwrap();
        assert_eq!(first.status, BookingStatus::Pending);

        let second = repo.insert_if_vacant(new_booking(2, 7, at(10, 30)));
        assert!(matches!(second, Err(SlotgateError::ScheduleConflict(_))));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn other_provider_or_time_does_not_conflict() {
        let repo = InMemoryBookingRepository::new();
        repo.insert_if_vacant(new_booking(1, 7, at(10, 30))).unwrap();
        repo.insert_if_vacant(new_booking(1, 8, at(10, 30))).unwrap();
        repo.insert_if_vacant(new_booking(1, 7, at(10, 31))).unwrap();
        assert_eq!(repo.len(), 3);
    }

    #[test]
    fn cancelling_releases_the_time() {
        let repo = InMemoryBookingRepository::new();
        let first = repo.insert_if_vacant(new_booking(1, 7, at(10, 30))).unwrap();

        repo.set_status(first.id, BookingStatus::Cancelled).unwrap();
        assert!(!repo.is_taken(7, at(10, 30)));

        let second = repo.insert_if_vacant(new_booking(2, 7, at(10, 30))).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn reactivating_a_displaced_booking_conflicts() {
        let repo = InMemoryBookingRepository::new();
        let first = repo.insert_if_vacant(new_booking(1, 7, at(10, 30))).unwrap();
        repo.set_status(first.id, BookingStatus::Cancelled).unwrap();
        repo.insert_if_vacant(new_booking(2, 7, at(10, 30))).unwrap();

        let result = repo.set_status(first.id, BookingStatus::Confirmed);
        assert!(matches!(result, Err(SlotgateError::ScheduleConflict(_))));
        assert_eq!(repo.get(first.id).unwrap().status, BookingStatus::Cancelled);
    }

    #[test]
    fn reactivating_a_free_time_reclaims_it() {
        let repo = InMemoryBookingRepository::new();
        let first = repo.insert_if_vacant(new_booking(1, 7, at(10, 30))).unwrap();
        repo.set_status(first.id, BookingStatus::Cancelled).unwrap();

        let confirmed = repo.set_status(first.id, BookingStatus::Confirmed).unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert!(repo.is_taken(7, at(10, 30)));
    }

    #[test]
    fn unknown_booking_is_not_found() {
        let repo = InMemoryBookingRepository::new();
        assert!(matches!(
            repo.set_status(99, BookingStatus::Confirmed),
            Err(SlotgateError::NotFound(_))
        ));
    }

    #[test]
    fn schedule_upsert_keeps_one_slot_per_day() {
        let repo = InMemoryScheduleRepository::new();
        repo.upsert(AvailabilitySlot::unavailable(1, Weekday::Mon));
        let replaced = repo.upsert(AvailabilitySlot::unavailable(1, Weekday::Mon));

        assert!(replaced.is_some());
        assert_eq!(repo.slots_for_provider(1).len(), 1);
    }
}
