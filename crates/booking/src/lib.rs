//! Provider schedules and appointment bookings.
//!
//! [`AvailabilityValidator`] answers whether a provider works at a given
//! weekday and time. [`BookingConflictGuard`] commits a booking only when the
//! provider is available and no active booking holds the same provider at the
//! exact same time; the check and the insert are one atomic repository step.
//! [`BookingService`] wraps both with the catalog lookup and the
//! cancel/status lifecycle.

pub mod availability;
pub mod catalog;
pub mod guard;
pub mod model;
pub mod repository;
pub mod service;

pub use availability::AvailabilityValidator;
pub use catalog::{CatalogEntry, ServiceCatalog};
pub use guard::BookingConflictGuard;
pub use model::{
    AvailabilitySlot, AvailabilityStatus, Booking, BookingId, BookingStatus, CustomerId,
    NewBooking, ProviderId, ServiceId,
};
pub use repository::{
    BookingRepository, InMemoryBookingRepository, InMemoryScheduleRepository, ScheduleRepository,
};
pub use service::BookingService;
