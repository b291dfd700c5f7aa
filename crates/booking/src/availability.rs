use std::sync::Arc;

use chrono::{NaiveTime, Weekday};
use slotgate_common::SlotgateResult;
use tracing::{debug, info};

use crate::model::{AvailabilitySlot, ProviderId};
use crate::repository::ScheduleRepository;

/// Answers whether a provider declared themselves available at a given
/// weekday and time, and records new declarations.
#[derive(Clone)]
pub struct AvailabilityValidator {
    schedules: Arc<dyn ScheduleRepository>,
}

impl AvailabilityValidator {
    pub fn new(schedules: Arc<dyn ScheduleRepository>) -> Self {
        Self { schedules }
    }

    /// True iff the provider's slot for `day` is AVAILABLE and
    /// `start <= time < end`. No slot for the day means not available.
    pub fn is_available(&self, provider_id: ProviderId, day: Weekday, time: NaiveTime) -> bool {
        let available = self
            .schedules
            .slot(provider_id, day)
            .map(|slot| slot.covers(time))
            .unwrap_or(false);
        debug!(provider_id, day = %day, time = %time, available, "provider availability check");
        available
    }

    /// Validate and store a slot, replacing the provider's previous slot for
    /// that day.
    pub fn declare(&self, slot: AvailabilitySlot) -> SlotgateResult<AvailabilitySlot> {
        slot.validate()?;
        let replaced = self.schedules.upsert(slot.clone());
        info!(
            provider_id = slot.provider_id,
            day = %slot.day_of_week,
            status = ?slot.status,
            replaced = replaced.is_some(),
            "schedule slot declared"
        );
        Ok(slot)
    }

    pub fn slot_for(&self, provider_id: ProviderId, day: Weekday) -> Option<AvailabilitySlot> {
        self.schedules.slot(provider_id, day)
    }

    /// A provider's slots in weekday order, Monday first.
    pub fn schedule_for(&self, provider_id: ProviderId) -> Vec<AvailabilitySlot> {
        self.schedules.slots_for_provider(provider_id)
    }

    pub fn schedules_on(&self, day: Weekday) -> Vec<AvailabilitySlot> {
        self.schedules.slots_on(day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AvailabilityStatus;
    use crate::repository::InMemoryScheduleRepository;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn validator() -> AvailabilityValidator {
        AvailabilityValidator::new(Arc::new(InMemoryScheduleRepository::new()))
    }

    #[test]
    fn window_bounds_are_half_open() {
        let v = validator();
        v.declare(AvailabilitySlot::available(1, Weekday::Mon, t(10, 0), t(11, 0)).unwrap())
            .unwrap();

        assert!(v.is_available(1, Weekday::Mon, t(10, 0)));
        assert!(v.is_available(1, Weekday::Mon, t(10, 30)));
        assert!(!v.is_available(1, Weekday::Mon, t(11, 0)));
    }

    #[test]
    fn undeclared_day_is_unavailable() {
        let v = validator();
        v.declare(AvailabilitySlot::available(1, Weekday::Mon, t(10, 0), t(11, 0)).unwrap())
            .unwrap();

        assert!(!v.is_available(1, Weekday::Tue, t(10, 30)));
        assert!(!v.is_available(2, Weekday::Mon, t(10, 30)));
    }

    #[test]
    fn unavailable_declaration_replaces_window() {
        let v = validator();
        v.declare(AvailabilitySlot::available(1, Weekday::Fri, t(9, 0), t(17, 0)).unwrap())
            .unwrap();
        v.declare(AvailabilitySlot::unavailable(1, Weekday::Fri)).unwrap();

        assert!(!v.is_available(1, Weekday::Fri, t(12, 0)));
        assert_eq!(v.schedule_for(1).len(), 1);
        assert_eq!(
            v.slot_for(1, Weekday::Fri).unwrap().status,
            AvailabilityStatus::Unavailable
        );
    }

    #[test]
    fn declare_rejects_invalid_slot() {
        let v = validator();
        let slot = AvailabilitySlot {
            provider_id: 1,
            day_of_week: Weekday::Wed,
            start_time: Some(t(12, 0)),
            end_time: Some(t(8, 0)),
            status: AvailabilityStatus::Available,
        };
        assert!(v.declare(slot).is_err());
        assert!(v.slot_for(1, Weekday::Wed).is_none());
    }

    #[test]
    fn schedule_is_ordered_by_weekday() {
        let v = validator();
        v.declare(AvailabilitySlot::unavailable(1, Weekday::Sun)).unwrap();
        v.declare(AvailabilitySlot::unavailable(1, Weekday::Mon)).unwrap();
        v.declare(AvailabilitySlot::unavailable(1, Weekday::Wed)).unwrap();

        let days: Vec<_> = v.schedule_for(1).iter().map(|s| s.day_of_week).collect();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Wed, Weekday::Sun]);
    }
}
