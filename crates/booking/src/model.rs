use chrono::{NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use slotgate_common::{SlotgateError, SlotgateResult};

pub type ProviderId = u64;
pub type CustomerId = u64;
pub type ServiceId = u64;
pub type BookingId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityStatus {
    Available,
    Unavailable,
}

/// A provider's declared recurring availability for one day of the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub provider_id: ProviderId,
    pub day_of_week: Weekday,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: AvailabilityStatus,
}

impl AvailabilitySlot {
    pub fn available(
        provider_id: ProviderId,
        day_of_week: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> SlotgateResult<Self> {
        let slot = Self {
            provider_id,
            day_of_week,
            start_time: Some(start_time),
            end_time: Some(end_time),
            status: AvailabilityStatus::Available,
        };
        slot.validate()?;
        Ok(slot)
    }

    pub fn unavailable(provider_id: ProviderId, day_of_week: Weekday) -> Self {
        Self {
            provider_id,
            day_of_week,
            start_time: None,
            end_time: None,
            status: AvailabilityStatus::Unavailable,
        }
    }

    /// AVAILABLE needs both times with start before end; UNAVAILABLE needs
    /// neither.
    pub fn validate(&self) -> SlotgateResult<()> {
        match self.status {
            AvailabilityStatus::Unavailable => {
                if self.start_time.is_some() || self.end_time.is_some() {
                    return Err(SlotgateError::InvalidSlot(
                        "start and end time must be empty when status is UNAVAILABLE".into(),
                    ));
                }
            }
            AvailabilityStatus::Available => match (self.start_time, self.end_time) {
                (Some(start), Some(end)) if start < end => {}
                (Some(_), Some(_)) => {
                    return Err(SlotgateError::InvalidSlot("start time must be before end time".into()))
                }
                _ => {
                    return Err(SlotgateError::InvalidSlot(
                        "start and end time are required when status is AVAILABLE".into(),
                    ))
                }
            },
        }
        Ok(())
    }

    /// Whether `time` falls in the half-open window `[start, end)` of an
    /// AVAILABLE slot.
    pub fn covers(&self, time: NaiveTime) -> bool {
        match (self.status, self.start_time, self.end_time) {
            (AvailabilityStatus::Available, Some(start), Some(end)) => start <= time && time < end,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Active bookings hold their provider's exact appointment time.
    pub fn is_active(self) -> bool {
        self != BookingStatus::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub customer_id: CustomerId,
    pub individual_service_id: ServiceId,
    pub provider_id: ProviderId,
    pub appointment_time: NaiveDateTime,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A booking about to be reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub customer_id: CustomerId,
    pub individual_service_id: ServiceId,
    pub provider_id: ProviderId,
    pub appointment_time: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn available_slot_needs_ordered_times() {
        assert!(AvailabilitySlot::available(1, Weekday::Mon, t(10, 0), t(11, 0)).is_ok());
        assert!(AvailabilitySlot::available(1, Weekday::Mon, t(11, 0), t(11, 0)).is_err());
        assert!(AvailabilitySlot::available(1, Weekday::Mon, t(12, 0), t(11, 0)).is_err());
    }

    #[test]
    fn available_slot_needs_both_times() {
        let slot = AvailabilitySlot {
            provider_id: 1,
            day_of_week: Weekday::Tue,
            start_time: Some(t(9, 0)),
            end_time: None,
            status: AvailabilityStatus::Available,
        };
        assert!(matches!(slot.validate(), Err(SlotgateError::InvalidSlot(_))));
    }

    #[test]
    fn unavailable_slot_rejects_times() {
        let mut slot = AvailabilitySlot::unavailable(1, Weekday::Sun);
        assert!(slot.validate().is_ok());

        slot.start_time = Some(t(9, 0));
        assert!(slot.validate().is_err());
    }

    #[test]
    fn covers_is_half_open() {
        let slot = AvailabilitySlot::available(1, Weekday::Mon, t(10, 0), t(11, 0)).unwrap();
        assert!(slot.covers(t(10, 0)));
        assert!(slot.covers(t(10, 59)));
        assert!(!slot.covers(t(11, 0)));
        assert!(!slot.covers(t(9, 59)));
        assert!(!AvailabilitySlot::unavailable(1, Weekday::Mon).covers(t(10, 30)));
    }

    #[test]
    fn statuses_serialize_in_upper_case() {
        assert_eq!(serde_json::to_string(&BookingStatus::Pending).unwrap(), "\"PENDING\"");
        assert_eq!(
            serde_json::from_str::<AvailabilityStatus>("\"UNAVAILABLE\"").unwrap(),
            AvailabilityStatus::Unavailable
        );
    }
}
