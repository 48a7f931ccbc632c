//! Booking slot rules.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use thiserror::Error;

/// Hours at which a visit may start. The shop closes for lunch at 12:00.
pub const BOOKING_SLOTS: [&str; 9] = [
    "08:00", "09:00", "10:00", "11:00", "13:00", "14:00", "15:00", "16:00", "17:00",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Scheduled time must use the HH:MM format")]
    InvalidTimeFormat,
    #[error("Scheduled time {0} is not an available slot")]
    NotASlot(String),
    #[error("Scheduled date cannot be in the past")]
    DateInPast,
    #[error("Scheduled time has already passed")]
    TimeInPast,
}

/// Validates booking dates and times in the shop's local timezone.
#[derive(Debug, Clone, Copy)]
pub struct BookingSchedule {
    offset: FixedOffset,
}

impl BookingSchedule {
    /// `utc_offset_hours` outside -23..=23 falls back to UTC.
    pub fn new(utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn parse_time(time: &str) -> Result<NaiveTime, ScheduleError> {
        let bytes = time.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(ScheduleError::InvalidTimeFormat);
        }
        NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| ScheduleError::InvalidTimeFormat)
    }

    /// The slot must exist, the date must not be before today and the
    /// moment itself must still be ahead.
    pub fn validate(
        &self,
        date: NaiveDate,
        time: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ScheduleError> {
        let start = Self::parse_time(time)?;
        if !BOOKING_SLOTS.contains(&time) {
            return Err(ScheduleError::NotASlot(time.to_string()));
        }

        let local_now = now.with_timezone(&self.offset);
        if date < local_now.date_naive() {
            return Err(ScheduleError::DateInPast);
        }
        if date.and_time(start) <= local_now.naive_local() {
            return Err(ScheduleError::TimeInPast);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    // 2026-03-10 09:30 in UTC+7
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 2, 30, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    #[test_case("9:00", ScheduleError::InvalidTimeFormat)]
    #[test_case("09-00", ScheduleError::InvalidTimeFormat)]
    #[test_case("25:00", ScheduleError::InvalidTimeFormat)]
    #[test_case("12:00", ScheduleError::NotASlot("12:00".into()))]
    #[test_case("08:30", ScheduleError::NotASlot("08:30".into()))]
    fn rejects_bad_times(time: &str, expected: ScheduleError) {
        let schedule = BookingSchedule::new(7);
        assert_eq!(schedule.validate(date(11), time, now()), Err(expected));
    }

    #[test]
    fn rejects_past_dates_and_times() {
        let schedule = BookingSchedule::new(7);
        assert_eq!(
            schedule.validate(date(9), "10:00", now()),
            Err(ScheduleError::DateInPast)
        );
        assert_eq!(
            schedule.validate(date(10), "09:00", now()),
            Err(ScheduleError::TimeInPast)
        );
    }

    #[test]
    fn accepts_later_slot_today_and_future_days() {
        let schedule = BookingSchedule::new(7);
        assert_eq!(schedule.validate(date(10), "10:00", now()), Ok(()));
        assert_eq!(schedule.validate(date(20), "08:00", now()), Ok(()));
    }

    #[test]
    fn uses_shop_offset_for_today() {
        // 2026-03-10 18:00 UTC is already 2026-03-11 01:00 in UTC+7.
        let late = Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap();
        let schedule = BookingSchedule::new(7);
        assert_eq!(
            schedule.validate(date(10), "17:00", late),
            Err(ScheduleError::DateInPast)
        );
        assert_eq!(schedule.validate(date(11), "08:00", late), Ok(()));
    }
}
