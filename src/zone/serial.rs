//! SOA serial policy (`YYYYMMDDnn`).

use chrono::{Datelike, NaiveDate, Utc};

/// First serial of a UTC calendar day
pub fn date_serial(date: NaiveDate) -> u32 {
    date.year() as u32 * 1_000_000 + date.month() * 10_000 + date.day() * 100
}

/// Next serial after `previous` for the given day.
///
/// Returns the day's `YYYYMMDD00` when that is larger than `previous`,
/// otherwise `previous + 1`. The result is therefore always strictly greater
/// than `previous`, also when `previous` is ahead of the calendar.
///
/// The one exception is `previous == u32::MAX`, where the count restarts at
/// the day's serial. Secondaries compare serials with RFC 1982 arithmetic,
/// in which any value less than 2^31 ahead of `u32::MAX` is newer, so the
/// restart still reads as an increase to them.
pub fn next_serial_on(previous: u32, date: NaiveDate) -> u32 {
    let base = date_serial(date);
    if previous < base {
        return base;
    }
    previous.checked_add(1).unwrap_or(base)
}

/// Catalog serials are plain counters: `previous + 1`, restarting at 1
/// after `u32::MAX` (newer under RFC 1982 arithmetic)
pub fn increment_serial(previous: u32) -> u32 {
    previous.checked_add(1).unwrap_or(1)
}

/// [`next_serial_on`] for the current UTC date
pub fn next_serial(previous: u32) -> u32 {
    next_serial_on(previous, Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `a` is newer than `b` under RFC 1982 serial number arithmetic
    fn serial_is_newer(a: u32, b: u32) -> bool {
        a != b && a.wrapping_sub(b) < 1 << 31
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_serial_of_day() {
        assert_eq!(next_serial_on(0, day(2024, 3, 9)), 2024030900);
        assert_eq!(next_serial_on(2024030817, day(2024, 3, 9)), 2024030900);
    }

    #[test]
    fn test_same_day_increments() {
        let today = day(2024, 3, 9);
        let first = next_serial_on(0, today);
        let second = next_serial_on(first, today);
        let third = next_serial_on(second, today);
        assert_eq!(second, 2024030901);
        assert_eq!(third, 2024030902);
    }

    #[test]
    fn test_never_decreases_past_99() {
        let today = day(2024, 3, 9);
        // A busy day ran past the two-digit counter into tomorrow's range
        assert_eq!(next_serial_on(2024030999, today), 2024031000);
        assert_eq!(next_serial_on(2024031000, day(2024, 3, 10)), 2024031001);
    }

    #[test]
    fn test_serial_ahead_of_calendar() {
        assert_eq!(next_serial_on(2099010100, day(2024, 3, 9)), 2099010101);
    }

    #[test]
    fn test_exhausted_serial_restarts_at_date() {
        let today = day(2024, 3, 9);
        let next = next_serial_on(u32::MAX, today);
        assert_eq!(next, 2024030900);
        assert!(serial_is_newer(next, u32::MAX));
        assert!(serial_is_newer(next_serial_on(u32::MAX - 1, today), u32::MAX - 1));
    }

    #[test]
    fn test_increment_serial() {
        assert_eq!(increment_serial(0), 1);
        assert_eq!(increment_serial(41), 42);
        assert_eq!(increment_serial(u32::MAX), 1);
        assert!(serial_is_newer(increment_serial(u32::MAX), u32::MAX));
        assert!(!serial_is_newer(5, 5));
        assert!(!serial_is_newer(4, 5));
    }
}
