//! Whole-day date bounds.
//!
//! Business dates are date-only: a range `start..=end` covers every instant
//! from the midnight of the start day to the last millisecond of the end
//! day, in the local time zone.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// First millisecond of the day containing `instant` in `tz`.
pub fn start_of_day<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> i64 {
    let date = instant.with_timezone(tz).date_naive();
    to_millis(tz, date.and_hms_milli_opt(0, 0, 0, 0), date)
}

/// Last millisecond of the day containing `instant` in `tz`.
pub fn end_of_day<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> i64 {
    let date = instant.with_timezone(tz).date_naive();
    to_millis(tz, date.and_hms_milli_opt(23, 59, 59, 999), date)
}

fn to_millis<Tz: TimeZone>(tz: &Tz, local: Option<NaiveDateTime>, date: NaiveDate) -> i64 {
    let local = local.unwrap_or_else(|| date.and_time(NaiveTime::default()));
    match tz.from_local_datetime(&local) {
        LocalResult::Single(instant) => instant.timestamp_millis(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp_millis(),
        // Skipped by a daylight-saving gap: the day starts when the gap ends.
        LocalResult::None => tz
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()
            .map_or_else(
                || Utc.from_utc_datetime(&local).timestamp_millis(),
                |instant| instant.timestamp_millis(),
            ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Local, Timelike};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn utc_day_bounds() {
        let instant = at(2024, 6, 15, 13, 45);
        let start = start_of_day(instant, &Utc);
        let end = end_of_day(instant, &Utc);

        assert_eq!(start, at(2024, 6, 15, 0, 0).timestamp_millis());
        assert_eq!(end, at(2024, 6, 16, 0, 0).timestamp_millis() - 1);
    }

    #[test]
    fn bounds_ignore_time_of_day() {
        let morning = at(2024, 6, 15, 0, 1);
        let evening = at(2024, 6, 15, 23, 59);
        assert_eq!(start_of_day(morning, &Utc), start_of_day(evening, &Utc));
        assert_eq!(end_of_day(morning, &Utc), end_of_day(evening, &Utc));
    }

    #[test]
    fn offset_zone_shifts_the_day() {
        let moscow = FixedOffset::east_opt(3 * 3600).unwrap();
        // 22:30 UTC is already the next day in Moscow.
        let instant = at(2024, 6, 15, 22, 30);
        let start = start_of_day(instant, &moscow);

        assert_eq!(start, at(2024, 6, 15, 21, 0).timestamp_millis());
        assert_eq!(end_of_day(instant, &moscow) - start, 86_399_999);
    }

    #[test]
    fn local_bounds_cover_the_instant() {
        let instant = at(2024, 6, 15, 12, 0);
        let start = start_of_day(instant, &Local);
        let end = end_of_day(instant, &Local);

        assert!(start <= instant.timestamp_millis());
        assert!(instant.timestamp_millis() <= end);
        let local_start = Local.timestamp_millis_opt(start).unwrap();
        assert_eq!(local_start.hour(), 0);
        assert_eq!(local_start.minute(), 0);
    }
}
