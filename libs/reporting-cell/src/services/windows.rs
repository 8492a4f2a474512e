// libs/reporting-cell/src/services/windows.rs
use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveTime, Utc};

use crate::models::{BucketGranularity, ReportError, Timespan, TimespanWindow};

const DAY_HISTORY_DAYS: u64 = 29;
const WEEK_HISTORY_WEEKS: u64 = 9;
const MONTH_HISTORY_MONTHS: u32 = 9;
const YEAR_HISTORY_YEARS: i32 = 9;

/// Midnight of `date` on the clinic's clock, as a UTC instant.
fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - chrono::Duration::seconds(offset.local_minus_utc().into());
    DateTime::from_naive_utc_and_offset(utc, Utc)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday().into())
}

fn month_start(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
}

fn year_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// Resolve a preset against `now`, with calendar boundaries taken on the
/// clinic's clock.
pub fn resolve_window(
    timespan: Timespan,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<TimespanWindow, ReportError> {
    let today = now.with_timezone(&offset).date_naive();

    let dates = match timespan {
        Timespan::Day => {
            let previous = today.checked_sub_days(Days::new(1));
            let history = today.checked_sub_days(Days::new(DAY_HISTORY_DAYS));
            Some((today, previous, history))
        }
        Timespan::Week => {
            let start = week_start(today);
            let previous = start.checked_sub_days(Days::new(7));
            let history = start.checked_sub_days(Days::new(7 * WEEK_HISTORY_WEEKS));
            Some((start, previous, history))
        }
        Timespan::Month => {
            let start = month_start(today).ok_or(ReportError::WindowOutOfRange)?;
            let previous = start.checked_sub_months(Months::new(1));
            let history = start.checked_sub_months(Months::new(MONTH_HISTORY_MONTHS));
            Some((start, previous, history))
        }
        Timespan::Year => {
            let start = year_start(today.year()).ok_or(ReportError::WindowOutOfRange)?;
            let previous = year_start(today.year() - 1);
            let history = year_start(today.year() - YEAR_HISTORY_YEARS);
            Some((start, previous, history))
        }
        Timespan::All => None,
    };

    let window = match dates {
        Some((start, previous, history)) => {
            let previous = previous.ok_or(ReportError::WindowOutOfRange)?;
            let history = history.ok_or(ReportError::WindowOutOfRange)?;

            TimespanWindow {
                timespan,
                current_start: Some(local_midnight(start, offset)),
                previous_start: Some(local_midnight(previous, offset)),
                history_start: Some(local_midnight(history, offset)),
                granularity: timespan.granularity(),
            }
        }
        None => TimespanWindow {
            timespan,
            current_start: None,
            previous_start: None,
            history_start: None,
            granularity: timespan.granularity(),
        },
    };

    Ok(window)
}

/// Bucket key for an instant: the first local day of its day, week, month or year.
pub fn bucket_of(at: DateTime<Utc>, granularity: BucketGranularity, offset: FixedOffset) -> NaiveDate {
    let local = at.with_timezone(&offset).date_naive();

    match granularity {
        BucketGranularity::Day => local,
        BucketGranularity::Week => week_start(local),
        BucketGranularity::Month => month_start(local).unwrap_or(local),
        BucketGranularity::Year => year_start(local.year()).unwrap_or(local),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_day_window() {
        // Wednesday
        let window = resolve_window(Timespan::Day, at(2024, 3, 6, 15), utc()).unwrap();

        assert_eq!(window.current_start, Some(at(2024, 3, 6, 0)));
        assert_eq!(window.previous_start, Some(at(2024, 3, 5, 0)));
        assert_eq!(window.history_start, Some(at(2024, 2, 6, 0)));
        assert_eq!(window.granularity, BucketGranularity::Day);
    }

    #[test]
    fn test_week_window_starts_on_monday() {
        let window = resolve_window(Timespan::Week, at(2024, 3, 6, 15), utc()).unwrap();

        assert_eq!(window.current_start, Some(at(2024, 3, 4, 0)));
        assert_eq!(window.previous_start, Some(at(2024, 2, 26, 0)));
        assert_eq!(window.history_start, Some(at(2024, 1, 1, 0)));
    }

    #[test]
    fn test_week_window_on_sunday_reaches_back_to_monday() {
        let window = resolve_window(Timespan::Week, at(2024, 3, 10, 23), utc()).unwrap();
        assert_eq!(window.current_start, Some(at(2024, 3, 4, 0)));
    }

    #[test]
    fn test_month_window_starts_on_first_day() {
        let window = resolve_window(Timespan::Month, at(2024, 3, 31, 12), utc()).unwrap();

        assert_eq!(window.current_start, Some(at(2024, 3, 1, 0)));
        assert_eq!(window.previous_start, Some(at(2024, 2, 1, 0)));
        assert_eq!(window.history_start, Some(at(2023, 6, 1, 0)));
        assert_eq!(window.granularity, BucketGranularity::Month);
    }

    #[test]
    fn test_month_window_crosses_year_boundary() {
        let window = resolve_window(Timespan::Month, at(2024, 1, 15, 12), utc()).unwrap();
        assert_eq!(window.previous_start, Some(at(2023, 12, 1, 0)));
    }

    #[test]
    fn test_year_window_starts_on_january_first() {
        let window = resolve_window(Timespan::Year, at(2024, 7, 4, 9), utc()).unwrap();

        assert_eq!(window.current_start, Some(at(2024, 1, 1, 0)));
        assert_eq!(window.previous_start, Some(at(2023, 1, 1, 0)));
        assert_eq!(window.history_start, Some(at(2015, 1, 1, 0)));
    }

    #[test]
    fn test_all_time_window_is_open() {
        let window = resolve_window(Timespan::All, at(2024, 7, 4, 9), utc()).unwrap();

        assert_eq!(window.current_start, None);
        assert_eq!(window.fetch_start(), None);
        assert!(window.previous_mirrors_current());
        assert!(window.in_current(at(1999, 1, 1, 0)));
        assert!(!window.in_previous(at(1999, 1, 1, 0)));
    }

    #[test]
    fn test_boundaries_follow_clinic_offset() {
        // 23:30 UTC on the 5th is already the 6th at UTC+3
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 23, 30, 0).unwrap();
        let window = resolve_window(Timespan::Day, now, offset).unwrap();

        assert_eq!(window.current_start, Some(at(2024, 3, 5, 21)));
        assert_eq!(window.previous_start, Some(at(2024, 3, 4, 21)));
    }

    #[test]
    fn test_window_membership() {
        let window = resolve_window(Timespan::Day, at(2024, 3, 6, 15), utc()).unwrap();

        assert!(window.in_current(at(2024, 3, 6, 0)));
        assert!(!window.in_current(at(2024, 3, 5, 23)));
        assert!(window.in_previous(at(2024, 3, 5, 23)));
        assert!(!window.in_previous(at(2024, 3, 6, 0)));
        assert!(!window.in_history(at(2024, 2, 5, 23)));
        assert_eq!(window.fetch_start(), Some(at(2024, 2, 6, 0)));
    }

    #[test]
    fn test_bucket_keys() {
        let instant = at(2024, 3, 6, 15);

        assert_eq!(bucket_of(instant, BucketGranularity::Day, utc()), NaiveDate::from_ymd_opt(2024, 3, 6).unwrap());
        assert_eq!(bucket_of(instant, BucketGranularity::Week, utc()), NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(bucket_of(instant, BucketGranularity::Month, utc()), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(bucket_of(instant, BucketGranularity::Year, utc()), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_bucket_key_uses_local_date() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        // 02:00 UTC on Jan 1 is still Dec 31 at UTC-5
        let instant = at(2024, 1, 1, 2);
        assert_eq!(bucket_of(instant, BucketGranularity::Year, offset), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    }
}
