/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session and logon time windows.
//!
//! A window is a daily or weekly span of wall-clock time, evaluated in UTC
//! or local time per session configuration. Besides membership, the window
//! answers whether two instants fall in the same occurrence; a session
//! whose creation time belongs to an earlier occurrence resets its
//! sequence numbers before the next logon.

use chrono::{DateTime, Datelike, Local, NaiveTime, Timelike, Utc};

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;

/// A recurring time window, daily or weekly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Window opening time of day.
    start: NaiveTime,
    /// Window closing time of day.
    end: NaiveTime,
    /// Opening day (1 = Sunday .. 7 = Saturday) for weekly windows.
    start_day: Option<i8>,
    /// Closing day (1 = Sunday .. 7 = Saturday) for weekly windows.
    end_day: Option<i8>,
    /// Evaluate in local time instead of UTC.
    use_local_time: bool,
}

impl TimeRange {
    /// Creates a daily window.
    #[must_use]
    pub const fn daily(start: NaiveTime, end: NaiveTime, use_local_time: bool) -> Self {
        Self {
            start,
            end,
            start_day: None,
            end_day: None,
            use_local_time,
        }
    }

    /// Creates a weekly window; days use the FIX convention 1 = Sunday.
    #[must_use]
    pub const fn weekly(
        start: NaiveTime,
        start_day: i8,
        end: NaiveTime,
        end_day: i8,
        use_local_time: bool,
    ) -> Self {
        Self {
            start,
            end,
            start_day: Some(start_day),
            end_day: Some(end_day),
            use_local_time,
        }
    }

    /// Returns the window opening time.
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    /// Returns the window closing time.
    #[must_use]
    pub const fn end(&self) -> NaiveTime {
        self.end
    }

    /// Seconds into the (local or UTC) day/week for the given instant.
    fn position(&self, t: DateTime<Utc>) -> (i64, i64) {
        let (day, secs) = if self.use_local_time {
            let local = t.with_timezone(&Local);
            (
                local.weekday().num_days_from_sunday() as i64,
                local.time().num_seconds_from_midnight() as i64,
            )
        } else {
            (
                t.weekday().num_days_from_sunday() as i64,
                t.time().num_seconds_from_midnight() as i64,
            )
        };
        (day, secs)
    }

    /// Window boundaries in seconds within the day (daily) or week (weekly).
    fn bounds(&self) -> (i64, i64, i64) {
        let start_secs = self.start.num_seconds_from_midnight() as i64;
        let end_secs = self.end.num_seconds_from_midnight() as i64;
        match (self.start_day, self.end_day) {
            (Some(sd), Some(ed)) => (
                (sd as i64 - 1) * SECONDS_PER_DAY + start_secs,
                (ed as i64 - 1) * SECONDS_PER_DAY + end_secs,
                SECONDS_PER_WEEK,
            ),
            _ => (start_secs, end_secs, SECONDS_PER_DAY),
        }
    }

    /// Seconds into the window period for the given instant.
    fn period_offset(&self, t: DateTime<Utc>) -> i64 {
        let (day, secs) = self.position(t);
        let (_, _, period) = self.bounds();
        if period == SECONDS_PER_WEEK {
            day * SECONDS_PER_DAY + secs
        } else {
            secs
        }
    }

    /// Returns true if the instant falls inside the window.
    #[must_use]
    pub fn is_in_range(&self, t: DateTime<Utc>) -> bool {
        let (start, end, period) = self.bounds();
        let offset = self.period_offset(t);
        if start <= end {
            offset >= start && offset <= end
        } else {
            // Window wraps the period boundary.
            offset >= start || offset <= end
        }
    }

    /// Epoch second at which the window occurrence containing (or most
    /// recently preceding) `t` opened.
    fn occurrence_start(&self, t: DateTime<Utc>) -> i64 {
        let (start, _, period) = self.bounds();
        let offset = self.period_offset(t);
        let period_base = t.timestamp() - offset;
        if offset >= start {
            period_base + start
        } else {
            period_base + start - period
        }
    }

    /// Returns true if both instants belong to the same window occurrence.
    ///
    /// Used for the day-rollover rule: a session created in a previous
    /// occurrence must reset its sequence numbers.
    #[must_use]
    pub fn is_in_same_range(&self, t1: DateTime<Utc>, t2: DateTime<Utc>) -> bool {
        if !self.is_in_range(t1) || !self.is_in_range(t2) {
            return false;
        }
        self.occurrence_start(t1) == self.occurrence_start(t2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_daily_window_membership() {
        let range = TimeRange::daily(time(9, 0), time(17, 0), false);

        assert!(range.is_in_range(utc(2024, 1, 15, 9, 0)));
        assert!(range.is_in_range(utc(2024, 1, 15, 12, 30)));
        assert!(range.is_in_range(utc(2024, 1, 15, 17, 0)));
        assert!(!range.is_in_range(utc(2024, 1, 15, 8, 59)));
        assert!(!range.is_in_range(utc(2024, 1, 15, 17, 1)));
    }

    #[test]
    fn test_overnight_window_membership() {
        let range = TimeRange::daily(time(22, 0), time(6, 0), false);

        assert!(range.is_in_range(utc(2024, 1, 15, 23, 0)));
        assert!(range.is_in_range(utc(2024, 1, 16, 3, 0)));
        assert!(!range.is_in_range(utc(2024, 1, 15, 12, 0)));
    }

    #[test]
    fn test_weekly_window_membership() {
        // Monday 08:00 through Friday 17:00. 2024-01-15 is a Monday.
        let range = TimeRange::weekly(time(8, 0), 2, time(17, 0), 6, false);

        assert!(range.is_in_range(utc(2024, 1, 15, 8, 0)));
        assert!(range.is_in_range(utc(2024, 1, 17, 3, 0)));
        assert!(range.is_in_range(utc(2024, 1, 19, 17, 0)));
        assert!(!range.is_in_range(utc(2024, 1, 14, 12, 0)));
        assert!(!range.is_in_range(utc(2024, 1, 19, 17, 1)));
        assert!(!range.is_in_range(utc(2024, 1, 20, 12, 0)));
    }

    #[test]
    fn test_same_range_same_day() {
        let range = TimeRange::daily(time(9, 0), time(17, 0), false);

        assert!(range.is_in_same_range(utc(2024, 1, 15, 9, 30), utc(2024, 1, 15, 16, 0)));
        assert!(!range.is_in_same_range(utc(2024, 1, 15, 9, 30), utc(2024, 1, 16, 9, 30)));
    }

    #[test]
    fn test_same_range_overnight() {
        let range = TimeRange::daily(time(22, 0), time(6, 0), false);

        // Tonight 23:00 and tomorrow 03:00 belong to the same occurrence.
        assert!(range.is_in_same_range(utc(2024, 1, 15, 23, 0), utc(2024, 1, 16, 3, 0)));
        // Tomorrow 23:00 opens the next occurrence.
        assert!(!range.is_in_same_range(utc(2024, 1, 15, 23, 0), utc(2024, 1, 16, 23, 0)));
    }

    #[test]
    fn test_same_range_outside_is_false() {
        let range = TimeRange::daily(time(9, 0), time(17, 0), false);
        assert!(!range.is_in_same_range(utc(2024, 1, 15, 8, 0), utc(2024, 1, 15, 10, 0)));
    }

    #[test]
    fn test_weekly_same_range() {
        let range = TimeRange::weekly(time(8, 0), 2, time(17, 0), 6, false);

        assert!(range.is_in_same_range(utc(2024, 1, 15, 9, 0), utc(2024, 1, 19, 16, 0)));
        assert!(!range.is_in_same_range(utc(2024, 1, 15, 9, 0), utc(2024, 1, 22, 9, 0)));
    }
}
