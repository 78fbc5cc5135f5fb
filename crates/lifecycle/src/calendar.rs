//! Session date normalization.
//!
//! Every weekly cycle is keyed by its normalized session date: the Monday
//! session start at a fixed local hour in a fixed time zone, stored as UTC.
//! All lookups go through this key, so every entry point must normalize the
//! same way.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use chrono_tz::Tz;

/// The fixed weekly session calendar.
#[derive(Debug, Clone, Copy)]
pub struct SessionCalendar {
    pub tz: Tz,
    /// Local hour of the session start on Mondays.
    pub start_hour: u32,
}

impl Default for SessionCalendar {
    fn default() -> Self {
        Self {
            tz: chrono_tz::America::New_York,
            start_hour: 18,
        }
    }
}

impl SessionCalendar {
    pub fn new(tz: Tz, start_hour: u32) -> Self {
        Self {
            tz,
            start_hour: start_hour.min(23),
        }
    }

    /// Normalized session date for the week containing `now`: the Monday of
    /// that week at the session start hour.
    pub fn this_monday(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.tz);
        let monday = local.date_naive()
            - Duration::days(local.weekday().num_days_from_monday() as i64);
        self.at_start_hour(monday)
    }

    /// Normalized session date for the upcoming Monday. If `now` falls on a
    /// Monday this is the same week's session date.
    pub fn next_monday(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.tz);
        let days_ahead = (7 - local.weekday().num_days_from_monday() as i64) % 7;
        self.at_start_hour(local.date_naive() + Duration::days(days_ahead))
    }

    /// Render a session date in the calendar's local zone for notification
    /// copy.
    pub fn display_date(&self, session_date: DateTime<Utc>) -> String {
        session_date
            .with_timezone(&self.tz)
            .format("%B %-d, %Y")
            .to_string()
    }

    fn at_start_hour(&self, date: chrono::NaiveDate) -> DateTime<Utc> {
        // start_hour is clamped to 0..=23 at construction
        let naive = date
            .and_hms_opt(self.start_hour.min(23), 0, 0)
            .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));
        // DST transitions never land on the session hour in practice, but an
        // ambiguous or skipped local time must still normalize consistently.
        match self.tz.from_local_datetime(&naive) {
            chrono::offset::LocalResult::Single(dt) => dt.with_timezone(&Utc),
            chrono::offset::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            chrono::offset::LocalResult::None => {
                let shifted = naive + Duration::hours(1);
                self.tz
                    .from_local_datetime(&shifted)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn calendar() -> SessionCalendar {
        SessionCalendar::default()
    }

    #[test]
    fn midweek_normalizes_to_same_week_monday() {
        // Wednesday 2026-08-19 10:00 UTC
        let now = Utc.with_ymd_and_hms(2026, 8, 19, 10, 0, 0).unwrap();
        let monday = calendar().this_monday(now);
        // Monday 2026-08-17 18:00 EDT == 22:00 UTC
        assert_eq!(monday, Utc.with_ymd_and_hms(2026, 8, 17, 22, 0, 0).unwrap());
    }

    #[test]
    fn monday_normalizes_to_itself() {
        let now = Utc.with_ymd_and_hms(2026, 8, 17, 12, 0, 0).unwrap();
        let cal = calendar();
        assert_eq!(cal.this_monday(now), cal.next_monday(now));
    }

    #[test]
    fn sunday_next_monday_is_tomorrow() {
        // Sunday 2026-08-16 22:00 UTC (18:00 EDT)
        let now = Utc.with_ymd_and_hms(2026, 8, 16, 22, 0, 0).unwrap();
        let next = calendar().next_monday(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 17, 22, 0, 0).unwrap());
    }

    #[test]
    fn every_entry_point_gets_the_same_key() {
        // Any two instants in the same local week map to one session date
        let cal = calendar();
        let tuesday = Utc.with_ymd_and_hms(2026, 8, 18, 3, 0, 0).unwrap();
        let friday = Utc.with_ymd_and_hms(2026, 8, 21, 23, 0, 0).unwrap();
        assert_eq!(cal.this_monday(tuesday), cal.this_monday(friday));
    }
}
