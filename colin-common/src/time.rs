//! Legacy timestamp utilities
//!
//! COLIN stores naive timestamps in Pacific local time. LEAR expects UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

/// Time zone of every naive timestamp in the legacy store
pub const LEGACY_TIMEZONE: Tz = chrono_tz::America::Vancouver;

/// Interpret a legacy Pacific-local timestamp as UTC
///
/// Ambiguous times (the repeated hour when DST ends) resolve to the earlier
/// instant. Times inside the DST gap are shifted forward one hour.
pub fn legacy_to_utc(ts: NaiveDateTime) -> DateTime<Utc> {
    let local = LEGACY_TIMEZONE
        .from_local_datetime(&ts)
        .earliest()
        .or_else(|| {
            LEGACY_TIMEZONE
                .from_local_datetime(&(ts + Duration::hours(1)))
                .earliest()
        });

    match local {
        Some(dt) => dt.with_timezone(&Utc),
        // Unreachable for real zone data; fall back to treating the value as UTC
        None => Utc.from_utc_datetime(&ts),
    }
}

/// RFC 3339 with second precision and an explicit `+00:00` offset
pub fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Legacy timestamp straight to the LEAR string form
pub fn legacy_to_utc_string(ts: NaiveDateTime) -> String {
    format_utc(&legacy_to_utc(ts))
}

/// `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Calendar date of a legacy timestamp as seen in Pacific time
pub fn legacy_date(ts: NaiveDateTime) -> String {
    format_date(ts.date())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_standard_time_offset() {
        // PST is UTC-8
        let utc = legacy_to_utc(ts("2020-01-15 10:00:00"));
        assert_eq!(format_utc(&utc), "2020-01-15T18:00:00+00:00");
    }

    #[test]
    fn test_daylight_time_offset() {
        // PDT is UTC-7
        let utc = legacy_to_utc(ts("2020-07-01 23:30:00"));
        assert_eq!(format_utc(&utc), "2020-07-02T06:30:00+00:00");
    }

    #[test]
    fn test_dst_gap_shifts_forward() {
        // 02:30 does not exist on 2021-03-14 in Vancouver
        let utc = legacy_to_utc(ts("2021-03-14 02:30:00"));
        assert_eq!(format_utc(&utc), "2021-03-14T10:30:00+00:00");
    }

    #[test]
    fn test_ambiguous_picks_earliest() {
        // 01:30 occurs twice on 2021-11-07; the first is PDT (UTC-7)
        let utc = legacy_to_utc(ts("2021-11-07 01:30:00"));
        assert_eq!(format_utc(&utc), "2021-11-07T08:30:00+00:00");
    }

    #[test]
    fn test_legacy_date_uses_local_calendar_day() {
        assert_eq!(legacy_date(ts("2020-07-01 23:30:00")), "2020-07-01");
    }
}
