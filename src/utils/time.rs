use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_rfc3339_utc(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Midnight of `date` in `tz`, expressed in UTC.
///
/// Days that start inside a DST gap fall back to 01:00 local time.
pub fn midnight_in_tz(date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    match tz.from_local_datetime(&midnight) {
        chrono::LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        chrono::LocalResult::None => {
            let shifted = midnight + Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        }
    }
}

/// Calendar date of `instant` as seen in `tz`
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Milliseconds elapsed since `started`, saturating
pub fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339_utc() {
        let dt = parse_rfc3339_utc("2024-01-02T12:00:00+02:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-02T10:00:00+00:00");

        assert!(parse_rfc3339_utc("2024-01-02T10:00:00.000Z").is_some());
        assert!(parse_rfc3339_utc("yesterday").is_none());
        assert!(parse_rfc3339_utc("").is_none());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-02-29"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_date("2023-02-29"), None);
        assert_eq!(parse_date("02/03/2024"), None);
    }

    #[test]
    fn test_midnight_in_tz() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        let utc = midnight_in_tz(date, chrono_tz::UTC).unwrap();
        assert_eq!(utc.to_rfc3339(), "2024-01-15T00:00:00+00:00");

        // Helsinki is UTC+2 in winter
        let helsinki = midnight_in_tz(date, chrono_tz::Europe::Helsinki).unwrap();
        assert_eq!(helsinki.to_rfc3339(), "2024-01-14T22:00:00+00:00");
        assert_eq!(local_date(helsinki, chrono_tz::Europe::Helsinki), date);
    }

    #[test]
    fn test_midnight_in_dst_gap() {
        // Santiago skipped 00:00 -> 01:00 on 2023-09-03
        let date = NaiveDate::from_ymd_opt(2023, 9, 3).unwrap();
        let start = midnight_in_tz(date, chrono_tz::America::Santiago).unwrap();
        assert_eq!(local_date(start, chrono_tz::America::Santiago), date);
    }
}
