use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Parses the timestamp formats accepted by `GET /payments-summary`.
///
/// Tries RFC 3339 and RFC 2822 first, then common naive layouts (read as UTC),
/// plain dates (midnight UTC), and finally unix epochs in seconds,
/// milliseconds, microseconds or nanoseconds depending on the digit count.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    parse_epoch(s)
}

fn parse_epoch(s: &str) -> Option<DateTime<Utc>> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i64 = s.parse().ok()?;
    let (secs, nanos) = match s.len() {
        0..=10 => (value, 0),
        11..=13 => (value / 1_000, (value % 1_000) * 1_000_000),
        14..=16 => (value / 1_000_000, (value % 1_000_000) * 1_000),
        _ => (value / 1_000_000_000, value % 1_000_000_000),
    };
    DateTime::from_timestamp(secs, nanos as u32)
}

/// Serde adapter writing RFC 3339 with a fixed nanosecond fraction and `Z`.
pub mod rfc3339_nanos {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, sec).unwrap()
    }

    #[test]
    fn test_rfc3339_variants() {
        assert_eq!(parse_timestamp("2025-07-10T12:34:56Z"), Some(utc(2025, 7, 10, 12, 34, 56)));
        assert_eq!(
            parse_timestamp("2025-07-10T09:34:56-03:00"),
            Some(utc(2025, 7, 10, 12, 34, 56))
        );

        let precise = parse_timestamp("2025-07-10T12:34:56.000000001Z").unwrap();
        assert_eq!(precise.nanosecond(), 1);
    }

    #[test]
    fn test_naive_and_date_only() {
        assert_eq!(parse_timestamp("2025-07-10T12:34:56.000"), Some(utc(2025, 7, 10, 12, 34, 56)));
        assert_eq!(parse_timestamp("2025-07-10 12:34:56"), Some(utc(2025, 7, 10, 12, 34, 56)));
        assert_eq!(parse_timestamp("2025-07-10"), Some(utc(2025, 7, 10, 0, 0, 0)));
        assert_eq!(parse_timestamp("2025/07/10"), Some(utc(2025, 7, 10, 0, 0, 0)));
    }

    #[test]
    fn test_epochs() {
        assert_eq!(parse_timestamp("1752150896"), Some(utc(2025, 7, 10, 12, 34, 56)));
        assert_eq!(parse_timestamp("1752150896000"), Some(utc(2025, 7, 10, 12, 34, 56)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2025-13-45"), None);
    }
}
