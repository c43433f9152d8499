//! Schema-aware timestamp decoding for stored records.
//!
//! Every timestamp field on a record is a `DateTime<Utc>` and serializes as
//! RFC 3339. Decoding is more lenient: legacy collections contain plain
//! `YYYY-MM-DD` dates and zone-less `datetime-local` values, which are taken
//! as UTC rather than left behind as strings.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parse any accepted timestamp spelling into UTC.
pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
}

/// Same as [`deserialize`] for optional fields; pair with `#[serde(default)]`.
pub mod option {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}"))),
        }
    }
}

/// `YYYY-MM` bucket label used by the growth series.
pub fn month_label(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Midnight UTC on the given calendar day. Fixtures are written this way.
pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_accepts_rfc3339_and_plain_dates() {
        let full = parse("2024-12-20T10:30:00.000Z").unwrap();
        assert_eq!(full.day(), 20);

        let offset = parse("2024-12-20T10:30:00+10:00").unwrap();
        assert_eq!(offset, Utc.with_ymd_and_hms(2024, 12, 20, 0, 30, 0).unwrap());

        let plain = parse("2023-01-15").unwrap();
        assert_eq!(plain, date(2023, 1, 15));

        let local = parse("2025-01-10T09:30").unwrap();
        assert_eq!(local, Utc.with_ymd_and_hms(2025, 1, 10, 9, 30, 0).unwrap());

        assert!(parse("yesterday").is_none());
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label(&date(2024, 3, 15)), "2024-03");
    }
}
