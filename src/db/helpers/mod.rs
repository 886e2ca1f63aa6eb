use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formatted_timestamps_round_trip_and_sort() {
        let early = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1);

        let early_raw = format_datetime(&early);
        let late_raw = format_datetime(&late);
        assert!(early_raw < late_raw);
        assert_eq!(parse_datetime(&early_raw, "scan_timestamp").unwrap(), early);
    }

    #[test]
    fn invalid_timestamp_names_the_field() {
        let err = parse_datetime("yesterday", "created_at").unwrap_err();
        assert!(err.to_string().contains("created_at"));
    }
}
