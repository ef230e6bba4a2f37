//! Time parsing and the display fix for temporal text columns.
//!
//! Backing engines disagree on how they render `DATE`/`DATETIME`/`TIME`
//! values as text; some emit ISO-8601 with a `T` separator and a zone
//! suffix. Values are normalized so string comparisons stay stable.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

const MICROS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const SECONDS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a datetime: microsecond precision first, then seconds, then a bare date.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, MICROS_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, SECONDS_FORMAT))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// `YYYY-MM-DD HH:MM:SS`, with `.ffffff` only when the sub-second part is non-zero.
pub fn format_datetime(t: &NaiveDateTime) -> String {
    if t.and_utc().timestamp_subsec_micros() == 0 {
        t.format(SECONDS_FORMAT).to_string()
    } else {
        t.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

/// Rewrite ISO-8601 `T`-form text of a temporal column into its canonical form.
///
/// Returns `None` when the column is not temporal or the text is not
/// `YYYY-MM-DDTHH:MM:SS...`.
pub fn normalize_display(type_name: &str, text: &str) -> Option<String> {
    let (date, rest) = text.split_once('T')?;
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    NaiveTime::parse_from_str(rest.get(..8)?, "%H:%M:%S").ok()?;
    match type_name.to_ascii_uppercase().as_str() {
        "DATE" => Some(date.to_string()),
        "DATETIME" | "TIMESTAMP" => Some(format!("{date} {}", clock_part(rest))),
        "TIME" => Some(clock_part(rest)),
        _ => None,
    }
}

/// `HH:MM:SS[.ffffff]` from the text after the `T`, dropping any zone suffix.
fn clock_part(rest: &str) -> String {
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ':' || c == '.'))
        .unwrap_or(rest.len());
    let clock = &rest[..end];
    match clock.split_once('.') {
        Some((hms, frac)) if frac.bytes().any(|b| b != b'0') => {
            let mut frac: String = frac.chars().take(6).collect();
            while frac.len() < 6 {
                frac.push('0');
            }
            format!("{hms}.{frac}")
        }
        Some((hms, _)) => hms.to_string(),
        None => clock.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_with_zero_millis_and_zulu() {
        assert_eq!(
            normalize_display("DATETIME", "2024-01-02T03:04:05.000Z").as_deref(),
            Some("2024-01-02 03:04:05")
        );
    }

    #[test]
    fn text_that_only_contains_t_is_left_alone() {
        assert_eq!(normalize_display("TIME", "Tomorrow"), None);
        assert_eq!(normalize_display("DATETIME", "see Tue"), None);
        assert_eq!(normalize_display("DATE", "TBD"), None);
        assert_eq!(normalize_display("DATETIME", "2024-01-02Tnoon"), None);
        assert_eq!(normalize_display("DATETIME", "2024-13-02T03:04:05"), None);
    }

    #[test]
    fn datetime_keeps_fraction_as_micros() {
        assert_eq!(
            normalize_display("datetime", "2024-01-02T03:04:05.25+08:00").as_deref(),
            Some("2024-01-02 03:04:05.250000")
        );
    }

    #[test]
    fn date_and_time_columns() {
        assert_eq!(
            normalize_display("DATE", "2024-01-02T00:00:00Z").as_deref(),
            Some("2024-01-02")
        );
        assert_eq!(
            normalize_display("TIME", "0000-01-01T13:14:15Z").as_deref(),
            Some("13:14:15")
        );
    }

    #[test]
    fn non_temporal_or_plain_text_untouched() {
        assert_eq!(normalize_display("VARCHAR", "2024-01-02T03:04:05Z"), None);
        assert_eq!(normalize_display("DATETIME", "2024-01-02 03:04:05"), None);
    }

    #[test]
    fn parse_falls_back_to_seconds_and_date() {
        let micro = parse_datetime("2024-01-02 03:04:05.123456").unwrap();
        assert_eq!(micro.and_utc().timestamp_subsec_micros(), 123456);
        let secs = parse_datetime("2024-01-02 03:04:05").unwrap();
        assert_eq!(format_datetime(&secs), "2024-01-02 03:04:05");
        let date = parse_datetime("2024-01-02").unwrap();
        assert_eq!(format_datetime(&date), "2024-01-02 00:00:00");
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn format_renders_micros_when_present() {
        let t = parse_datetime("2024-01-02 03:04:05.5").unwrap();
        assert_eq!(format_datetime(&t), "2024-01-02 03:04:05.500000");
    }
}
