use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::Timestamp;

/// Timezone the verification time is shown in unless configured otherwise
pub const DEFAULT_DISPLAY_TIMEZONE: Tz = chrono_tz::Asia::Jakarta;

/// en-US date with a 24-hour clock, e.g. `1/15/2025, 17:03:09`
const DISPLAY_FORMAT: &str = "%-m/%-d/%Y, %H:%M:%S";

/// Parse a configured timezone name, e.g. `Asia/Jakarta`
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.parse().ok()
}

/// Format a last-verified timestamp in `tz`. Text that is not RFC 3339 is
/// shown as-is.
pub fn format_last_verified(timestamp: &Timestamp, tz: Tz) -> String {
    let utc = match timestamp {
        Timestamp::Millis(ms) => DateTime::<Utc>::from_timestamp_millis(*ms),
        Timestamp::Text(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
    };

    match (utc, timestamp) {
        (Some(utc), _) => format_in(utc, tz),
        (None, Timestamp::Text(text)) => text.clone(),
        (None, Timestamp::Millis(ms)) => ms.to_string(),
    }
}

fn format_in(utc: DateTime<Utc>, tz: Tz) -> String {
    tz.from_utc_datetime(&utc.naive_utc())
        .format(DISPLAY_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_iso_in_jakarta() {
        let ts = Timestamp::Text("2025-01-15T10:03:09.000Z".to_string());
        assert_eq!(
            format_last_verified(&ts, DEFAULT_DISPLAY_TIMEZONE),
            "1/15/2025, 17:03:09"
        );
    }

    #[test]
    fn test_format_crosses_midnight() {
        let ts = Timestamp::Text("2024-12-31T20:30:00Z".to_string());
        assert_eq!(
            format_last_verified(&ts, DEFAULT_DISPLAY_TIMEZONE),
            "1/1/2025, 03:30:00"
        );
    }

    #[test]
    fn test_format_millis() {
        // 2025-01-15T10:03:09Z
        let ts = Timestamp::Millis(1_736_935_389_000);
        assert_eq!(
            format_last_verified(&ts, DEFAULT_DISPLAY_TIMEZONE),
            "1/15/2025, 17:03:09"
        );
    }

    #[test]
    fn test_format_other_timezone() {
        let ts = Timestamp::Text("2025-01-15T10:03:09Z".to_string());
        let utc = parse_timezone("UTC").unwrap();
        assert_eq!(format_last_verified(&ts, utc), "1/15/2025, 10:03:09");
    }

    #[test]
    fn test_unparseable_text_is_kept() {
        let ts = Timestamp::Text("yesterday".to_string());
        assert_eq!(format_last_verified(&ts, DEFAULT_DISPLAY_TIMEZONE), "yesterday");
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Asia/Jakarta"), Some(chrono_tz::Asia::Jakarta));
        assert!(parse_timezone("Mars/Olympus").is_none());
    }
}
