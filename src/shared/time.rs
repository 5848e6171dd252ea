use chrono::{DateTime, SecondsFormat, Utc};

pub(crate) fn now_unix_seconds() -> i64 {
    Utc::now().timestamp()
}

/// `YYYY-MM-DDTHH:MM:SSZ`; `None` when the timestamp is outside chrono's range.
pub(crate) fn format_unix_utc(unix_seconds: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(unix_seconds, 0)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_known_instants() {
        assert_eq!(format_unix_utc(0).as_deref(), Some("1970-01-01T00:00:00Z"));
        assert_eq!(
            format_unix_utc(951_782_400).as_deref(),
            Some("2000-02-29T00:00:00Z")
        );
        assert_eq!(
            format_unix_utc(1_700_000_000).as_deref(),
            Some("2023-11-14T22:13:20Z")
        );
        assert_eq!(format_unix_utc(-1).as_deref(), Some("1969-12-31T23:59:59Z"));
    }

    #[test]
    fn out_of_range_timestamp_is_none() {
        assert_eq!(format_unix_utc(i64::MAX), None);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_unix_seconds() > 1_577_836_800);
    }
}
