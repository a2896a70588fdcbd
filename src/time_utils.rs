// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and dashboard ranges.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, SecondsFormat, TimeZone, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Fixed offset for chart labels; out-of-range offsets fall back to UTC.
pub fn label_offset(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

/// `DD/MM/YYYY` label for an epoch-seconds timestamp.
pub fn format_label(timestamp: i64, offset: FixedOffset) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.with_timezone(&offset).format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

/// Epoch seconds of midnight on the first day of `month`'s month.
pub fn start_of_month(month: NaiveDate, offset: FixedOffset) -> i64 {
    month
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|dt| offset.from_local_datetime(&dt).single())
        .map(|dt| dt.timestamp())
        .unwrap_or_default()
}

/// Epoch seconds of the last second of the month containing `now`.
pub fn end_of_month(now: DateTime<Utc>, offset: FixedOffset) -> i64 {
    let local = now.with_timezone(&offset);
    let (year, month) = if local.month() == 12 {
        (local.year() + 1, 1)
    } else {
        (local.year(), local.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|next| start_of_month(next, offset) - 1)
        .unwrap_or_else(|| now.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_label_utc() {
        // 2020-01-01T00:00:00Z
        assert_eq!(format_label(1_577_836_800, label_offset(0)), "01/01/2020");
    }

    #[test]
    fn test_format_label_with_offset() {
        // 2019-12-31T23:00:00Z is midnight in UTC+1
        assert_eq!(format_label(1_577_833_200, label_offset(60)), "01/01/2020");
        assert_eq!(format_label(1_577_833_200, label_offset(0)), "31/12/2019");
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        assert_eq!(label_offset(1440), Utc.fix());
        assert_eq!(label_offset(i32::MAX), Utc.fix());
        assert_eq!(label_offset(i32::MIN), Utc.fix());
        assert_eq!(label_offset(-300).local_minus_utc(), -18_000);
    }

    #[test]
    fn test_month_range() {
        let offset = label_offset(0);
        let jan = NaiveDate::from_ymd_opt(2020, 1, 15).unwrap();
        assert_eq!(start_of_month(jan, offset), 1_577_836_800);

        let now = Utc.with_ymd_and_hms(2020, 12, 10, 8, 0, 0).unwrap();
        // 2021-01-01T00:00:00Z minus one second
        assert_eq!(end_of_month(now, offset), 1_609_459_199);
    }
}
