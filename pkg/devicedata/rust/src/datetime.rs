// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Time parsing, IANA zone resolution and local calendar helpers.

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Offset, SecondsFormat, TimeZone,
    Timelike, Utc, Weekday,
};
use chrono_tz::Tz;

pub const UTC_ZONE: &str = "UTC";

pub const MS_PER_HOUR: i64 = 60 * 60 * 1000;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Naive layouts accepted when `time` has no offset. They are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a record timestamp into a UTC instant.
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Resolve an IANA zone name, `None` when unknown or empty.
pub fn resolve_zone(name: &str) -> Option<Tz> {
    if name.is_empty() {
        return None;
    }
    name.parse::<Tz>().ok()
}

/// Resolve a zone name, falling back to UTC.
pub fn zone_or_utc(name: &str) -> Tz {
    resolve_zone(name).unwrap_or(Tz::UTC)
}

/// UTC ISO-8601 with millisecond precision, e.g. `2023-03-15T10:00:00.000Z`.
pub fn iso(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// [`iso`] reduced to word characters, e.g. `20230315T100000000Z`. Used in
/// synthesized record ids.
pub fn compact_iso(instant: &DateTime<Utc>) -> String {
    iso(instant)
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Wall clock time of `instant` in `tz`, `YYYY-MM-DDTHH:mm:ss`.
pub fn wall_time(instant: &DateTime<Utc>, tz: Tz) -> String {
    instant
        .with_timezone(&tz)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

/// Negated UTC offset of `instant` in `tz`, in minutes.
pub fn display_offset(instant: &DateTime<Utc>, tz: Tz) -> i32 {
    let offset_secs = instant.with_timezone(&tz).offset().fix().local_minus_utc();
    -(offset_secs / 60)
}

/// Local calendar date of `instant` in `tz`.
pub fn local_date(instant: &DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Local hour of day of `instant` in `tz`.
pub fn local_hour(instant: &DateTime<Utc>, tz: Tz) -> u32 {
    instant.with_timezone(&tz).hour()
}

/// Milliseconds elapsed since local midnight.
pub fn ms_since_local_midnight(instant: &DateTime<Utc>, tz: Tz) -> i64 {
    let local = instant.with_timezone(&tz);
    let midnight = start_of_day(local.date_naive(), tz);
    (*instant - midnight).num_milliseconds()
}

/// First instant of the local day `date` in `tz`.
///
/// Some zones skip midnight on DST transitions; the first valid local time
/// after it is used then.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let mut naive = date.and_time(chrono::NaiveTime::MIN);
    for _ in 0..4 {
        if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
            return dt.with_timezone(&Utc);
        }
        naive += Duration::minutes(30);
    }
    naive.and_utc()
}

/// Last millisecond of the local day `date` in `tz`.
pub fn end_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    match date.succ_opt() {
        Some(next) => start_of_day(next, tz) - Duration::milliseconds(1),
        None => start_of_day(date, tz) + Duration::milliseconds(MS_PER_DAY - 1),
    }
}

/// Monday of the ISO week containing `date`.
pub fn iso_week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Sunday of the ISO week containing `date`.
pub fn iso_week_end(date: NaiveDate) -> NaiveDate {
    iso_week_start(date) + Duration::days(6)
}

/// Lowercase English weekday name.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "sunday",
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
    }
}

/// Inverse of [`weekday_name`].
pub fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "sunday" => Some(Weekday::Sun),
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        _ => None,
    }
}

/// Serde helpers for instants stored as UTC ISO-8601 strings.
pub(crate) mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::iso(instant))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::Serializer;

        pub fn serialize<S>(
            instant: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match instant {
                Some(instant) => super::serialize(instant, serializer),
                None => serializer.serialize_none(),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_forms() {
        let with_offset = parse_time("2023-03-15T11:00:00+01:00").unwrap();
        let utc = parse_time("2023-03-15T10:00:00.000Z").unwrap();
        let naive = parse_time("2023-03-15T10:00:00").unwrap();
        assert_eq!(with_offset, utc);
        assert_eq!(naive, utc);
        assert_eq!(
            parse_time("2023-03-15").unwrap(),
            parse_time("2023-03-15T00:00:00Z").unwrap()
        );
        assert!(parse_time("not a date").is_none());
        assert!(parse_time("2023-13-45T00:00:00Z").is_none());
    }

    #[test]
    fn test_iso_format() {
        let t = parse_time("2023-03-15T10:00:00.5+00:00").unwrap();
        assert_eq!(iso(&t), "2023-03-15T10:00:00.500Z");
        assert_eq!(compact_iso(&t), "20230315T100000500Z");
    }

    #[test]
    fn test_resolve_zone() {
        assert_eq!(resolve_zone("Europe/Paris"), Some(Tz::Europe__Paris));
        assert_eq!(resolve_zone("UTC"), Some(Tz::UTC));
        assert!(resolve_zone("Mars/Olympus").is_none());
        assert!(resolve_zone("").is_none());
        assert_eq!(zone_or_utc("nope"), Tz::UTC);
    }

    #[test]
    fn test_display_offset_is_negated() {
        let winter = parse_time("2023-01-15T12:00:00Z").unwrap();
        let summer = parse_time("2023-07-15T12:00:00Z").unwrap();
        assert_eq!(display_offset(&winter, Tz::Europe__Paris), -60);
        assert_eq!(display_offset(&summer, Tz::Europe__Paris), -120);
        assert_eq!(display_offset(&winter, Tz::America__New_York), 300);
    }

    #[test]
    fn test_local_calendar() {
        let t = parse_time("2023-03-15T23:30:00Z").unwrap();
        assert_eq!(
            local_date(&t, Tz::Europe__Paris),
            NaiveDate::from_ymd_opt(2023, 3, 16).unwrap()
        );
        assert_eq!(ms_since_local_midnight(&t, Tz::Europe__Paris), 30 * 60 * 1000);
        assert_eq!(wall_time(&t, Tz::Europe__Paris), "2023-03-16T00:30:00");
    }

    #[test]
    fn test_day_bounds_across_dst() {
        // Paris switched to summer time on 2023-03-26, a 23 hour day.
        let date = NaiveDate::from_ymd_opt(2023, 3, 26).unwrap();
        let start = start_of_day(date, Tz::Europe__Paris);
        let end = end_of_day(date, Tz::Europe__Paris);
        assert_eq!(iso(&start), "2023-03-25T23:00:00.000Z");
        assert_eq!((end - start).num_milliseconds(), 23 * MS_PER_HOUR - 1);
    }

    #[test]
    fn test_iso_week() {
        let wed = NaiveDate::from_ymd_opt(2023, 3, 15).unwrap();
        assert_eq!(iso_week_start(wed), NaiveDate::from_ymd_opt(2023, 3, 13).unwrap());
        assert_eq!(iso_week_end(wed), NaiveDate::from_ymd_opt(2023, 3, 19).unwrap());
        let sunday = NaiveDate::from_ymd_opt(2023, 3, 19).unwrap();
        assert_eq!(iso_week_start(sunday), NaiveDate::from_ymd_opt(2023, 3, 13).unwrap());
    }

    #[test]
    fn test_weekday_names() {
        for day in [Weekday::Sun, Weekday::Wed, Weekday::Sat] {
            assert_eq!(weekday_from_name(weekday_name(day)), Some(day));
        }
        assert_eq!(weekday_from_name("Funday"), None);
    }
}
