//! Date/time value normalization.
//!
//! Source exports carry timestamps in a few shapes (`6/20/24 3:24`, ISO-8601 with or without a
//! `Z`, plain dates). The destination expects `YYYY-MM-DDTHH:mm:ss` shifted by a fixed offset.
//! Values that cannot be parsed are returned untouched; there is no error channel.

use chrono::{prelude::*, Duration, NaiveDateTime};

/// Hours added to every parsed value unless configured otherwise.
pub const DEFAULT_OFFSET_HOURS: i64 = 6;

const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const ISO_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Two-digit-year shapes come before the `%Y` ones: `%Y` also accepts one or two digits and
/// would read `1/2/24` as year 1.
const GENERIC_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%m/%d/%y %I:%M:%S %p",
    "%m/%d/%y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const GENERIC_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parses landing before this year come from a short year read through `%Y`.
const MIN_YEAR: i32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    offset: Duration,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_offset_hours(DEFAULT_OFFSET_HOURS)
    }
}

impl Normalizer {
    pub fn with_offset(offset: Duration) -> Self {
        Self { offset }
    }

    pub fn with_offset_hours(hours: i64) -> Self {
        Self::with_offset(Duration::hours(hours))
    }

    /// Returns the canonical shifted timestamp, or `value` unchanged if it does not parse.
    pub fn normalize(&self, value: &str) -> String {
        if value.is_empty() {
            return String::new();
        }

        let parsed = match slash_fields(value) {
            Some(fields) => fields.to_datetime(),
            None if value.contains('T') => parse_iso_local(value),
            None => parse_generic(value),
        };

        parsed
            .and_then(|dt| dt.checked_add_signed(self.offset))
            .map(|dt| dt.format(OUTPUT_FORMAT).to_string())
            .unwrap_or_else(|| value.to_string())
    }
}

/// Normalizes with [`DEFAULT_OFFSET_HOURS`].
pub fn normalize_datetime(value: &str) -> String {
    Normalizer::default().normalize(value)
}

/// Components of an `M/D/YY H:mm` value, matched by shape only.
#[derive(Debug, PartialEq, Eq)]
struct SlashFields {
    month: u32,
    day: u32,
    year: i32,
    hour: u32,
    minute: u32,
}

impl SlashFields {
    fn to_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)?
            .and_hms_opt(self.hour, self.minute, 0)
    }
}

fn slash_fields(value: &str) -> Option<SlashFields> {
    let (date, time) = value.split_once(' ')?;

    let mut date_parts = date.split('/');
    let month = digits(date_parts.next()?, 1, 2)?;
    let day = digits(date_parts.next()?, 1, 2)?;
    let year = digits(date_parts.next()?, 2, 2)?;
    if date_parts.next().is_some() {
        return None;
    }

    let (hour, minute) = time.split_once(':')?;

    Some(SlashFields {
        month,
        day,
        // two-digit years are always this century
        year: 2000 + year as i32,
        hour: digits(hour, 1, 2)?,
        minute: digits(minute, 2, 2)?,
    })
}

fn digits(part: &str, min: usize, max: usize) -> Option<u32> {
    if part.len() < min || part.len() > max || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Drops a trailing `Z` and any fractional seconds, then reads the rest as wall-clock time.
/// The UTC designation is intentionally not honoured.
fn parse_iso_local(value: &str) -> Option<NaiveDateTime> {
    let without_zone = value.strip_suffix('Z').unwrap_or(value);
    let without_fraction = without_zone
        .split_once('.')
        .map_or(without_zone, |(whole, _)| whole);

    ISO_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(without_fraction, format)
            .ok()
            .filter(plausible)
    })
}

fn plausible(dt: &NaiveDateTime) -> bool {
    dt.year() >= MIN_YEAR
}

fn parse_generic(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    GENERIC_DATETIME_FORMATS
        .iter()
        .find_map(|format| {
            NaiveDateTime::parse_from_str(value, format)
                .ok()
                .filter(plausible)
        })
        .or_else(|| {
            GENERIC_DATE_FORMATS.iter().find_map(|format| {
                NaiveDate::parse_from_str(value, format)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .filter(plausible)
            })
        })
        .or_else(|| {
            DateTime::parse_from_rfc2822(value)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
                .filter(plausible)
        })
}
