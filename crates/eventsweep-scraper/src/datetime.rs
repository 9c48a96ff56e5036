//! Date and time canonicalization.
//!
//! Dates are strict: a candidate whose date text matches none of its
//! source's formats is dropped. Times are best effort and come back as
//! `None` when unreadable.
//!
//! Timestamps carrying an offset (`Z`, `-07:00`) are converted to the
//! source's configured time zone before the date or time is taken. Without
//! a zone the timestamp's own wall-clock reading is kept.

use std::sync::LazyLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::ScraperError;
use crate::settings::Settings;

const DEFAULT_PAST_TOLERANCE_DAYS: u64 = 30;

/// Specifiers that pin a year; formats without one get the year inferred.
const YEAR_SPECIFIERS: &[&str] = &["%Y", "%y", "%G", "%g", "%D", "%F", "%x", "%c", "%+", "%s"];

static ORDINAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").expect("valid regex"));

static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?::(\d{2}))?\s*(?:([ap])\.?\s*m\.?)?$").expect("valid regex")
});

static RANGE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:-|–|—|\bto\b|\buntil\b)\s*").expect("valid regex"));

/// Per-source date parsing rules.
#[derive(Debug, Clone)]
pub struct DateRules {
    formats: Vec<String>,
    pattern: Option<Regex>,
    past_tolerance_days: u64,
    /// Zone the source's events happen in.
    timezone: Option<Tz>,
}

impl DateRules {
    #[must_use]
    pub fn new(formats: &[&str]) -> Self {
        Self {
            formats: formats.iter().map(|f| (*f).to_owned()).collect(),
            pattern: None,
            past_tolerance_days: DEFAULT_PAST_TOLERANCE_DAYS,
            timezone: None,
        }
    }

    #[must_use]
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    /// Reads `date_formats`, `date_pattern`, `past_tolerance_days`, and
    /// `timezone`, falling back to `defaults` when no formats are configured.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidSetting`] for an unusable format string,
    /// a bad regex, a non-integer tolerance, or an unknown zone name.
    pub fn from_settings(settings: &Settings<'_>, defaults: &[&str]) -> Result<Self, ScraperError> {
        let mut formats = settings.str_list("date_formats")?;
        if formats.is_empty() {
            formats = defaults.iter().map(|f| (*f).to_owned()).collect();
        }
        for format in &formats {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(ScraperError::InvalidSetting {
                    setting: "date_formats".to_owned(),
                    reason: format!("\"{format}\" is not a valid date format"),
                });
            }
        }

        Ok(Self {
            formats,
            pattern: settings.optional_regex("date_pattern")?,
            past_tolerance_days: settings
                .optional_u64("past_tolerance_days")?
                .unwrap_or(DEFAULT_PAST_TOLERANCE_DAYS),
            timezone: settings.optional_timezone("timezone")?,
        })
    }

    #[must_use]
    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    #[must_use]
    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }

    /// Parses `raw` against each format in order, then as an RFC 3339 or ISO
    /// timestamp. Year-less formats resolve relative to `today`.
    #[must_use]
    pub fn parse(&self, raw: &str, today: NaiveDate) -> Option<NaiveDate> {
        let text = self.extract(raw)?;
        let text = ORDINAL_SUFFIX.replace_all(text.trim(), "$1");
        let text = text.trim().trim_end_matches([',', '.', ':']);
        if text.is_empty() {
            return None;
        }

        self.formats
            .iter()
            .find_map(|format| self.parse_with(text, format, today))
            .or_else(|| parse_timestamp(text, self.timezone).map(|dt| dt.date()))
    }

    /// [`parse_time`] with offset-bearing timestamps read in this source's
    /// zone.
    #[must_use]
    pub fn parse_time(&self, raw: &str) -> Option<NaiveTime> {
        time_in_zone(raw, self.timezone)
    }

    /// [`parse_time_range`] with offset-bearing timestamps read in this
    /// source's zone.
    #[must_use]
    pub fn parse_time_range(&self, raw: &str) -> (Option<NaiveTime>, Option<NaiveTime>) {
        range_in_zone(raw, self.timezone)
    }

    fn extract<'t>(&self, raw: &'t str) -> Option<&'t str> {
        let Some(pattern) = &self.pattern else {
            return Some(raw);
        };
        let caps = pattern.captures(raw)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }

    fn parse_with(&self, text: &str, format: &str, today: NaiveDate) -> Option<NaiveDate> {
        if YEAR_SPECIFIERS.iter().any(|spec| format.contains(spec)) {
            return NaiveDate::parse_from_str(text, format).ok();
        }

        let with_year = |year: i32| {
            NaiveDate::parse_from_str(&format!("{text} {year}"), &format!("{format} %Y")).ok()
        };
        let earliest = today
            .checked_sub_days(Days::new(self.past_tolerance_days))
            .unwrap_or(today);

        match with_year(today.year()) {
            Some(date) if date >= earliest => Some(date),
            Some(date) => with_year(today.year() + 1).or(Some(date)),
            // Weekday or Feb 29 only valid in the following year.
            None => with_year(today.year() + 1),
        }
    }
}

/// RFC 3339 or naive ISO timestamp as a local wall-clock reading. Offset
/// timestamps are shifted into `timezone` when one is given.
fn parse_timestamp(text: &str, timezone: Option<Tz>) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| match timezone {
            Some(tz) => dt.with_timezone(&tz).naive_local(),
            None => dt.naive_local(),
        })
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    fn flipped(self) -> Self {
        match self {
            Meridiem::Am => Meridiem::Pm,
            Meridiem::Pm => Meridiem::Am,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    hour: u32,
    minute: u32,
    has_minutes: bool,
    meridiem: Option<Meridiem>,
}

impl Clock {
    fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim().trim_end_matches(['.', ',']).trim();
        match text.to_ascii_lowercase().as_str() {
            "noon" => {
                return Some(Self {
                    hour: 12,
                    minute: 0,
                    has_minutes: true,
                    meridiem: Some(Meridiem::Pm),
                })
            }
            "midnight" => {
                return Some(Self {
                    hour: 12,
                    minute: 0,
                    has_minutes: true,
                    meridiem: Some(Meridiem::Am),
                })
            }
            _ => {}
        }

        let caps = CLOCK.captures(text)?;
        let hour = caps.get(1)?.as_str().parse().ok()?;
        let minute = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let meridiem = caps.get(3).map(|m| {
            if m.as_str().eq_ignore_ascii_case("a") {
                Meridiem::Am
            } else {
                Meridiem::Pm
            }
        });
        Some(Self {
            hour,
            minute,
            has_minutes: caps.get(2).is_some(),
            meridiem,
        })
    }

    fn resolve(self, meridiem: Option<Meridiem>) -> Option<NaiveTime> {
        let hour = match meridiem {
            Some(_) if !(1..=12).contains(&self.hour) => return None,
            Some(Meridiem::Am) => self.hour % 12,
            Some(Meridiem::Pm) => self.hour % 12 + 12,
            // Without a meridiem only an explicit 24-hour clock is trusted.
            None if !self.has_minutes => return None,
            None => self.hour,
        };
        NaiveTime::from_hms_opt(hour, self.minute, 0)
    }

    fn own(self) -> Option<NaiveTime> {
        self.resolve(self.meridiem)
    }
}

/// Parses a single time of day: `1pm`, `1:30 PM`, `13:00`, `noon`,
/// `midnight`, or an RFC 3339 timestamp (wall-clock time kept).
#[must_use]
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    time_in_zone(raw, None)
}

fn time_in_zone(raw: &str, timezone: Option<Tz>) -> Option<NaiveTime> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    Clock::parse(text)
        .and_then(Clock::own)
        .or_else(|| parse_timestamp(text, timezone).map(|dt| dt.time()))
}

/// Parses a `start - end` range. A meridiem given on only one side is
/// shared with the other unless that would put start after end, in which
/// case the unmarked side takes the opposite meridiem (`11-2pm` is 11am to
/// 2pm).
///
/// Text without a separator is read as a lone start time. Either side may
/// come back `None` independently.
#[must_use]
pub fn parse_time_range(raw: &str) -> (Option<NaiveTime>, Option<NaiveTime>) {
    range_in_zone(raw, None)
}

fn range_in_zone(raw: &str, timezone: Option<Tz>) -> (Option<NaiveTime>, Option<NaiveTime>) {
    let text = raw.trim();
    if parse_timestamp(text, timezone).is_some() {
        return (time_in_zone(text, timezone), None);
    }

    let mut parts = RANGE_SEPARATOR.splitn(text, 2);
    let first = parts.next().unwrap_or_default();
    let Some(second) = parts.next() else {
        return (time_in_zone(first, timezone), None);
    };

    let (Some(start), Some(end)) = (Clock::parse(first), Clock::parse(second)) else {
        return (time_in_zone(first, timezone), time_in_zone(second, timezone));
    };

    match (start.meridiem, end.meridiem) {
        (None, Some(shared)) => {
            let end_time = end.own();
            let start_time = match (start.resolve(Some(shared)), end_time) {
                (Some(s), Some(e)) if s > e => start.resolve(Some(shared.flipped())),
                (s, _) => s,
            };
            (start_time, end_time)
        }
        (Some(shared), None) => {
            let start_time = start.own();
            let end_time = match (start_time, end.resolve(Some(shared))) {
                (Some(s), Some(e)) if e < s => end.resolve(Some(shared.flipped())),
                (_, e) => e,
            };
            (start_time, end_time)
        }
        _ => (start.own(), end.own()),
    }
}
