use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Vendor name used when neither text nor image analysis produced one.
pub const UNRESOLVED_VENDOR: &str = "TBD";

/// A validated, normalized event.
///
/// Serializes to a flat record: ISO-8601 `date` (`2025-07-05`) and optional
/// ISO-8601 `start_time` / `end_time` (`17:00:00`). Dates and times are
/// timezone-naive and local to the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    pub source_key: String,
    pub source_name: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    /// Never empty; [`UNRESOLVED_VENDOR`] when unresolved.
    pub vendor_name: String,
    pub location: Option<String>,
    /// `true` when `vendor_name` came from image analysis rather than text.
    pub name_from_image: bool,
}

/// Identity of an event for set comparison and deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub source_key: String,
    pub date: NaiveDate,
    pub vendor_name: String,
    pub start_time: Option<NaiveTime>,
}

impl Event {
    #[must_use]
    pub fn key(&self) -> EventKey {
        EventKey {
            source_key: self.source_key.clone(),
            date: self.date,
            vendor_name: self.vendor_name.clone(),
            start_time: self.start_time,
        }
    }

    #[must_use]
    pub fn has_resolved_vendor(&self) -> bool {
        self.vendor_name != UNRESOLVED_VENDOR
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;
        if let Some(start) = self.start_time {
            write!(f, " {}", start.format("%H:%M"))?;
            if let Some(end) = self.end_time {
                write!(f, "-{}", end.format("%H:%M"))?;
            }
        }
        write!(f, ": {} @ {}", self.vendor_name, self.source_name)
    }
}

/// Keeps events dated within `[today, today + window_days]` and sorts them
/// by date, start time, source key, then vendor name.
///
/// Events without a start time sort before timed events on the same day.
#[must_use]
pub fn upcoming(events: &[Event], today: NaiveDate, window_days: u64) -> Vec<Event> {
    let last_day = today
        .checked_add_days(Days::new(window_days))
        .unwrap_or(NaiveDate::MAX);

    let mut selected: Vec<Event> = events
        .iter()
        .filter(|e| e.date >= today && e.date <= last_day)
        .cloned()
        .collect();

    selected.sort_by(|a, b| {
        (a.date, a.start_time, &a.source_key, &a.vendor_name).cmp(&(
            b.date,
            b.start_time,
            &b.source_key,
            &b.vendor_name,
        ))
    });
    selected
}
