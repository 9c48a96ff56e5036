use std::collections::BTreeSet;

use serde::Serialize;

use crate::event::{Event, EventKey};
use crate::failure::ScrapeError;

/// Three-way result of a run, for callers deciding exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Every source completed without a source-level error.
    Success,
    /// Some, but not all, sources failed.
    Partial,
    /// At least one source was attempted and none succeeded.
    Failed,
}

/// Everything one coordinator run produced.
///
/// `events` is a set in all but type: arrival order depends on which source
/// finished first and carries no meaning.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub events: Vec<Event>,
    pub errors: Vec<ScrapeError>,
    /// Number of sources handed to the run.
    pub source_count: usize,
}

impl RunReport {
    #[must_use]
    pub fn outcome(&self) -> RunOutcome {
        let failed: BTreeSet<&str> = self
            .errors
            .iter()
            .map(|e| e.source_key.as_str())
            .collect();

        if failed.is_empty() {
            RunOutcome::Success
        } else if failed.len() >= self.source_count {
            RunOutcome::Failed
        } else {
            RunOutcome::Partial
        }
    }

    /// Event identities, for order-independent comparison between runs.
    #[must_use]
    pub fn event_keys(&self) -> BTreeSet<EventKey> {
        self.events.iter().map(Event::key).collect()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::FailureKind;

    fn error(key: &str) -> ScrapeError {
        ScrapeError {
            source_key: key.to_owned(),
            source_name: key.to_uppercase(),
            message: "boom".to_owned(),
            kind: FailureKind::Transient,
            attempts: 3,
        }
    }

    #[test]
    fn no_errors_is_success() {
        let report = RunReport {
            source_count: 2,
            ..RunReport::default()
        };
        assert_eq!(report.outcome(), RunOutcome::Success);
    }

    #[test]
    fn empty_run_is_success() {
        assert_eq!(RunReport::default().outcome(), RunOutcome::Success);
    }

    #[test]
    fn some_errors_is_partial() {
        let report = RunReport {
            errors: vec![error("a")],
            source_count: 3,
            ..RunReport::default()
        };
        assert_eq!(report.outcome(), RunOutcome::Partial);
    }

    #[test]
    fn all_sources_failing_is_failed() {
        let report = RunReport {
            errors: vec![error("a"), error("b")],
            source_count: 2,
            ..RunReport::default()
        };
        assert_eq!(report.outcome(), RunOutcome::Failed);
    }
}
