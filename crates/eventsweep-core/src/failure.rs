use serde::{Deserialize, Serialize};

/// Classification of a source-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Network failure or timeout. Retried by the coordinator.
    Transient,
    /// The origin answered with a non-2xx HTTP status.
    Rejected,
    /// The document as a whole could not be interpreted.
    Malformed,
    /// Unknown strategy or missing/invalid per-source setting.
    Configuration,
}

impl FailureKind {
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Rejected => write!(f, "rejected"),
            FailureKind::Malformed => write!(f, "malformed"),
            FailureKind::Configuration => write!(f, "configuration"),
        }
    }
}

/// Total failure of one source during a run.
///
/// Partially successful sources never produce one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeError {
    pub source_key: String,
    pub source_name: String,
    pub message: String,
    pub kind: FailureKind,
    /// Fetch attempts made before giving up; `0` when the source was never
    /// fetched (configuration failures, sources abandoned before start).
    pub attempts: u32,
}

impl ScrapeError {
    /// Operator-facing one-liner for status pages.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        format!("Failed to fetch information for {}", self.source_name)
    }
}

impl std::fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {} error after {} attempt(s): {}",
            self.source_name, self.source_key, self.kind, self.attempts, self.message
        )
    }
}
