use eventsweep_core::FailureKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u128 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    #[error("unexpected content type \"{content_type}\" from {url} (expected {expected})")]
    UnexpectedContentType {
        content_type: String,
        url: String,
        expected: &'static str,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error for {context}: {source}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },

    #[error("unrecognized document from {url}: {reason}")]
    Unrecognized { url: String, reason: String },

    #[error("unknown strategy \"{0}\"")]
    UnknownStrategy(String),

    #[error("missing required setting \"{setting}\"")]
    MissingSetting { setting: String },

    #[error("invalid setting \"{setting}\": {reason}")]
    InvalidSetting { setting: String, reason: String },

    #[error("invalid source URL \"{url}\": {reason}")]
    InvalidSourceUrl { url: String, reason: String },

    #[error("abandoned after exceeding the {deadline_secs}s run deadline")]
    DeadlineExceeded { deadline_secs: u64 },

    #[error("source pipeline panicked: {0}")]
    Panicked(String),
}

impl ScraperError {
    /// Maps this error onto the source-level failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            ScraperError::Http(e) => {
                if e.status().is_some() {
                    FailureKind::Rejected
                } else if e.is_decode() {
                    FailureKind::Malformed
                } else if e.is_builder() {
                    FailureKind::Configuration
                } else {
                    FailureKind::Transient
                }
            }
            ScraperError::Timeout { .. } | ScraperError::DeadlineExceeded { .. } => {
                FailureKind::Transient
            }
            ScraperError::UnexpectedStatus { .. } => FailureKind::Rejected,
            ScraperError::EmptyBody { .. }
            | ScraperError::UnexpectedContentType { .. }
            | ScraperError::Deserialize { .. }
            | ScraperError::Csv { .. }
            | ScraperError::Unrecognized { .. }
            | ScraperError::Panicked(_) => FailureKind::Malformed,
            ScraperError::UnknownStrategy(_)
            | ScraperError::MissingSetting { .. }
            | ScraperError::InvalidSetting { .. }
            | ScraperError::InvalidSourceUrl { .. } => FailureKind::Configuration,
        }
    }
}

/// Failures talking to the image-analysis service.
///
/// These never leave the name-recovery step; they only decide whether a
/// call is retried.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image analysis returned HTTP {status}")]
    Status { status: u16 },

    #[error("image analysis response had no text content")]
    MissingText,
}

impl VisionError {
    /// Timeout-class failures are the only ones worth another attempt.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            VisionError::Http(e) => e.is_timeout(),
            VisionError::Status { status } => matches!(status, 408 | 504),
            VisionError::MissingText => false,
        }
    }
}
