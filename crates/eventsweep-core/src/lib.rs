pub mod app_config;
pub mod config;
pub mod event;
pub mod failure;
pub mod report;
pub mod source;

pub use app_config::{EngineConfig, VisionConfig};
pub use config::{load_engine_config, load_engine_config_from_env};
pub use event::{upcoming, Event, EventKey, UNRESOLVED_VENDOR};
pub use failure::{FailureKind, ScrapeError};
pub use report::{RunOutcome, RunReport};
pub use source::Source;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
