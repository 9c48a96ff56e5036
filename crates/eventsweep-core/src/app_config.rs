/// Settings for the image-analysis service used for vendor name recovery.
#[derive(Clone)]
pub struct VisionConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionConfig")
            .field("api_key", &"[redacted]")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Engine settings read from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub run_deadline_secs: u64,
    pub max_concurrent_sources: usize,
    pub max_attempts: u32,
    pub retry_backoff_base_ms: u64,
    pub user_agent: String,
    pub window_days: u64,
    /// `None` disables image-based name recovery.
    pub vision: Option<VisionConfig>,
}
