use errors::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};

/// Per-spider options. Every field has a workable default so a host can run
/// with an empty TOML table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiderConfig {
    /// Registry key of the default data-flow sink appended to the pipeline.
    #[serde(default)]
    pub storage: Option<String>,
    /// Maximum admission attempts per request.
    #[serde(default = "default_retried_times")]
    pub retried_times: u32,
    /// Depth ceiling for follow-up requests; 0 disables the check.
    #[serde(default)]
    pub depth: u32,
    /// Dispatch target in requests per second.
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Soft bound on in-flight requests before dispatch pauses.
    #[serde(default = "default_requested_queue_count")]
    pub requested_queue_count: usize,
    /// Seconds of continuous idling or pausing after which the dispatcher
    /// terminates.
    #[serde(default = "default_empty_sleep_time")]
    pub empty_sleep_time: u64,
    #[serde(default)]
    pub use_proxy: bool,
    /// How long a dispatched request may stay unanswered before the sweep
    /// re-admits it.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_retried_times() -> u32 {
    3
}

fn default_speed() -> f64 {
    1.0
}

fn default_requested_queue_count() -> usize {
    1000
}

fn default_empty_sleep_time() -> u64 {
    30
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

impl Default for SpiderConfig {
    fn default() -> Self {
        SpiderConfig {
            storage: None,
            retried_times: default_retried_times(),
            depth: 0,
            speed: default_speed(),
            requested_queue_count: default_requested_queue_count(),
            empty_sleep_time: default_empty_sleep_time(),
            use_proxy: false,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl SpiderConfig {
    pub fn load(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            Error::with_message(ErrorKind::Spider, format!("failed to read config {path}"), Some(e))
        })?;
        let config: SpiderConfig = toml::from_str(&config_str).map_err(|e| {
            Error::with_message(ErrorKind::Spider, format!("failed to parse config {path}"), Some(e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retried_times < 1 {
            return Err(invalid("retried_times must be at least 1"));
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(invalid("speed must be a positive number"));
        }
        if self.requested_queue_count == 0 {
            return Err(invalid("requested_queue_count must be positive"));
        }
        if self.empty_sleep_time == 0 {
            return Err(invalid("empty_sleep_time must be at least 1 second"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms must be positive"));
        }
        Ok(())
    }

    /// Pacing tuple: `(tick interval in ms, requests per tick)`.
    ///
    /// At one request per second and above the tick is fixed at 1s and the
    /// batch grows; below that the batch is one and the tick stretches.
    pub fn pacing(&self) -> (u64, usize) {
        if self.speed >= 1.0 {
            (1000, self.speed.floor() as usize)
        } else {
            ((1.0 / self.speed).floor() as u64 * 1000, 1)
        }
    }

    /// Terminal threshold for the idle and paused counters, in ms.
    pub fn sleep_limit_ms(&self) -> u64 {
        self.empty_sleep_time * 1000
    }
}

fn invalid(message: &str) -> Error {
    Error::with_message(ErrorKind::Spider, message.to_string(), None::<errors::BoxError>)
}
