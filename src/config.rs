use serde::{Deserialize, Serialize};

/// Timing policy for blocking map operations against a remote store.
///
/// The retry bound and pause are policy defaults, not semantic constants;
/// override them per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Upper bound on any single blocking wait for a remote operation.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Pause between retries when a listed key is not yet readable.
    #[serde(default = "default_request_retry_ms")]
    pub request_retry_ms: u64,

    /// Attempts before a listed-but-absent key is dropped from an aggregate.
    #[serde(default = "default_max_not_found_retries")]
    pub max_not_found_retries: u32,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_request_retry_ms() -> u64 {
    10
}

fn default_max_not_found_retries() -> u32 {
    3
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            request_retry_ms: default_request_retry_ms(),
            max_not_found_retries: default_max_not_found_retries(),
        }
    }
}

impl MapConfig {
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("CIRRUSMAP"))
            .build()
            .map_err(|e| crate::error::CirrusError::Config(e.to_string()))?;

        let config: MapConfig = settings
            .try_deserialize()
            .map_err(|e| crate::error::CirrusError::Config(e.to_string()))?;

        Ok(config)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }

    pub fn request_retry(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_retry_ms)
    }
}
