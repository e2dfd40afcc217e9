//! Configuration management

use crate::error::{InstikitError, InstikitResult};
use crate::types::{HttpConfig, InstikitConfig, RealtimeConfig, RetryConfig, StorageConfig};

use std::path::Path;

impl Default for InstikitConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("instikit");

        Self {
            http: HttpConfig {
                base_url: "http://localhost:4000/api".to_string(),
                timeout_seconds: 30,
                user_agent: "instikit/0.1".to_string(),
            },
            realtime: RealtimeConfig {
                path: "/realtime".to_string(),
                channel_capacity: 64,
            },
            storage: StorageConfig {
                data_dir: data_dir.to_string_lossy().into_owned(),
            },
            retry: RetryConfig {
                base_delay_ms: 1000,
                max_retries: 3,
                jitter_ms: 500,
            },
        }
    }
}

impl InstikitConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> InstikitResult<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            InstikitError::config(format!(
                "failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: InstikitConfig = toml::from_str(&content)
            .map_err(|e| InstikitError::config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> InstikitResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| InstikitError::config(format!("failed to serialize config: {}", e)))?;

        std::fs::write(&path, content).map_err(|e| {
            InstikitError::config(format!(
                "failed to write config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Apply environment overrides on top of the loaded values.
    ///
    /// `INSTIKIT_BASE_URL`, `INSTIKIT_REALTIME_PATH` and `INSTIKIT_DATA_DIR`
    /// win over both the defaults and the config file.
    pub fn apply_env(mut self) -> Self {
        if let Ok(base_url) = std::env::var("INSTIKIT_BASE_URL") {
            self.http.base_url = base_url;
        }
        if let Ok(path) = std::env::var("INSTIKIT_REALTIME_PATH") {
            self.realtime.path = path;
        }
        if let Ok(dir) = std::env::var("INSTIKIT_DATA_DIR") {
            self.storage.data_dir = dir;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> InstikitResult<()> {
        url::Url::parse(&self.http.base_url).map_err(|e| {
            InstikitError::config(format!(
                "http.base_url is not a valid URL ({}): {}",
                self.http.base_url, e
            ))
        })?;

        if self.http.timeout_seconds == 0 {
            return Err(InstikitError::config(
                "http.timeout_seconds must be greater than 0",
            ));
        }

        if self.retry.max_retries == 0 {
            return Err(InstikitError::config(
                "retry.max_retries must be greater than 0",
            ));
        }

        if self.realtime.channel_capacity == 0 {
            return Err(InstikitError::config(
                "realtime.channel_capacity must be greater than 0",
            ));
        }

        Ok(())
    }
}
