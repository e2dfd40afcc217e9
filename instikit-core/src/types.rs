//! Core data type definitions

use serde::{Deserialize, Serialize};

/// Response envelope every API endpoint wraps its payload in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the server accepted the request
    pub success: bool,
    /// Human-readable outcome, present mostly on failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Endpoint-specific payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Consume the envelope, yielding the payload of an accepted response.
    pub fn into_data(self) -> Result<T, String> {
        if !self.success {
            return Err(self
                .message
                .unwrap_or_else(|| "request rejected".to_string()));
        }
        self.data
            .ok_or_else(|| "response accepted but carried no data".to_string())
    }
}

/// Top-level client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstikitConfig {
    pub http: HttpConfig,
    pub realtime: RealtimeConfig,
    pub storage: StorageConfig,
    pub retry: RetryConfig,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base URL every API path is resolved against
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

/// Realtime channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Path of the push endpoint, resolved against the HTTP base URL with
    /// the scheme switched to ws/wss
    pub path: String,
    /// Buffer size of each local broadcast channel
    pub channel_capacity: usize,
}

/// Local persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted credential
    pub data_dir: String,
}

/// Rate-limit retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Initial backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Maximum automatic retries for one throttled request
    pub max_retries: u32,
    /// Upper bound of the random jitter added to each delay, in milliseconds
    pub jitter_ms: u64,
}
