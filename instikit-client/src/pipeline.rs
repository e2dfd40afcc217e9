//! The outbound request pipeline
//!
//! `ApiClient` wraps every call to the institute API in the fixed policies
//! call sites never see: bearer attachment, global expiry teardown, and
//! bounded rate-limit backoff. Everything else passes through classified
//! but untouched.

use crate::auth::AuthHandle;
use crate::backoff::RetryPolicy;
use instikit_core::{ApiEnvelope, InstikitConfig, InstikitError, InstikitResult};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

/// HTTP client for the institute API
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Arc<AuthHandle>,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: &InstikitConfig, auth: Arc<AuthHandle>) -> InstikitResult<Self> {
        let base_url = Url::parse(&config.http.base_url).map_err(|e| {
            InstikitError::config(format!("invalid base URL {}: {}", config.http.base_url, e))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_seconds))
            .user_agent(config.http.user_agent.clone())
            .build()
            .map_err(|e| InstikitError::network("failed to build HTTP client", Some(Box::new(e))))?;

        Ok(Self {
            http,
            base_url,
            auth,
            retry: RetryPolicy::from_config(&config.retry),
        })
    }

    /// The shared credential handle this pipeline attaches from.
    pub fn auth(&self) -> &Arc<AuthHandle> {
        &self.auth
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> InstikitResult<T> {
        self.execute(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> InstikitResult<T> {
        self.execute(Method::POST, path, Some(serde_json::to_value(body)?))
            .await
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> InstikitResult<T> {
        self.execute(Method::PATCH, path, Some(serde_json::to_value(body)?))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> InstikitResult<T> {
        self.execute(Method::DELETE, path, None).await
    }

    /// Run one logical request through the pipeline. Retries on throttling
    /// are serialized here, per request; unrelated requests back off
    /// independently.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> InstikitResult<T> {
        let url = self.join(path)?;
        let request_id = Uuid::new_v4();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let bearer = self.auth.bearer().await;
            let mut request = self.http.request(method.clone(), url.clone());
            if let Some((token, _)) = &bearer {
                request = request.bearer_auth(token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            debug!(%request_id, %method, %url, attempt, "issuing request");

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => return Err(classify_send_error(e)),
            };
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = parse_retry_after(&response);
                match self.retry.delay_for(attempt, retry_after) {
                    Some(delay) => {
                        let delay = delay + self.retry.jitter();
                        warn!(
                            %request_id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "throttled by the server, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    None => {
                        warn!(%request_id, attempt, "retry budget exhausted");
                        return Err(InstikitError::RateLimited {
                            retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
                        });
                    }
                }
            }

            if status == StatusCode::UNAUTHORIZED {
                if let Some((_, generation)) = bearer {
                    // Global policy: the credential is gone. Signal teardown
                    // (deduplicated per generation) and fail this call
                    // without retrying it.
                    self.auth.report_expired(generation);
                    return Err(InstikitError::AuthExpired);
                }
                // An unauthenticated 401 (e.g. a bad login) is the caller's
                // problem, not a session teardown.
            }

            return decode_response(status, response).await;
        }
    }

    fn join(&self, path: &str) -> InstikitResult<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| InstikitError::config(format!("invalid request path {}: {}", path, e)))
    }
}

/// Decode a terminal (non-retried) response into the caller's type or a
/// pass-through error.
async fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    response: reqwest::Response,
) -> InstikitResult<T> {
    let body = response
        .text()
        .await
        .map_err(|e| InstikitError::network("failed to read response body", Some(Box::new(e))))?;

    if status.is_success() {
        let envelope: ApiEnvelope<T> = serde_json::from_str(&body)?;
        return envelope
            .into_data()
            .map_err(|message| InstikitError::Validation {
                status: status.as_u16(),
                message,
            });
    }

    let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
        .ok()
        .and_then(|envelope| envelope.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    if status.is_client_error() {
        Err(InstikitError::Validation {
            status: status.as_u16(),
            message,
        })
    } else {
        Err(InstikitError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

fn classify_send_error(error: reqwest::Error) -> InstikitError {
    let message = if error.is_timeout() {
        "request timed out"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "transport error"
    };
    InstikitError::network(message, Some(Box::new(error)))
}

/// Parse a Retry-After header given in seconds. HTTP-date values are rare on
/// throttling responses and are ignored.
fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
