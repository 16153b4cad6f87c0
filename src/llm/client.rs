use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::metrics::{CallCounters, MetricsSink};
use super::types::{ChatCompletionRequest, ChatCompletionResponse, CompletionRequest};
use super::CompletionModel;
use crate::config::{ModelConfig, ModelProvider, RequestConfig};
use crate::error::{ModelError, ModelErrorKind, ModelResult};

/// Retrying client for a chat completion endpoint.
///
/// Transient failures (timeouts, connection and TLS errors, 429 and 5xx
/// responses) are retried with exponential backoff, and the HTTP connection
/// pool is rebuilt before each retry. Authentication failures, rejections and
/// empty responses fail on the first attempt.
pub struct ModelClient {
    http: RwLock<Client>,
    endpoint: String,
    provider: ModelProvider,
    api_key: Option<String>,
    model: String,
    request_config: RequestConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl ModelClient {
    /// Create a new model client recording into fresh [`CallCounters`].
    pub fn new(config: &ModelConfig, request_config: RequestConfig) -> ModelResult<Self> {
        let http = build_http_client(&request_config)?;

        Ok(Self {
            http: RwLock::new(http),
            endpoint: endpoint_url(config),
            provider: config.provider,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            request_config,
            metrics: Arc::new(CallCounters::new()),
        })
    }

    /// Replace the metrics sink
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Full URL requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Call the model, retrying transient failures.
    ///
    /// Exactly one outcome is recorded in the metrics sink per call. A call
    /// whose future is dropped before finishing, e.g. by a stage deadline,
    /// counts as a failure.
    pub async fn call(&self, request: &CompletionRequest) -> ModelResult<String> {
        let guard = CallGuard::new(self.metrics.as_ref());
        let result = self.call_with_retry(request).await;
        guard.finish(result.is_ok());
        result
    }

    async fn call_with_retry(&self, request: &CompletionRequest) -> ModelResult<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ModelError::new(
                ModelErrorKind::Auth,
                "no API key configured",
            ));
        };

        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let start = Instant::now();

            match self.execute_request(api_key, request).await {
                Ok(text) => {
                    info!(
                        attempt,
                        latency_ms = start.elapsed().as_millis() as u64,
                        chars = text.len(),
                        "Model call succeeded"
                    );
                    return Ok(text);
                }
                Err(e) => {
                    error!(
                        error = %e.message,
                        kind = %e.kind,
                        attempt,
                        latency_ms = start.elapsed().as_millis() as u64,
                        "Model call failed"
                    );

                    if !e.is_transient() || attempt > self.request_config.max_retries {
                        return Err(e.with_attempts(attempt));
                    }

                    let delay = backoff_delay(self.request_config.retry_delay_ms, attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying model request"
                    );
                    tokio::time::sleep(delay).await;

                    self.reconnect()
                        .await
                        .map_err(|e| e.with_attempts(attempt))?;
                }
            }
        }
    }

    /// Drop the current connection pool and build a fresh one.
    async fn reconnect(&self) -> ModelResult<()> {
        let fresh = build_http_client(&self.request_config)?;
        *self.http.write().await = fresh;
        debug!("Rebuilt model HTTP client");
        Ok(())
    }

    /// Execute a single attempt (internal)
    async fn execute_request(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> ModelResult<String> {
        let timeout_ms = request.timeout.as_millis() as u64;

        match tokio::time::timeout(request.timeout, self.send_once(api_key, request)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::timeout(timeout_ms)),
        }
    }

    async fn send_once(&self, api_key: &str, request: &CompletionRequest) -> ModelResult<String> {
        let body = ChatCompletionRequest {
            model: match self.provider {
                ModelProvider::OpenAi => Some(self.model.as_str()),
                ModelProvider::Azure => None,
            },
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "Calling model endpoint"
        );

        let client = self.http.read().await.clone();
        let builder = client.post(&self.endpoint).json(&body);
        let builder = match self.provider {
            ModelProvider::OpenAi => builder.bearer_auth(api_key),
            ModelProvider::Azure => builder.header("api-key", api_key),
        };

        let response = builder.send().await.map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &error_body));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                classify_transport_error(&e)
            } else {
                ModelError::new(
                    ModelErrorKind::EmptyResponse,
                    format!("Failed to parse response: {}", e),
                )
            }
        })?;

        if completion.was_filtered() {
            return Err(ModelError::new(
                ModelErrorKind::Rejected,
                "response blocked by content filter",
            ));
        }

        completion
            .text()
            .map(|t| t.to_string())
            .ok_or_else(|| ModelError::new(ModelErrorKind::EmptyResponse, "response had no content"))
    }
}

#[async_trait]
impl CompletionModel for ModelClient {
    async fn complete(&self, request: CompletionRequest) -> ModelResult<String> {
        self.call(&request).await
    }
}

fn build_http_client(request_config: &RequestConfig) -> ModelResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_millis(request_config.timeout_ms))
        .build()
        .map_err(|e| {
            ModelError::new(
                ModelErrorKind::Network,
                format!("Failed to build HTTP client: {}", e),
            )
        })
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`.
pub(crate) fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}

fn endpoint_url(config: &ModelConfig) -> String {
    let base = config.base_url.trim_end_matches('/');
    match config.provider {
        ModelProvider::OpenAi => {
            if base.ends_with("/chat/completions") {
                base.to_string()
            } else {
                format!("{}/chat/completions", base)
            }
        }
        ModelProvider::Azure => {
            // Accept either the resource root or a full deployment URL
            let root = base.find("/openai").map(|i| &base[..i]).unwrap_or(base);
            format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                root, config.model, config.api_version
            )
        }
    }
}

fn classify_transport_error(e: &reqwest::Error) -> ModelError {
    let kind = if e.is_timeout() {
        ModelErrorKind::Timeout
    } else {
        // connect, reset, TLS and body errors are all worth another attempt
        ModelErrorKind::Network
    };
    ModelError::new(kind, e.to_string())
}

fn classify_status(status: StatusCode, body: &str) -> ModelError {
    let kind = match status.as_u16() {
        401 | 403 => ModelErrorKind::Auth,
        408 => ModelErrorKind::Timeout,
        429 => ModelErrorKind::Network,
        s if s >= 500 => ModelErrorKind::Network,
        _ => ModelErrorKind::Rejected,
    };
    let snippet: String = body.chars().take(200).collect();
    ModelError::new(kind, format!("HTTP {}: {}", status.as_u16(), snippet))
}

/// Records a call outcome exactly once, as a failure if never finished.
struct CallGuard<'a> {
    metrics: &'a dyn MetricsSink,
    finished: bool,
}

impl<'a> CallGuard<'a> {
    fn new(metrics: &'a dyn MetricsSink) -> Self {
        Self {
            metrics,
            finished: false,
        }
    }

    fn finish(mut self, success: bool) {
        self.finished = true;
        self.metrics.record_call(success);
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Model call abandoned before completion");
            self.metrics.record_call(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_config(provider: ModelProvider, base_url: &str) -> ModelConfig {
        ModelConfig {
            api_key: Some("test_key".to_string()),
            base_url: base_url.to_string(),
            model: "gpt-4o-mini".to_string(),
            provider,
            api_version: "2024-12-01-preview".to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        let config = model_config(ModelProvider::OpenAi, "https://api.openai.com/v1/");
        let client = ModelClient::new(&config, RequestConfig::default());
        assert!(client.is_ok());
        assert_eq!(
            client.unwrap().endpoint(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_endpoint_keeps_full_path() {
        let config = model_config(
            ModelProvider::OpenAi,
            "http://localhost:8080/v1/chat/completions",
        );
        assert_eq!(
            endpoint_url(&config),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_azure_endpoint_normalization() {
        let config = model_config(
            ModelProvider::Azure,
            "https://acme.openai.azure.com/openai/deployments/old/chat/completions",
        );
        assert_eq!(
            endpoint_url(&config),
            "https://acme.openai.azure.com/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-12-01-preview"
        );
    }

    #[test]
    fn test_backoff_delay_doubles() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(u64::MAX, 40), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, "").kind,
            ModelErrorKind::Auth
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, "").kind,
            ModelErrorKind::Auth
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "").kind,
            ModelErrorKind::Network
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, "").kind,
            ModelErrorKind::Network
        );
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, "content policy").kind,
            ModelErrorKind::Rejected
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_fast() {
        let mut config = model_config(ModelProvider::OpenAi, "http://127.0.0.1:9");
        config.api_key = None;
        let counters = Arc::new(CallCounters::new());
        let client = ModelClient::new(&config, RequestConfig::default())
            .unwrap()
            .with_metrics(counters.clone());

        let err = client
            .call(&CompletionRequest::new(vec![]))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::Auth);
        assert_eq!(counters.calls(), 1);
        assert_eq!(counters.successes(), 0);
    }

    #[test]
    fn test_call_guard_records_once() {
        let counters = CallCounters::new();

        CallGuard::new(&counters).finish(true);
        assert_eq!(counters.calls(), 1);
        assert_eq!(counters.successes(), 1);

        drop(CallGuard::new(&counters));
        assert_eq!(counters.calls(), 2);
        assert_eq!(counters.successes(), 1);
    }
}
