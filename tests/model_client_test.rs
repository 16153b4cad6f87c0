//! Integration tests for the model client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use thesis_analysis::config::{ModelConfig, ModelProvider, RequestConfig};
use thesis_analysis::error::ModelErrorKind;
use thesis_analysis::llm::{CallCounters, CompletionModel, CompletionRequest, Message, ModelClient};

fn model_config(base_url: &str) -> ModelConfig {
    ModelConfig {
        api_key: Some("test-api-key".to_string()),
        base_url: base_url.to_string(),
        model: "gpt-4o-mini".to_string(),
        provider: ModelProvider::OpenAi,
        api_version: "2024-12-01-preview".to_string(),
    }
}

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str, max_retries: u32) -> ModelClient {
    let request_config = RequestConfig {
        timeout_ms: 5000,
        max_retries,
        retry_delay_ms: 10,
    };

    ModelClient::new(&model_config(base_url), request_config).expect("Failed to create client")
}

fn create_test_request(content: &str) -> CompletionRequest {
    CompletionRequest::new(vec![Message::system("Respond in JSON"), Message::user(content)])
        .with_timeout(Duration::from_secs(2))
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 30}
    })
}

#[cfg(test)]
mod call_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_call() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 2000})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("{\"ok\": true}")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let result = client.call(&create_test_request("Analyze")).await;

        assert!(result.is_ok(), "Call should succeed: {:?}", result.err());
        assert_eq!(result.unwrap(), "{\"ok\": true}");
    }

    #[tokio::test]
    async fn test_call_through_trait() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("hello")))
            .mount(&mock_server)
            .await;

        let client: Arc<dyn CompletionModel> = Arc::new(create_test_client(&mock_server.uri(), 0));
        let text = client.complete(create_test_request("hi")).await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_azure_provider_uses_api_key_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt-4o-mini/chat/completions"))
            .and(query_param("api-version", "2024-12-01-preview"))
            .and(header("api-key", "test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("azure")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = model_config(&mock_server.uri());
        config.provider = ModelProvider::Azure;
        let client = ModelClient::new(&config, RequestConfig::default()).unwrap();

        let text = client.call(&create_test_request("hi")).await.unwrap();
        assert_eq!(text, "azure");
    }
}

#[cfg(test)]
mod retry_tests {
    use super::*;

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(2)
            .with_priority(1)
            .expect(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("recovered")))
            .with_priority(2)
            .expect(1)
            .mount(&mock_server)
            .await;

        let counters = Arc::new(CallCounters::new());
        let client = create_test_client(&mock_server.uri(), 3).with_metrics(counters.clone());

        let text = client.call(&create_test_request("retry me")).await.unwrap();
        assert_eq!(text, "recovered");

        // One logical call, however many attempts
        assert_eq!(counters.calls(), 1);
        assert_eq!(counters.successes(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;

        let counters = Arc::new(CallCounters::new());
        let client = create_test_client(&mock_server.uri(), 2).with_metrics(counters.clone());

        let err = client.call(&create_test_request("fail")).await.unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::Network);
        assert_eq!(err.attempts, 3);

        let stats = counters.snapshot();
        assert_eq!(stats.calls, 1);
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
            .with_priority(2)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 1);
        assert_eq!(client.call(&create_test_request("x")).await.unwrap(), "ok");
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API key", "type": "invalid_request_error"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 3);
        let err = client.call(&create_test_request("x")).await.unwrap_err();

        assert_eq!(err.kind, ModelErrorKind::Auth);
        assert_eq!(err.attempts, 1);
        assert!(err.message.contains("401"));
    }

    #[tokio::test]
    async fn test_bad_request_is_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("context length exceeded"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 3);
        let err = client.call(&create_test_request("x")).await.unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::Rejected);
    }

    #[tokio::test]
    async fn test_content_filter_is_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": ""}, "finish_reason": "content_filter"}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 3);
        let err = client.call(&create_test_request("x")).await.unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::Rejected);
    }

    #[tokio::test]
    async fn test_empty_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("   ")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 3);
        let err = client.call(&create_test_request("x")).await.unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::EmptyResponse);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 3);
        let err = client.call(&create_test_request("x")).await.unwrap_err();
        assert_eq!(err.kind, ModelErrorKind::EmptyResponse);
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 1);
        let request = create_test_request("x").with_timeout(Duration::from_millis(100));
        let err = client.call(&request).await.unwrap_err();

        assert_eq!(err.kind, ModelErrorKind::Timeout);
        assert_eq!(err.attempts, 2);
    }

    #[tokio::test]
    async fn test_call_dropped_by_deadline_is_recorded() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("late"))
                    .set_delay(Duration::from_millis(1000)),
            )
            .mount(&mock_server)
            .await;

        let counters = Arc::new(CallCounters::new());
        let client = create_test_client(&mock_server.uri(), 0).with_metrics(counters.clone());
        let request = create_test_request("x");

        // A stage deadline shorter than the response delay
        let outcome = tokio::time::timeout(Duration::from_millis(100), client.call(&request)).await;
        assert!(outcome.is_err());

        let stats = counters.snapshot();
        assert_eq!(stats.calls, 1);
        assert_eq!(stats.successes, 0);
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network() {
        // Nothing listens on the discard port
        let client = create_test_client("http://127.0.0.1:9", 0);
        let err = client.call(&create_test_request("x")).await.unwrap_err();
        assert!(matches!(
            err.kind,
            ModelErrorKind::Network | ModelErrorKind::Timeout
        ));
    }
}
