use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Message in a chat completion conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who is speaking.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions for the model.
    System,
    /// Caller input.
    User,
    /// Model output.
    Assistant,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A single model call as issued by a stage executor.
///
/// `timeout` bounds each network attempt, not the retry loop as a whole;
/// the stage budget covers that.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Conversation, system prompt first.
    pub messages: Vec<Message>,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl CompletionRequest {
    /// Create a request with default generation settings
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            max_tokens: 2000,
            temperature: 0.3,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the maximum number of completion tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Concatenated text of every user message, used for matching in logs and tests.
    pub fn user_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Wire body of a chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    /// Omitted for Azure, where the deployment is part of the URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    /// Conversation, system prompt first.
    pub messages: &'a [Message],
    /// Completion token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Response from a chat completion endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Provider-assigned id.
    pub id: Option<String>,
    /// Model that served the call.
    pub model: Option<String>,
    /// Completions, usually one.
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Token accounting, if reported.
    pub usage: Option<Usage>,
}

/// One completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// Position in `choices`.
    pub index: Option<u32>,
    /// Generated message.
    pub message: Option<ResponseMessage>,
    /// Why generation stopped.
    pub finish_reason: Option<String>,
}

/// Assistant message inside a choice
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Usually `assistant`.
    pub role: Option<String>,
    /// Generated text.
    pub content: Option<String>,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: Option<u32>,
    /// Tokens generated.
    pub completion_tokens: Option<u32>,
    /// Sum of both.
    pub total_tokens: Option<u32>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if it is non-blank.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    /// Whether the first choice was cut by the provider's content filter.
    pub fn was_filtered(&self) -> bool {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .map(|r| r == "content_filter")
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_roles_serialize_lowercase() {
        let json = serde_json::to_value(Message::system("be terse")).unwrap();
        assert_eq!(json, json!({"role": "system", "content": "be terse"}));
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new(vec![Message::user("hi")])
            .with_max_tokens(100)
            .with_temperature(0.0)
            .with_timeout(Duration::from_millis(250));
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.timeout, Duration::from_millis(250));
        assert_eq!(request.user_text(), "hi");
    }

    #[test]
    fn test_chat_request_omits_missing_model() {
        let messages = vec![Message::user("hi")];
        let body = ChatCompletionRequest {
            model: None,
            messages: &messages,
            max_tokens: 10,
            temperature: 0.5,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("model").is_none());
        assert_eq!(value["max_tokens"], json!(10));
    }

    #[test]
    fn test_response_text() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"a\": 1}"}, "finish_reason": "stop"}]
        }))
        .unwrap();
        assert_eq!(response.text(), Some("{\"a\": 1}"));
        assert!(!response.was_filtered());
    }

    #[test]
    fn test_response_text_blank_or_missing() {
        let blank: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "   "}}]
        }))
        .unwrap();
        assert_eq!(blank.text(), None);

        let empty: ChatCompletionResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.text(), None);
    }

    #[test]
    fn test_response_content_filter() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": null}, "finish_reason": "content_filter"}]
        }))
        .unwrap();
        assert!(response.was_filtered());
    }
}
