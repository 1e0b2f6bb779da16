//! AI Provider trait and common types.
//!
//! Defines the interface that all AI providers must implement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;

use crate::data_uri::DataUri;
use crate::errors::{AdvisorError, AdvisorResult};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIRole {
    /// System message (sets context/behavior)
    System,
    /// User message (input)
    User,
    /// Assistant message (AI response)
    Assistant,
}

/// A message in a conversation with an AI model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIMessage {
    /// Role of the message sender
    pub role: AIRole,
    /// Content of the message
    pub content: String,
    /// Images attached to the message (user messages only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<DataUri>,
}

impl AIMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::Assistant,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// Attach an image to this message.
    pub fn with_image(mut self, image: DataUri) -> Self {
        self.images.push(image);
        self
    }
}

/// Token usage information from an AI response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: u32,
    /// Number of output tokens
    pub output_tokens: u32,
    /// Total tokens (input + output)
    pub total_tokens: u32,
}

/// Response from an AI model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIResponse {
    /// Generated text content
    pub text: String,
    /// Token usage information
    pub usage: TokenUsage,
    /// Model that generated the response
    pub model: String,
    /// Provider that generated the response
    pub provider: String,
}

/// Options for text generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 to 1.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Stop sequences
    pub stop_sequences: Option<Vec<String>>,
    /// Whether to request JSON output
    pub json_mode: bool,
    /// Schema the reply must follow. Providers with native schema support
    /// send it with the request; the others rely on the prompt.
    pub response_schema: Option<ResponseSchema>,
}

/// A named JSON schema for structured output.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

/// Trait for AI providers.
///
/// All AI providers (Anthropic, OpenAI, Gemini) must implement this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Get the provider name (e.g., "anthropic", "openai").
    fn name(&self) -> &'static str;

    /// Get the environment variable name for the API key.
    fn api_key_env_var(&self) -> &'static str;

    /// Check if the provider is configured (has API key).
    fn is_configured(&self) -> bool;

    /// Get the list of supported models.
    fn supported_models(&self) -> Vec<&'static str>;

    /// Model used when the caller does not pick one.
    fn default_model(&self) -> &'static str;

    /// Check if a model is supported.
    fn supports_model(&self, model: &str) -> bool {
        self.supported_models().contains(&model)
    }

    /// Generate text from messages.
    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> AdvisorResult<AIResponse>;
}

/// Generate a structured object from an AI response.
///
/// This is a standalone function rather than a trait method because
/// generic methods are not dyn-compatible.
pub fn parse_ai_response<T: for<'de> Deserialize<'de>>(response: &AIResponse) -> AdvisorResult<T> {
    let text = response.text.trim();

    // Models sometimes wrap JSON in markdown code blocks
    let json_text = if text.starts_with("```json") {
        text.strip_prefix("```json")
            .and_then(|s| s.strip_suffix("```"))
            .unwrap_or(text)
            .trim()
    } else if text.starts_with("```") {
        text.strip_prefix("```")
            .and_then(|s| s.strip_suffix("```"))
            .unwrap_or(text)
            .trim()
    } else {
        text
    };

    serde_json::from_str(json_text).map_err(|e| {
        tracing::warn!(
            provider = %response.provider,
            error = %e,
            excerpt = %excerpt(text),
            "AI response is not valid JSON"
        );
        let reason = match e.classify() {
            Category::Eof => "the reply was cut off before the JSON ended",
            Category::Data => "the reply did not have the expected fields",
            Category::Syntax | Category::Io => "the reply was not valid JSON",
        };
        AdvisorError::AiResponseParseError {
            reason: reason.to_string(),
        }
    })
}

/// First characters of a model reply, for logs.
fn excerpt(text: &str) -> String {
    const MAX_CHARS: usize = 200;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{head}...")
    }
}

/// Builder for constructing AI messages.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    messages: Vec<AIMessage>,
}

impl MessageBuilder {
    /// Create a new message builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a system message.
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(AIMessage::system(content));
        self
    }

    /// Add a user message.
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(AIMessage::user(content));
        self
    }

    /// Add a user message carrying images.
    pub fn user_with_images(mut self, content: impl Into<String>, images: &[DataUri]) -> Self {
        let mut message = AIMessage::user(content);
        message.images.extend(images.iter().cloned());
        self.messages.push(message);
        self
    }

    /// Build the message list.
    pub fn build(self) -> Vec<AIMessage> {
        self.messages
    }
}

/// Extract a readable error message from a provider's error body.
///
/// All three providers wrap errors as `{"error": {"message": ..}}`; Gemini
/// also carries a `status` such as `RESOURCE_EXHAUSTED`.
pub(crate) fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Inner,
    }

    #[derive(Deserialize)]
    struct Inner {
        message: String,
        #[serde(default)]
        status: Option<String>,
        #[serde(rename = "type", default)]
        error_type: Option<String>,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(Envelope { error }) => match error.status.or(error.error_type) {
            Some(kind) => format!("{kind}: {}", error.message),
            None => error.message,
        },
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(text: &str) -> AIResponse {
        AIResponse {
            text: text.to_string(),
            usage: TokenUsage::default(),
            model: "test".to_string(),
            provider: "test".to_string(),
        }
    }

    #[derive(Debug, Deserialize)]
    struct Sample {
        crop: String,
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed: Sample = parse_ai_response(&response(r#"{"crop": "maize"}"#)).unwrap();
        assert_eq!(parsed.crop, "maize");
    }

    #[test]
    fn test_parse_fenced_json() {
        let parsed: Sample =
            parse_ai_response(&response("```json\n{\"crop\": \"rice\"}\n```")).unwrap();
        assert_eq!(parsed.crop, "rice");

        let parsed: Sample =
            parse_ai_response(&response("```\n{\"crop\": \"jute\"}\n```")).unwrap();
        assert_eq!(parsed.crop, "jute");
    }

    #[test]
    fn test_parse_rejects_prose() {
        let err = parse_ai_response::<Sample>(&response("I recommend maize.")).unwrap_err();
        assert!(matches!(err, AdvisorError::AiResponseParseError { .. }));
    }

    #[test]
    fn test_parse_error_does_not_echo_reply() {
        let reply = "Rainfall of 1429 mm suits rice. ".repeat(20);
        let err = parse_ai_response::<Sample>(&response(&reply)).unwrap_err();
        let message = err.to_string();
        assert!(!message.contains("1429"), "{message}");
        assert!(message.contains("not valid JSON"));

        let err = parse_ai_response::<Sample>(&response(r#"{"crop": "ri"#)).unwrap_err();
        assert!(err.to_string().contains("cut off"));

        let err = parse_ai_response::<Sample>(&response(r#"{"plant": "rice"}"#)).unwrap_err();
        assert!(err.to_string().contains("expected fields"));
    }

    #[test]
    fn test_excerpt_truncates_long_replies() {
        assert_eq!(excerpt("short"), "short");
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), 203);
    }

    #[test]
    fn test_message_builder_attaches_images() {
        let image = DataUri::from_bytes("image/png", b"leaf");
        let messages = MessageBuilder::new()
            .system("sys")
            .user_with_images("look", std::slice::from_ref(&image))
            .build();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, AIRole::System);
        assert!(messages[0].images.is_empty());
        assert_eq!(messages[1].images, vec![image]);
    }

    #[test]
    fn test_error_message_prefers_status() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(error_message(body), "RESOURCE_EXHAUSTED: Quota exceeded");

        let body = r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(error_message(body), "overloaded_error: Overloaded");

        assert_eq!(error_message(" upstream down "), "upstream down");
    }
}
