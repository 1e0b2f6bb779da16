//! Google Gemini provider implementation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::errors::{AdvisorError, AdvisorResult};

use super::provider::{
    error_message, AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions, TokenUsage,
};

/// Gemini API root; the model and method are appended per request
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Supported Gemini models (all multimodal)
const SUPPORTED_MODELS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_field_names)]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

/// Google Gemini provider.
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider with an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Some(api_key.into()),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    /// Create from `GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`.
    pub fn from_env() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok();
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    /// Set a custom API root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Convert messages to Gemini contents, extracting the system instruction.
    fn convert_messages(&self, messages: &[AIMessage]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
        let mut system = None;
        let mut contents = Vec::new();

        for msg in messages {
            let text_part = GeminiPart {
                text: Some(msg.content.clone()),
                inline_data: None,
            };

            let role = match msg.role {
                AIRole::System => {
                    system = Some(GeminiContent {
                        role: None,
                        parts: vec![text_part],
                    });
                    continue;
                }
                AIRole::User => "user",
                AIRole::Assistant => "model",
            };

            let mut parts: Vec<GeminiPart> = msg
                .images
                .iter()
                .map(|image| GeminiPart {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: image.mime_type().to_string(),
                        data: image.base64_data().to_string(),
                    }),
                })
                .collect();
            parts.push(text_part);

            contents.push(GeminiContent {
                role: Some(role.to_string()),
                parts,
            });
        }

        (system, contents)
    }
}

#[async_trait]
impl AIProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn api_key_env_var(&self) -> &'static str {
        "GEMINI_API_KEY"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn supported_models(&self) -> Vec<&'static str> {
        SUPPORTED_MODELS.to_vec()
    }

    fn default_model(&self) -> &'static str {
        DEFAULT_MODEL
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> AdvisorResult<AIResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| AdvisorError::ProviderNotConfigured {
                provider: "gemini (GEMINI_API_KEY not set)".to_string(),
            })?;

        let (system_instruction, contents) = self.convert_messages(messages);
        let request = GeminiRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                stop_sequences: options.stop_sequences.clone(),
                response_mime_type: (options.json_mode || options.response_schema.is_some())
                    .then(|| "application/json".to_string()),
                response_json_schema: options
                    .response_schema
                    .as_ref()
                    .map(|schema| without_meta_schema(&schema.schema)),
            },
        };

        tracing::debug!(model, "Calling Gemini API");

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AdvisorError::Ai(format!("Gemini API request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdvisorError::Ai(format!("Failed to read response: {e}")))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AdvisorError::AiRateLimitExceeded {
                provider: "gemini".to_string(),
                message: error_message(&body),
            });
        }
        if !status.is_success() {
            return Err(AdvisorError::Ai(format!(
                "Gemini API error ({status}): {}",
                error_message(&body)
            )));
        }

        let api_response: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| AdvisorError::Ai(format!("Failed to parse response: {e}")))?;

        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AdvisorError::Ai("Gemini returned no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AdvisorError::Ai(format!(
                "Gemini returned an empty response (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let usage = api_response.usage_metadata.unwrap_or_default();
        Ok(AIResponse {
            text,
            usage: TokenUsage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            },
            model: api_response
                .model_version
                .unwrap_or_else(|| model.to_string()),
            provider: "gemini".to_string(),
        })
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Gemini rejects the `$schema` keyword at the schema root.
fn without_meta_schema(schema: &serde_json::Value) -> serde_json::Value {
    let mut schema = schema.clone();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::ResponseSchema;
    use crate::data_uri::DataUri;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_provider_name() {
        let provider = GeminiProvider::new("key");
        assert_eq!(provider.name(), "gemini");
        assert!(provider.supports_model("gemini-2.5-flash"));
        assert!(!provider.supports_model("gpt-4o"));
    }

    #[test]
    fn test_endpoint() {
        let provider = GeminiProvider::new("key").with_base_url("http://localhost:9000/");
        assert_eq!(
            provider.endpoint("gemini-2.5-flash"),
            "http://localhost:9000/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_message_conversion() {
        let provider = GeminiProvider::new("key");
        let messages = vec![
            AIMessage::system("Be precise"),
            AIMessage::user("What is wrong?").with_image(DataUri::from_bytes("image/webp", b"x")),
            AIMessage::assistant("Rust fungus"),
        ];

        let (system, contents) = provider.convert_messages(&messages);

        assert_eq!(
            system.unwrap().parts[0].text.as_deref(),
            Some("Be precise")
        );
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(
            contents[0].parts[0].inline_data.as_ref().unwrap().mime_type,
            "image/webp"
        );
        assert_eq!(contents[0].parts[1].text.as_deref(), Some("What is wrong?"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
    }

    #[tokio::test]
    async fn test_generate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "key"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "{\"a\":"}, {"text": "1}"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4, "totalTokenCount": 14},
                "modelVersion": "gemini-2.5-flash"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("key").with_base_url(server.uri());
        let options = GenerateOptions {
            json_mode: true,
            ..GenerateOptions::default()
        };
        let response = provider
            .generate_text("gemini-2.5-flash", &[AIMessage::user("hi")], &options)
            .await
            .unwrap();

        assert_eq!(response.text, "{\"a\":1}");
        assert_eq!(response.usage.total_tokens, 14);
        assert_eq!(response.provider, "gemini");
    }

    #[tokio::test]
    async fn test_generate_text_sends_response_schema() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseJsonSchema": {"type": "object", "title": "Diagnosis"}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "{}"}]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("key").with_base_url(server.uri());
        let options = GenerateOptions {
            response_schema: Some(ResponseSchema {
                name: "plant_disease_diagnosis".to_string(),
                schema: json!({
                    "$schema": "http://json-schema.org/draft-07/schema#",
                    "type": "object",
                    "title": "Diagnosis"
                }),
            }),
            ..GenerateOptions::default()
        };
        let response = provider
            .generate_text("gemini-2.5-flash", &[AIMessage::user("hi")], &options)
            .await
            .unwrap();
        assert_eq!(response.text, "{}");

        let sent = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&sent[0].body).unwrap();
        assert!(body["generationConfig"]["responseJsonSchema"]
            .get("$schema")
            .is_none());
    }

    #[tokio::test]
    async fn test_resource_exhausted_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {
                    "code": 429,
                    "message": "You exceeded your current quota",
                    "status": "RESOURCE_EXHAUSTED"
                }
            })))
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("key").with_base_url(server.uri());
        let err = provider
            .generate_text("gemini-2.5-flash", &[AIMessage::user("hi")], &GenerateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AdvisorError::AiRateLimitExceeded { .. }));
        assert!(err.to_string().contains("RESOURCE_EXHAUSTED"));
    }

    #[tokio::test]
    async fn test_empty_candidate_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let provider = GeminiProvider::new("key").with_base_url(server.uri());
        let err = provider
            .generate_text("gemini-2.5-flash", &[AIMessage::user("hi")], &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
