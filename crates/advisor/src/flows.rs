//! The two advisor flows: crop recommendation and plant disease diagnosis.
//!
//! Each flow renders its prompt, calls the configured [`AIProvider`] once in
//! JSON mode and returns a fully populated, schema-typed result. Errors from
//! the provider, including rate limiting, are passed through unchanged.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::ai::prompts::{
    CropRecommendationContext, PlantDiseaseContext, PromptManager, CROP_RECOMMENDATION,
    PLANT_DISEASE,
};
use crate::ai::{
    parse_ai_response, AIProvider, GenerateOptions, MessageBuilder, ResponseSchema,
};
use crate::data_uri::DataUri;
use crate::errors::AdvisorResult;
use crate::schemas::{
    CropRecommendationInput, CropRecommendationOutput, PlantDiseaseOutput, StructuredOutput,
};

/// Default sampling temperature for both flows.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default output token cap for both flows.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Runs the advisor flows against an AI provider.
pub struct Advisor {
    provider: Arc<dyn AIProvider>,
    model: String,
    prompts: PromptManager,
    options: GenerateOptions,
}

impl Advisor {
    /// Create an advisor using the provider's default model.
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            model,
            prompts: PromptManager::new(),
            options: GenerateOptions {
                temperature: Some(DEFAULT_TEMPERATURE),
                max_tokens: Some(DEFAULT_MAX_TOKENS),
                ..Default::default()
            },
        }
    }

    /// Use a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override temperature and token limits. JSON mode is always on.
    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Recommend a crop, fertilizer and tips for the given readings.
    ///
    /// The readings are expected to be validated already.
    pub async fn recommend_crop(
        &self,
        input: &CropRecommendationInput,
    ) -> AdvisorResult<CropRecommendationOutput> {
        info!(
            provider = self.provider.name(),
            model = %self.model,
            "Requesting crop recommendation"
        );
        let context = CropRecommendationContext::new(*input);
        let output: CropRecommendationOutput =
            self.run(CROP_RECOMMENDATION, &context, &[]).await?;
        info!(crop = %output.recommended_crop, "Crop recommendation ready");
        Ok(output)
    }

    /// Diagnose the disease shown in a plant photo.
    pub async fn diagnose_plant_disease(&self, photo: &DataUri) -> AdvisorResult<PlantDiseaseOutput> {
        info!(
            provider = self.provider.name(),
            model = %self.model,
            mime_type = photo.mime_type(),
            bytes = photo.decoded_len(),
            "Requesting plant disease diagnosis"
        );
        let context = PlantDiseaseContext::new(photo.mime_type());
        let output: PlantDiseaseOutput = self
            .run(PLANT_DISEASE, &context, std::slice::from_ref(photo))
            .await?;
        info!(disease = %output.disease, confidence = %output.confidence, "Diagnosis ready");
        Ok(output)
    }

    async fn run<C, T>(&self, template_id: &str, context: &C, images: &[DataUri]) -> AdvisorResult<T>
    where
        C: serde::Serialize,
        T: StructuredOutput,
    {
        let (system, user) = self.prompts.render(template_id, context)?;
        let messages = MessageBuilder::new()
            .system(system)
            .user_with_images(user, images)
            .build();

        let options = GenerateOptions {
            json_mode: true,
            response_schema: Some(ResponseSchema {
                name: T::SCHEMA_NAME.to_string(),
                schema: <T as StructuredOutput>::json_schema(),
            }),
            ..self.options.clone()
        };

        let response = self
            .provider
            .generate_text(&self.model, &messages, &options)
            .await
            .inspect_err(|e| warn!(template = template_id, error = %e, "AI call failed"))?;

        debug!(
            template = template_id,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "AI call completed"
        );

        let output: T = parse_ai_response(&response)?;
        output.ensure_complete()?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::MockAIProvider;
    use crate::ai::{AIResponse, AIRole, TokenUsage};
    use crate::errors::AdvisorError;

    fn reply(text: &str) -> AIResponse {
        AIResponse {
            text: text.to_string(),
            usage: TokenUsage::default(),
            model: "mock-model".to_string(),
            provider: "mock".to_string(),
        }
    }

    fn provider() -> MockAIProvider {
        let mut provider = MockAIProvider::new();
        provider.expect_name().return_const("mock");
        provider.expect_default_model().return_const("mock-model");
        provider
    }

    fn input() -> CropRecommendationInput {
        CropRecommendationInput {
            nitrogen: 90.0,
            phosphorus: 42.0,
            potassium: 43.0,
            temperature: 20.87,
            humidity: 82.0,
            ph: 6.5,
            rainfall: 202.93,
        }
    }

    #[tokio::test]
    async fn test_recommend_crop_sends_readings_in_json_mode() {
        let mut provider = provider();
        provider
            .expect_generate_text()
            .withf(|model, messages, options| {
                model == "mock-model"
                    && options.json_mode
                    && options.response_schema.as_ref().is_some_and(|schema| {
                        schema.name == "crop_recommendation"
                            && schema.schema == CropRecommendationOutput::json_schema()
                    })
                    && options.temperature == Some(DEFAULT_TEMPERATURE)
                    && messages.len() == 2
                    && messages[0].role == AIRole::System
                    && messages[1].content.contains("Rainfall: 202.93 mm")
                    && messages[1].images.is_empty()
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(reply(
                    r#"{"recommended_crop":"Rice","fertilizer":"Urea","tips":"* Keep fields flooded"}"#,
                ))
            });

        let advisor = Advisor::new(Arc::new(provider));
        let output = advisor.recommend_crop(&input()).await.unwrap();

        assert_eq!(output.recommended_crop, "Rice");
        assert_eq!(output.fertilizer, "Urea");
        assert_eq!(output.tip_list(), vec!["Keep fields flooded"]);
    }

    #[tokio::test]
    async fn test_diagnosis_attaches_photo() {
        let photo = DataUri::from_bytes("image/jpeg", b"leaf pixels");
        let expected = photo.clone();

        let mut provider = provider();
        provider
            .expect_generate_text()
            .withf(move |_, messages, options| {
                options
                    .response_schema
                    .as_ref()
                    .is_some_and(|schema| schema.name == "plant_disease_diagnosis")
                    && messages[1].images == vec![expected.clone()]
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(reply(
                    "```json\n{\"disease\":\"Early Blight\",\"confidence\":\"88%\",\
                     \"cureInstructions\":\"1. Remove infected leaves\",\
                     \"preventionTips\":\"Rotate crops\"}\n```",
                ))
            });

        let advisor = Advisor::new(Arc::new(provider)).with_model("vision-model");
        assert_eq!(advisor.model(), "vision-model");

        let output = advisor.diagnose_plant_disease(&photo).await.unwrap();
        assert_eq!(output.disease, "Early Blight");
        assert_eq!(output.confidence, "88%");
    }

    #[tokio::test]
    async fn test_incomplete_output_is_rejected() {
        let mut provider = provider();
        provider.expect_generate_text().returning(|_, _, _| {
            Ok(reply(r#"{"recommended_crop":"Maize","fertilizer":"","tips":"* Weed early"}"#))
        });

        let advisor = Advisor::new(Arc::new(provider));
        let err = advisor.recommend_crop(&input()).await.unwrap_err();
        assert!(matches!(err, AdvisorError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_passes_through() {
        let mut provider = provider();
        provider.expect_generate_text().returning(|_, _, _| {
            Err(AdvisorError::AiRateLimitExceeded {
                provider: "mock".to_string(),
                message: "RESOURCE_EXHAUSTED: quota".to_string(),
            })
        });

        let advisor = Advisor::new(Arc::new(provider));
        let err = advisor.recommend_crop(&input()).await.unwrap_err();
        assert!(matches!(err, AdvisorError::AiRateLimitExceeded { .. }));
        assert!(err.to_string().contains("429"));
    }
}
