//! Plant disease diagnosis prompt template.
//!
//! The photo itself travels as an image attachment on the user message;
//! the template only carries the instructions.

use serde::Serialize;
use serde_json::Value;

use crate::schemas::{PlantDiseaseOutput, StructuredOutput};

use super::PromptTemplate;

/// Template ID.
pub const PLANT_DISEASE: &str = "plant-disease";

/// Context for the plant-disease prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PlantDiseaseContext {
    /// MIME type of the attached photo
    pub mime_type: String,
    /// JSON schema the answer must follow
    pub output_schema: Value,
}

impl PlantDiseaseContext {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            output_schema: PlantDiseaseOutput::json_schema(),
        }
    }
}

/// Get the plant-disease template.
pub fn template() -> PromptTemplate {
    PromptTemplate::new(PLANT_DISEASE, SYSTEM_PROMPT, USER_PROMPT)
        .with_description("Diagnose a plant disease from a photo and suggest cure and prevention")
}

const SYSTEM_PROMPT: &str = r#"You are a plant pathologist. You look at photos of crops and leaves, identify the disease that is present, and explain how to treat it and keep it from coming back.

Rules:
- "disease" is the common name of the disease. If the plant looks healthy, say "Healthy".
- "confidence" is your confidence in the diagnosis as a percentage, for example "92%".
- "cureInstructions" gives numbered, step-by-step treatment instructions.
- "preventionTips" gives practical measures to prevent recurrence.
- Every field must be filled in.

Respond with a single JSON object and nothing else. It must match this JSON schema:
{{{json output_schema}}}"#;

const USER_PROMPT: &str = r"Diagnose the plant in the attached photo ({{mime_type}}).";
