//! Crop recommendation prompt template.
//!
//! Turns seven soil/climate readings into a crop, a fertilizer and
//! cultivation tips.

use serde::Serialize;
use serde_json::Value;

use crate::schemas::{CropRecommendationInput, CropRecommendationOutput, StructuredOutput};

use super::PromptTemplate;

/// Template ID.
pub const CROP_RECOMMENDATION: &str = "crop-recommendation";

/// Context for the crop-recommendation prompt.
#[derive(Debug, Clone, Serialize)]
pub struct CropRecommendationContext {
    /// Readings, flattened so the template can use `{{num nitrogen}}` etc.
    #[serde(flatten)]
    pub input: CropRecommendationInput,
    /// JSON schema the answer must follow
    pub output_schema: Value,
}

impl CropRecommendationContext {
    pub fn new(input: CropRecommendationInput) -> Self {
        Self {
            input,
            output_schema: CropRecommendationOutput::json_schema(),
        }
    }
}

/// Get the crop-recommendation template.
pub fn template() -> PromptTemplate {
    PromptTemplate::new(CROP_RECOMMENDATION, SYSTEM_PROMPT, USER_PROMPT)
        .with_description("Recommend a crop, fertilizer and cultivation tips for soil and climate readings")
}

const SYSTEM_PROMPT: &str = r#"You are an agronomist who advises smallholder farmers on what to plant. Given soil nutrient levels and local climate readings, you pick the single crop best suited to those conditions, name a fertilizer that fits that crop on that soil, and give practical cultivation tips.

Rules:
- "recommended_crop" is one crop name, nothing else.
- "fertilizer" names the fertilizer and, briefly, how to apply it.
- "tips" holds several actionable tips, one per line, each line starting with "* ".
- Every field must be filled in.

Respond with a single JSON object and nothing else. It must match this JSON schema:
{{{json output_schema}}}"#;

const USER_PROMPT: &str = r"Recommend a crop for these conditions:
- Nitrogen (N): {{num nitrogen}}
- Phosphorus (P): {{num phosphorus}}
- Potassium (K): {{num potassium}}
- Temperature: {{num temperature}} °C
- Humidity: {{num humidity}}%
- pH: {{num ph}}
- Rainfall: {{num rainfall}} mm";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_all_readings() {
        let context = CropRecommendationContext::new(CropRecommendationInput {
            nitrogen: 70.0,
            phosphorus: 75.0,
            potassium: 105.0,
            temperature: 25.5,
            humidity: 50.0,
            ph: 7.0,
            rainfall: 160.0,
        });

        let (system, user) = template().render(&context).unwrap();

        assert!(system.contains("\"recommended_crop\""));
        assert!(user.contains("Nitrogen (N): 70\n"));
        assert!(user.contains("Temperature: 25.5 °C"));
        assert!(user.contains("pH: 7\n"));
        assert!(user.ends_with("Rainfall: 160 mm"));
    }
}
