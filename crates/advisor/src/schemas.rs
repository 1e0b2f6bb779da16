//! Input and output shapes for the two AI flows.
//!
//! The output types double as the contract handed to the model: their JSON
//! schema (generated with `schemars`) is embedded in the system prompt, and
//! every response is checked with [`StructuredOutput::ensure_complete`]
//! before it is returned to a caller.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AdvisorError, AdvisorResult};
use crate::validation::ValidationErrors;

/// Names of the seven soil/climate readings, in form order.
pub const CROP_INPUT_FIELDS: [&str; 7] = [
    "nitrogen",
    "phosphorus",
    "potassium",
    "temperature",
    "humidity",
    "ph",
    "rainfall",
];

/// Soil and climate readings submitted for a crop recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CropRecommendationInput {
    /// The level of Nitrogen (N) in the soil.
    pub nitrogen: f64,
    /// The level of Phosphorus (P) in the soil.
    pub phosphorus: f64,
    /// The level of Potassium (K) in the soil.
    pub potassium: f64,
    /// The ambient temperature in Celsius.
    pub temperature: f64,
    /// The relative humidity as a percentage.
    pub humidity: f64,
    /// The pH level of the soil.
    pub ph: f64,
    /// The amount of rainfall in millimeters.
    pub rainfall: f64,
}

impl CropRecommendationInput {
    /// Look up a reading by field name.
    pub fn get(&self, field: &str) -> Option<f64> {
        match field {
            "nitrogen" => Some(self.nitrogen),
            "phosphorus" => Some(self.phosphorus),
            "potassium" => Some(self.potassium),
            "temperature" => Some(self.temperature),
            "humidity" => Some(self.humidity),
            "ph" => Some(self.ph),
            "rainfall" => Some(self.rainfall),
            _ => None,
        }
    }

    /// Build an input from an untyped JSON object, reporting every missing
    /// or non-numeric field at once.
    pub fn from_value(value: &Value) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let Some(object) = value.as_object() else {
            errors.add("body", "must be a JSON object");
            return Err(errors);
        };

        let mut readings = [0.0_f64; 7];
        for (slot, field) in readings.iter_mut().zip(CROP_INPUT_FIELDS) {
            match object.get(field) {
                None | Some(Value::Null) => errors.add(field, "is required"),
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(v) if v.is_finite() => *slot = v,
                    _ => errors.add(field, "must be a finite number"),
                },
                Some(_) => errors.add(field, "must be a number"),
            }
        }
        errors.into_result()?;

        let [nitrogen, phosphorus, potassium, temperature, humidity, ph, rainfall] = readings;
        Ok(Self {
            nitrogen,
            phosphorus,
            potassium,
            temperature,
            humidity,
            ph,
            rainfall,
        })
    }
}

/// The model's crop recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CropRecommendationOutput {
    /// The most suitable crop for the given conditions.
    pub recommended_crop: String,
    /// The appropriate fertilizer to use for the recommended crop.
    pub fertilizer: String,
    /// Actionable cultivation tips for the recommended crop, one per line,
    /// each starting with a bullet point.
    pub tips: String,
}

impl CropRecommendationOutput {
    /// Split `tips` into individual tips with bullet markers removed.
    pub fn tip_list(&self) -> Vec<String> {
        self.tips
            .lines()
            .map(|line| {
                line.trim()
                    .trim_start_matches(['*', '-', '•'])
                    .trim()
                    .to_string()
            })
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// A plant photo submitted for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlantDiseaseInput {
    /// A photo of a plant as a data URI: `data:<mimetype>;base64,<encoded_data>`.
    pub photo_data_uri: String,
}

/// The model's disease diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlantDiseaseOutput {
    /// The name of the identified plant disease.
    pub disease: String,
    /// The confidence level of the diagnosis (e.g. "92%").
    pub confidence: String,
    /// Step-by-step instructions for curing the identified disease.
    pub cure_instructions: String,
    /// Tips and best practices for preventing future occurrences.
    pub prevention_tips: String,
}

/// A schema-constrained result produced by a model.
pub trait StructuredOutput: DeserializeOwned + JsonSchema + Send {
    /// Name used when asking providers for structured output.
    const SCHEMA_NAME: &'static str;

    /// The wire name and value of every required string field.
    fn required_fields(&self) -> Vec<(&'static str, &str)>;

    /// Reject responses with blank fields so a partially filled result is
    /// never handed back as a success.
    fn ensure_complete(&self) -> AdvisorResult<()> {
        let missing: Vec<&str> = self
            .required_fields()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AdvisorError::SchemaMismatch {
                reason: format!("empty fields in {}: {}", Self::SCHEMA_NAME, missing.join(", ")),
            })
        }
    }

    /// JSON schema for this output, as embedded in prompts.
    fn json_schema() -> Value {
        serde_json::to_value(schemars::schema_for!(Self)).unwrap_or(Value::Null)
    }
}

impl StructuredOutput for CropRecommendationOutput {
    const SCHEMA_NAME: &'static str = "crop_recommendation";

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("recommended_crop", self.recommended_crop.as_str()),
            ("fertilizer", self.fertilizer.as_str()),
            ("tips", self.tips.as_str()),
        ]
    }
}

impl StructuredOutput for PlantDiseaseOutput {
    const SCHEMA_NAME: &'static str = "plant_disease_diagnosis";

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("disease", self.disease.as_str()),
            ("confidence", self.confidence.as_str()),
            ("cureInstructions", self.cure_instructions.as_str()),
            ("preventionTips", self.prevention_tips.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_accepts_numbers() {
        let input = CropRecommendationInput::from_value(&json!({
            "nitrogen": 70, "phosphorus": 75, "potassium": 105,
            "temperature": 25, "humidity": 50, "ph": 7, "rainfall": 160
        }))
        .unwrap();

        assert_eq!(input.nitrogen, 70.0);
        assert_eq!(input.ph, 7.0);
        assert_eq!(input.get("rainfall"), Some(160.0));
        assert_eq!(input.get("sunlight"), None);
    }

    #[test]
    fn test_from_value_reports_every_bad_field() {
        let errors = CropRecommendationInput::from_value(&json!({
            "nitrogen": "lots", "phosphorus": 75, "potassium": null,
            "temperature": 25, "humidity": 50, "ph": 7
        }))
        .unwrap_err();

        let fields = errors.fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["nitrogen"], "must be a number");
        assert_eq!(fields["potassium"], "is required");
        assert_eq!(fields["rainfall"], "is required");
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        let errors = CropRecommendationInput::from_value(&json!([1, 2, 3])).unwrap_err();
        assert!(errors.fields().contains_key("body"));
    }

    #[test]
    fn test_tip_list_strips_bullets() {
        let output = CropRecommendationOutput {
            recommended_crop: "Rice".to_string(),
            fertilizer: "Urea".to_string(),
            tips: "* Keep fields flooded\n- Transplant at 25 days\n\n• Watch for blast".to_string(),
        };
        assert_eq!(
            output.tip_list(),
            vec!["Keep fields flooded", "Transplant at 25 days", "Watch for blast"]
        );
    }

    #[test]
    fn test_ensure_complete_flags_blank_fields() {
        let output = PlantDiseaseOutput {
            disease: "Early blight".to_string(),
            confidence: "  ".to_string(),
            cure_instructions: "Remove infected leaves".to_string(),
            prevention_tips: String::new(),
        };
        let err = output.ensure_complete().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("confidence"));
        assert!(text.contains("preventionTips"));
    }

    #[test]
    fn test_disease_output_uses_camel_case() {
        let output: PlantDiseaseOutput = serde_json::from_value(json!({
            "disease": "Leaf rust",
            "confidence": "88%",
            "cureInstructions": "Apply fungicide",
            "preventionTips": "Rotate crops"
        }))
        .unwrap();
        assert!(output.ensure_complete().is_ok());
        assert_eq!(output.cure_instructions, "Apply fungicide");
    }

    #[test]
    fn test_json_schema_lists_output_fields() {
        let schema = <CropRecommendationOutput as StructuredOutput>::json_schema();
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("recommended_crop"));
        assert!(properties.contains_key("fertilizer"));
        assert!(properties.contains_key("tips"));
    }
}
