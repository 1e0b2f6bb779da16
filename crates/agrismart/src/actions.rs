//! Server actions: validate, call the advisor, save history.
//!
//! An action either returns a populated result or a non-empty error
//! message. Validation failures are returned separately as `Err` and never
//! reach the AI provider.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use advisor::{
    simulated_reading, AdvisorError, Advisor, CropRecommendationInput, CropRecommendationOutput,
    ImageLimits, InputRanges, PlantDiseaseOutput, ValidationErrors,
};

use crate::auth::UserInfo;
use crate::history::History;

/// Shown instead of the raw provider error when the AI quota is exhausted.
pub const RATE_LIMIT_MESSAGE: &str =
    "The AI service is receiving too many requests right now. Please wait a minute and try again.";

/// Whether a provider error message indicates rate limiting.
pub fn is_rate_limited(message: &str) -> bool {
    message.contains("RESOURCE_EXHAUSTED") || message.contains("429")
}

/// Message shown to the user for a failed AI call.
pub fn user_facing_message(message: &str) -> String {
    if is_rate_limited(message) {
        RATE_LIMIT_MESSAGE.to_string()
    } else if message.trim().is_empty() {
        "The AI service returned an empty error".to_string()
    } else {
        message.to_string()
    }
}

/// Outcome of an action: exactly one of `data` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionResult<T> {
    Data(T),
    Error(String),
}

impl<T> ActionResult<T> {
    fn from_advisor(result: Result<T, AdvisorError>) -> Self {
        match result {
            Ok(data) => Self::Data(data),
            Err(e) => Self::Error(user_facing_message(&e.to_string())),
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Data(data) => Some(data),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Data(_) => None,
            Self::Error(message) => Some(message),
        }
    }

    /// Whether this failed because the AI provider is rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        self.error() == Some(RATE_LIMIT_MESSAGE)
    }
}

/// A crop recommendation as returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CropRecommendationResult {
    /// Readings the recommendation was made for
    pub inputs: CropRecommendationInput,
    pub output: CropRecommendationOutput,
    /// Parsed tips, one per line
    pub tip_list: Vec<String>,
    /// History record id, absent if saving failed
    pub record_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A diagnosis as returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiseaseDetectionResult {
    pub output: PlantDiseaseOutput,
    pub record_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// The server actions behind the two forms.
pub struct Actions {
    advisor: Advisor,
    history: History,
    ranges: InputRanges,
    images: ImageLimits,
}

impl Actions {
    pub fn new(advisor: Advisor, history: History, ranges: InputRanges, images: ImageLimits) -> Self {
        Self {
            advisor,
            history,
            ranges,
            images,
        }
    }

    pub fn ranges(&self) -> &InputRanges {
        &self.ranges
    }

    pub fn image_limits(&self) -> &ImageLimits {
        &self.images
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn advisor(&self) -> &Advisor {
        &self.advisor
    }

    /// Validate readings, then recommend a crop and save the result.
    pub async fn recommend_crop(
        &self,
        user: &UserInfo,
        input: CropRecommendationInput,
    ) -> Result<ActionResult<CropRecommendationResult>, ValidationErrors> {
        self.ranges.validate(&input)?;

        let output = match self.advisor.recommend_crop(&input).await {
            Ok(output) => output,
            Err(e) => {
                warn!(uid = %user.uid, error = %e, "Crop recommendation failed");
                return Ok(ActionResult::from_advisor(Err(e)));
            }
        };

        let (record_id, created_at) = match self
            .history
            .record_crop_recommendation(&user.uid, &input, &output)
            .await
        {
            Ok(record) => (Some(record.id), Some(record.created_at)),
            Err(e) => {
                warn!(uid = %user.uid, error = %e, "Failed to save crop recommendation");
                (None, None)
            }
        };

        Ok(ActionResult::Data(CropRecommendationResult {
            inputs: input,
            tip_list: output.tip_list(),
            output,
            record_id,
            created_at,
        }))
    }

    /// Generate in-range readings and run [`Actions::recommend_crop`] on them.
    pub async fn simulate_crop_recommendation(
        &self,
        user: &UserInfo,
    ) -> Result<ActionResult<CropRecommendationResult>, ValidationErrors> {
        let input = simulated_reading(&mut rand::thread_rng(), &self.ranges);
        info!(uid = %user.uid, ?input, "Simulated sensor reading");
        self.recommend_crop(user, input).await
    }

    /// Validate the photo, then diagnose it and save the result.
    pub async fn diagnose_plant_disease(
        &self,
        user: &UserInfo,
        photo_data_uri: &str,
    ) -> Result<ActionResult<DiseaseDetectionResult>, ValidationErrors> {
        let photo = self.images.validate(photo_data_uri)?;

        let output = match self.advisor.diagnose_plant_disease(&photo).await {
            Ok(output) => output,
            Err(e) => {
                warn!(uid = %user.uid, error = %e, "Plant disease diagnosis failed");
                return Ok(ActionResult::from_advisor(Err(e)));
            }
        };

        let (record_id, created_at) = match self
            .history
            .record_disease_detection(&user.uid, &photo.to_string(), &output)
            .await
        {
            Ok(record) => (Some(record.id), Some(record.created_at)),
            Err(e) => {
                warn!(uid = %user.uid, error = %e, "Failed to save disease detection");
                (None, None)
            }
        };

        Ok(ActionResult::Data(DiseaseDetectionResult {
            output,
            record_id,
            created_at,
        }))
    }
}
