#![warn(clippy::pedantic)]
// Allow common pedantic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]

//! # Advisor
//!
//! AI-backed agronomy flows for AgriSmart.
//!
//! This crate provides:
//! - Crop recommendation from soil nutrient and climate readings
//! - Plant disease diagnosis from a photo passed as a data URI
//! - Input validation with per-field messages
//! - Gemini, Anthropic and OpenAI providers behind one trait
//!
//! ## Example
//!
//! ```rust,ignore
//! use advisor::{Advisor, CropRecommendationInput, ProviderRegistry};
//!
//! let provider = ProviderRegistry::with_defaults().require_any()?;
//! let advisor = Advisor::new(provider);
//! let output = advisor.recommend_crop(&input).await?;
//! println!("Plant {}", output.recommended_crop);
//! ```

pub mod ai;
pub mod data_uri;
pub mod errors;
pub mod flows;
pub mod schemas;
pub mod simulate;
pub mod validation;

pub use ai::{AIProvider, GenerateOptions, ProviderRegistry};
pub use data_uri::{mime_type_for_path, DataUri, ACCEPTED_IMAGE_TYPES, DEFAULT_MAX_IMAGE_BYTES};
pub use errors::{AdvisorError, AdvisorResult};
pub use flows::Advisor;
pub use schemas::{
    CropRecommendationInput, CropRecommendationOutput, PlantDiseaseInput, PlantDiseaseOutput,
    StructuredOutput, CROP_INPUT_FIELDS,
};
pub use simulate::simulated_reading;
pub use validation::{FieldRange, ImageLimits, InputRanges, ValidationErrors};
