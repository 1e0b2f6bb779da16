//! Range checks applied before any AI call.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data_uri::{DataUri, ACCEPTED_IMAGE_TYPES, DEFAULT_MAX_IMAGE_BYTES};
use crate::schemas::{CropRecommendationInput, CROP_INPUT_FIELDS};

/// Per-field validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. The first message for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{field} {message}"))
            .collect();
        write!(f, "Invalid input: {}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Inclusive numeric range for one form field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
}

impl FieldRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Accepted ranges for the crop recommendation form.
///
/// Defaults follow the value ranges seen in the common crop recommendation
/// dataset; deployments can widen or narrow them through configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputRanges {
    pub nitrogen: FieldRange,
    pub phosphorus: FieldRange,
    pub potassium: FieldRange,
    pub temperature: FieldRange,
    pub humidity: FieldRange,
    pub ph: FieldRange,
    pub rainfall: FieldRange,
}

impl Default for InputRanges {
    fn default() -> Self {
        Self {
            nitrogen: FieldRange::new(0.0, 140.0),
            phosphorus: FieldRange::new(5.0, 145.0),
            potassium: FieldRange::new(5.0, 205.0),
            temperature: FieldRange::new(8.0, 44.0),
            humidity: FieldRange::new(14.0, 100.0),
            ph: FieldRange::new(3.5, 10.0),
            rainfall: FieldRange::new(20.0, 300.0),
        }
    }
}

impl InputRanges {
    /// Range for a field by name.
    pub fn get(&self, field: &str) -> Option<FieldRange> {
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

    /// Every field with its range, in form order.
    pub fn fields(&self) -> Vec<(&'static str, FieldRange)> {
        CROP_INPUT_FIELDS
            .iter()
            .filter_map(|field| self.get(field).map(|range| (*field, range)))
            .collect()
    }

    /// Check that every reading is finite and inside its range.
    pub fn validate(&self, input: &CropRecommendationInput) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, range) in self.fields() {
            let Some(value) = input.get(field) else {
                continue;
            };
            if !value.is_finite() {
                errors.add(field, "must be a finite number");
            } else if !range.contains(value) {
                errors.add(
                    field,
                    format!("must be between {} and {}", range.min, range.max),
                );
            }
        }
        errors.into_result()
    }
}

/// Constraints on uploaded plant photos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageLimits {
    pub accepted_types: Vec<String>,
    pub max_bytes: usize,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            accepted_types: ACCEPTED_IMAGE_TYPES.iter().map(ToString::to_string).collect(),
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl ImageLimits {
    /// Parse and check a photo data URI against these limits.
    pub fn validate(&self, photo_data_uri: &str) -> Result<DataUri, ValidationErrors> {
        const FIELD: &str = "photoDataUri";
        let mut errors = ValidationErrors::new();

        if photo_data_uri.trim().is_empty() {
            errors.add(FIELD, "is required");
            return Err(errors);
        }

        let uri = match DataUri::parse(photo_data_uri) {
            Ok(uri) => uri,
            Err(e) => {
                errors.add(FIELD, e.to_string());
                return Err(errors);
            }
        };

        if !self
            .accepted_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(uri.mime_type()))
        {
            errors.add(
                FIELD,
                format!(
                    "image type '{}' is not supported (expected one of: {})",
                    uri.mime_type(),
                    self.accepted_types.join(", ")
                ),
            );
        } else if uri.decoded_len() > self.max_bytes {
            errors.add(
                FIELD,
                format!(
                    "image is {} bytes, larger than the {} byte limit",
                    uri.decoded_len(),
                    self.max_bytes
                ),
            );
        }

        errors.into_result().map(|()| uri)
    }
}
