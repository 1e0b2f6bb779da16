//! Simulated sensor readings for trying the recommendation flow without a
//! field kit.

use rand::Rng;

use crate::schemas::CropRecommendationInput;
use crate::validation::{FieldRange, InputRanges};

/// Ranges readings are drawn from before narrowing to the accepted ranges.
const TYPICAL: InputRanges = InputRanges {
    nitrogen: FieldRange::new(0.0, 140.0),
    phosphorus: FieldRange::new(5.0, 145.0),
    potassium: FieldRange::new(5.0, 205.0),
    temperature: FieldRange::new(10.0, 40.0),
    humidity: FieldRange::new(30.0, 100.0),
    ph: FieldRange::new(5.5, 8.5),
    rainfall: FieldRange::new(30.0, 230.0),
};

/// Generate a plausible reading set, rounded to two decimals.
///
/// Each value is drawn from the overlap of its typical range and `accepted`,
/// or from `accepted` alone when the two do not overlap, so a well-formed
/// `accepted` always validates the result.
pub fn simulated_reading<R: Rng>(rng: &mut R, accepted: &InputRanges) -> CropRecommendationInput {
    CropRecommendationInput {
        nitrogen: sample(rng, &TYPICAL.nitrogen, &accepted.nitrogen),
        phosphorus: sample(rng, &TYPICAL.phosphorus, &accepted.phosphorus),
        potassium: sample(rng, &TYPICAL.potassium, &accepted.potassium),
        temperature: sample(rng, &TYPICAL.temperature, &accepted.temperature),
        humidity: sample(rng, &TYPICAL.humidity, &accepted.humidity),
        ph: sample(rng, &TYPICAL.ph, &accepted.ph),
        rainfall: sample(rng, &TYPICAL.rainfall, &accepted.rainfall),
    }
}

fn sample<R: Rng>(rng: &mut R, typical: &FieldRange, accepted: &FieldRange) -> f64 {
    let mut low = typical.min.max(accepted.min);
    let mut high = typical.max.min(accepted.max);
    if low > high {
        low = accepted.min;
        high = accepted.max;
    }
    if !(low.is_finite() && high.is_finite()) || low >= high {
        return low;
    }

    // Rounding can step past a bound that has more than two decimals.
    round2(rng.gen_range(low..=high)).max(low).min(high)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
