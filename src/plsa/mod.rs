pub mod accumulator;
pub mod corpus;
pub mod expectation;
pub mod features;
pub mod inference;
pub mod model;
pub mod serde;
pub mod train;
pub mod vocab;

/// Half-width of the band around 1.0 a probability mass must stay in.
pub const MASS_TOLERANCE: f64 = 1e-4;

/// Training prunes a document's topic once its weight drops below this.
pub const TRAIN_TOPIC_THRESHOLD: f32 = 1e-5;

/// Inference prunes a topic once its weight drops below this.
pub const INFER_TOPIC_THRESHOLD: f32 = 1e-4;

/// Inference stops once no topic moved by this much in a pass.
pub const DELTA_THRESHOLD: f32 = 1e-3;

#[inline]
pub fn within_tolerance(mass: f64) -> bool {
    (1.0 - MASS_TOLERANCE..=1.0 + MASS_TOLERANCE).contains(&mass)
}
