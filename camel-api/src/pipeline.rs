//! Prediction request pipeline
//!
//! validate -> decode -> infer -> fallback decision -> rating -> explanation
//! overlay -> persist. Cheap range checks run before any decode or model
//! work, and the record is written last so a failure at any earlier step
//! leaves the store untouched.

use image::{DynamicImage, ImageError};
use ndarray::Axis;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::db;
use crate::explain::{self, ExplainError};
use crate::model::{preprocess, BreedModel, ModelError, BREEDS, FALLBACK_LABEL};
use crate::models::{NewPrediction, PredictionRecord, Probabilities, TraitScores};

/// Confidence threshold used when the caller gives none
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.60;

/// Pipeline error types
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Caller-supplied value rejected; `field` names the offending input
    #[error("{message}")]
    InvalidInput { field: &'static str, message: String },

    #[error("Classification model is not loaded")]
    ModelUnavailable,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Explanation rendering failed: {0}")]
    Explanation(#[from] ExplainError),

    #[error("Failed to persist prediction: {0}")]
    Persistence(#[from] camel_common::Error),

    /// Blocking inference task panicked or was cancelled
    #[error("Inference task failed: {0}")]
    Task(String),
}

impl ClassifyError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ClassifyError::InvalidInput {
            field,
            message: message.into(),
        }
    }
}

/// One classification request
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub image: Vec<u8>,
    pub traits: TraitScores,
    pub confidence_threshold: f64,
}

/// Check trait scores (in fixed field order) and then the threshold
///
/// Non-finite values are out of range.
pub fn validate(traits: &TraitScores, confidence_threshold: f64) -> Result<(), ClassifyError> {
    for (field, value) in traits.named() {
        if !(TraitScores::MIN..=TraitScores::MAX).contains(&value) {
            return Err(ClassifyError::invalid(
                field,
                format!(
                    "{} must be between {:.1} and {:.1}, got {}",
                    field,
                    TraitScores::MIN,
                    TraitScores::MAX,
                    value
                ),
            ));
        }
    }

    if !(0.0..=1.0).contains(&confidence_threshold) {
        return Err(ClassifyError::invalid(
            "confidence_threshold",
            format!(
                "confidence_threshold must be between 0.0 and 1.0, got {}",
                confidence_threshold
            ),
        ));
    }

    Ok(())
}

/// Outcome of the fallback policy
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Index of the most probable breed in [`BREEDS`]
    pub class_index: usize,
    /// What the model thinks
    pub raw_label: &'static str,
    /// What we are confident enough to assert
    pub label: &'static str,
    pub confidence: f64,
    pub is_fallback: bool,
}

/// Apply the fallback policy to a validated probability vector
///
/// Ties resolve to the lowest index. Confidence equal to the threshold is not
/// a fallback.
pub fn decide(probabilities: &[f64], confidence_threshold: f64) -> Decision {
    let (class_index, confidence) = probabilities
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, p)| {
            if p > best.1 {
                (i, p)
            } else {
                best
            }
        });

    let raw_label = BREEDS[class_index];
    let is_fallback = confidence < confidence_threshold;

    Decision {
        class_index,
        raw_label,
        label: if is_fallback { FALLBACK_LABEL } else { raw_label },
        confidence,
        is_fallback,
    }
}

/// Everything the pipeline computes before persistence
#[derive(Debug, Clone)]
pub struct Classification {
    pub decision: Decision,
    pub probabilities: Probabilities,
    pub rating: f64,
    /// Base64 PNG overlay for the raw predicted class
    pub explanation_png: String,
}

/// Run the model on a decoded image and shape the result
///
/// Synchronous and CPU bound; call from the blocking pool.
pub fn run_inference(
    model: &dyn BreedModel,
    image: &DynamicImage,
    traits: &TraitScores,
    confidence_threshold: f64,
) -> Result<Classification, ClassifyError> {
    let input = preprocess::model_input(image, traits);
    let output = model.predict(&input)?;
    output.validate()?;

    let decision = decide(&output.probabilities, confidence_threshold);

    let probabilities: Probabilities = BREEDS
        .iter()
        .zip(&output.probabilities)
        .map(|(breed, p)| (breed.to_string(), *p))
        .collect();

    let activation = output
        .class_activations
        .index_axis(Axis(0), decision.class_index);
    let explanation_png = explain::explanation_png(image, activation)?;

    debug!(
        raw_label = decision.raw_label,
        confidence = decision.confidence,
        is_fallback = decision.is_fallback,
        "Inference complete"
    );

    Ok(Classification {
        decision,
        probabilities,
        rating: traits.rating(),
        explanation_png,
    })
}

/// Classify an image for `user_id` and persist the result
pub async fn classify(
    db: &SqlitePool,
    model: Option<Arc<dyn BreedModel>>,
    user_id: i64,
    request: ClassifyRequest,
) -> Result<PredictionRecord, ClassifyError> {
    validate(&request.traits, request.confidence_threshold)?;

    let traits = request.traits;
    let threshold = request.confidence_threshold;
    let image_bytes = request.image;

    let classification = tokio::task::spawn_blocking(move || {
        let image = preprocess::decode_image(&image_bytes).map_err(|e| match e {
            ImageError::Limits(_) => ClassifyError::invalid(
                "file",
                format!(
                    "image dimensions exceed {0}x{0} pixels",
                    preprocess::MAX_IMAGE_DIMENSION
                ),
            ),
            other => {
                ClassifyError::invalid("file", format!("file is not a supported image: {}", other))
            }
        })?;
        let model = model.ok_or(ClassifyError::ModelUnavailable)?;
        run_inference(model.as_ref(), &image, &traits, threshold)
    })
    .await
    .map_err(|e| ClassifyError::Task(e.to_string()))??;

    let record = db::insert_prediction(
        db,
        NewPrediction {
            user_id,
            breed: classification.decision.label.to_string(),
            confidence: classification.decision.confidence,
            rating: classification.rating,
            traits,
            is_fallback: classification.decision.is_fallback,
            explanation_png: classification.explanation_png,
            probabilities: classification.probabilities,
        },
    )
    .await?;

    info!(
        user_id = user_id,
        prediction_id = record.id,
        breed = %record.breed,
        confidence = record.confidence,
        is_fallback = record.is_fallback,
        "Prediction stored"
    );

    Ok(record)
}
