//! Breed classification model
//!
//! The trained network is an image + tabular model: an RGB image tensor and
//! the four trait scores go in, per-breed scores and per-class activation
//! maps (used for the explanation overlay) come out. The service only talks to
//! it through [`BreedModel`], loaded once at startup and shared read-only.

use ndarray::{Array2, Array3, Array4};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "onnx")]
pub mod onnx;
pub mod preprocess;

/// Breed labels in model output order
pub const BREEDS: [&str; 3] = ["Majaheem Camel", "Bactrian Camel", "Libyan Camel"];

/// Headline label used when the model is not confident enough
pub const FALLBACK_LABEL: &str = "Arabian Camel (Dromedary)";

/// Allowed deviation of the probability sum from 1.0
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Model error types
#[derive(Debug, Error)]
pub enum ModelError {
    /// Model artifact missing or unreadable
    #[error("Failed to load model: {0}")]
    Load(String),

    /// Forward pass failed
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Model produced output that violates the output contract
    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    /// No model backend compiled in or loaded
    #[error("Model unavailable: {0}")]
    Unavailable(String),
}

/// Tensors fed to the model
#[derive(Debug, Clone)]
pub struct ModelInput {
    /// Normalized image, shape `[1, 3, IMAGE_SIZE, IMAGE_SIZE]`
    pub image: Array4<f32>,
    /// Trait scores, shape `[1, 4]`
    pub traits: Array2<f32>,
}

/// Result of one forward pass
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// Probability per breed, in [`BREEDS`] order
    pub probabilities: Vec<f64>,
    /// Class activation maps, shape `[BREEDS.len(), h, w]`
    pub class_activations: Array3<f32>,
}

impl ModelOutput {
    /// Check the output contract: one finite, non-negative probability per
    /// breed summing to 1, and one non-empty activation map per breed
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.probabilities.len() != BREEDS.len() {
            return Err(ModelError::InvalidOutput(format!(
                "expected {} probabilities, got {}",
                BREEDS.len(),
                self.probabilities.len()
            )));
        }

        if self
            .probabilities
            .iter()
            .any(|p| !p.is_finite() || *p < 0.0)
        {
            return Err(ModelError::InvalidOutput(
                "probabilities must be finite and non-negative".to_string(),
            ));
        }

        let sum: f64 = self.probabilities.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(ModelError::InvalidOutput(format!(
                "probabilities sum to {}, expected 1",
                sum
            )));
        }

        let (classes, height, width) = self.class_activations.dim();
        if classes != BREEDS.len() || height == 0 || width == 0 {
            return Err(ModelError::InvalidOutput(format!(
                "activation maps have shape [{}, {}, {}], expected [{}, h, w]",
                classes,
                height,
                width,
                BREEDS.len()
            )));
        }

        Ok(())
    }
}

/// A loaded classification model
///
/// Implementations must be deterministic: identical inputs give identical
/// outputs. Calls are synchronous and CPU/GPU bound; callers run them on the
/// blocking thread pool.
pub trait BreedModel: Send + Sync {
    /// Human-readable backend description for logs
    fn describe(&self) -> String;

    /// Run one forward pass
    fn predict(&self, input: &ModelInput) -> Result<ModelOutput, ModelError>;
}

/// Numerically stable softmax over raw logits
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Load the model artifact at `path` with the compiled-in backend
#[cfg(feature = "onnx")]
pub fn load_model(path: &Path) -> Result<Arc<dyn BreedModel>, ModelError> {
    let model = onnx::OnnxBreedModel::load(path)?;
    Ok(Arc::new(model))
}

/// Load the model artifact at `path` with the compiled-in backend
#[cfg(not(feature = "onnx"))]
pub fn load_model(path: &Path) -> Result<Arc<dyn BreedModel>, ModelError> {
    Err(ModelError::Unavailable(format!(
        "cannot load {}: built without the `onnx` feature",
        path.display()
    )))
}
