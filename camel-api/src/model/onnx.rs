//! ONNX Runtime backend
//!
//! Expected graph signature:
//! - inputs: `image` `[1, 3, 224, 224]` f32, `traits` `[1, 4]` f32
//! - outputs: `logits` `[1, C]` f32, `cam` `[1, C, h, w]` f32 (one Grad-CAM
//!   map per class, computed in-graph against the last conv block)

use ndarray::{Array3, ArrayD, Ix4};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session, SessionOutputs},
    value::Tensor,
};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use super::{softmax, BreedModel, ModelError, ModelInput, ModelOutput};

/// Model backed by an ONNX Runtime session
pub struct OnnxBreedModel {
    session: Mutex<Session>,
    path: PathBuf,
}

impl OnnxBreedModel {
    /// Load and optimize the graph at `path`
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::Load(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| ModelError::Load(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelError::Load(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| ModelError::Load(e.to_string()))?;

        info!(path = %path.display(), "ONNX model session created");

        Ok(Self {
            session: Mutex::new(session),
            path: path.to_path_buf(),
        })
    }
}

fn require_output<T>(value: Option<T>, name: &str) -> Result<T, ModelError> {
    value.ok_or_else(|| ModelError::InvalidOutput(format!("graph has no `{}` output", name)))
}

/// Owned copy of the named f32 output
fn output_array(outputs: &SessionOutputs, name: &str) -> Result<ArrayD<f32>, ModelError> {
    require_output(outputs.get(name), name)?
        .try_extract_array::<f32>()
        .map(|view| view.to_owned())
        .map_err(|e| ModelError::InvalidOutput(format!("{}: {}", name, e)))
}

impl BreedModel for OnnxBreedModel {
    fn describe(&self) -> String {
        format!("onnx:{}", self.path.display())
    }

    fn predict(&self, input: &ModelInput) -> Result<ModelOutput, ModelError> {
        let image = Tensor::from_array(input.image.clone())
            .map_err(|e| ModelError::Inference(e.to_string()))?;
        let traits = Tensor::from_array(input.traits.clone())
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        // Copy both outputs out so the session lock is released before any
        // shape checks run
        let (logits, cam) = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| ModelError::Inference("model session lock poisoned".to_string()))?;

            let outputs = session
                .run(inputs!["image" => image, "traits" => traits])
                .map_err(|e| ModelError::Inference(e.to_string()))?;

            (
                output_array(&outputs, "logits")?,
                output_array(&outputs, "cam")?,
            )
        };

        let logits: Vec<f32> = logits.iter().copied().collect();
        let cam = cam
            .into_dimensionality::<Ix4>()
            .map_err(|e| ModelError::InvalidOutput(format!("cam must be 4-D: {}", e)))?;

        let (_, classes, height, width) = cam.dim();
        let class_activations = Array3::from_shape_vec(
            (classes, height, width),
            cam.iter().copied().collect(),
        )
        .map_err(|e| ModelError::InvalidOutput(format!("cam: {}", e)))?;

        Ok(ModelOutput {
            probabilities: softmax(&logits),
            class_activations,
        })
    }
}
