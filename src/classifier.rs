//! Model loading and inference.

use std::path::Path;

use ndarray::Array4;
use tract_onnx::prelude::*;
use tracing::{debug, info};

use crate::error::{PredictError, StartupError};

/// Forward pass of a pretrained classifier over a batch of one image.
///
/// Implementations are shared read-only across concurrent requests.
pub trait Classifier: Send + Sync {
    /// Returns one probability per known class, in training index order.
    fn predict(&self, batch: &Array4<f32>) -> Result<Vec<f32>, PredictError>;
}

/// ONNX network executed with tract on the CPU.
pub struct TractClassifier {
    plan: TypedRunnableModel<TypedModel>,
    input_shape: [usize; 4],
}

impl TractClassifier {
    /// Load and optimize the network for an NHWC f32 input of
    /// `[1, input_size, input_size, 3]`.
    ///
    /// A missing file is reported before tract is involved so that startup
    /// fails with a clear message.
    pub fn load(path: &Path, input_size: u32) -> Result<Self, StartupError> {
        if !path.exists() {
            return Err(StartupError::ModelMissing(path.to_path_buf()));
        }

        let side = input_size as usize;
        let input_shape = [1, side, side, 3];

        debug!("Loading ONNX model from {}", path.display());

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| StartupError::ModelLoad(format!("{}: {}", path.display(), e)))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, side, side, 3)),
            )
            .map_err(|e| StartupError::ModelLoad(format!("input fact rejected: {}", e)))?
            .into_optimized()
            .map_err(|e| StartupError::ModelLoad(format!("optimization failed: {}", e)))?
            .into_runnable()
            .map_err(|e| StartupError::ModelLoad(format!("model not runnable: {}", e)))?;

        info!("Model loaded from {}", path.display());

        Ok(Self { plan, input_shape })
    }
}

impl Classifier for TractClassifier {
    fn predict(&self, batch: &Array4<f32>) -> Result<Vec<f32>, PredictError> {
        if batch.shape() != &self.input_shape[..] {
            return Err(PredictError::Inference(format!(
                "input shape {:?} does not match model input {:?}",
                batch.shape(),
                self.input_shape
            )));
        }

        let values: Vec<f32> = batch.iter().copied().collect();
        let tensor = Tensor::from_shape(&self.input_shape, &values)
            .map_err(|e| PredictError::Inference(format!("failed to build input tensor: {}", e)))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| PredictError::Inference(format!("inference failed: {}", e)))?;

        let output = outputs
            .first()
            .ok_or_else(|| PredictError::Inference("model produced no output".to_string()))?;

        let scores = output
            .to_array_view::<f32>()
            .map_err(|e| PredictError::Inference(format!("unexpected output type: {}", e)))?;

        Ok(scores.iter().copied().collect())
    }
}
