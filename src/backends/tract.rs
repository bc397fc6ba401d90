//! Tract backend implementation for segmentation models
//!
//! Tract is a pure Rust neural network inference library, so the server ships
//! without native ONNX Runtime libraries.

use crate::error::{ResizerError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::{Array4, Ix4};
use tract_onnx::prelude::*;

/// Optimized, runnable ONNX graph
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: ModelManager,
}

impl TractBackend {
    /// Create a Tract backend for the model resolved by `model_manager`
    ///
    /// The model is parsed and optimized on [`InferenceBackend::initialize`].
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager,
        }
    }

    /// Load and initialize the model using Tract
    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_data = self.model_manager.load_model()?;
        let model_info = self.model_manager.get_info()?;
        let (batch, channels, height, width) = model_info.input_shape;

        log::info!("Initializing Tract backend");
        log::info!("Model: {} ({})", model_info.name, model_info.precision);

        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::info!("Model size: {size_mb:.2} MB");

        log::debug!("Creating Tract model from ONNX data...");

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| ResizerError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([batch, channels, height, width]).into())
            .map_err(|e| ResizerError::model(format!("Failed to set model input shape: {e}")))?
            .into_optimized()
            .map_err(|e| ResizerError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| ResizerError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Tract backend initialized in {:.2}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }

        let model_load_time = self.load_model()?;
        Ok(Some(model_load_time))
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| ResizerError::inference("Tract model not initialized"))?;

        let start = Instant::now();
        let outputs = model
            .run(tvec![Tensor::from(input.clone()).into()])
            .map_err(|e| ResizerError::inference(format!("Tract inference failed: {e}")))?;

        let mask = outputs
            .into_iter()
            .next()
            .ok_or_else(|| ResizerError::inference("Model produced no outputs"))?
            .into_tensor()
            .into_array::<f32>()
            .map_err(|e| ResizerError::inference(format!("Output tensor is not f32: {e}")))?
            .into_dimensionality::<Ix4>()
            .map_err(|e| ResizerError::inference(format!("Output tensor is not 4D: {e}")))?;

        log::debug!(
            "Tract inference on {:?} took {}ms, output {:?}",
            input.shape(),
            start.elapsed().as_millis(),
            mask.shape()
        );

        Ok(mask)
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .get_info()
            .map_or((1, 3, 1024, 1024), |info| info.input_shape)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .get_info()
            .map_or((1, 1, 1024, 1024), |info| info.output_shape)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.model_manager.get_preprocessing_config()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        self.model_manager.get_info()
    }
}
