//! Inference backend abstraction

use crate::{
    error::Result,
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;

/// Trait for segmentation inference backends
///
/// Backends are initialized once and then shared by concurrent requests, so
/// inference takes `&self`.
pub trait InferenceBackend: Send + Sync {
    /// Load the model; returns the load time on first initialization
    ///
    /// # Errors
    /// - Model loading or validation errors
    fn initialize(&mut self) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor, returning a 1x1xHxW mask tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Invalid input tensor dimensions
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Get the expected input shape for this backend
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Get the expected output shape for this backend
    fn output_shape(&self) -> (usize, usize, usize, usize);

    /// Get preprocessing configuration for this backend
    ///
    /// # Errors
    /// - Invalid or missing preprocessing configuration
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Get model information for this backend
    ///
    /// # Errors
    /// - Model metadata unavailable or invalid
    fn get_model_info(&self) -> Result<ModelInfo>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}
