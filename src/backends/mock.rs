//! Mock backend implementation for testing and debugging
//!
//! Produces a soft circular foreground mask centered in the model frame, so
//! background removal can be exercised without a model file.

use crate::{
    error::{ResizerError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;

/// Mock backend for testing and debugging purposes
#[derive(Debug, Clone)]
pub struct MockBackend {
    /// Whether the backend has been initialized
    initialized: bool,
    /// Simulated model information
    model_info: ModelInfo,
    /// Preprocessing configuration
    preprocessing_config: PreprocessingConfig,
    /// Whether to simulate initialization failure
    should_fail_init: bool,
    /// Whether to simulate inference failure
    should_fail_inference: bool,
}

impl MockBackend {
    /// Create a new mock backend with a 256x256 model frame
    #[must_use]
    pub fn new() -> Self {
        Self::with_size(256)
    }

    /// Create a mock backend with a square model frame of `size` pixels
    #[must_use]
    pub fn with_size(size: usize) -> Self {
        let size = size.max(8);
        Self {
            initialized: false,
            model_info: ModelInfo {
                name: "mock-segmentation-model".to_string(),
                precision: "fp32".to_string(),
                size_bytes: 512 * 1024,
                input_shape: (1, 3, size, size),
                output_shape: (1, 1, size, size),
            },
            preprocessing_config: PreprocessingConfig {
                target_size: [size as u32, size as u32],
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    /// Create an initialized mock backend, ready to share
    #[must_use]
    pub fn initialized() -> Self {
        let mut backend = Self::new();
        backend.initialized = true;
        backend
    }

    /// Create a mock backend that will fail during initialization
    #[must_use]
    pub fn new_failing_init() -> Self {
        let mut backend = Self::new();
        backend.should_fail_init = true;
        backend
    }

    /// Create an initialized mock backend that will fail during inference
    #[must_use]
    pub fn new_failing_inference() -> Self {
        let mut backend = Self::initialized();
        backend.should_fail_inference = true;
        backend
    }

    /// Soft-edged disc covering the middle third of the frame
    fn generate_mock_output(&self, batch_size: usize) -> Array4<f32> {
        let output_height = self.model_info.output_shape.2;
        let output_width = self.model_info.output_shape.3;
        let center_x = output_width as f32 / 2.0;
        let center_y = output_height as f32 / 2.0;
        let radius = (output_width.min(output_height) as f32 / 3.0).max(2.0);

        Array4::from_shape_fn(
            (batch_size, 1, output_height, output_width),
            |(_, _, y, x)| {
                let dx = x as f32 - center_x;
                let dy = y as f32 - center_y;
                let distance = (dx * dx + dy * dy).sqrt();
                ((radius - distance) / (radius / 4.0)).clamp(0.0, 1.0)
            },
        )
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.should_fail_init {
            return Err(ResizerError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(ResizerError::inference("Mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(ResizerError::inference("Mock backend inference failed"));
        }

        let (batch, channels, height, width) = input.dim();
        if channels != 3 || (height, width) != (self.input_shape().2, self.input_shape().3) {
            return Err(ResizerError::inference(format!(
                "Unexpected input tensor shape {:?}",
                input.shape()
            )));
        }

        Ok(self.generate_mock_output(batch))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.input_shape
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.output_shape
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing_config.clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(self.model_info.clone())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
