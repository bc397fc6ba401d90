//! Segmentation model location and metadata
//!
//! Models are ONNX files on local disk. A model path is either the `.onnx` file
//! itself or a folder in the HuggingFace layout:
//!
//! ```text
//! isnet-general-onnx/
//! ├── onnx/model.onnx            (or model.onnx at the top level)
//! ├── onnx/model_fp16.onnx       (selected with variant "fp16")
//! └── preprocessor_config.json   (optional: size, image_mean, image_std)
//! ```

use crate::error::{ResizerError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Model source specification
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ModelSource {
    /// Model file or model folder on the local filesystem
    External(PathBuf),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::External(path) => {
                format!(
                    "external:{}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                )
            },
        }
    }
}

/// Complete model specification including source and optional variant
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    pub variant: Option<String>,
}

impl ModelSpec {
    /// Specification for a model at `path` with the default variant
    pub fn external<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            source: ModelSource::External(path.into()),
            variant: None,
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Preprocessing configuration for a model
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Square model input size, `[height, width]`
    pub target_size: [u32; 2],
    /// Per-channel mean in 0-1 range
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation in 0-1 range
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    /// ISNet settings: 1024x1024 input, pixels shifted to roughly [-0.5, 0.5]
    fn default() -> Self {
        Self {
            target_size: [1024, 1024],
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }
}

/// Resolves a [`ModelSpec`] to a file and reads its metadata
#[derive(Debug, Clone)]
pub struct ModelManager {
    spec: ModelSpec,
    model_path: PathBuf,
    preprocessing: PreprocessingConfig,
}

impl ModelManager {
    /// Resolve the model file and preprocessing configuration
    ///
    /// # Errors
    /// - Model path does not exist
    /// - Folder contains no model file for the requested variant
    /// - `preprocessor_config.json` exists but is malformed
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        let ModelSource::External(ref root) = spec.source;

        if !root.exists() {
            return Err(ResizerError::model_error_with_context(
                "locate",
                root,
                "path does not exist",
                &["pass the .onnx file or its folder with --model"],
            ));
        }

        let (model_path, config_dir) = if root.is_dir() {
            (Self::find_model_file(root, spec.variant.as_deref())?, root.clone())
        } else {
            let parent = root.parent().map_or_else(PathBuf::new, Path::to_path_buf);
            (root.clone(), parent)
        };

        let preprocessing = match Self::read_preprocessor_config(&config_dir)? {
            Some(config) => Self::parse_preprocessing_config(&config)?,
            None => {
                log::debug!(
                    "No preprocessor_config.json next to {}, using ISNet defaults",
                    model_path.display()
                );
                PreprocessingConfig::default()
            },
        };

        Ok(Self {
            spec: spec.clone(),
            model_path,
            preprocessing,
        })
    }

    /// Path of the resolved `.onnx` file
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Read the model bytes
    ///
    /// # Errors
    /// - File I/O errors when reading model data
    pub fn load_model(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.model_path)
            .map_err(|e| ResizerError::file_io_error("read model", &self.model_path, &e))
    }

    /// Get model information
    ///
    /// # Errors
    /// - Model file metadata cannot be read
    pub fn get_info(&self) -> Result<ModelInfo> {
        let size_bytes = std::fs::metadata(&self.model_path)
            .map_err(|e| ResizerError::file_io_error("inspect model", &self.model_path, &e))?
            .len() as usize;

        let [height, width] = self.preprocessing.target_size;
        let (height, width) = (height as usize, width as usize);

        Ok(ModelInfo {
            name: self.spec.source.display_name(),
            precision: self.precision().to_string(),
            size_bytes,
            input_shape: (1, 3, height, width),
            output_shape: (1, 1, height, width),
        })
    }

    /// Get preprocessing configuration
    ///
    /// # Errors
    /// Infallible today; kept fallible for backends that resolve it lazily.
    pub fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing.clone())
    }

    fn precision(&self) -> &str {
        let stem = self
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if stem.ends_with("fp16") {
            "fp16"
        } else {
            "fp32"
        }
    }

    fn find_model_file(dir: &Path, variant: Option<&str>) -> Result<PathBuf> {
        let file_name = match variant {
            None | Some("fp32") => "model.onnx".to_string(),
            Some(other) => format!("model_{other}.onnx"),
        };

        [dir.join("onnx").join(&file_name), dir.join(&file_name)]
            .into_iter()
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                ResizerError::model_error_with_context(
                    "locate",
                    dir,
                    &format!("no {file_name} found"),
                    &["check the model variant", "point --model at the .onnx file"],
                )
            })
    }

    fn read_preprocessor_config(dir: &Path) -> Result<Option<Value>> {
        let path = dir.join("preprocessor_config.json");
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| ResizerError::file_io_error("read preprocessor config", &path, &e))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ResizerError::model(format!("Invalid {}: {e}", path.display())))
    }

    /// Parse a HuggingFace `preprocessor_config.json`
    ///
    /// `image_mean` and `image_std` are given in 0-255 and converted to 0-1.
    fn parse_preprocessing_config(preprocessor: &Value) -> Result<PreprocessingConfig> {
        let size = preprocessor
            .get("size")
            .ok_or_else(|| ResizerError::model("Missing size in preprocessor config"))?;

        let dimension = |key: &str| -> Result<u32> {
            size.get(key)
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .filter(|v| *v > 0)
                .ok_or_else(|| ResizerError::model(format!("Missing or invalid {key} in size config")))
        };
        let height = dimension("height")?;
        let width = dimension("width")?;

        Ok(PreprocessingConfig {
            target_size: [height, width],
            normalization_mean: Self::parse_channels(preprocessor, "image_mean")?,
            normalization_std: Self::parse_channels(preprocessor, "image_std")?,
        })
    }

    fn parse_channels(preprocessor: &Value, key: &str) -> Result<[f32; 3]> {
        let values = preprocessor
            .get(key)
            .and_then(Value::as_array)
            .ok_or_else(|| ResizerError::model(format!("Missing or invalid {key} in preprocessor config")))?;

        let mut channels = [0.0f32; 3];
        for (index, slot) in channels.iter_mut().enumerate() {
            let value = values
                .get(index)
                .and_then(Value::as_f64)
                .ok_or_else(|| ResizerError::model(format!("{key} must have 3 numeric values")))?;
            *slot = (value / 255.0) as f32;
        }

        if key == "image_std" && channels.iter().any(|std| *std <= 0.0) {
            return Err(ResizerError::model("image_std values must be positive"));
        }
        Ok(channels)
    }
}
