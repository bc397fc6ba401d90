#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Resizer Server
//!
//! An HTTP service and library that resizes uploaded images, re-encodes them
//! as PNG, JPEG, WebP, TIFF or BMP, and optionally compresses them under a
//! byte budget by searching downward through encoder quality levels.
//! Backgrounds can be removed first with an ONNX segmentation model run by
//! the pure Rust Tract backend.
//!
//! ## Features
//!
//! - **Size-constrained encoding**: quality 95, 90, ..., 5, 1 until the
//!   output fits, with an explicit error when nothing does
//! - **Exact resizing**: Lanczos3 to the requested frame
//! - **Background removal**: ISNet-style models from a local `.onnx` file
//! - **HTTP surface**: `POST /process_image` with permissive CORS
//! - **CLI Integration**: `serve` and `process` commands (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resizer_server::{ImageProcessor, OutputFormat, ProcessRequest, ProcessorConfig};
//! use std::num::NonZeroU32;
//!
//! # fn example() -> anyhow::Result<()> {
//! let processor = ImageProcessor::new(ProcessorConfig::default())?;
//! let request = ProcessRequest {
//!     width: NonZeroU32::new(800).unwrap(),
//!     height: NonZeroU32::new(600).unwrap(),
//!     format: OutputFormat::Jpeg,
//!     target_bytes: 50 * 1024,
//!     remove_bg: false,
//! };
//!
//! let input = std::fs::read("photo.png")?;
//! let output = processor.process_bytes(&input, &request)?;
//! std::fs::write("photo.jpg", &output.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Serving
//!
//! ```rust,no_run
//! use resizer_server::{serve, ImageProcessor, ProcessorConfig, ServerConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let processor = ImageProcessor::new(ProcessorConfig::default())?;
//! serve(ServerConfig::default(), processor).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): pure Rust inference backend for background removal
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `webp-support` (default): WebP decoding and lossy WebP encoding
//! - `mock`: synthetic segmentation backend for tests and benchmarks

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod removal;
pub mod server;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::sync::Arc;
use tokio::io::AsyncRead;

#[cfg(any(test, feature = "mock"))]
pub use backends::MockBackend;
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use config::{OutputFormat, ProcessRequest, RequestFields};
pub use encoder::{encode_within_budget, EncodingAttempt, SizeConstrainedEncoder};
pub use error::{ResizerError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelManager, ModelSource, ModelSpec};
pub use processor::{ImageProcessor, ProcessorConfig, ProcessorConfigBuilder};
pub use removal::BackgroundRemover;
pub use server::{router, serve, AppState, ServerConfig, PROCESS_IMAGE_PATH};
pub use types::{ProcessedImage, ProcessingTimings, SegmentationMask};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Process an image read from an async stream
///
/// The stream is read to the end, then the pipeline runs on the blocking
/// thread pool.
///
/// # Examples
///
/// ```rust,no_run
/// use resizer_server::{process_from_reader, ImageProcessor, OutputFormat, ProcessRequest, ProcessorConfig};
/// use std::{num::NonZeroU32, sync::Arc};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let processor = Arc::new(ImageProcessor::new(ProcessorConfig::default())?);
/// let request = ProcessRequest {
///     width: NonZeroU32::new(256).unwrap(),
///     height: NonZeroU32::new(256).unwrap(),
///     format: OutputFormat::WebP,
///     target_bytes: 0,
///     remove_bg: false,
/// };
/// let file = File::open("large_image.jpg").await?;
/// let result = process_from_reader(file, request, processor).await?;
/// # Ok(())
/// # }
/// ```
pub async fn process_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    request: ProcessRequest,
    processor: Arc<ImageProcessor>,
) -> Result<ProcessedImage> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer)
        .await
        .map_err(|e| ResizerError::processing(format!("Failed to read from stream: {}", e)))?;

    tokio::task::spawn_blocking(move || processor.process_bytes(&buffer, &request))
        .await
        .map_err(|e| ResizerError::internal(format!("Processing task failed: {}", e)))?
}
