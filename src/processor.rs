//! Request processing pipeline
//!
//! [`ImageProcessor`] owns everything a request needs that outlives it: the
//! encoder defaults, the dimension limit and, when a model is configured, the
//! shared background remover. It is used by both the HTTP server and the
//! `process` CLI command so the two behave identically.
//!
//! Pipeline order: decode, remove background (optional), resize, color
//! conversion, size-constrained encode.

use crate::{
    config::{OutputFormat, ProcessRequest},
    encoder::{
        check_webp_dimensions, SizeConstrainedEncoder, DEFAULT_JPEG_QUALITY, DEFAULT_WEBP_QUALITY,
    },
    error::{ResizerError, Result},
    inference::InferenceBackend,
    models::ModelSpec,
    removal::BackgroundRemover,
    services::{ImageIOService, OutputFormatHandler, ResizeService, DEFAULT_MAX_DIMENSION},
    types::{ProcessedImage, ProcessingTimings},
};
use image::DynamicImage;
use instant::Instant;
use log::debug;
use tracing::{info as trace_info, instrument, span, Level};

/// Processor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    /// JPEG quality used when no size budget is given (1-100)
    pub jpeg_quality: u8,
    /// WebP quality used when no size budget is given (1-100)
    pub webp_quality: u8,
    /// Largest accepted output width or height
    pub max_dimension: u32,
    /// Segmentation model for background removal, if any
    pub model_spec: Option<ModelSpec>,
}

impl ProcessorConfig {
    /// Create a new processor configuration builder
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            webp_quality: DEFAULT_WEBP_QUALITY,
            max_dimension: DEFAULT_MAX_DIMENSION,
            model_spec: None,
        }
    }
}

/// Builder for `ProcessorConfig`
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    #[must_use]
    pub fn webp_quality(mut self, quality: u8) -> Self {
        self.config.webp_quality = quality;
        self
    }

    #[must_use]
    pub fn max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.max_dimension = max_dimension;
        self
    }

    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = Some(model_spec);
        self
    }

    /// Build the processor configuration
    ///
    /// # Errors
    /// - `InvalidConfig` for qualities outside 1-100 or a zero dimension limit
    pub fn build(self) -> Result<ProcessorConfig> {
        for (format, quality) in [
            (OutputFormat::Jpeg, self.config.jpeg_quality),
            (OutputFormat::WebP, self.config.webp_quality),
        ] {
            if let Some((min, max)) = OutputFormatHandler::get_quality_range(format) {
                if !(min..=max).contains(&quality) {
                    return Err(ResizerError::invalid_config(format!(
                        "{format} quality must be {min}-{max}, got {quality}"
                    )));
                }
            }
        }
        if self.config.max_dimension == 0 {
            return Err(ResizerError::invalid_config(
                "Maximum dimension must be positive",
            ));
        }

        Ok(self.config)
    }
}

/// Runs the processing pipeline; cheap to share behind an `Arc`
#[derive(Debug)]
pub struct ImageProcessor {
    config: ProcessorConfig,
    encoder: SizeConstrainedEncoder,
    remover: Option<BackgroundRemover>,
}

impl ImageProcessor {
    /// Create a processor, loading the configured model if there is one
    ///
    /// # Errors
    /// - Model resolution or loading failures
    /// - `InvalidConfig` when a model is configured but no backend is compiled in
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        let remover = match config.model_spec {
            Some(ref spec) => Some(Self::load_remover(spec)?),
            None => None,
        };
        Ok(Self::with_remover(config, remover))
    }

    /// Create a processor that removes backgrounds with `backend`
    ///
    /// The configured model spec is ignored.
    ///
    /// # Errors
    /// - Backend initialization failures
    pub fn with_backend<B: InferenceBackend + 'static>(
        config: ProcessorConfig,
        backend: B,
    ) -> Result<Self> {
        let remover = BackgroundRemover::new(backend)?;
        Ok(Self::with_remover(config, Some(remover)))
    }

    /// Create a processor from parts
    #[must_use]
    pub fn with_remover(config: ProcessorConfig, remover: Option<BackgroundRemover>) -> Self {
        let encoder = SizeConstrainedEncoder::new(config.jpeg_quality, config.webp_quality);
        Self {
            config,
            encoder,
            remover,
        }
    }

    #[cfg(feature = "tract")]
    fn load_remover(spec: &ModelSpec) -> Result<BackgroundRemover> {
        use crate::{backends::TractBackend, models::ModelManager};

        log::info!("Loading segmentation model {}", spec.source.display_name());
        let manager = ModelManager::from_spec(spec)?;
        BackgroundRemover::new(TractBackend::with_model_manager(manager))
    }

    #[cfg(not(feature = "tract"))]
    fn load_remover(spec: &ModelSpec) -> Result<BackgroundRemover> {
        Err(ResizerError::invalid_config(format!(
            "Model {} configured but no inference backend is enabled (build with the `tract` feature)",
            spec.source.display_name()
        )))
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Whether `remove_bg` requests can be served
    #[must_use]
    pub fn supports_background_removal(&self) -> bool {
        self.remover.is_some()
    }

    /// Decode `image_bytes` and run the pipeline
    ///
    /// # Errors
    /// - `InvalidDimensions` when the requested size exceeds the limit
    /// - `BackgroundRemovalUnavailable` when removal is requested without a model
    /// - `Decode` for unreadable uploads
    /// - `BudgetUnreachable` when no quality level fits `target_bytes`
    /// - inference and encoder failures
    #[instrument(
        skip(self, image_bytes, request),
        fields(
            input_bytes = image_bytes.len(),
            format = %request.format,
            target_bytes = request.target_bytes,
            remove_bg = request.remove_bg
        )
    )]
    pub fn process_bytes(&self, image_bytes: &[u8], request: &ProcessRequest) -> Result<ProcessedImage> {
        self.check_request(request)?;

        let total_start = Instant::now();
        let decode_start = Instant::now();
        let image = {
            let _span = span!(Level::DEBUG, "decode").entered();
            ImageIOService::load_from_bytes(image_bytes)?
        };
        let decode_ms = elapsed_ms(decode_start);

        let mut processed = self.run_pipeline(image, request)?;
        processed.timings.decode_ms = decode_ms;
        processed.timings.total_ms = elapsed_ms(total_start);

        trace_info!(
            output_bytes = processed.len(),
            quality = ?processed.quality,
            total_ms = processed.timings.total_ms,
            "Image processed"
        );
        Ok(processed)
    }

    /// Run the pipeline on an already decoded image
    ///
    /// # Errors
    /// Same as [`ImageProcessor::process_bytes`] minus decoding.
    pub fn process_image(&self, image: DynamicImage, request: &ProcessRequest) -> Result<ProcessedImage> {
        self.check_request(request)?;

        let total_start = Instant::now();
        let mut processed = self.run_pipeline(image, request)?;
        processed.timings.total_ms = elapsed_ms(total_start);
        Ok(processed)
    }

    /// Reject requests that would fail after the expensive stages
    fn check_request(&self, request: &ProcessRequest) -> Result<()> {
        let (width, height) = request.dimensions();
        ResizeService::validate_dimensions(width, height, self.config.max_dimension)?;
        if request.format == OutputFormat::WebP {
            check_webp_dimensions(width, height)?;
        }

        if request.remove_bg && self.remover.is_none() {
            return Err(ResizerError::BackgroundRemovalUnavailable);
        }
        Ok(())
    }

    fn run_pipeline(&self, image: DynamicImage, request: &ProcessRequest) -> Result<ProcessedImage> {
        let mut timings = ProcessingTimings::default();
        let (width, height) = request.dimensions();
        debug!(
            "Processing {}x{} image into {}x{} {}",
            image.width(),
            image.height(),
            width,
            height,
            request.format
        );

        let image = if request.remove_bg {
            let remover = self
                .remover
                .as_ref()
                .ok_or(ResizerError::BackgroundRemovalUnavailable)?;
            OutputFormatHandler::validate_for_background_removal(request.format);

            let _span = span!(Level::DEBUG, "remove_background").entered();
            let start = Instant::now();
            let without_background = remover.remove_background(&image)?;
            timings.background_removal_ms = Some(elapsed_ms(start));
            without_background
        } else {
            image
        };

        let resized = {
            let _span = span!(Level::DEBUG, "resize", width, height).entered();
            let start = Instant::now();
            let resized = ResizeService::resize(&image, width, height, self.config.max_dimension)?;
            timings.resize_ms = elapsed_ms(start);
            resized
        };
        drop(image);

        let encode_start = Instant::now();
        let converted = OutputFormatHandler::convert_for_format(resized, request.format);
        let attempt = self
            .encoder
            .encode_within_budget(&converted, request.format, request.target_bytes)?;
        timings.encode_ms = elapsed_ms(encode_start);

        Ok(ProcessedImage {
            bytes: attempt.bytes,
            format: request.format,
            dimensions: (converted.width(), converted.height()),
            quality: attempt.quality,
            timings,
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockBackend;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::{io::Cursor, num::NonZeroU32};

    fn request(width: u32, height: u32, format: OutputFormat) -> ProcessRequest {
        ProcessRequest {
            width: NonZeroU32::new(width).unwrap(),
            height: NonZeroU32::new(height).unwrap(),
            format,
            target_bytes: 0,
            remove_bg: false,
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_processor_config_builder_chain() {
        let config = ProcessorConfigBuilder::new()
            .jpeg_quality(90)
            .webp_quality(70)
            .max_dimension(2048)
            .build()
            .unwrap();

        assert_eq!(config.jpeg_quality, 90);
        assert_eq!(config.webp_quality, 70);
        assert_eq!(config.max_dimension, 2048);
        assert!(config.model_spec.is_none());
    }

    #[test]
    fn test_processor_config_validation() {
        assert!(ProcessorConfig::builder().jpeg_quality(0).build().is_err());
        assert!(ProcessorConfig::builder().webp_quality(101).build().is_err());
        assert!(ProcessorConfig::builder().max_dimension(0).build().is_err());
        assert_eq!(
            ProcessorConfig::builder().build().unwrap(),
            ProcessorConfig::default()
        );
    }

    #[test]
    fn test_resize_and_encode_jpeg() {
        let processor = ImageProcessor::new(ProcessorConfig::default()).unwrap();
        let result = processor
            .process_bytes(&png_bytes(120, 90), &request(60, 40, OutputFormat::Jpeg))
            .unwrap();

        assert_eq!(result.dimensions, (60, 40));
        assert_eq!(result.quality, Some(DEFAULT_JPEG_QUALITY));
        assert_eq!(result.mime_type(), "image/jpeg");

        let decoded = image::load_from_memory(&result.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (60, 40));
    }

    #[test]
    fn test_remove_bg_without_model_is_unavailable() {
        let processor = ImageProcessor::new(ProcessorConfig::default()).unwrap();
        let mut req = request(10, 10, OutputFormat::Png);
        req.remove_bg = true;

        assert!(!processor.supports_background_removal());
        assert!(matches!(
            processor.process_bytes(&png_bytes(10, 10), &req),
            Err(ResizerError::BackgroundRemovalUnavailable)
        ));
    }

    #[test]
    fn test_remove_bg_with_backend_produces_alpha() {
        let processor =
            ImageProcessor::with_backend(ProcessorConfig::default(), MockBackend::with_size(64))
                .unwrap();
        let mut req = request(50, 50, OutputFormat::Png);
        req.remove_bg = true;

        let result = processor.process_bytes(&png_bytes(100, 100), &req).unwrap();
        assert!(result.timings.background_removal_ms.is_some());

        let decoded = image::load_from_memory(&result.bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (50, 50));
        assert_eq!(decoded.get_pixel(25, 25)[3], 255);
        assert!(decoded.pixels().any(|pixel| pixel[3] < 255));
    }

    #[test]
    fn test_dimension_limit() {
        let config = ProcessorConfig::builder().max_dimension(100).build().unwrap();
        let processor = ImageProcessor::new(config).unwrap();

        assert!(matches!(
            processor.process_bytes(&png_bytes(10, 10), &request(101, 10, OutputFormat::Png)),
            Err(ResizerError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_garbage_input_is_decode_error() {
        let processor = ImageProcessor::new(ProcessorConfig::default()).unwrap();
        assert!(matches!(
            processor.process_bytes(b"definitely not an image", &request(10, 10, OutputFormat::Png)),
            Err(ResizerError::Decode(_))
        ));
    }

    #[test]
    fn test_budget_is_respected() {
        let processor = ImageProcessor::new(ProcessorConfig::default()).unwrap();
        let mut req = request(200, 200, OutputFormat::Jpeg);
        req.target_bytes = 8 * 1024;

        let result = processor.process_bytes(&png_bytes(300, 300), &req).unwrap();
        assert!(result.len() as u64 <= req.target_bytes);
        assert!(result.quality.is_some());
    }

    #[test]
    fn test_webp_frame_limit_checked_before_decoding() {
        let config = ProcessorConfig::builder().max_dimension(20_000).build().unwrap();
        let processor = ImageProcessor::new(config).unwrap();

        assert!(matches!(
            processor.process_bytes(b"not decoded", &request(16_384, 10, OutputFormat::WebP)),
            Err(ResizerError::InvalidDimensions { width: 16_384, .. })
        ));
        assert!(matches!(
            processor.process_bytes(b"not decoded", &request(16_384, 10, OutputFormat::Png)),
            Err(ResizerError::Decode(_))
        ));
    }
}
