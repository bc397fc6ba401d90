//! Output format handling service
//!
//! This module keeps per-format decisions (color mode, transparency, quality range)
//! out of the processing pipeline.

use crate::config::OutputFormat;
use image::DynamicImage;

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert an image into a color mode the target format can store
    ///
    /// Formats without transparency get a three-channel RGB image. PNG keeps the
    /// decoded color type; the remaining encoders only accept 8-bit RGB or RGBA.
    ///
    /// # Examples
    /// ```rust
    /// use resizer_server::{config::OutputFormat, services::OutputFormatHandler};
    /// use image::{DynamicImage, RgbaImage};
    ///
    /// let rgba = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
    /// let converted = OutputFormatHandler::convert_for_format(rgba, OutputFormat::Jpeg);
    /// assert!(matches!(converted, DynamicImage::ImageRgb8(_)));
    /// ```
    #[must_use]
    pub fn convert_for_format(image: DynamicImage, format: OutputFormat) -> DynamicImage {
        match format {
            OutputFormat::Png => image,
            OutputFormat::Jpeg => match image {
                DynamicImage::ImageRgb8(_) => image,
                other => DynamicImage::ImageRgb8(other.to_rgb8()),
            },
            OutputFormat::WebP | OutputFormat::Tiff | OutputFormat::Bmp => match image {
                DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
                other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
                other => DynamicImage::ImageRgb8(other.to_rgb8()),
            },
        }
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png | OutputFormat::WebP | OutputFormat::Tiff | OutputFormat::Bmp => true,
            OutputFormat::Jpeg => false,
        }
    }

    /// Warn when background removal output is headed for an opaque format
    pub fn validate_for_background_removal(format: OutputFormat) {
        if !Self::supports_transparency(format) {
            log::warn!(
                "Output format {:?} does not support transparency. Background removal results will be flattened.",
                format
            );
        }
    }

    /// Get the quality range for a format
    ///
    /// Returns `(min, max)` for formats whose encoder honours a quality level and
    /// `None` for lossless formats.
    #[must_use]
    pub fn get_quality_range(format: OutputFormat) -> Option<(u8, u8)> {
        match format {
            OutputFormat::Jpeg | OutputFormat::WebP => Some((1, 100)),
            OutputFormat::Png | OutputFormat::Tiff | OutputFormat::Bmp => None,
        }
    }
}
