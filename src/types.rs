//! Core types produced by the processing pipeline

use crate::{
    config::OutputFormat,
    error::{ResizerError, Result},
};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Foreground mask as 8-bit alpha values, row-major
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255)
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Write the mask into the alpha channel of an RGBA image
    ///
    /// # Errors
    /// - `Processing` when image and mask dimensions differ or the mask data
    ///   does not cover its dimensions
    pub fn apply_to_image(&self, image: &mut RgbaImage) -> Result<()> {
        let (width, height) = self.dimensions;
        if self.data.len() as u64 != u64::from(width) * u64::from(height) {
            return Err(ResizerError::processing(format!(
                "Mask has {} values for {width}x{height}",
                self.data.len()
            )));
        }
        if image.dimensions() != self.dimensions {
            return Err(ResizerError::processing(format!(
                "Image {:?} and mask {:?} dimensions do not match",
                image.dimensions(),
                self.dimensions
            )));
        }

        for (pixel, alpha) in image.pixels_mut().zip(&self.data) {
            pixel[3] = *alpha;
        }
        Ok(())
    }

    /// Fraction of pixels that are mostly foreground
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&value| value > 127).count();
        foreground as f32 / self.data.len() as f32
    }
}

/// Per-stage timings for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image decoding from the upload
    pub decode_ms: u64,

    /// Background removal (preprocess, inference, mask), if requested
    pub background_removal_ms: Option<u64>,

    /// Lanczos resize to the requested frame
    pub resize_ms: u64,

    /// Color conversion and the quality search
    pub encode_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

/// Encoded result of one processing request
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// Encoding used for `bytes`
    pub format: OutputFormat,
    /// Pixel dimensions (width, height)
    pub dimensions: (u32, u32),
    /// Quality chosen by the encoder, `None` for lossless formats
    pub quality: Option<u8>,
    pub timings: ProcessingTimings,
}

impl ProcessedImage {
    /// MIME type for the `Content-Type` header
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Encoded size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
