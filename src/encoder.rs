//! Size-constrained encoding
//!
//! [`SizeConstrainedEncoder::encode_within_budget`] re-encodes an image at falling
//! quality levels until the output fits a byte budget.
//!
//! The search starts at quality 95 and steps down by 5. Quality never drops below 1:
//! the schedule is `95, 90, ..., 5, 1`, so a search makes at most 20 attempts and
//! then fails with [`ResizerError::BudgetUnreachable`]. Lossless formats ignore
//! quality, so they get exactly one attempt.

use crate::{
    config::OutputFormat,
    error::{ResizerError, Result},
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use std::io::Cursor;
use tracing::{debug, instrument, trace};

/// First quality level tried by the budget search
pub const INITIAL_QUALITY: u8 = 95;

/// Quality decrement between attempts
pub const QUALITY_STEP: u8 = 5;

/// Quality floor; the last attempt of every lossy search uses this level
pub const MIN_QUALITY: u8 = 1;

/// Default JPEG quality for unconstrained encodes
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Default WebP quality for unconstrained encodes
pub const DEFAULT_WEBP_QUALITY: u8 = 80;

/// Largest width or height libwebp can encode
pub const WEBP_MAX_DIMENSION: u32 = 16_383;

/// Quality levels visited by the budget search, highest first
pub fn quality_schedule() -> impl Iterator<Item = u8> {
    std::iter::successors(Some(INITIAL_QUALITY), |&quality| {
        (quality > MIN_QUALITY).then(|| quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY))
    })
}

/// One encoded candidate produced during a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingAttempt {
    /// Quality level used, `None` for lossless formats
    pub quality: Option<u8>,
    /// Encoded image bytes
    pub bytes: Vec<u8>,
}

impl EncodingAttempt {
    /// Encoded size in bytes
    #[must_use]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn fits(&self, target_bytes: u64) -> bool {
        self.len() <= target_bytes
    }
}

/// Encoder that trades quality for size to meet a byte budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeConstrainedEncoder {
    jpeg_quality: u8,
    webp_quality: u8,
}

impl Default for SizeConstrainedEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY, DEFAULT_WEBP_QUALITY)
    }
}

impl SizeConstrainedEncoder {
    /// Create an encoder with the qualities used when no budget is given
    #[must_use]
    pub fn new(jpeg_quality: u8, webp_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(MIN_QUALITY, 100),
            webp_quality: webp_quality.clamp(MIN_QUALITY, 100),
        }
    }

    /// Encode `image` as `format`, staying within `target_bytes`
    ///
    /// A budget of 0 means unconstrained: the image is encoded once at the
    /// format's default quality and returned whatever its size.
    ///
    /// # Errors
    /// - `BudgetUnreachable` when the quality floor (or the single lossless
    ///   attempt) still exceeds the budget
    /// - `Image`/`Encode`/`UnsupportedFormat` when the encoder itself fails
    #[instrument(
        skip(self, image),
        fields(
            format = %format,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn encode_within_budget(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        target_bytes: u64,
    ) -> Result<EncodingAttempt> {
        if target_bytes == 0 {
            let attempt = self.encode_default(image, format)?;
            debug!(size_bytes = attempt.len(), "Encoded without size constraint");
            return Ok(attempt);
        }

        if !format.is_lossy() {
            let attempt = EncodingAttempt {
                quality: None,
                bytes: encode_lossless(image, format)?,
            };
            return if attempt.fits(target_bytes) {
                debug!(size_bytes = attempt.len(), "Lossless encoding fits budget");
                Ok(attempt)
            } else {
                Err(ResizerError::BudgetUnreachable {
                    target_bytes,
                    smallest_bytes: attempt.len(),
                })
            };
        }

        let mut smallest_bytes = u64::MAX;
        for (iteration, quality) in quality_schedule().enumerate() {
            let attempt = EncodingAttempt {
                quality: Some(quality),
                bytes: encode_at_quality(image, format, quality)?,
            };
            trace!(
                iteration,
                quality,
                size_bytes = attempt.len(),
                target_bytes,
                "Encoding attempt"
            );

            if attempt.fits(target_bytes) {
                debug!(
                    quality,
                    attempts = iteration + 1,
                    size_bytes = attempt.len(),
                    "Found encoding within budget"
                );
                return Ok(attempt);
            }
            smallest_bytes = smallest_bytes.min(attempt.len());
        }

        debug!(target_bytes, smallest_bytes, "Budget unreachable at minimum quality");
        Err(ResizerError::BudgetUnreachable {
            target_bytes,
            smallest_bytes,
        })
    }

    /// Encode once at the format's default quality
    ///
    /// # Errors
    /// - `Image`/`Encode`/`UnsupportedFormat` when the encoder fails
    pub fn encode_default(&self, image: &DynamicImage, format: OutputFormat) -> Result<EncodingAttempt> {
        let quality = match format {
            OutputFormat::Jpeg => Some(self.jpeg_quality),
            OutputFormat::WebP => Some(self.webp_quality),
            OutputFormat::Png | OutputFormat::Tiff | OutputFormat::Bmp => None,
        };

        let bytes = match quality {
            Some(quality) => encode_at_quality(image, format, quality)?,
            None => encode_lossless(image, format)?,
        };

        Ok(EncodingAttempt { quality, bytes })
    }
}

/// Encode with the default encoder settings, see [`SizeConstrainedEncoder::encode_within_budget`]
///
/// # Errors
/// - `BudgetUnreachable` when no quality level fits the budget
/// - encoder failures
pub fn encode_within_budget(
    image: &DynamicImage,
    format: OutputFormat,
    target_bytes: u64,
) -> Result<EncodingAttempt> {
    SizeConstrainedEncoder::default().encode_within_budget(image, format, target_bytes)
}

/// Encode into a fresh buffer at the given quality
///
/// Lossless formats ignore `quality`.
///
/// # Errors
/// - `Image` when the image crate rejects the pixel data
/// - `Encode` when libwebp fails
/// - `UnsupportedFormat` for WebP when built without `webp-support`
pub fn encode_at_quality(image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
    let quality = quality.clamp(MIN_QUALITY, 100);
    match format {
        OutputFormat::Jpeg => {
            let mut buffer = Vec::new();
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            match image {
                DynamicImage::ImageRgb8(rgb) => encoder.encode_image(rgb)?,
                other => encoder.encode_image(&other.to_rgb8())?,
            }
            Ok(buffer)
        },
        OutputFormat::WebP => encode_webp(image, quality),
        OutputFormat::Png | OutputFormat::Tiff | OutputFormat::Bmp => {
            encode_lossless(image, format)
        },
    }
}

fn encode_lossless(image: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), format.image_format())?;
    Ok(buffer)
}

#[cfg(feature = "webp-support")]
fn encode_webp(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let (width, height) = (image.width(), image.height());
    check_webp_dimensions(width, height)?;

    let encoded = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height)
            .encode_simple(false, f32::from(quality))
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height)
            .encode_simple(false, f32::from(quality))
    };

    let memory = encoded.map_err(|e| {
        ResizerError::encode(format!("libwebp failed on {width}x{height} image: {e:?}"))
    })?;
    if memory.is_empty() {
        return Err(ResizerError::encode(format!(
            "libwebp produced no output for {width}x{height} image"
        )));
    }
    Ok(memory.to_vec())
}

/// Reject frames libwebp cannot represent
///
/// # Errors
/// - `InvalidDimensions` when either side exceeds [`WEBP_MAX_DIMENSION`]
pub fn check_webp_dimensions(width: u32, height: u32) -> Result<()> {
    if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
        return Err(ResizerError::invalid_dimensions(
            u64::from(width),
            u64::from(height),
            format!("WebP output is limited to {WEBP_MAX_DIMENSION} pixels per side"),
        ));
    }
    Ok(())
}

#[cfg(not(feature = "webp-support"))]
fn encode_webp(_image: &DynamicImage, _quality: u8) -> Result<Vec<u8>> {
    Err(ResizerError::unsupported_format(
        "webp (built without webp-support)",
    ))
}
