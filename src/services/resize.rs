//! Resize service

use crate::error::{ResizerError, Result};
use image::{imageops::FilterType, DynamicImage};

/// Largest width or height accepted when no limit is configured
pub const DEFAULT_MAX_DIMENSION: u32 = 10_000;

/// Service for resizing images to exact output dimensions
pub struct ResizeService;

impl ResizeService {
    /// Resize to exactly `width` x `height` with Lanczos3 resampling
    ///
    /// The aspect ratio is not preserved; callers ask for the frame they want.
    ///
    /// # Errors
    /// - `InvalidDimensions` when either side is 0 or above `max_dimension`
    pub fn resize(
        image: &DynamicImage,
        width: u32,
        height: u32,
        max_dimension: u32,
    ) -> Result<DynamicImage> {
        Self::validate_dimensions(width, height, max_dimension)?;

        if image.width() == width && image.height() == height {
            log::debug!("Image already {}x{}, skipping resize", width, height);
            return Ok(image.clone());
        }

        Ok(image.resize_exact(width, height, FilterType::Lanczos3))
    }

    /// Check requested output dimensions against the configured limit
    ///
    /// # Errors
    /// - `InvalidDimensions` when either side is 0 or above `max_dimension`
    pub fn validate_dimensions(width: u32, height: u32, max_dimension: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(ResizerError::invalid_dimensions(
                u64::from(width),
                u64::from(height),
                "width and height must be positive",
            ));
        }
        if width > max_dimension || height > max_dimension {
            return Err(ResizerError::invalid_dimensions(
                u64::from(width),
                u64::from(height),
                format!("maximum supported dimension is {max_dimension}"),
            ));
        }
        Ok(())
    }
}
