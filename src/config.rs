//! Configuration types for image processing requests
//!
//! Form values arrive as strings; [`ProcessRequest::from_fields`] turns them into a
//! validated request with one error per offending field.

use crate::error::{ResizerError, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::Path;
use std::str::FromStr;

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    Png,
    /// JPEG (no transparency, RGB output)
    Jpeg,
    /// WebP with alpha channel transparency, lossy when a quality is given
    WebP,
    /// TIFF with alpha channel transparency and lossless compression
    Tiff,
    /// Windows bitmap
    Bmp,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl OutputFormat {
    /// All formats this service can emit
    pub const ALL: [OutputFormat; 5] = [
        Self::Png,
        Self::Jpeg,
        Self::WebP,
        Self::Tiff,
        Self::Bmp,
    ];

    /// MIME type sent in the `Content-Type` header
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Tiff => "image/tiff",
            Self::Bmp => "image/bmp",
        }
    }

    /// Matching `image` crate format
    #[must_use]
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::WebP => image::ImageFormat::WebP,
            Self::Tiff => image::ImageFormat::Tiff,
            Self::Bmp => image::ImageFormat::Bmp,
        }
    }

    /// Whether the encoder honours a quality level
    #[must_use]
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg | Self::WebP)
    }

    /// Infer the format from a file extension
    ///
    /// # Errors
    /// - Path has no extension
    /// - Extension is not a supported output format
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ResizerError::unsupported_format(format!(
                    "cannot infer output format from '{}'",
                    path.display()
                ))
            })?;
        extension.parse()
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::WebP => write!(f, "webp"),
            Self::Tiff => write!(f, "tiff"),
            Self::Bmp => write!(f, "bmp"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ResizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::WebP),
            "tiff" | "tif" => Ok(Self::Tiff),
            "bmp" => Ok(Self::Bmp),
            other => Err(ResizerError::unsupported_format(other)),
        }
    }
}

/// Raw, unvalidated form values for a processing request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFields {
    pub width: Option<String>,
    pub height: Option<String>,
    pub format: Option<String>,
    pub size_kb: Option<String>,
    pub remove_bg: Option<String>,
}

impl RequestFields {
    /// Store a named text field, ignoring names the endpoint does not know
    pub fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "width" => &mut self.width,
            "height" => &mut self.height,
            "format" => &mut self.format,
            "size_kb" => &mut self.size_kb,
            "remove_bg" => &mut self.remove_bg,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

/// Validated parameters for one processing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    /// Output width in pixels
    pub width: NonZeroU32,
    /// Output height in pixels
    pub height: NonZeroU32,
    /// Output encoding
    pub format: OutputFormat,
    /// Maximum encoded size in bytes (0 = unconstrained)
    pub target_bytes: u64,
    /// Run background removal before resizing
    pub remove_bg: bool,
}

impl ProcessRequest {
    /// Build a request from raw form fields
    ///
    /// # Errors
    /// - `MissingField` when width, height or format is absent
    /// - `InvalidField` when width or height is not an integer
    /// - `InvalidDimensions` when width or height is not positive
    /// - `UnsupportedFormat` for unknown formats
    pub fn from_fields(fields: &RequestFields) -> Result<Self> {
        let width = fields.width.as_deref();
        let height = fields.height.as_deref();
        let raw_width = parse_dimension("width", width)?;
        let raw_height = parse_dimension("height", height)?;
        let (width, height) = validate_dimensions(raw_width, raw_height)?;

        let format = fields
            .format
            .as_deref()
            .ok_or_else(|| ResizerError::missing_field("format"))?
            .parse()?;

        Ok(Self {
            width,
            height,
            format,
            target_bytes: parse_target_bytes(fields.size_kb.as_deref()),
            remove_bg: parse_flag(fields.remove_bg.as_deref()),
        })
    }

    /// Output dimensions as a `(width, height)` tuple
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width.get(), self.height.get())
    }
}

fn parse_dimension(field: &str, value: Option<&str>) -> Result<i64> {
    let value = value.ok_or_else(|| ResizerError::missing_field(field))?;
    value
        .trim()
        .parse::<i64>()
        .map_err(|e| ResizerError::invalid_field(field, format!("'{value}' is not an integer ({e})")))
}

fn validate_dimensions(width: i64, height: i64) -> Result<(NonZeroU32, NonZeroU32)> {
    let to_dimension = |value: i64| {
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
    };

    match (to_dimension(width), to_dimension(height)) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(ResizerError::invalid_dimensions(
            width.max(0).unsigned_abs(),
            height.max(0).unsigned_abs(),
            format!("width and height must be between 1 and {}", u32::MAX),
        )),
    }
}

/// Convert the optional `size_kb` field into a byte budget
///
/// Absent, empty, unparsable and non-positive values all mean "unconstrained".
#[must_use]
pub fn parse_target_bytes(size_kb: Option<&str>) -> u64 {
    let Some(raw) = size_kb.map(str::trim).filter(|s| !s.is_empty()) else {
        return 0;
    };

    match raw.parse::<i64>() {
        Ok(kb) if kb > 0 => u64::try_from(kb).map_or(0, |kb| kb.saturating_mul(1024)),
        Ok(_) => 0,
        Err(e) => {
            tracing::warn!(size_kb = raw, error = %e, "Ignoring invalid size_kb, output is unconstrained");
            0
        },
    }
}

/// Only the exact string `true` enables a flag, mirroring the form contract
#[must_use]
pub fn parse_flag(value: Option<&str>) -> bool {
    value == Some("true")
}
