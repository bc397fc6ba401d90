//! Error types for image processing requests

use thiserror::Error;

/// Result type alias for resizer operations
pub type Result<T> = std::result::Result<T, ResizerError>;

/// Message returned when a request carries no `image` part
pub const MISSING_IMAGE_MESSAGE: &str = "No image file provided";

/// Error types for the processing pipeline and its HTTP surface
#[derive(Error, Debug)]
pub enum ResizerError {
    /// The request did not include an image file
    #[error("{}", MISSING_IMAGE_MESSAGE)]
    MissingImage,

    /// A required form field was absent
    #[error("Missing required field '{0}'")]
    MissingField(String),

    /// A form field was present but could not be parsed
    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// The multipart body itself was malformed
    #[error("Malformed multipart request: {0}")]
    Multipart(String),

    /// The upload exceeded the configured body limit
    #[error("Uploaded payload exceeds the {limit_bytes} byte limit")]
    PayloadTooLarge { limit_bytes: usize },

    /// Uploaded bytes could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Requested output dimensions are not usable
    #[error("Invalid dimensions {width}x{height}: {reason}")]
    InvalidDimensions {
        width: u64,
        height: u64,
        reason: String,
    },

    /// Unsupported output format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Even the lowest quality encoding does not fit the byte budget
    #[error(
        "Cannot encode within {target_bytes} bytes: smallest encoding was {smallest_bytes} bytes"
    )]
    BudgetUnreachable {
        target_bytes: u64,
        smallest_bytes: u64,
    },

    /// Background removal was requested but no model is loaded
    #[error("Background removal is not available: no segmentation model configured")]
    BackgroundRemovalUnavailable,

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by the image crate while encoding
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Encoder failures outside the image crate
    #[error("Encoding error: {0}")]
    Encode(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure inside a processing stage
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResizerError {
    /// Create a new missing field error
    pub fn missing_field<S: Into<String>>(field: S) -> Self {
        Self::MissingField(field.into())
    }

    /// Create a new invalid field error
    pub fn invalid_field<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new invalid dimensions error
    pub fn invalid_dimensions<S: Into<String>>(width: u64, height: u64, reason: S) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new encoding error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create model error with troubleshooting context
    pub fn model_error_with_context<P: AsRef<std::path::Path>>(
        operation: &str,
        model_path: P,
        error: &str,
        suggestions: &[&str],
    ) -> Self {
        let path_display = model_path.as_ref().display();
        let suggestion_text = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" Suggestions: {}", suggestions.join(", "))
        };

        Self::Model(format!(
            "Failed to {operation} model '{path_display}': {error}.{suggestion_text}"
        ))
    }

    /// Whether the error was caused by the client's input rather than the server
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingImage
                | Self::MissingField(_)
                | Self::InvalidField { .. }
                | Self::Multipart(_)
                | Self::PayloadTooLarge { .. }
                | Self::Decode(_)
                | Self::InvalidDimensions { .. }
                | Self::UnsupportedFormat(_)
                | Self::BudgetUnreachable { .. }
        )
    }
}
