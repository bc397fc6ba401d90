//! Backend implementations for segmentation inference
//!
//! - Tract backend (pure Rust, loads ONNX models from disk)
//! - Mock backend (synthetic circular mask, no model file; `mock` feature)

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(feature = "tract")]
pub mod tract;

#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;
