//! Service layer for the processing pipeline
//!
//! This module contains services that keep decoding, resizing and per-format
//! decisions out of the request orchestration.

pub mod format;
pub mod io;
pub mod resize;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use resize::{ResizeService, DEFAULT_MAX_DIMENSION};
