//! Image I/O operations service
//!
//! This module separates decoding and file access from the processing pipeline,
//! so the HTTP handler and the CLI share one decode path.

use crate::error::{ResizerError, Result};
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Service for handling image input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an image from raw bytes
    ///
    /// The format is guessed from the content, never from a filename.
    ///
    /// # Errors
    /// - `Decode` when the bytes are empty, of an unknown format or corrupt
    ///
    /// # Examples
    /// ```rust,no_run
    /// use resizer_server::services::ImageIOService;
    ///
    /// let image_data = std::fs::read("input.jpg")?;
    /// let image = ImageIOService::load_from_bytes(&image_data)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(ResizerError::decode("uploaded file is empty"));
        }

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ResizerError::decode(format!("could not read image header: {e}")))?;

        let Some(format) = reader.format() else {
            return Err(ResizerError::decode("unrecognized image format"));
        };

        log::debug!("Decoding {} byte upload as {:?}", bytes.len(), format);

        reader
            .decode()
            .map_err(|e| ResizerError::decode(format!("{format:?} data is invalid: {e}")))
    }

    /// Read an input file into memory
    ///
    /// # Errors
    /// - `Io` when the file is missing or unreadable
    pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path_ref = path.as_ref();
        std::fs::read(path_ref).map_err(|e| ResizerError::file_io_error("read image file", path_ref, &e))
    }

    /// Write encoded bytes to a file, creating parent directories as needed
    ///
    /// # Errors
    /// - `Io` when the directory or file cannot be written
    pub fn save_bytes<P: AsRef<Path>>(bytes: &[u8], path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ResizerError::file_io_error("create output directory", parent, &e))?;
        }

        std::fs::write(path_ref, bytes)
            .map_err(|e| ResizerError::file_io_error("write output file", path_ref, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])));
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_load_from_bytes() {
        let image = ImageIOService::load_from_bytes(&png_bytes(7, 5)).unwrap();
        assert_eq!((image.width(), image.height()), (7, 5));
    }

    #[test]
    fn test_load_from_garbage_bytes() {
        let result = ImageIOService::load_from_bytes(b"definitely not an image");
        assert!(matches!(result, Err(ResizerError::Decode(_))));

        let result = ImageIOService::load_from_bytes(&[]);
        assert!(matches!(result, Err(ResizerError::Decode(_))));
    }

    #[test]
    fn test_load_truncated_png() {
        let bytes = png_bytes(16, 16);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            ImageIOService::load_from_bytes(truncated),
            Err(ResizerError::Decode(_))
        ));
    }

    #[test]
    fn test_load_nonexistent_file() {
        match ImageIOService::read_bytes("/nonexistent/path/image.jpg") {
            Err(ResizerError::Io(error)) => {
                assert!(error.to_string().contains("/nonexistent/path/image.jpg"));
            },
            other => panic!("expected an IO error, got {other:?}"),
        }
    }

    #[test]
    fn test_save_and_load_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");

        ImageIOService::save_bytes(&png_bytes(3, 4), &path).unwrap();
        let bytes = ImageIOService::read_bytes(&path).unwrap();
        let loaded = ImageIOService::load_from_bytes(&bytes).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (3, 4));
    }
}
