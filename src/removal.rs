//! Background removal with a segmentation model
//!
//! The remover owns a shared, initialized [`InferenceBackend`]. Each call
//! letterboxes the image into the model frame, runs inference, maps the mask
//! back onto the source pixels and writes it into the alpha channel.

use crate::{
    error::{ResizerError, Result},
    inference::InferenceBackend,
    types::SegmentationMask,
    utils::{ImagePreprocessor, Letterbox},
};
use image::{DynamicImage, GenericImageView};
use instant::Instant;
use ndarray::Array4;
use std::sync::Arc;
use tracing::{debug, instrument, span, Level};

/// Removes image backgrounds using a shared segmentation backend
#[derive(Clone)]
pub struct BackgroundRemover {
    backend: Arc<dyn InferenceBackend>,
}

impl std::fmt::Debug for BackgroundRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemover")
            .field("input_shape", &self.backend.input_shape())
            .finish_non_exhaustive()
    }
}

impl BackgroundRemover {
    /// Initialize `backend` and wrap it for sharing across requests
    ///
    /// # Errors
    /// - Model loading failures from the backend
    pub fn new<B: InferenceBackend + 'static>(mut backend: B) -> Result<Self> {
        if let Some(load_time) = backend.initialize()? {
            log::info!("Segmentation model loaded in {}ms", load_time.as_millis());
        }
        Ok(Self {
            backend: Arc::new(backend),
        })
    }

    /// Remove the background, returning an RGBA image of the same dimensions
    ///
    /// # Errors
    /// - `Processing` for images the preprocessor cannot handle
    /// - `Inference` when the backend fails or returns an unexpected tensor
    #[instrument(
        skip(self, image),
        fields(dimensions = %format!("{}x{}", image.width(), image.height()))
    )]
    pub fn remove_background(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let mask = self.segment(image)?;

        let mut rgba = image.to_rgba8();
        mask.apply_to_image(&mut rgba)?;

        debug!(
            foreground_ratio = mask.foreground_ratio(),
            "Applied segmentation mask"
        );
        Ok(DynamicImage::ImageRgba8(rgba))
    }

    /// Compute the foreground mask for `image` without applying it
    ///
    /// # Errors
    /// - `Processing` for images the preprocessor cannot handle
    /// - `Inference` when the backend fails or returns an unexpected tensor
    pub fn segment(&self, image: &DynamicImage) -> Result<SegmentationMask> {
        let preprocessing_config = self.backend.get_preprocessing_config()?;

        let input_tensor = {
            let _span = span!(Level::DEBUG, "preprocess").entered();
            let start = Instant::now();
            let tensor = ImagePreprocessor::preprocess_for_inference(image, &preprocessing_config)?;
            debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Preprocessed image");
            tensor
        };

        let output_tensor = {
            let _span = span!(Level::DEBUG, "inference").entered();
            let start = Instant::now();
            let tensor = self.backend.infer(&input_tensor)?;
            debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Inference finished");
            tensor
        };

        let _span = span!(Level::DEBUG, "postprocess").entered();
        tensor_to_mask(&output_tensor, image.dimensions())
    }
}

/// Map a 1x1xHxW model output back onto an image of `original_dimensions`
///
/// The output is assumed to use the same letterbox placement as the
/// preprocessing step. Values are clamped to 0..1 and scaled to 0..255;
/// pixels that fall outside the frame are treated as background.
///
/// # Errors
/// - `Inference` when the tensor is not shaped 1x1xHxW
pub fn tensor_to_mask(
    tensor: &Array4<f32>,
    original_dimensions: (u32, u32),
) -> Result<SegmentationMask> {
    let (batch, channels, height, width) = tensor.dim();
    if batch != 1 || channels != 1 || height == 0 || width == 0 {
        return Err(ResizerError::inference(format!(
            "Invalid output tensor shape {:?}, expected [1, 1, H, W]",
            tensor.shape()
        )));
    }

    let frame = (
        u32::try_from(width).map_err(|_| ResizerError::inference("Output tensor too wide"))?,
        u32::try_from(height).map_err(|_| ResizerError::inference("Output tensor too tall"))?,
    );
    let letterbox = Letterbox::fit(original_dimensions, frame)?;

    let (orig_width, orig_height) = original_dimensions;
    let mut mask_data = Vec::with_capacity(orig_width as usize * orig_height as usize);

    for y in 0..orig_height {
        for x in 0..orig_width {
            let value = letterbox
                .source_to_frame(x, y)
                .and_then(|(tx, ty)| tensor.get([0, 0, ty as usize, tx as usize]).copied())
                .unwrap_or(0.0);

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            mask_data.push((value.clamp(0.0, 1.0) * 255.0).round() as u8);
        }
    }

    Ok(SegmentationMask::new(mask_data, original_dimensions))
}
