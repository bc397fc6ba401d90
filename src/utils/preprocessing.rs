//! Image preprocessing for segmentation inference
//!
//! Converts an arbitrary image into the padded, normalized NCHW tensor the
//! segmentation model expects, and describes the letterbox geometry so the
//! model output can be mapped back onto the source image.

use crate::{
    error::{ResizerError, Result},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, DynamicImage, ImageBuffer, Rgb, RgbImage};
use ndarray::Array4;

/// Letterbox padding color
const PADDING_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Placement of the scaled source image inside the model frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Scale factor from source pixels to model pixels
    pub scale: f32,
    /// Scaled image size inside the frame
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// Left/top padding
    pub offset_x: u32,
    pub offset_y: u32,
    /// Model frame size
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Letterbox {
    /// Fit `source` into `frame` preserving the aspect ratio, centered
    ///
    /// # Errors
    /// - `Processing` when either size has a zero side
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn fit(source: (u32, u32), frame: (u32, u32)) -> Result<Self> {
        let (source_width, source_height) = source;
        let (frame_width, frame_height) = frame;
        if source_width == 0 || source_height == 0 || frame_width == 0 || frame_height == 0 {
            return Err(ResizerError::processing(format!(
                "Cannot fit {source_width}x{source_height} into {frame_width}x{frame_height}"
            )));
        }

        let scale = (frame_width as f32 / source_width as f32)
            .min(frame_height as f32 / source_height as f32);

        let scaled_width = ((source_width as f32 * scale).round() as u32).clamp(1, frame_width);
        let scaled_height = ((source_height as f32 * scale).round() as u32).clamp(1, frame_height);

        Ok(Self {
            scale,
            scaled_width,
            scaled_height,
            offset_x: (frame_width - scaled_width) / 2,
            offset_y: (frame_height - scaled_height) / 2,
            frame_width,
            frame_height,
        })
    }

    /// Map a source pixel to the nearest model-frame pixel, if it lies inside the frame
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    #[must_use]
    pub fn source_to_frame(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        let frame_x = ((x as f32 + 0.5) * self.scale).floor() as u32 + self.offset_x;
        let frame_y = ((y as f32 + 0.5) * self.scale).floor() as u32 + self.offset_y;

        (frame_x < self.frame_width && frame_y < self.frame_height).then_some((frame_x, frame_y))
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess image for model inference
    ///
    /// This function handles:
    /// - RGB conversion
    /// - Aspect ratio preserving resize
    /// - Center padding to the model frame
    /// - Normalization to tensor format (NCHW)
    ///
    /// # Errors
    /// - `Processing` for empty images or an empty model frame
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [frame_height, frame_width] = preprocessing_config.target_size;
        let rgb_image = image.to_rgb8();
        let letterbox = Letterbox::fit(rgb_image.dimensions(), (frame_width, frame_height))?;

        let resized = image::imageops::resize(
            &rgb_image,
            letterbox.scaled_width,
            letterbox.scaled_height,
            FilterType::Triangle,
        );

        let mut canvas = ImageBuffer::from_pixel(frame_width, frame_height, PADDING_COLOR);
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        Ok(Self::canvas_to_tensor(&canvas, preprocessing_config))
    }

    /// Convert canvas to normalized tensor
    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        Array4::from_shape_fn(
            (1, 3, height as usize, width as usize),
            |(_, channel, y, x)| {
                #[allow(clippy::cast_possible_truncation)]
                let pixel = canvas.get_pixel(x as u32, y as u32);
                (f32::from(pixel[channel]) / 255.0 - mean[channel]) / std[channel]
            },
        )
    }
}
