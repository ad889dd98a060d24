//! Image decoding and tensor preparation.
//!
//! Steps, in order:
//! 1. Decode the upload and force it to 8-bit RGB
//! 2. Resize to exactly `input_size` x `input_size` (Catmull-Rom bicubic)
//! 3. Convert to f32 and divide every channel by 255.0
//! 4. Lay out as HWC and prepend a batch axis of one

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::{Array3, Array4, Axis};

use crate::error::PredictError;

/// Resampling filter the network's training pipeline used (PIL bicubic).
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

pub const RESCALE_DIVISOR: f32 = 255.0;

/// Decode arbitrary image bytes into an RGB pixel grid.
///
/// Grayscale, alpha and palette sources are all converted to three channels.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, PredictError> {
    if bytes.is_empty() {
        return Err(PredictError::Decode("uploaded file is empty".to_string()));
    }

    let image = image::load_from_memory(bytes)
        .map_err(|e| PredictError::Decode(format!("cannot identify image file: {}", e)))?;

    Ok(image.to_rgb8())
}

/// Fixed-shape (H, W, 3) array of values in [0.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array3<f32>);

impl NormalizedTensor {
    pub fn view(&self) -> &Array3<f32> {
        &self.0
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    /// Prepend the batch axis: (1, H, W, 3).
    pub fn into_batch(self) -> Array4<f32> {
        self.0.insert_axis(Axis(0))
    }
}

pub fn preprocess(image: &RgbImage, input_size: u32) -> Result<NormalizedTensor, PredictError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PredictError::Preprocess(format!(
            "image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }

    let resized = image::imageops::resize(image, input_size, input_size, RESIZE_FILTER);

    let side = input_size as usize;
    let values: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / RESCALE_DIVISOR)
        .collect();

    let array = Array3::from_shape_vec((side, side, 3), values)
        .map_err(|e| PredictError::Preprocess(format!("unexpected image layout: {}", e)))?;

    Ok(NormalizedTensor(array))
}
