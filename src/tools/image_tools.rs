use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use ndarray::Array4;

use crate::{domain::face::FaceBBox, Error, Result};

/// Formats the native decoder cannot read and that need an upstream transcode
pub fn is_unsupported_mime(mime_type: Option<&str>) -> bool {
    mime_type
        .map(|m| {
            let m = m.to_lowercase();
            m.contains("heic") || m.contains("heif")
        })
        .unwrap_or(false)
}

pub fn decode_image(buffer: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(buffer)?)
}

pub fn resize_rgb(img: &DynamicImage, width: u32, height: u32) -> RgbImage {
    img.resize_exact(width, height, FilterType::Triangle).to_rgb8()
}

/// Pixels as a `[1, 3, height, width]` tensor normalized with `(v - mean) / std`
pub fn to_nchw_tensor(image: &RgbImage, mean: f32, std: f32) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] = (pixel[channel] as f32 - mean) / std;
        }
    }
    tensor
}

/// Crop clamped to the image bounds, fails when nothing is left
pub fn crop_face(img: &DynamicImage, bbox: &FaceBBox) -> Result<DynamicImage> {
    let (width, height) = img.dimensions();
    let x1 = bbox.x.max(0.0).min(width as f32) as u32;
    let y1 = bbox.y.max(0.0).min(height as f32) as u32;
    let x2 = (bbox.x + bbox.width).max(0.0).min(width as f32) as u32;
    let y2 = (bbox.y + bbox.height).max(0.0).min(height as f32) as u32;
    if x2 <= x1 || y2 <= y1 {
        return Err(Error::Error { message: format!("Empty face crop {:?}", bbox) });
    }
    Ok(img.crop_imm(x1, y1, x2 - x1, y2 - y1))
}

pub fn l2_normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|v| *v /= norm);
    }
}
