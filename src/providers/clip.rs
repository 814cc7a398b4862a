//! CLIP-style image preprocessing with the `image` crate.

use std::io::ErrorKind;

use ::image::imageops::FilterType;
use ::image::{DynamicImage, ImageError};
use async_trait::async_trait;
use tracing::debug;

use super::{run_blocking, ImagePreprocessor, PixelTensor};
use crate::error::{Component, IndexError, Result};

/// Side length of the square model input.
pub const IMAGE_SIZE: u32 = 224;

const MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Resizes to 224×224 and normalizes each channel with the CLIP mean/std.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClipPreprocessor;

impl ClipPreprocessor {
    pub fn new() -> Self {
        Self
    }
}

fn to_tensor(img: &DynamicImage) -> PixelTensor {
    let side = IMAGE_SIZE as usize;
    let rgb = img
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::CatmullRom)
        .to_rgb8();

    let plane = side * side;
    let mut data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = y as usize * side + x as usize;
        for c in 0..3 {
            data[c * plane + offset] = (f32::from(pixel[c]) / 255.0 - MEAN[c]) / STD[c];
        }
    }

    PixelTensor {
        channels: 3,
        height: side,
        width: side,
        data,
    }
}

fn map_image_error(locator: &str, err: ImageError) -> IndexError {
    match err {
        ImageError::IoError(io) if io.kind() == ErrorKind::NotFound => {
            IndexError::NotFound(locator.to_string())
        }
        other => IndexError::processing(Component::Preprocessor, other),
    }
}

#[async_trait]
impl ImagePreprocessor for ClipPreprocessor {
    async fn preprocess(&self, locator: &str) -> Result<PixelTensor> {
        debug!("Preprocessing image: {}", locator);
        let path = locator.to_string();

        // Decoding and resizing are CPU-bound.
        run_blocking(Component::Preprocessor, move || {
            let img = ::image::open(&path).map_err(|e| map_image_error(&path, e))?;
            Ok(to_tensor(&img))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[tokio::test]
    async fn produces_normalized_chw_tensor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("red.png");
        RgbImage::from_pixel(10, 6, Rgb([255, 0, 0])).save(&path).unwrap();

        let tensor = ClipPreprocessor::new()
            .preprocess(path.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(tensor.shape(), [3, 224, 224]);
        assert_eq!(tensor.data.len(), 3 * 224 * 224);

        let plane = 224 * 224;
        let red = (1.0 - MEAN[0]) / STD[0];
        let green = (0.0 - MEAN[1]) / STD[1];
        assert!((tensor.data[0] - red).abs() < 1e-4);
        assert!((tensor.data[plane + 100] - green).abs() < 1e-4);
    }

    #[tokio::test]
    async fn missing_image_is_not_found() {
        let err = ClipPreprocessor::new()
            .preprocess("/no/such/image.png")
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
    }

    #[tokio::test]
    async fn undecodable_file_is_a_preprocessor_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let err = ClipPreprocessor::new()
            .preprocess(path.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.component(), Component::Preprocessor);
    }
}
