//! Image and trait preprocessing
//!
//! Must match the training transforms exactly: resize to 224x224, scale to
//! [0, 1], normalize per channel with the ImageNet mean/std, NCHW layout.

use image::{imageops::FilterType, DynamicImage, ImageError, ImageReader, Limits};
use ndarray::{Array2, Array4};
use std::io::Cursor;

use super::ModelInput;
use crate::models::TraitScores;

/// Square input resolution expected by the model
pub const IMAGE_SIZE: u32 = 224;

/// Per-channel mean (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Largest accepted upload width or height, in pixels
///
/// The explanation overlay is rendered at the original resolution, so this
/// bounds per-request memory independently of the compressed upload size.
pub const MAX_IMAGE_DIMENSION: u32 = 4096;

/// Decode raw upload bytes into an image (format sniffed from content)
///
/// Images wider or taller than [`MAX_IMAGE_DIMENSION`] fail with
/// `ImageError::Limits` before any pixel data is allocated.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);

    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.limits(limits);
    reader.decode()
}

/// Build the `[1, 3, IMAGE_SIZE, IMAGE_SIZE]` normalized tensor
pub fn image_tensor(image: &DynamicImage) -> Array4<f32> {
    let size = IMAGE_SIZE as usize;
    let resized = image.resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    tensor
}

/// Build the `[1, 4]` trait tensor
pub fn trait_tensor(traits: &TraitScores) -> Array2<f32> {
    let values = traits.as_array();
    Array2::from_shape_fn((1, 4), |(_, i)| values[i] as f32)
}

/// Full model input for one request
pub fn model_input(image: &DynamicImage, traits: &TraitScores) -> ModelInput {
    ModelInput {
        image: image_tensor(image),
        traits: trait_tensor(traits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_image(b"definitely not an image").is_err());
    }

    #[test]
    fn test_decode_rejects_oversized_dimensions() {
        let wide = solid_png(MAX_IMAGE_DIMENSION + 1, 2, [10, 20, 30]);
        assert!(matches!(decode_image(&wide), Err(ImageError::Limits(_))));

        let tall = solid_png(2, MAX_IMAGE_DIMENSION + 1, [10, 20, 30]);
        assert!(matches!(decode_image(&tall), Err(ImageError::Limits(_))));
    }

    #[test]
    fn test_decode_accepts_limit_edge() {
        let edge = solid_png(MAX_IMAGE_DIMENSION, 1, [10, 20, 30]);
        let image = decode_image(&edge).unwrap();
        assert_eq!(image.width(), MAX_IMAGE_DIMENSION);
    }

    #[test]
    fn test_tensor_shape_and_normalization() {
        let bytes = solid_png(50, 30, [255, 0, 128]);
        let image = decode_image(&bytes).unwrap();
        let tensor = image_tensor(&image);

        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);

        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        let blue = (128.0 / 255.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];
        assert!((tensor[[0, 0, 100, 100]] - red).abs() < 0.02);
        assert!((tensor[[0, 1, 0, 223]] - green).abs() < 0.02);
        assert!((tensor[[0, 2, 223, 0]] - blue).abs() < 0.02);
    }

    #[test]
    fn test_trait_tensor_order() {
        let traits = TraitScores::new(3.5, 4.0, 3.8, 4.2);
        let tensor = trait_tensor(&traits);
        assert_eq!(tensor.shape(), &[1, 4]);
        assert_eq!(tensor[[0, 0]], 3.5);
        assert_eq!(tensor[[0, 1]], 4.0);
        assert!((tensor[[0, 2]] - 3.8).abs() < 1e-6);
        assert!((tensor[[0, 3]] - 4.2).abs() < 1e-6);
    }
}
