//! Explanation overlay rendering
//!
//! Turns a class activation map into a heatmap over the uploaded image:
//! ReLU, min-max normalize, scale to 0-255, resize to the original image,
//! JET colormap, then alpha-blend over the original pixels. The result is
//! PNG-encoded and transported as base64.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{
    imageops::{self, FilterType},
    DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage,
};
use ndarray::{Array2, ArrayView2};
use std::io::Cursor;
use thiserror::Error;

/// Heatmap weight in the blend; the original image gets `1 - OVERLAY_ALPHA`
pub const OVERLAY_ALPHA: f32 = 0.4;

#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("activation map is empty")]
    EmptyActivation,

    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] image::ImageError),
}

/// Clamp negatives to zero and rescale into [0, 1]
///
/// A map with no positive response stays all-zero.
pub fn normalize_activation(activation: ArrayView2<f32>) -> Array2<f32> {
    let mut map = activation.mapv(|v| if v.is_finite() { v.max(0.0) } else { 0.0 });

    let min = map.iter().copied().fold(f32::INFINITY, f32::min);
    map.mapv_inplace(|v| v - min);

    let max = map.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        map.mapv_inplace(|v| v / max);
    }
    map
}

/// JET colormap (blue -> cyan -> yellow -> red) for `t` in [0, 1]
pub fn jet_color(t: f32) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let channel = |offset: f32| -> u8 {
        let v = (1.5 - (4.0 * t - offset).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Blend the colored activation map over `original`
pub fn render_overlay(
    original: &RgbImage,
    activation: ArrayView2<f32>,
) -> Result<RgbImage, ExplainError> {
    let (rows, cols) = activation.dim();
    if rows == 0 || cols == 0 {
        return Err(ExplainError::EmptyActivation);
    }

    let normalized = normalize_activation(activation);
    let heat = GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([(normalized[[y as usize, x as usize]] * 255.0) as u8])
    });

    let (width, height) = original.dimensions();
    let heat = imageops::resize(&heat, width, height, FilterType::Triangle);

    let overlay = RgbImage::from_fn(width, height, |x, y| {
        let color = jet_color(heat.get_pixel(x, y)[0] as f32 / 255.0);
        let base = original.get_pixel(x, y);
        let mut out = [0u8; 3];
        for c in 0..3 {
            let blended = OVERLAY_ALPHA * color[c] as f32 + (1.0 - OVERLAY_ALPHA) * base[c] as f32;
            out[c] = blended.clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    });

    Ok(overlay)
}

/// PNG-encode an RGB image and return it base64 (standard alphabet)
pub fn encode_png_base64(image: &RgbImage) -> Result<String, ExplainError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(STANDARD.encode(buf.into_inner()))
}

/// Render and encode the explanation overlay for one prediction
pub fn explanation_png(
    original: &DynamicImage,
    activation: ArrayView2<f32>,
) -> Result<String, ExplainError> {
    let rgb = original.to_rgb8();
    let overlay = render_overlay(&rgb, activation)?;
    encode_png_base64(&overlay)
}
