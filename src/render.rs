//! Raster collaborators: decoding tile bytes, drawing slices, overlay blending

use crate::error::Result;
use crate::types::Voxel;
use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::HashSet;

/// Turns encoded raster bytes into an RGBA8 pixel buffer
pub trait RasterDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage>;
}

/// PNG decoder backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct PngDecoder;

impl RasterDecoder for PngDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
        Ok(image.to_rgba8())
    }
}

/// 2D surface that accepts RGBA8 images
pub trait RenderSink {
    /// Draw `image` with its top-left corner at (`x`, `y`)
    fn put_image(&mut self, image: &RgbaImage, x: u32, y: u32);
}

impl RenderSink for RgbaImage {
    fn put_image(&mut self, image: &RgbaImage, x: u32, y: u32) {
        image::imageops::replace(self, image, i64::from(x), i64::from(y));
    }
}

/// Color blended over highlighted segments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlay {
    pub color: [u8; 3],
    pub alpha: f32,
}

impl Overlay {
    /// Quarter-strength pure blue
    pub const HIGHLIGHT: Self = Self {
        color: [0, 0, 255],
        alpha: 0.25,
    };

    /// Blend the overlay into the color channels, alpha stays as it was
    #[inline]
    pub fn blend(&self, pixel: &mut Rgba<u8>) {
        for (channel, &overlay) in pixel.0.iter_mut().take(3).zip(self.color.iter()) {
            *channel = (f32::from(*channel) * (1.0 - self.alpha) + f32::from(overlay) * self.alpha) as u8;
        }
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::HIGHLIGHT
    }
}

/// A pixel whose color bits are all zero has not been loaded yet
#[inline]
pub fn is_unloaded(pixel: &Rgba<u8>) -> bool {
    pixel.0[..3].iter().all(|&c| c == 0)
}

/// Composite a grayscale channel slice for display.
///
/// Unloaded pixels are replaced by the matching `loading` pixel, then every
/// pixel whose label is highlighted gets the overlay blended in. `labels` is
/// the segmentation slice in the same order as the image pixels.
pub fn composite_channel<S: Voxel>(
    pixels: &mut RgbaImage,
    loading: &RgbaImage,
    labels: &[S],
    highlighted: &HashSet<u32>,
    overlay: &Overlay,
) {
    debug_assert_eq!(pixels.dimensions(), loading.dimensions());
    debug_assert_eq!(pixels.len() / 4, labels.len());

    for ((pixel, fallback), &label) in pixels.pixels_mut().zip(loading.pixels()).zip(labels) {
        if is_unloaded(pixel) {
            *pixel = *fallback;
        }
        if highlighted.contains(&label.to_word()) {
            overlay.blend(pixel);
        }
    }
}
