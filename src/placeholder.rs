//! Loading placeholder shown wherever channel data has not arrived

use crate::error::{Result, VolumeError};
use crate::render::{PngDecoder, RasterDecoder};
use image::{Rgba, RgbaImage};
use std::sync::OnceLock;
use tracing::warn;

static LOADING_PNG: &[u8] = include_bytes!("../assets/loading.png");

/// Gray used when the embedded asset cannot be decoded
const FALLBACK_PIXEL: Rgba<u8> = Rgba([128, 128, 128, 255]);

/// An image repeated across a slice while data is loading
#[derive(Debug, Clone)]
pub struct Placeholder {
    image: RgbaImage,
}

impl Placeholder {
    /// Process-wide placeholder decoded from the embedded asset on first use
    pub fn global() -> &'static Placeholder {
        static GLOBAL: OnceLock<Placeholder> = OnceLock::new();

        GLOBAL.get_or_init(|| match Self::decode(LOADING_PNG) {
            Ok(placeholder) => placeholder,
            Err(e) => {
                warn!("loading placeholder could not be decoded, using flat gray: {}", e);
                Self::solid(128, 128, FALLBACK_PIXEL)
            }
        })
    }

    /// Decode a placeholder from PNG bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_image(PngDecoder.decode(bytes)?)
    }

    /// Wrap a decoded image, which must not be empty
    pub fn from_image(image: RgbaImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(VolumeError::Decode("placeholder image is empty".to_string()));
        }
        Ok(Self { image })
    }

    /// A placeholder of a single color
    pub fn solid(width: u32, height: u32, pixel: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(width.max(1), height.max(1), pixel),
        }
    }

    /// Width of one placeholder repeat
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height of one placeholder repeat
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel at (`x`, `y`) of the placeholder repeated over the plane
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self
            .image
            .get_pixel(x % self.image.width(), y % self.image.height())
    }

    /// The placeholder tiled from the origin over a `width` x `height` area
    pub fn tiled(&self, width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| self.pixel(x, y))
    }
}
