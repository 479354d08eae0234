//! Pixel buffers exchanged with model backends.
//!
//! Generative backends hand their output over in whatever layout they
//! produce natively; [`ImageData`] normalizes those layouts into an
//! [`image::RgbImage`] that can be saved, encoded and scored.

use image::{DynamicImage, RgbImage};
use imgref::ImgVec;
use rgb::{RGB8, RGBA8};

use crate::error::{Error, Result};

/// Image data accepted from model backends.
///
/// Supports `imgref::ImgVec` buffers, raw slices and already decoded images.
#[derive(Clone)]
pub enum ImageData {
    /// RGB8 image using imgref.
    Rgb8(ImgVec<RGB8>),

    /// RGBA8 image using imgref.
    Rgba8(ImgVec<RGBA8>),

    /// RGB8 raw slice with dimensions.
    RgbSlice {
        /// Pixel data in row-major order.
        data: Vec<u8>,
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
    },

    /// RGBA8 raw slice with dimensions.
    RgbaSlice {
        /// Pixel data in row-major order.
        data: Vec<u8>,
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
    },

    /// Image decoded by the `image` crate.
    Decoded(RgbImage),
}

impl ImageData {
    /// Get image width.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Self::Rgb8(img) => img.width(),
            Self::Rgba8(img) => img.width(),
            Self::RgbSlice { width, .. } | Self::RgbaSlice { width, .. } => *width,
            Self::Decoded(img) => img.width() as usize,
        }
    }

    /// Get image height.
    #[must_use]
    pub fn height(&self) -> usize {
        match self {
            Self::Rgb8(img) => img.height(),
            Self::Rgba8(img) => img.height(),
            Self::RgbSlice { height, .. } | Self::RgbaSlice { height, .. } => *height,
            Self::Decoded(img) => img.height() as usize,
        }
    }

    /// Convert to an RGB8 byte vector in row-major order, dropping alpha.
    #[must_use]
    pub fn to_rgb8_vec(&self) -> Vec<u8> {
        match self {
            Self::Rgb8(img) => img.pixels().flat_map(|p| [p.r, p.g, p.b]).collect(),
            Self::Rgba8(img) => img.pixels().flat_map(|p| [p.r, p.g, p.b]).collect(),
            Self::RgbSlice { data, .. } => data.clone(),
            Self::RgbaSlice { data, .. } => data
                .chunks_exact(4)
                .flat_map(|chunk| [chunk[0], chunk[1], chunk[2]])
                .collect(),
            Self::Decoded(img) => img.as_raw().clone(),
        }
    }

    /// Convert into an [`RgbImage`].
    ///
    /// Fails if a raw slice does not hold exactly `width * height` pixels.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        if let Self::Decoded(img) = self {
            return Ok(img.clone());
        }

        let channels = match self {
            Self::RgbaSlice { .. } => 4,
            _ => 3,
        };
        if let Self::RgbSlice { data, width, height } | Self::RgbaSlice { data, width, height } =
            self
        {
            let expected = width * height * channels;
            if data.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: data.len(),
                });
            }
        }

        let width = self.width();
        let height = self.height();
        let rgb = self.to_rgb8_vec();
        let actual = rgb.len();
        RgbImage::from_raw(width as u32, height as u32, rgb).ok_or(Error::DimensionMismatch {
            expected: width * height * 3,
            actual,
        })
    }
}

impl From<RgbImage> for ImageData {
    fn from(img: RgbImage) -> Self {
        Self::Decoded(img)
    }
}

impl From<DynamicImage> for ImageData {
    fn from(img: DynamicImage) -> Self {
        Self::Decoded(img.to_rgb8())
    }
}
