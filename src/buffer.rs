//! Raw RGBA pixel buffers exchanged with the kernel worker.

use image::RgbaImage;

use crate::error::{Error, Result};

/// A decoded raster: `width * height` pixels, 4 bytes each, row-major.
///
/// Buffers are moved, never shared, across the worker boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBuffer`] if `rgba.len() != width * height * 4`.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let buffer = Self {
            width,
            height,
            rgba,
        };
        buffer.validate()?;
        Ok(buffer)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The raw RGBA bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.rgba
    }

    /// Check that the byte length matches the declared dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBuffer`] on mismatch.
    pub fn validate(&self) -> Result<()> {
        let expected = u64::from(self.width) * u64::from(self.height) * 4;
        if self.rgba.len() as u64 == expected {
            Ok(())
        } else {
            Err(Error::InvalidBuffer {
                width: self.width,
                height: self.height,
                len: self.rgba.len(),
            })
        }
    }

    /// Convert into an [`RgbaImage`] without copying.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBuffer`] if the dimensions do not match.
    pub fn into_image(self) -> Result<RgbaImage> {
        let (width, height, len) = (self.width, self.height, self.rgba.len());
        RgbaImage::from_raw(width, height, self.rgba).ok_or(Error::InvalidBuffer {
            width,
            height,
            len,
        })
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(img: RgbaImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            rgba: img.into_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_length_mismatch() {
        let err = PixelBuffer::new(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, Error::InvalidBuffer { len: 10, .. }));
    }

    #[test]
    fn image_conversion_preserves_pixels() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgba([1, 2, 3, 4]));
        let buffer = PixelBuffer::from(img.clone());
        assert_eq!(buffer.width(), 3);
        assert_eq!(buffer.height(), 2);
        assert_eq!(buffer.into_image().unwrap(), img);
    }
}
