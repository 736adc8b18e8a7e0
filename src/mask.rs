//! Opacity masks derived from the reference watermark templates.
//!
//! Each template is the watermark rendered as a light shape on a dark or
//! transparent background, so per-pixel brightness approximates the overlay's
//! opacity: `alpha = max(R, G, B) / 255`. Fully transparent template pixels
//! count as black whatever colour they store.

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use tracing::debug;

use crate::error::{Error, Result};
use crate::placement::WatermarkSize;

/// Per-pixel watermark opacity in `[0, 1]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct OpacityMask {
    width: u32,
    height: u32,
    alphas: Vec<f32>,
}

impl OpacityMask {
    /// Build a mask from raw alpha values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the length does not match the
    /// dimensions or any value falls outside `[0, 1]`.
    pub fn new(width: u32, height: u32, alphas: Vec<f32>) -> Result<Self> {
        if alphas.len() as u64 != u64::from(width) * u64::from(height) {
            return Err(Error::InvalidConfig(format!(
                "mask of {} values does not match {width}x{height}",
                alphas.len()
            )));
        }
        if let Some(bad) = alphas.iter().find(|a| !(0.0..=1.0).contains(*a)) {
            return Err(Error::InvalidConfig(format!("mask alpha {bad} outside [0, 1]")));
        }
        Ok(Self {
            width,
            height,
            alphas,
        })
    }

    /// Derive a mask from a decoded template image.
    #[must_use]
    pub fn from_template(template: &DynamicImage) -> Self {
        let rgba = template.to_rgba8();
        let alphas = rgba
            .pixels()
            .map(|px| {
                if px[3] == 0 {
                    0.0
                } else {
                    f32::from(px[0].max(px[1]).max(px[2])) / 255.0
                }
            })
            .collect();
        Self {
            width: rgba.width(),
            height: rgba.height(),
            alphas,
        }
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// All alpha values, row-major.
    #[must_use]
    pub fn alphas(&self) -> &[f32] {
        &self.alphas
    }

    /// Alpha at a local coordinate.
    #[must_use]
    pub fn alpha_at(&self, x: u32, y: u32) -> f32 {
        self.alphas[(y * self.width + x) as usize]
    }
}

/// The two masks every job reads from. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct MaskSet {
    small: Arc<OpacityMask>,
    large: Arc<OpacityMask>,
}

impl MaskSet {
    /// Assemble a mask set, checking each mask against its watermark size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetLoad`] if a mask is not square at the size its
    /// slot expects (48 for small, 96 for large).
    pub fn new(small: OpacityMask, large: OpacityMask) -> Result<Self> {
        check_dimensions(&small, WatermarkSize::Small)?;
        check_dimensions(&large, WatermarkSize::Large)?;
        Ok(Self {
            small: Arc::new(small),
            large: Arc::new(large),
        })
    }

    /// Decode both templates from encoded image bytes (PNG in practice).
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetLoad`] if either template fails to decode or has
    /// the wrong dimensions.
    pub fn load(small_template: &[u8], large_template: &[u8]) -> Result<Self> {
        let small = decode_template(small_template, WatermarkSize::Small)?;
        let large = decode_template(large_template, WatermarkSize::Large)?;
        debug!("Loaded opacity masks from memory");
        Self::new(small, large)
    }

    /// Read and decode both templates from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetLoad`] if either file is unreadable, undecodable,
    /// or has the wrong dimensions.
    pub fn load_files(small_path: &Path, large_path: &Path) -> Result<Self> {
        let read = |path: &Path, size: WatermarkSize| {
            std::fs::read(path).map_err(|e| Error::AssetLoad {
                which: slot_name(size),
                reason: format!("{}: {e}", path.display()),
            })
        };
        let small_bytes = read(small_path, WatermarkSize::Small)?;
        let large_bytes = read(large_path, WatermarkSize::Large)?;
        debug!(
            "Read mask templates {} and {}",
            small_path.display(),
            large_path.display()
        );
        Self::load(&small_bytes, &large_bytes)
    }

    /// The mask for a watermark size.
    #[must_use]
    pub fn get(&self, size: WatermarkSize) -> &OpacityMask {
        match size {
            WatermarkSize::Small => &self.small,
            WatermarkSize::Large => &self.large,
        }
    }
}

fn slot_name(size: WatermarkSize) -> &'static str {
    match size {
        WatermarkSize::Small => "small",
        WatermarkSize::Large => "large",
    }
}

fn decode_template(bytes: &[u8], size: WatermarkSize) -> Result<OpacityMask> {
    let template = image::load_from_memory(bytes).map_err(|e| Error::AssetLoad {
        which: slot_name(size),
        reason: e.to_string(),
    })?;
    Ok(OpacityMask::from_template(&template))
}

fn check_dimensions(mask: &OpacityMask, size: WatermarkSize) -> Result<()> {
    let expected = size.target_size();
    if mask.width == expected && mask.height == expected {
        Ok(())
    } else {
        Err(Error::AssetLoad {
            which: slot_name(size),
            reason: format!(
                "expected {expected}x{expected}, got {}x{}",
                mask.width, mask.height
            ),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    use super::*;

    /// Encode a synthetic template whose brightness varies across the region.
    pub(crate) fn template_png(size: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(size, size, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x + y) * 255 / (2 * size - 2)) as u8;
            Rgb([v, v / 2, v / 3])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    pub(crate) fn test_masks() -> MaskSet {
        MaskSet::load(&template_png(48), &template_png(96)).unwrap()
    }

    #[test]
    fn mask_values_are_max_channel_over_255() {
        let img = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([10, 200, 30])
            } else {
                Rgb([255, 0, 0])
            }
        });
        let mask = OpacityMask::from_template(&DynamicImage::ImageRgb8(img));
        assert_eq!(mask.width(), 2);
        assert!((mask.alpha_at(0, 0) - 200.0 / 255.0).abs() < f32::EPSILON);
        assert!((mask.alpha_at(1, 0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn transparent_template_pixels_are_zero() {
        let img = RgbaImage::from_fn(3, 1, |x, _| match x {
            0 => Rgba([255, 255, 255, 0]),
            1 => Rgba([255, 255, 255, 1]),
            _ => Rgba([0, 120, 0, 255]),
        });
        let mask = OpacityMask::from_template(&DynamicImage::ImageRgba8(img));
        assert!(mask.alpha_at(0, 0).abs() < f32::EPSILON);
        assert!((mask.alpha_at(1, 0) - 1.0).abs() < f32::EPSILON);
        assert!((mask.alpha_at(2, 0) - 120.0 / 255.0).abs() < f32::EPSILON);
    }

    #[test]
    fn white_on_transparent_export_loads_as_empty_mask() {
        let encode = |size: u32| {
            let img = RgbaImage::from_pixel(size, size, Rgba([255, 255, 255, 0]));
            let mut bytes = Vec::new();
            DynamicImage::ImageRgba8(img)
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .unwrap();
            bytes
        };
        let masks = MaskSet::load(&encode(48), &encode(96)).unwrap();
        for size in [WatermarkSize::Small, WatermarkSize::Large] {
            assert!(masks.get(size).alphas().iter().all(|a| a.abs() < f32::EPSILON));
        }
    }

    #[test]
    fn loads_both_templates_with_values_in_range() {
        let masks = test_masks();
        let small = masks.get(WatermarkSize::Small);
        let large = masks.get(WatermarkSize::Large);
        assert_eq!((small.width(), small.height()), (48, 48));
        assert_eq!((large.width(), large.height()), (96, 96));
        assert_eq!(large.alphas().len(), 96 * 96);
        for &a in small.alphas().iter().chain(large.alphas()) {
            assert!((0.0..=1.0).contains(&a));
        }
    }

    #[test]
    fn undecodable_template_is_asset_error() {
        let err = MaskSet::load(b"not a png", &template_png(96)).unwrap_err();
        assert!(matches!(err, Error::AssetLoad { which: "small", .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn swapped_templates_are_rejected() {
        let err = MaskSet::load(&template_png(96), &template_png(48)).unwrap_err();
        assert!(matches!(err, Error::AssetLoad { which: "small", .. }));
    }

    #[test]
    fn missing_file_is_asset_error() {
        let err = MaskSet::load_files(
            Path::new("/nonexistent/mask_48.png"),
            Path::new("/nonexistent/mask_96.png"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::AssetLoad { which: "small", .. }));
    }

    #[test]
    fn raw_mask_rejects_out_of_range_alpha() {
        assert!(OpacityMask::new(1, 1, vec![1.5]).is_err());
        assert!(OpacityMask::new(2, 1, vec![0.5]).is_err());
        assert!(OpacityMask::new(1, 1, vec![0.5]).is_ok());
        assert!(OpacityMask::new(u32::MAX, u32::MAX, vec![0.5]).is_err());
    }
}
