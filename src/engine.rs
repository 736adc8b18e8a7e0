//! Core watermark removal engine.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::debug;

use crate::blending;
use crate::buffer::PixelBuffer;
use crate::config::ProcessingConfig;
use crate::error::{Error, Result};
use crate::mask::MaskSet;
use crate::placement::{self, ForceMode, Placement};

/// Suffix appended to the stem of exported images.
pub const CLEAN_SUFFIX: &str = "_clean";

/// The watermark engine holding the loaded opacity masks.
///
/// Create once and reuse for every image; the masks are shared read-only.
/// This runs the kernel on the calling thread. For batches driven from a
/// responsive front end, see [`crate::JobRouter`], whose worker wraps one of
/// these.
#[derive(Debug, Clone)]
pub struct WatermarkEngine {
    masks: MaskSet,
}

impl WatermarkEngine {
    /// Create an engine from an already loaded mask set.
    #[must_use]
    pub fn new(masks: MaskSet) -> Self {
        Self { masks }
    }

    /// Create an engine by loading both mask templates from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AssetLoad`] if either template cannot be loaded.
    pub fn load_files(small_template: &Path, large_template: &Path) -> Result<Self> {
        MaskSet::load_files(small_template, large_template).map(Self::new)
    }

    /// The masks this engine uses.
    #[must_use]
    pub fn masks(&self) -> &MaskSet {
        &self.masks
    }

    /// Where the watermark sits for the given dimensions and mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegionOutOfBounds`] if the region does not fit.
    #[allow(clippy::unused_self)] // method on `self` for API consistency
    pub fn placement(&self, width: u32, height: u32, mode: ForceMode) -> Result<Placement> {
        placement::resolve(width, height, mode)
    }

    /// Remove the watermark from an image in-place.
    ///
    /// Returns the region that was reconstructed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegionOutOfBounds`] (leaving the image untouched) if
    /// the watermark region does not fit, or [`Error::InvalidConfig`] if the
    /// gain is out of range.
    pub fn remove(&self, image: &mut RgbaImage, config: &ProcessingConfig) -> Result<Placement> {
        config.validate()?;
        let placement = self.placement(image.width(), image.height(), config.force_mode)?;
        blending::unblend_region(
            image,
            self.masks.get(placement.size),
            placement.x,
            placement.y,
            config.alpha_gain,
        );
        Ok(placement)
    }

    /// Clean an owned pixel buffer and hand it back.
    ///
    /// Images too small to hold the watermark pass through unmodified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBuffer`] for malformed buffers and
    /// [`Error::InvalidConfig`] for out-of-range settings.
    pub fn process(&self, buffer: PixelBuffer, config: &ProcessingConfig) -> Result<PixelBuffer> {
        config.validate()?;
        let mut image = buffer.into_image()?;
        match self.remove(&mut image, config) {
            Ok(placement) => debug!(
                "Reconstructed {}x{} region at ({}, {})",
                placement.extent(),
                placement.extent(),
                placement.x,
                placement.y
            ),
            Err(Error::RegionOutOfBounds {
                width,
                height,
                size,
                margin,
            }) => debug!(
                "Image {width}x{height} cannot hold a {size}px watermark with {margin}px margin, passing through"
            ),
            Err(e) => return Err(e),
        }
        Ok(PixelBuffer::from(image))
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Decode an image file into an RGBA pixel buffer.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_image(path: &Path) -> Result<PixelBuffer> {
    let img = image::open(path)?;
    Ok(PixelBuffer::from(img.to_rgba8()))
}

/// Save an RGBA image with format-specific settings.
///
/// JPEG drops the alpha channel and is written at quality 100.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&rgb)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// Output is always PNG to keep the alpha channel.
/// Example: `"photo.jpg"` becomes `"photo_clean.png"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}{CLEAN_SUFFIX}.png"))
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::mask::tests::test_masks;
    use crate::placement::WatermarkSize;

    #[test]
    fn remove_reports_resolved_region() {
        let engine = WatermarkEngine::new(test_masks());
        let mut img = RgbaImage::from_pixel(2000, 2000, Rgba([200, 200, 200, 255]));
        let placement = engine.remove(&mut img, &ProcessingConfig::default()).unwrap();
        assert_eq!(placement.size, WatermarkSize::Large);
        assert_eq!((placement.x, placement.y), (1840, 1840));
        // Local (80, 80) has alpha ~0.84, which unblends a 200 grey to black.
        assert_eq!(img.get_pixel(1920, 1920).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(1839, 1839).0, [200, 200, 200, 255]);
    }

    #[test]
    fn process_passes_small_images_through() {
        let engine = WatermarkEngine::new(test_masks());
        let img = RgbaImage::from_pixel(60, 60, Rgba([9, 8, 7, 255]));
        let out = engine
            .process(PixelBuffer::from(img.clone()), &ProcessingConfig::default())
            .unwrap();
        assert_eq!(out.into_image().unwrap(), img);
    }

    #[test]
    fn process_rejects_bad_gain() {
        let engine = WatermarkEngine::new(test_masks());
        let config = ProcessingConfig {
            alpha_gain: 5.0,
            ..ProcessingConfig::default()
        };
        let img = RgbaImage::new(100, 100);
        assert!(matches!(
            engine.process(PixelBuffer::from(img), &config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn default_output_path_appends_clean_suffix() {
        let p = default_output_path(Path::new("/tmp/photo.jpg"));
        assert_eq!(p, PathBuf::from("/tmp/photo_clean.png"));

        let p = default_output_path(Path::new("image.png"));
        assert_eq!(p.file_name().unwrap().to_str().unwrap(), "image_clean.png");
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(is_supported_image(Path::new("photo.bmp")));
    }

    #[test]
    fn is_supported_image_rejects_unsupported_formats() {
        assert!(!is_supported_image(Path::new("photo.gif")));
        assert!(!is_supported_image(Path::new("photo.txt")));
        assert!(!is_supported_image(Path::new("photo")));
    }
}
