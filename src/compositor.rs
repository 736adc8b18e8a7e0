//! Replacement logo overlay.
//!
//! The logo is drawn where the watermark was, scaled to the watermark's size
//! and blended source-over at a fixed opacity.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::debug;

use crate::error::{Error, Result};
use crate::placement::{self, ForceMode};

/// Opacity a freshly configured or cleared overlay uses.
pub const DEFAULT_LOGO_OPACITY: f32 = 0.8;
/// Scale a freshly configured or cleared overlay uses.
pub const DEFAULT_LOGO_SCALE: f32 = 1.0;
/// Smallest allowed logo scale.
pub const MIN_LOGO_SCALE: f32 = 0.1;
/// Largest allowed logo scale.
pub const MAX_LOGO_SCALE: f32 = 2.0;

/// Process-wide logo settings, read by every session after reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct LogoOverlay {
    image: Option<Arc<RgbaImage>>,
    opacity: f32,
    scale: f32,
}

impl Default for LogoOverlay {
    fn default() -> Self {
        Self {
            image: None,
            opacity: DEFAULT_LOGO_OPACITY,
            scale: DEFAULT_LOGO_SCALE,
        }
    }
}

impl LogoOverlay {
    /// Create a validated overlay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `opacity` is outside `[0, 1]` or
    /// `scale` outside `[0.1, 2.0]`.
    pub fn new(image: Option<RgbaImage>, opacity: f32, scale: f32) -> Result<Self> {
        let mut overlay = Self {
            image: image.map(Arc::new),
            ..Self::default()
        };
        overlay.set_opacity(opacity)?;
        overlay.set_scale(scale)?;
        Ok(overlay)
    }

    /// The logo image, if one is configured.
    #[must_use]
    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_deref()
    }

    /// Whether drawing would do anything.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.image.is_some()
    }

    /// Opacity in `[0, 1]`.
    #[must_use]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Scale relative to the watermark size.
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Replace the logo image.
    pub fn set_image(&mut self, image: RgbaImage) {
        self.image = Some(Arc::new(image));
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `opacity` is outside `[0, 1]`.
    pub fn set_opacity(&mut self, opacity: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(Error::InvalidConfig(format!(
                "logo opacity {opacity} outside [0, 1]"
            )));
        }
        self.opacity = opacity;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `scale` is outside `[0.1, 2.0]`.
    pub fn set_scale(&mut self, scale: f32) -> Result<()> {
        if !(MIN_LOGO_SCALE..=MAX_LOGO_SCALE).contains(&scale) {
            return Err(Error::InvalidConfig(format!(
                "logo scale {scale} outside [{MIN_LOGO_SCALE}, {MAX_LOGO_SCALE}]"
            )));
        }
        self.scale = scale;
        Ok(())
    }

    /// Drop the logo and reset opacity and scale to their defaults.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Destination rectangle of the scaled logo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoPlacement {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Scaled width.
    pub width: u32,
    /// Scaled height.
    pub height: u32,
}

/// Where a `logo_w` x `logo_h` logo lands on an image.
///
/// The logo is fitted inside the watermark's square (aspect preserved), then
/// multiplied by `scale`. Its bottom-right corner sits on the watermark
/// region's bottom-right corner, so a square logo at scale 1.0 covers the
/// region exactly. Returns `None` when the watermark region or the scaled
/// logo would leave the image.
#[must_use]
pub fn logo_placement(
    width: u32,
    height: u32,
    logo_w: u32,
    logo_h: u32,
    scale: f32,
    mode: ForceMode,
) -> Option<LogoPlacement> {
    if logo_w == 0 || logo_h == 0 {
        return None;
    }
    let region = placement::resolve(width, height, mode).ok()?;
    #[allow(clippy::cast_precision_loss)]
    let (target, lw, lh) = (region.extent() as f32, logo_w as f32, logo_h as f32);
    let fit = (target / lw).min(target / lh) * scale;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (scaled_w, scaled_h) = (
        ((lw * fit).round() as u32).max(1),
        ((lh * fit).round() as u32).max(1),
    );

    let right = region.x + region.extent();
    let bottom = region.y + region.extent();
    Some(LogoPlacement {
        x: right.checked_sub(scaled_w)?,
        y: bottom.checked_sub(scaled_h)?,
        width: scaled_w,
        height: scaled_h,
    })
}

/// Draw the configured logo onto `image` in place.
///
/// Returns whether anything was drawn. No logo, or a placement outside the
/// image, is a silent no-op.
pub fn apply_overlay(image: &mut RgbaImage, overlay: &LogoOverlay, mode: ForceMode) -> bool {
    let Some(logo) = overlay.image() else {
        return false;
    };
    let Some(dest) = logo_placement(
        image.width(),
        image.height(),
        logo.width(),
        logo.height(),
        overlay.scale(),
        mode,
    ) else {
        debug!(
            "Logo does not fit a {}x{} image, skipping overlay",
            image.width(),
            image.height()
        );
        return false;
    };

    let scaled = imageops::resize(logo, dest.width, dest.height, FilterType::Triangle);
    for (lx, ly, src) in scaled.enumerate_pixels() {
        let dst = image.get_pixel_mut(dest.x + lx, dest.y + ly);
        blend_over(&mut dst.0, src.0, overlay.opacity());
    }
    true
}

/// Source-over composite of `src` onto `dst` with an extra global opacity.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend_over(dst: &mut [u8; 4], src: [u8; 4], opacity: f32) {
    let sa = f32::from(src[3]) / 255.0 * opacity;
    if sa <= 0.0 {
        return;
    }
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for ch in 0..3 {
        let value = (f32::from(src[ch]) * sa + f32::from(dst[ch]) * da * (1.0 - sa)) / out_a;
        dst[ch] = value.clamp(0.0, 255.0).round() as u8;
    }
    dst[3] = (out_a * 255.0).clamp(0.0, 255.0).round() as u8;
}
