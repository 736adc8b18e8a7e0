//! Alpha blending math for watermark removal.
//!
//! The watermark is applied via forward alpha blending of a white logo:
//! `watermarked = alpha * 255 + (1 - alpha) * original`
//!
//! This module provides the reverse operation to recover original pixels.

use image::RgbaImage;

use crate::buffer::PixelBuffer;
use crate::error::Result;
use crate::mask::OpacityMask;
use crate::placement::Placement;

/// Color value of the watermark logo (white).
pub const LOGO_VALUE: f32 = 255.0;

/// Effective opacity of a mask pixel after applying the strength gain.
#[must_use]
pub fn effective_alpha(mask_alpha: f32, gain: f32) -> f32 {
    (mask_alpha * gain).clamp(0.0, 1.0)
}

/// Recover one color channel from its watermarked value.
///
/// Applies `original = (watermarked - alpha * 255) / (1 - alpha)`, clamped to
/// `[0, 255]`. A fully opaque pixel (`alpha >= 1`) carries no trace of the
/// original, so the observed value is returned unchanged.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn unblend_channel(observed: u8, alpha: f32) -> u8 {
    if alpha >= 1.0 {
        return observed;
    }
    let original = (f32::from(observed) - alpha * LOGO_VALUE) / (1.0 - alpha);
    original.clamp(0.0, 255.0).round() as u8
}

/// Remove the watermark in-place from the mask-sized region at `(pos_x, pos_y)`.
///
/// The region is clipped to the image bounds. RGB channels are unblended
/// identically; the image's own alpha channel is left untouched.
pub fn unblend_region(
    image: &mut RgbaImage,
    mask: &OpacityMask,
    pos_x: u32,
    pos_y: u32,
    gain: f32,
) {
    let x2 = pos_x.saturating_add(mask.width()).min(image.width());
    let y2 = pos_y.saturating_add(mask.height()).min(image.height());

    if pos_x >= x2 || pos_y >= y2 {
        return;
    }

    for dy in 0..(y2 - pos_y) {
        for dx in 0..(x2 - pos_x) {
            let alpha = effective_alpha(mask.alpha_at(dx, dy), gain);
            if alpha <= 0.0 {
                continue;
            }

            let px = image.get_pixel_mut(pos_x + dx, pos_y + dy);
            for ch in 0..3 {
                px[ch] = unblend_channel(px[ch], alpha);
            }
        }
    }
}

/// Reconstruct the pre-watermark pixels of `buffer` at `placement`.
///
/// Takes ownership of the buffer and hands back the cleaned one; pixels
/// outside the region are returned verbatim.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidBuffer`] if the buffer's byte length does
/// not match its dimensions.
pub fn reconstruct(
    buffer: PixelBuffer,
    mask: &OpacityMask,
    placement: Placement,
    gain: f32,
) -> Result<PixelBuffer> {
    let mut image = buffer.into_image()?;
    unblend_region(&mut image, mask, placement.x, placement.y, gain);
    Ok(PixelBuffer::from(image))
}
