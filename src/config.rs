//! Per-image processing configuration.

use crate::error::{Error, Result};
use crate::placement::ForceMode;

/// Lowest reconstruction strength (nominal inversion).
pub const MIN_ALPHA_GAIN: f32 = 1.0;
/// Highest reconstruction strength.
pub const MAX_ALPHA_GAIN: f32 = 3.0;

/// User-adjustable settings for one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingConfig {
    /// Which mask to use, or `Auto` to infer from dimensions.
    pub force_mode: ForceMode,
    /// Multiplier on mask opacity; above 1.0 removes stubborn residue at the
    /// cost of fidelity.
    pub alpha_gain: f32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            force_mode: ForceMode::Auto,
            alpha_gain: MIN_ALPHA_GAIN,
        }
    }
}

impl ProcessingConfig {
    /// Create a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `alpha_gain` is outside `[1.0, 3.0]`.
    pub fn new(force_mode: ForceMode, alpha_gain: f32) -> Result<Self> {
        let config = Self {
            force_mode,
            alpha_gain,
        };
        config.validate()?;
        Ok(config)
    }

    /// Same mode, gain clamped into range the way a slider would.
    #[must_use]
    pub fn with_gain_clamped(self, alpha_gain: f32) -> Self {
        Self {
            alpha_gain: if alpha_gain.is_nan() {
                MIN_ALPHA_GAIN
            } else {
                alpha_gain.clamp(MIN_ALPHA_GAIN, MAX_ALPHA_GAIN)
            },
            ..self
        }
    }

    /// Check that the gain is in range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when it is not.
    pub fn validate(&self) -> Result<()> {
        if (MIN_ALPHA_GAIN..=MAX_ALPHA_GAIN).contains(&self.alpha_gain) {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "alpha gain {} outside [{MIN_ALPHA_GAIN}, {MAX_ALPHA_GAIN}]",
                self.alpha_gain
            )))
        }
    }
}
