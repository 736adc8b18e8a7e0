//! Watermark size selection and corner placement.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Both image dimensions must exceed this for `auto` to pick the large mask.
const LARGE_THRESHOLD: u32 = 1024;

/// Watermark size classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatermarkSize {
    /// 48x48 watermark, 32px margin.
    Small,
    /// 96x96 watermark, 64px margin.
    Large,
}

impl WatermarkSize {
    /// Edge length of the square watermark region.
    #[must_use]
    pub fn target_size(self) -> u32 {
        match self {
            Self::Small => 48,
            Self::Large => 96,
        }
    }

    /// Distance from the right and bottom image edges.
    #[must_use]
    pub fn margin(self) -> u32 {
        match self {
            Self::Small => 32,
            Self::Large => 64,
        }
    }

    /// Size the watermark takes for an image of the given dimensions.
    ///
    /// - **Large**: both width AND height > 1024
    /// - **Small**: otherwise (including 1024x1024)
    #[must_use]
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        if width > LARGE_THRESHOLD && height > LARGE_THRESHOLD {
            Self::Large
        } else {
            Self::Small
        }
    }
}

/// User-selectable size mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ForceMode {
    /// Infer the size from the image dimensions.
    #[default]
    Auto,
    /// Always use the small mask.
    Small,
    /// Always use the large mask.
    Large,
}

impl ForceMode {
    /// Resolve to a concrete size for the given dimensions.
    #[must_use]
    pub fn size_for(self, width: u32, height: u32) -> WatermarkSize {
        match self {
            Self::Auto => WatermarkSize::for_dimensions(width, height),
            Self::Small => WatermarkSize::Small,
            Self::Large => WatermarkSize::Large,
        }
    }
}

impl fmt::Display for ForceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Small => "small",
            Self::Large => "large",
        })
    }
}

impl FromStr for ForceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "small" => Ok(Self::Small),
            "large" => Ok(Self::Large),
            other => Err(Error::InvalidConfig(format!("unknown mode `{other}`"))),
        }
    }
}

/// Where the watermark sits in a particular image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Which mask applies.
    pub size: WatermarkSize,
    /// X coordinate of the region's top-left corner.
    pub x: u32,
    /// Y coordinate of the region's top-left corner.
    pub y: u32,
}

impl Placement {
    /// Edge length of the region.
    #[must_use]
    pub fn extent(&self) -> u32 {
        self.size.target_size()
    }
}

/// Resolve the watermark region for an image.
///
/// The region is anchored at the bottom-right corner:
/// `x = width - margin - size`, `y = height - margin - size`.
///
/// # Errors
///
/// Returns [`Error::RegionOutOfBounds`] when the region would start at a
/// negative coordinate. Callers pass such images through unmodified.
pub fn resolve(width: u32, height: u32, mode: ForceMode) -> Result<Placement> {
    let size = mode.size_for(width, height);
    let span = size.target_size() + size.margin();
    match (width.checked_sub(span), height.checked_sub(span)) {
        (Some(x), Some(y)) => Ok(Placement { size, x, y }),
        _ => Err(Error::RegionOutOfBounds {
            width,
            height,
            size: size.target_size(),
            margin: size.margin(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_small_when_either_dim_lte_1024() {
        assert_eq!(WatermarkSize::for_dimensions(800, 600), WatermarkSize::Small);
        assert_eq!(WatermarkSize::for_dimensions(1024, 1024), WatermarkSize::Small);
        assert_eq!(WatermarkSize::for_dimensions(2048, 512), WatermarkSize::Small);
        assert_eq!(WatermarkSize::for_dimensions(512, 2048), WatermarkSize::Small);
    }

    #[test]
    fn auto_large_when_both_dims_gt_1024() {
        assert_eq!(WatermarkSize::for_dimensions(1025, 1025), WatermarkSize::Large);
        assert_eq!(WatermarkSize::for_dimensions(2048, 2048), WatermarkSize::Large);
    }

    #[test]
    fn forced_modes_override_dimensions() {
        assert_eq!(ForceMode::Small.size_for(4096, 4096), WatermarkSize::Small);
        assert_eq!(ForceMode::Large.size_for(300, 300), WatermarkSize::Large);
    }

    #[test]
    fn resolve_anchors_at_bottom_right() {
        let p = resolve(2000, 2000, ForceMode::Auto).unwrap();
        assert_eq!(p.size, WatermarkSize::Large);
        assert_eq!((p.x, p.y), (1840, 1840));

        let p = resolve(500, 500, ForceMode::Auto).unwrap();
        assert_eq!(p.size, WatermarkSize::Small);
        assert_eq!((p.x, p.y), (420, 420));
    }

    #[test]
    fn resolve_exact_fit_is_at_origin() {
        let p = resolve(80, 80, ForceMode::Small).unwrap();
        assert_eq!((p.x, p.y), (0, 0));
    }

    #[test]
    fn resolve_rejects_region_outside_image() {
        let err = resolve(79, 500, ForceMode::Small).unwrap_err();
        assert!(matches!(
            err,
            Error::RegionOutOfBounds {
                size: 48,
                margin: 32,
                ..
            }
        ));
        assert!(resolve(500, 500, ForceMode::Large).is_ok());
        assert!(resolve(159, 500, ForceMode::Large).is_err());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("AUTO".parse::<ForceMode>().unwrap(), ForceMode::Auto);
        assert_eq!("large".parse::<ForceMode>().unwrap(), ForceMode::Large);
        assert!("medium".parse::<ForceMode>().is_err());
        assert_eq!(ForceMode::Small.to_string(), "small");
    }
}
