//! Error types for the watermark-unblend crate.

use crate::protocol::JobId;

/// Errors that can occur while loading masks, resolving placement, or
/// processing images.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A mask template could not be decoded or has unexpected dimensions.
    ///
    /// This is fatal: no image can be processed without both masks.
    #[error("failed to load {which} mask template: {reason}")]
    AssetLoad {
        /// Which template failed (`"small"` or `"large"`).
        which: &'static str,
        /// Human-readable cause.
        reason: String,
    },

    /// The watermark region does not fit inside the image.
    #[error("watermark region {size}x{size} with {margin}px margin does not fit a {width}x{height} image")]
    RegionOutOfBounds {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Watermark edge length in pixels.
        size: u32,
        /// Distance from the bottom-right corner in pixels.
        margin: u32,
    },

    /// A pixel buffer's byte length does not match its dimensions.
    #[error("pixel buffer of {len} bytes does not match {width}x{height} RGBA")]
    InvalidBuffer {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Actual byte length.
        len: usize,
    },

    /// A job failed inside the kernel worker.
    #[error("processing failed: {0}")]
    Process(String),

    /// A completion arrived for a job that is no longer current.
    #[error("stale result for job {job}")]
    StaleResult {
        /// The superseded or orphaned job.
        job: JobId,
    },

    /// The kernel worker has shut down and no longer accepts jobs.
    #[error("kernel worker is not running")]
    WorkerUnavailable,

    /// A configuration value is outside its allowed range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image decoding or encoding.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Whether this error blocks all processing rather than a single image.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AssetLoad { .. } | Self::WorkerUnavailable)
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let out_of_bounds = Error::RegionOutOfBounds {
            width: 10,
            height: 20,
            size: 48,
            margin: 32,
        };
        let msg = out_of_bounds.to_string();
        assert!(msg.contains("10x20"));
        assert!(msg.contains("48x48"));

        let asset = Error::AssetLoad {
            which: "large",
            reason: "truncated".to_string(),
        };
        assert!(asset.to_string().contains("large"));
        assert!(asset.to_string().contains("truncated"));
    }

    #[test]
    fn only_asset_and_worker_errors_are_fatal() {
        assert!(Error::AssetLoad {
            which: "small",
            reason: String::new()
        }
        .is_fatal());
        assert!(Error::WorkerUnavailable.is_fatal());
        assert!(!Error::Process("boom".to_string()).is_fatal());
        assert!(!Error::StaleResult {
            job: JobId::new(1, 2)
        }
        .is_fatal());
    }
}
