//! Remove a fixed, semi-transparent corner watermark via reverse alpha blending.
//!
//! The watermark is a white logo composited over the bottom-right corner of an
//! image. Given the logo's opacity mask (48x48 or 96x96, derived from reference
//! templates), this crate inverts the blend to recover the original pixels and
//! can then draw a replacement logo in the same spot.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use watermark_unblend::{ProcessingConfig, WatermarkEngine};
//!
//! let engine = WatermarkEngine::load_files(
//!     Path::new("assets/mask_48.png"),
//!     Path::new("assets/mask_96.png"),
//! )
//! .expect("failed to load masks");
//! let mut img = image::open("photo.png").unwrap().to_rgba8();
//! engine.remove(&mut img, &ProcessingConfig::default()).ok();
//! img.save("cleaned.png").unwrap();
//! ```
//!
//! # Batches
//!
//! For many images driven from a front end that must stay responsive, start a
//! [`JobRouter`] (one kernel thread fed by a bounded queue) and drive it from a
//! [`Workbench`], which keeps one [`Session`] per image and discards results
//! that a newer edit has superseded.
//!
//! ```no_run
//! use std::path::Path;
//! use watermark_unblend::{
//!     load_image, JobRouter, LogoOverlay, MaskSet, ProcessingConfig, Workbench,
//!     DEFAULT_QUEUE_DEPTH,
//! };
//!
//! # async fn run() -> watermark_unblend::Result<()> {
//! let masks = MaskSet::load_files(Path::new("mask_48.png"), Path::new("mask_96.png"))?;
//! let router = JobRouter::start(masks, DEFAULT_QUEUE_DEPTH)?;
//! let mut bench = Workbench::new(router, LogoOverlay::default());
//!
//! bench.add(load_image(Path::new("a.png")), ProcessingConfig::default()).await?;
//! while let Some(event) = bench.next_event().await {
//!     println!("{event:?}");
//! }
//! bench.shutdown();
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod blending;
mod buffer;
pub mod compositor;
mod config;
mod engine;
pub mod error;
mod mask;
pub mod placement;
mod protocol;
mod router;
mod session;
mod worker;
mod workbench;

pub use buffer::PixelBuffer;
pub use compositor::{apply_overlay, LogoOverlay};
pub use config::{ProcessingConfig, MAX_ALPHA_GAIN, MIN_ALPHA_GAIN};
pub use engine::{
    default_output_path, is_supported_image, load_image, save_image, WatermarkEngine,
    CLEAN_SUFFIX,
};
pub use error::{Error, Result};
pub use mask::{MaskSet, OpacityMask};
pub use placement::{resolve, ForceMode, Placement, WatermarkSize};
pub use protocol::{Job, JobId, WorkerRequest, WorkerResponse};
pub use router::{JobRouter, JobSlot, DEFAULT_QUEUE_DEPTH};
pub use session::{Session, SessionEvent, SessionState};
pub use workbench::Workbench;
