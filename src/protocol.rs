//! Messages exchanged between the coordinating side and the kernel worker.

use std::fmt;

use crate::buffer::PixelBuffer;
use crate::config::ProcessingConfig;
use crate::mask::MaskSet;

/// Identifies one in-flight request.
///
/// A job belongs to exactly one session; `generation` increases every time the
/// session dispatches new work, so a completion is current only if its
/// generation matches the session's latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId {
    /// Owning session.
    pub session: u64,
    /// Dispatch counter within the session.
    pub generation: u64,
}

impl JobId {
    /// Create a job id.
    #[must_use]
    pub fn new(session: u64, generation: u64) -> Self {
        Self {
            session,
            generation,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.session, self.generation)
    }
}

/// Requests sent to the kernel worker.
#[derive(Debug)]
pub enum WorkerRequest {
    /// One-time mask installation; must precede any `ProcessImage`.
    InitMasks(MaskSet),
    /// Clean one image. The buffer is owned by the worker until it replies.
    ProcessImage(Job),
}

/// One unit of kernel work, consumed exactly once.
#[derive(Debug)]
pub struct Job {
    /// Request id echoed in the response.
    pub id: JobId,
    /// Pixels to clean.
    pub image: PixelBuffer,
    /// Size mode and strength.
    pub config: ProcessingConfig,
}

/// Replies from the kernel worker, exactly one per `ProcessImage`.
#[derive(Debug)]
pub enum WorkerResponse {
    /// The job finished; ownership of the buffer returns to the caller.
    ProcessComplete {
        /// Request id.
        id: JobId,
        /// Cleaned pixels.
        image: PixelBuffer,
    },
    /// The job failed.
    ProcessError {
        /// Request id.
        id: JobId,
        /// Human-readable reason.
        message: String,
    },
}

impl WorkerResponse {
    /// The id of the job this response completes.
    #[must_use]
    pub fn id(&self) -> JobId {
        match self {
            Self::ProcessComplete { id, .. } | Self::ProcessError { id, .. } => *id,
        }
    }
}
