//! Lifecycle of a single image.
//!
//! ```text
//! Idle --load--> Loading --decoded--> AwaitingKernel --result--> Ready
//!                   |                       |                      |
//!                   +------> Failed <-------+ error                |
//!                                                                   |
//!        config change / overlay change: AwaitingKernel <----------+
//! ```
//!
//! Every dispatch bumps the session's generation; a completion whose
//! generation is not the latest is stale and gets discarded.

use image::RgbaImage;
use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::compositor::{self, LogoOverlay};
use crate::config::ProcessingConfig;
use crate::error::{Error, Result};
use crate::protocol::{Job, JobId, WorkerResponse};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no image yet.
    Idle,
    /// Image received, being checked before dispatch.
    Loading,
    /// A job is with the kernel.
    AwaitingKernel,
    /// The final image is available.
    Ready,
    /// The latest job or the load failed.
    Failed(String),
}

/// What a routed completion did to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session's output is ready.
    Ready(u64),
    /// The session's latest job failed.
    Failed {
        /// Session id.
        session: u64,
        /// Reason reported by the kernel.
        message: String,
    },
}

/// One image and everything derived from it.
#[derive(Debug)]
pub struct Session {
    id: u64,
    config: ProcessingConfig,
    state: SessionState,
    source: Option<PixelBuffer>,
    output: Option<RgbaImage>,
    generation: u64,
}

impl Session {
    /// Create an idle session.
    #[must_use]
    pub fn new(id: u64, config: ProcessingConfig) -> Self {
        Self {
            id,
            config,
            state: SessionState::Idle,
            source: None,
            output: None,
            generation: 0,
        }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// The final image of the latest successful job, if any.
    #[must_use]
    pub fn output(&self) -> Option<&RgbaImage> {
        self.output.as_ref()
    }

    /// Whether an image has been loaded, so there is something to reprocess.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.source.is_some()
    }

    /// Id of the job whose result the session is waiting for.
    #[must_use]
    pub fn current_job(&self) -> Option<JobId> {
        (self.state == SessionState::AwaitingKernel).then(|| JobId::new(self.id, self.generation))
    }

    /// Take the outcome of decoding the image and produce the first job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the session already holds an image.
    /// A decode failure is returned as-is and moves the session to `Failed`.
    pub fn load(&mut self, decoded: Result<PixelBuffer>) -> Result<Job> {
        if self.state != SessionState::Idle {
            return Err(Error::InvalidConfig(format!(
                "session {} already has an image",
                self.id
            )));
        }
        self.state = SessionState::Loading;
        match decoded {
            Ok(image) => {
                self.source = Some(image);
                self.dispatch()
            }
            Err(e) => {
                self.state = SessionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Apply new settings; returns the superseding job when there is an image
    /// to reprocess.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the settings are out of range; the
    /// previous settings stay in effect.
    pub fn set_config(&mut self, config: ProcessingConfig) -> Result<Option<Job>> {
        config.validate()?;
        self.config = config;
        self.reprocess()
    }

    /// Re-dispatch with unchanged settings, e.g. after the overlay changed.
    ///
    /// # Errors
    ///
    /// Never fails once an image has been loaded; returns `Ok(None)` if
    /// there is nothing to reprocess.
    pub fn reprocess(&mut self) -> Result<Option<Job>> {
        if self.source.is_none() {
            return Ok(None);
        }
        self.dispatch().map(Some)
    }

    fn dispatch(&mut self) -> Result<Job> {
        let image = self.source.clone().ok_or_else(|| {
            Error::InvalidConfig(format!("session {} has no image", self.id))
        })?;
        self.generation += 1;
        self.state = SessionState::AwaitingKernel;
        let id = JobId::new(self.id, self.generation);
        debug!("Session {} dispatching job {id}", self.id);
        Ok(Job {
            id,
            image,
            config: self.config,
        })
    }

    /// Apply a kernel completion.
    ///
    /// On success the overlay is drawn and the session becomes `Ready`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleResult`] if the response is not for the job the
    /// session is waiting on; the session is left unchanged.
    pub fn complete(
        &mut self,
        response: WorkerResponse,
        overlay: &LogoOverlay,
    ) -> Result<SessionEvent> {
        let job = response.id();
        if self.current_job() != Some(job) {
            return Err(Error::StaleResult { job });
        }

        let result = match response {
            WorkerResponse::ProcessComplete { image, .. } => image.into_image(),
            WorkerResponse::ProcessError { message, .. } => Err(Error::Process(message)),
        };

        match result {
            Ok(mut image) => {
                if compositor::apply_overlay(&mut image, overlay, self.config.force_mode) {
                    debug!("Session {} overlay applied", self.id);
                }
                self.output = Some(image);
                self.state = SessionState::Ready;
                Ok(SessionEvent::Ready(self.id))
            }
            Err(e) => {
                let message = match e {
                    Error::Process(message) => message,
                    other => other.to_string(),
                };
                self.state = SessionState::Failed(message.clone());
                Ok(SessionEvent::Failed {
                    session: self.id,
                    message,
                })
            }
        }
    }
}
