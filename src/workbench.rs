//! The coordinating side: many sessions, one kernel worker.
//!
//! The workbench owns every live session and the shared logo overlay. It
//! submits jobs without waiting for their results, which arrive in
//! [`Workbench::next_event`] and are routed back to their sessions by job id.

use std::collections::BTreeMap;

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::buffer::PixelBuffer;
use crate::compositor::LogoOverlay;
use crate::config::ProcessingConfig;
use crate::error::{Error, Result};
use crate::protocol::WorkerResponse;
use crate::router::JobRouter;
use crate::session::{Session, SessionEvent, SessionState};

/// Sessions plus the router that serves them.
pub struct Workbench {
    router: JobRouter,
    overlay: LogoOverlay,
    sessions: BTreeMap<u64, Session>,
    next_session: u64,
}

impl Workbench {
    /// Create a workbench over a started router.
    #[must_use]
    pub fn new(router: JobRouter, overlay: LogoOverlay) -> Self {
        Self {
            router,
            overlay,
            sessions: BTreeMap::new(),
            next_session: 1,
        }
    }

    /// Start a session for a decoded image (or the error decoding it) and
    /// dispatch its first job.
    ///
    /// A decode failure still creates the session, in the `Failed` state.
    /// Queue space is reserved before the session exists, so dropping the
    /// future while the queue is full leaves the workbench unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerUnavailable`] if the kernel has stopped.
    pub async fn add(
        &mut self,
        decoded: Result<PixelBuffer>,
        config: ProcessingConfig,
    ) -> Result<u64> {
        let image = match decoded {
            Ok(image) => image,
            Err(e) => {
                let id = self.next_id();
                let mut session = Session::new(id, config);
                if let Err(e) = session.load(Err(e)) {
                    warn!("Session {id} failed to load: {e}");
                }
                self.sessions.insert(id, session);
                return Ok(id);
            }
        };

        let slot = self.router.reserve().await?;
        let id = self.next_session;
        self.next_session += 1;
        let mut session = Session::new(id, config);
        let job = session.load(Ok(image))?;
        self.sessions.insert(id, session);
        slot.submit(job);
        Ok(id)
    }

    /// Change one session's settings, superseding any job in flight.
    ///
    /// The session is untouched until queue space is secured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an unknown session or out-of-range
    /// settings, and [`Error::WorkerUnavailable`] if the kernel has stopped.
    pub async fn set_config(&mut self, session: u64, config: ProcessingConfig) -> Result<()> {
        config.validate()?;
        if !self.sessions.contains_key(&session) {
            return Err(unknown_session(session));
        }

        let slot = self.router.reserve().await?;
        let job = self
            .sessions
            .get_mut(&session)
            .ok_or_else(|| unknown_session(session))?
            .set_config(config)?;
        if let Some(job) = job {
            slot.submit(job);
        }
        Ok(())
    }

    /// Replace the shared overlay and reprocess every session that has an image.
    ///
    /// Each session is re-dispatched only once its queue slot is reserved, so
    /// a dropped call leaves the rest on their previous output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerUnavailable`] if the kernel has stopped.
    pub async fn set_overlay(&mut self, overlay: LogoOverlay) -> Result<()> {
        self.overlay = overlay;
        let ids: Vec<u64> = self
            .sessions
            .values()
            .filter(|s| s.has_image())
            .map(Session::id)
            .collect();
        info!("Overlay changed, reprocessing {} images", ids.len());

        for id in ids {
            let slot = self.router.reserve().await?;
            if let Some(session) = self.sessions.get_mut(&id) {
                if let Some(job) = session.reprocess()? {
                    slot.submit(job);
                }
            }
        }
        Ok(())
    }

    /// Drop the logo, reset its settings, and reprocess.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerUnavailable`] if the kernel has stopped.
    pub async fn clear_overlay(&mut self) -> Result<()> {
        self.set_overlay(LogoOverlay::default()).await
    }

    /// The overlay every session is composited with.
    #[must_use]
    pub fn overlay(&self) -> &LogoOverlay {
        &self.overlay
    }

    /// Destroy a session. Results still in flight for it are discarded.
    pub fn remove(&mut self, session: u64) -> bool {
        self.sessions.remove(&session).is_some()
    }

    /// Look up a session.
    #[must_use]
    pub fn session(&self, session: u64) -> Option<&Session> {
        self.sessions.get(&session)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no live sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of sessions waiting on the kernel.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| *s.state() == SessionState::AwaitingKernel)
            .count()
    }

    /// Wait for the next completion that belongs to a live, current job.
    ///
    /// Stale completions are discarded along the way. Returns `None` when no
    /// session is waiting, or the worker has stopped.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        while self.pending() > 0 {
            let response = self.router.next_response().await?;
            if let Some(event) = self.route(response) {
                return Some(event);
            }
        }
        None
    }

    /// Deliver one worker response to the session it belongs to.
    ///
    /// Returns `None` if the response is stale or its session is gone.
    pub fn route(&mut self, response: WorkerResponse) -> Option<SessionEvent> {
        let job = response.id();
        let Some(session) = self.sessions.get_mut(&job.session) else {
            debug!("Discarding result {job} for a removed session");
            return None;
        };
        match session.complete(response, &self.overlay) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!("Discarding result: {e}");
                None
            }
        }
    }

    /// Final images of every `Ready` session, in the order they were added.
    #[must_use]
    pub fn ready_outputs(&self) -> Vec<(u64, &RgbaImage)> {
        self.sessions
            .values()
            .filter(|s| *s.state() == SessionState::Ready)
            .filter_map(|s| s.output().map(|img| (s.id(), img)))
            .collect()
    }

    /// Stop the kernel worker.
    pub fn shutdown(self) {
        self.router.shutdown();
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_session;
        self.next_session += 1;
        id
    }
}

fn unknown_session(session: u64) -> Error {
    Error::InvalidConfig(format!("no session {session}"))
}
