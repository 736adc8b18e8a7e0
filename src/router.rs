//! Hands jobs to the kernel worker and collects its replies.

use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::mask::MaskSet;
use crate::protocol::{Job, WorkerRequest, WorkerResponse};
use crate::worker;

/// Default number of jobs that may wait in the request queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 16;

/// Connection to the single kernel worker.
///
/// Submission never blocks a thread: when the queue is full, [`reserve`]
/// suspends until the worker frees a slot. Responses come back in whatever
/// order the worker produces them and are matched to sessions by
/// [`JobId`](crate::JobId), not by position.
///
/// [`reserve`]: JobRouter::reserve
pub struct JobRouter {
    requests: mpsc::Sender<WorkerRequest>,
    responses: mpsc::UnboundedReceiver<WorkerResponse>,
    worker: JoinHandle<()>,
}

impl JobRouter {
    /// Start the worker and install the masks before anything else is queued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the worker thread cannot be spawned, or
    /// [`Error::WorkerUnavailable`] if it stops before accepting the masks.
    pub fn start(masks: MaskSet, queue_depth: usize) -> Result<Self> {
        let (requests, request_rx) = mpsc::channel(queue_depth.max(1));
        let (response_tx, responses) = mpsc::unbounded_channel();
        let worker = worker::spawn(request_rx, response_tx)?;

        requests
            .try_send(WorkerRequest::InitMasks(masks))
            .map_err(|_| Error::WorkerUnavailable)?;
        info!("Kernel worker started (queue depth {})", queue_depth.max(1));

        Ok(Self {
            requests,
            responses,
            worker,
        })
    }

    /// Wait for room in the request queue.
    ///
    /// Dropping the future before it resolves leaves the queue untouched, so
    /// callers can reserve first and only then commit to a job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerUnavailable`] if the worker has exited.
    pub async fn reserve(&self) -> Result<JobSlot<'_>> {
        let permit = self
            .requests
            .reserve()
            .await
            .map_err(|_| Error::WorkerUnavailable)?;
        Ok(JobSlot { permit })
    }

    /// Queue a job for the worker.
    ///
    /// The job's pixel buffer moves to the worker; it comes back only in the
    /// matching [`WorkerResponse`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerUnavailable`] if the worker has exited.
    pub async fn submit(&self, job: Job) -> Result<()> {
        self.reserve().await?.submit(job);
        Ok(())
    }

    /// Wait for the next completion. Returns `None` once the worker is gone.
    pub async fn next_response(&mut self) -> Option<WorkerResponse> {
        self.responses.recv().await
    }

    /// Take a completion if one is already waiting.
    pub fn try_next_response(&mut self) -> Option<WorkerResponse> {
        self.responses.try_recv().ok()
    }

    /// Stop accepting jobs, let the worker drain its queue, and wait for it.
    ///
    /// Responses still buffered are dropped.
    pub fn shutdown(self) {
        let Self {
            requests,
            responses,
            worker,
        } = self;
        drop(requests);
        if worker.join().is_err() {
            warn!("Kernel worker panicked during shutdown");
        }
        drop(responses);
        info!("Kernel worker stopped");
    }

    /// A router whose queue is drained by the caller instead of a worker.
    #[cfg(test)]
    pub(crate) fn without_worker(
        queue_depth: usize,
    ) -> (
        Self,
        mpsc::Receiver<WorkerRequest>,
        mpsc::UnboundedSender<WorkerResponse>,
    ) {
        let (requests, request_rx) = mpsc::channel(queue_depth.max(1));
        let (response_tx, responses) = mpsc::unbounded_channel();
        let router = Self {
            requests,
            responses,
            worker: std::thread::spawn(|| {}),
        };
        (router, request_rx, response_tx)
    }
}

/// A reserved place in the request queue.
///
/// Sending through the slot cannot wait or fail; if the worker has gone by
/// then, its response simply never arrives.
pub struct JobSlot<'a> {
    permit: mpsc::Permit<'a, WorkerRequest>,
}

impl JobSlot<'_> {
    /// Hand the job to the worker.
    pub fn submit(self, job: Job) {
        let id = job.id;
        self.permit.send(WorkerRequest::ProcessImage(job));
        debug!("Submitted job {id}");
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::buffer::PixelBuffer;
    use crate::config::ProcessingConfig;
    use crate::mask::tests::test_masks;
    use crate::protocol::JobId;

    fn job(session: u64, generation: u64) -> Job {
        Job {
            id: JobId::new(session, generation),
            image: PixelBuffer::from(RgbaImage::from_pixel(200, 200, Rgba([90, 90, 90, 255]))),
            config: ProcessingConfig::default(),
        }
    }

    #[tokio::test]
    async fn completes_every_submitted_job() {
        let mut router = JobRouter::start(test_masks(), 1).unwrap();
        for session in 1..=3 {
            router.submit(job(session, 1)).await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            let response = router.next_response().await.unwrap();
            assert!(matches!(response, WorkerResponse::ProcessComplete { .. }));
            seen.push(response.id().session);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(router.try_next_response().is_none());
        router.shutdown();
    }

    #[tokio::test]
    async fn malformed_job_yields_process_error() {
        let mut router = JobRouter::start(test_masks(), 4).unwrap();
        let mut bad = job(7, 1);
        bad.config.alpha_gain = 4.0;
        router.submit(bad).await.unwrap();

        match router.next_response().await.unwrap() {
            WorkerResponse::ProcessError { id, message } => {
                assert_eq!(id, JobId::new(7, 1));
                assert!(!message.is_empty());
            }
            WorkerResponse::ProcessComplete { .. } => panic!("expected an error"),
        }
        router.shutdown();
    }

    #[tokio::test]
    async fn dropped_reservation_frees_its_place() {
        let (router, mut requests, _responses) = JobRouter::without_worker(1);
        drop(router.reserve().await.unwrap());
        router.submit(job(1, 1)).await.unwrap();

        tokio::select! {
            biased;
            _ = router.reserve() => panic!("queue should be full"),
            () = std::future::ready(()) => {}
        }

        match requests.recv().await.unwrap() {
            WorkerRequest::ProcessImage(job) => assert_eq!(job.id, JobId::new(1, 1)),
            WorkerRequest::InitMasks(_) => panic!("unexpected mask install"),
        }
        router.reserve().await.unwrap().submit(job(2, 1));
        assert!(matches!(
            requests.recv().await,
            Some(WorkerRequest::ProcessImage(job)) if job.id == JobId::new(2, 1)
        ));
        router.shutdown();
    }
}
