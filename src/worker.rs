//! The isolated kernel context.
//!
//! One dedicated thread drains the request queue in submission order and
//! answers every `ProcessImage` with exactly one response. It exits when the
//! request sender is dropped or nobody is listening for responses anymore.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::WatermarkEngine;
use crate::protocol::{Job, WorkerRequest, WorkerResponse};

const THREAD_NAME: &str = "unblend-kernel";

/// Start the kernel thread.
pub(crate) fn spawn(
    requests: mpsc::Receiver<WorkerRequest>,
    responses: mpsc::UnboundedSender<WorkerResponse>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || run(requests, &responses))
}

fn run(
    mut requests: mpsc::Receiver<WorkerRequest>,
    responses: &mpsc::UnboundedSender<WorkerResponse>,
) {
    let mut engine: Option<WatermarkEngine> = None;

    while let Some(request) = requests.blocking_recv() {
        match request {
            WorkerRequest::InitMasks(masks) => {
                if engine.is_some() {
                    warn!("Ignoring repeated mask initialization");
                    continue;
                }
                debug!("Kernel masks installed");
                engine = Some(WatermarkEngine::new(masks));
            }
            WorkerRequest::ProcessImage(job) => {
                let response = match &engine {
                    Some(engine) => handle(engine, job),
                    None => WorkerResponse::ProcessError {
                        id: job.id,
                        message: "masks not initialized".to_string(),
                    },
                };
                if responses.send(response).is_err() {
                    debug!("Response channel closed, stopping kernel");
                    break;
                }
            }
        }
    }

    debug!("Kernel worker exiting");
}

/// Run one job, turning errors and panics into `ProcessError`.
pub(crate) fn handle(engine: &WatermarkEngine, job: Job) -> WorkerResponse {
    let Job { id, image, config } = job;
    debug!(
        "Processing job {id} ({}x{}, mode={}, gain={:.2})",
        image.width(),
        image.height(),
        config.force_mode,
        config.alpha_gain
    );

    match panic::catch_unwind(AssertUnwindSafe(|| engine.process(image, &config))) {
        Ok(Ok(image)) => WorkerResponse::ProcessComplete { id, image },
        Ok(Err(e)) => {
            warn!("Job {id} failed: {e}");
            WorkerResponse::ProcessError {
                id,
                message: e.to_string(),
            }
        }
        Err(_) => {
            warn!("Job {id} panicked inside the kernel");
            WorkerResponse::ProcessError {
                id,
                message: "internal fault in kernel".to_string(),
            }
        }
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

    fn job(id: JobId, image: PixelBuffer) -> Job {
        Job {
            id,
            image,
            config: ProcessingConfig::default(),
        }
    }

    #[test]
    fn handle_echoes_id_on_success() {
        let engine = WatermarkEngine::new(test_masks());
        let image = PixelBuffer::from(RgbaImage::from_pixel(300, 300, Rgba([1, 2, 3, 255])));
        let response = handle(&engine, job(JobId::new(4, 1), image));
        assert!(matches!(
            response,
            WorkerResponse::ProcessComplete { id, .. } if id == JobId::new(4, 1)
        ));
    }

    #[test]
    fn handle_reports_bad_config_as_error() {
        let engine = WatermarkEngine::new(test_masks());
        let mut bad = job(JobId::new(1, 1), PixelBuffer::from(RgbaImage::new(100, 100)));
        bad.config.alpha_gain = 0.0;
        match handle(&engine, bad) {
            WorkerResponse::ProcessError { message, .. } => assert!(message.contains("gain")),
            WorkerResponse::ProcessComplete { .. } => panic!("expected an error"),
        }
    }

    #[test]
    fn jobs_before_init_fail() {
        let (req_tx, req_rx) = mpsc::channel(4);
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel();
        let handle = spawn(req_rx, resp_tx).unwrap();

        req_tx
            .blocking_send(WorkerRequest::ProcessImage(job(
                JobId::new(1, 1),
                PixelBuffer::from(RgbaImage::new(200, 200)),
            )))
            .unwrap();
        req_tx
            .blocking_send(WorkerRequest::InitMasks(test_masks()))
            .unwrap();
        req_tx
            .blocking_send(WorkerRequest::ProcessImage(job(
                JobId::new(1, 2),
                PixelBuffer::from(RgbaImage::new(200, 200)),
            )))
            .unwrap();
        drop(req_tx);
        handle.join().unwrap();

        assert!(matches!(
            resp_rx.try_recv().unwrap(),
            WorkerResponse::ProcessError { message, .. } if message.contains("not initialized")
        ));
        assert!(matches!(
            resp_rx.try_recv().unwrap(),
            WorkerResponse::ProcessComplete { .. }
        ));
        assert!(resp_rx.try_recv().is_err());
    }
}
