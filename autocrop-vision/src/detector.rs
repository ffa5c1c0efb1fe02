use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::RgbaImage;

use crate::error::DetectorError;
use crate::face::{best_face, FaceDescriptor};

/// How long a caller waits for a detector before treating the image as faceless.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed capability configuration of a detector backend.
///
/// Chosen once when the backend is built; nothing in the processing session
/// changes it per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorOptions {
    /// Prefer accuracy over speed.
    pub accurate: bool,
    /// Report every contour, not only the face outline.
    pub all_contours: bool,
    /// Keep face identities stable across consecutive images.
    pub tracking: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            accurate: true,
            all_contours: true,
            tracking: true,
        }
    }
}

/// Face detection capability consumed by the processing pipeline.
///
/// Implementations return the single best face, `Ok(None)` when the image
/// has no face, and [`DetectorError::Timeout`] when no answer arrived within
/// `timeout`.
pub trait FaceDetector: Send + Sync {
    fn locate(
        &self,
        image: &RgbaImage,
        timeout: Duration,
    ) -> Result<Option<FaceDescriptor>, DetectorError>;
}

/// Adapter that runs a blocking, multi-face backend on a worker thread and
/// gives up once the deadline passes.
///
/// The backend receives its own copy of the image. A backend that overruns
/// keeps running in the background, holding that copy, and its late result
/// is dropped. Threads cannot be cancelled, so a backend that never returns
/// leaks one worker per call; [`DeadlineDetector::in_flight`] exposes how
/// many are still running.
pub struct DeadlineDetector<F> {
    backend: Arc<F>,
    options: DetectorOptions,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight count when a worker finishes, panics included.
struct WorkerGuard(Arc<AtomicUsize>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<F> DeadlineDetector<F>
where
    F: Fn(&RgbaImage, &DetectorOptions) -> Result<Vec<FaceDescriptor>, DetectorError>
        + Send
        + Sync
        + 'static,
{
    pub fn new(backend: F, options: DetectorOptions) -> Self {
        Self {
            backend: Arc::new(backend),
            options,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn options(&self) -> &DetectorOptions {
        &self.options
    }

    /// Workers that have not returned yet, including ones whose caller
    /// already gave up.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl<F> FaceDetector for DeadlineDetector<F>
where
    F: Fn(&RgbaImage, &DetectorOptions) -> Result<Vec<FaceDescriptor>, DetectorError>
        + Send
        + Sync
        + 'static,
{
    fn locate(
        &self,
        image: &RgbaImage,
        timeout: Duration,
    ) -> Result<Option<FaceDescriptor>, DetectorError> {
        let (tx, rx) = mpsc::channel();
        let backend = Arc::clone(&self.backend);
        let options = self.options.clone();
        let image = image.clone();
        let guard = WorkerGuard(Arc::clone(&self.in_flight));
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        thread::Builder::new()
            .name("face-detect".to_string())
            .spawn(move || {
                let _guard = guard;
                // The receiver is gone if the caller already timed out.
                let _ = tx.send((*backend)(&image, &options));
            })
            .map_err(|e| DetectorError::Unavailable(format!("spawn detector thread: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => {
                let faces = result?;
                log::debug!("detector returned {} candidate face(s)", faces.len());
                Ok(best_face(faces))
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "detector gave no answer within {:?}, {} worker(s) still running",
                    timeout,
                    self.in_flight()
                );
                Err(DetectorError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(DetectorError::Unavailable(
                "detector thread exited without a result".to_string(),
            )),
        }
    }
}
