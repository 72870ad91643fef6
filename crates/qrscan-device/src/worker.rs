//! Continuous decode worker
//!
//! Camera callbacks push frames through a [`FrameSink`]; the worker decodes
//! them on the blocking pool, one at a time. While a decode is running the
//! newest frame waits in a single pending slot and anything older is dropped,
//! so memory never exceeds one in-flight frame plus one pending frame and a
//! slow decoder never builds a backlog.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use qrscan_core::prelude::*;
use qrscan_core::{BarcodeResult, Rect};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::decoder::{decode_with_invert, Decoder};
use crate::frame::Frame;

/// Receives every non-empty decode outcome.
///
/// Called from a runtime worker thread, never from the control loop.
pub trait ResultSink: Send + Sync + 'static {
    fn deliver(&self, results: Vec<BarcodeResult>);
}

/// Per-frame decode settings, read when a frame starts decoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Only this region of the preview is decoded
    pub framing: Option<Rect>,
    /// Retry on the luminance-inverted frame when nothing is found
    pub invert: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub submitted: u64,
    pub superseded: u64,
    pub decoded: u64,
}

struct WorkerShared {
    pending: Mutex<Option<Frame>>,
    wake: Notify,
    closed: AtomicBool,
    options: RwLock<DecodeOptions>,
    submitted: AtomicU64,
    superseded: AtomicU64,
    decoded: AtomicU64,
}

impl WorkerShared {
    fn pending(&self) -> MutexGuard<'_, Option<Frame>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn options(&self) -> DecodeOptions {
        *self.options.read().unwrap_or_else(|e| e.into_inner())
    }

    fn update_options(&self, f: impl FnOnce(&mut DecodeOptions)) {
        let mut options = self.options.write().unwrap_or_else(|e| e.into_inner());
        f(&mut options);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Producer handle given to the camera
#[derive(Clone)]
pub struct FrameSink {
    shared: Arc<WorkerShared>,
}

impl std::fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSink")
            .field("closed", &self.shared.is_closed())
            .finish()
    }
}

impl FrameSink {
    /// Offer a frame for decoding. Never blocks on the decoder.
    ///
    /// Replaces any frame still waiting for the worker. Returns `false`
    /// once the worker has shut down.
    pub fn submit(&self, frame: Frame) -> bool {
        if self.shared.is_closed() {
            return false;
        }

        let replaced = self.shared.pending().replace(frame).is_some();
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.shared.superseded.fetch_add(1, Ordering::Relaxed);
            trace!("pending frame superseded");
        }
        self.shared.wake.notify_one();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

/// Single-flight decoder loop bound to one camera session
pub struct DecodeWorker {
    shared: Arc<WorkerShared>,
    task: JoinHandle<()>,
}

impl DecodeWorker {
    /// Start the worker on the current tokio runtime
    pub fn spawn(decoder: Arc<dyn Decoder>, sink: Arc<dyn ResultSink>) -> Self {
        Self::spawn_with(decoder, sink, DecodeOptions::default())
    }

    pub fn spawn_with(
        decoder: Arc<dyn Decoder>,
        sink: Arc<dyn ResultSink>,
        options: DecodeOptions,
    ) -> Self {
        let shared = Arc::new(WorkerShared {
            pending: Mutex::new(None),
            wake: Notify::new(),
            closed: AtomicBool::new(false),
            options: RwLock::new(options),
            submitted: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
            decoded: AtomicU64::new(0),
        });

        debug!("decode worker starting with {} backend", decoder.name());
        let task = tokio::spawn(run(shared.clone(), decoder, sink));
        Self { shared, task }
    }

    pub fn frame_sink(&self) -> FrameSink {
        FrameSink {
            shared: self.shared.clone(),
        }
    }

    /// Restrict decoding to a region of the preview, `None` for the whole frame
    pub fn set_framing(&self, framing: Option<Rect>) {
        self.shared.update_options(|o| o.framing = framing);
    }

    pub fn set_invert(&self, invert: bool) {
        self.shared.update_options(|o| o.invert = invert);
    }

    pub fn options(&self) -> DecodeOptions {
        self.shared.options()
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            submitted: self.shared.submitted.load(Ordering::Relaxed),
            superseded: self.shared.superseded.load(Ordering::Relaxed),
            decoded: self.shared.decoded.load(Ordering::Relaxed),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.is_closed()
    }

    /// Stop accepting frames and drop whatever is pending.
    ///
    /// A decode already running on the blocking pool finishes, but its
    /// results are discarded.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.pending().take();
        self.task.abort();
        debug!("decode worker shut down");
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(shared: Arc<WorkerShared>, decoder: Arc<dyn Decoder>, sink: Arc<dyn ResultSink>) {
    loop {
        shared.wake.notified().await;
        if shared.is_closed() {
            break;
        }

        let Some(frame) = shared.pending().take() else {
            continue;
        };

        let options = shared.options();
        let decoder = decoder.clone();
        let outcome =
            tokio::task::spawn_blocking(move || decode_frame(decoder.as_ref(), frame, options))
                .await;

        if shared.is_closed() {
            break;
        }

        match outcome {
            Ok(Ok(results)) => {
                shared.decoded.fetch_add(1, Ordering::Relaxed);
                if !results.is_empty() {
                    sink.deliver(results);
                }
            }
            Ok(Err(e)) => warn!("frame decode failed: {}", e),
            Err(e) => error!("decode task panicked: {}", e),
        }
    }
}

fn decode_frame(
    decoder: &dyn Decoder,
    frame: Frame,
    options: DecodeOptions,
) -> Result<Vec<BarcodeResult>> {
    let frame = match options.framing {
        Some(region) => match frame.crop(&region) {
            Some(cropped) => cropped,
            None => return Ok(Vec::new()),
        },
        None => frame,
    };
    decode_with_invert(decoder, &frame, options.invert)
}
