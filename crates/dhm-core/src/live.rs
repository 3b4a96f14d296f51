//! Background live reconstruction
//!
//! A [`LiveSession`] owns a [`LiveReconstructionPipeline`] on a dedicated
//! worker thread. Each iteration pulls a frame from the [`FrameSource`],
//! applies any queued [`Command`]s, reconstructs, publishes the result to a
//! single-slot "latest frame" cell and hands it to the [`DisplaySink`].
//!
//! # Example
//!
//! ```rust,no_run
//! use dhm_core::live::{LiveConfig, LiveSession, LiveFrame};
//! use dhm_core::frame::RawFrame;
//! use dhm_core::params::OpticalParameters;
//! use dhm_core::reconstruction::LiveReconstructionPipeline;
//!
//! let pipeline = LiveReconstructionPipeline::new(OpticalParameters::default());
//! let source = || RawFrame::from_u8(64, 64, vec![0; 64 * 64]).ok();
//! let sink = |frame: &LiveFrame| println!("frame {}", frame.sequence);
//!
//! let session = LiveSession::start(pipeline, source, sink, LiveConfig::default()).unwrap();
//! // ... send commands, read session.latest_frame() ...
//! let pipeline = session.stop().unwrap();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::display::DisplayImage;
use crate::frame::RawFrame;
use crate::reconstruction::{Command, LiveReconstructionPipeline, ReconstructionOutput};
use crate::types::{HoloError, HoloResult};

/// Worker thread name
const THREAD_NAME: &str = "dhm-live";

/// Supplies hologram frames; `None` means the source is closed
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<RawFrame>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Option<RawFrame> + Send,
{
    fn next_frame(&mut self) -> Option<RawFrame> {
        self()
    }
}

/// Receives every reconstructed frame
pub trait DisplaySink: Send {
    fn present(&mut self, frame: &LiveFrame);
}

impl<F> DisplaySink for F
where
    F: FnMut(&LiveFrame) + Send,
{
    fn present(&mut self, frame: &LiveFrame) {
        self(frame)
    }
}

/// Reconstructed frame together with its rendered presentation
#[derive(Debug, Clone)]
pub struct LiveFrame {
    /// Monotonic frame counter, starting at 0
    pub sequence: u64,
    pub output: ReconstructionOutput,
    pub image: DisplayImage,
}

/// Worker loop timing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveConfig {
    /// Pause after each iteration
    pub frame_interval: Duration,
    /// Iterations per FPS measurement
    pub fps_batch: u32,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(10),
            fps_batch: 5,
        }
    }
}

impl LiveConfig {
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_fps_batch(mut self, batch: u32) -> Self {
        self.fps_batch = batch.max(1);
        self
    }
}

/// State shared between the handle and the worker
#[derive(Debug, Default)]
struct Shared {
    latest: Mutex<Option<Arc<LiveFrame>>>,
    last_error: Mutex<Option<HoloError>>,
    /// f64 bits; NaN until the first batch completes
    fps_bits: AtomicU64,
    frames: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            fps_bits: AtomicU64::new(f64::NAN.to_bits()),
            ..Default::default()
        }
    }

    fn record_error(&self, err: HoloError) {
        *lock(&self.last_error) = Some(err);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle to a running live reconstruction worker
pub struct LiveSession {
    commands: Sender<Command>,
    shared: Arc<Shared>,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<LiveReconstructionPipeline>>,
}

impl LiveSession {
    /// Move `pipeline` onto a new worker thread and start polling `source`
    pub fn start<S, D>(
        pipeline: LiveReconstructionPipeline,
        source: S,
        sink: D,
        config: LiveConfig,
    ) -> HoloResult<Self>
    where
        S: FrameSource + 'static,
        D: DisplaySink + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared::new());
        let stop_flag = Arc::new(AtomicBool::new(false));

        let worker_shared = Arc::clone(&shared);
        let worker_stop = Arc::clone(&stop_flag);
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || Self::worker_loop(pipeline, source, sink, rx, worker_shared, worker_stop, config))
            .map_err(|e| HoloError::Worker(format!("Failed to spawn thread: {}", e)))?;

        info!(
            interval_ms = config.frame_interval.as_millis() as u64,
            "Live reconstruction started"
        );

        Ok(Self {
            commands: tx,
            shared,
            stop_flag,
            handle: Some(handle),
        })
    }

    fn worker_loop<S: FrameSource, D: DisplaySink>(
        mut pipeline: LiveReconstructionPipeline,
        mut source: S,
        mut sink: D,
        commands: Receiver<Command>,
        shared: Arc<Shared>,
        stop_flag: Arc<AtomicBool>,
        config: LiveConfig,
    ) -> LiveReconstructionPipeline {
        let batch = config.fps_batch.max(1);
        let mut batch_start = Instant::now();
        let mut batch_count = 0u32;
        let mut sequence = 0u64;

        while !stop_flag.load(Ordering::Relaxed) {
            let Some(frame) = source.next_frame() else {
                info!("Frame source closed");
                break;
            };

            loop {
                match commands.try_recv() {
                    Ok(command) => {
                        if let Err(e) = pipeline.apply(command) {
                            warn!(error = %e, "Command rejected");
                            shared.record_error(e);
                        }
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            match pipeline.process_frame(&frame) {
                Ok(output) => {
                    let image = DisplayImage::render(&output, pipeline.log_scale());
                    let live = Arc::new(LiveFrame {
                        sequence,
                        output,
                        image,
                    });
                    sequence += 1;
                    *lock(&shared.latest) = Some(Arc::clone(&live));
                    shared.frames.fetch_add(1, Ordering::Relaxed);
                    sink.present(&live);
                }
                Err(e) => {
                    warn!(error = %e, "Frame reconstruction failed");
                    shared.record_error(e);
                }
            }

            batch_count += 1;
            if batch_count == batch {
                let elapsed = batch_start.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    let fps = f64::from(batch) / elapsed;
                    shared.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
                    debug!(fps, "Live frame rate");
                }
                batch_count = 0;
                batch_start = Instant::now();
            }

            thread::sleep(config.frame_interval);
        }

        info!(frames = sequence, "Live reconstruction stopped");
        pipeline
    }

    /// Queue a command for the next iteration
    pub fn send(&self, command: Command) -> HoloResult<()> {
        self.commands
            .send(command)
            .map_err(|_| HoloError::Worker("live worker has exited".to_string()))
    }

    /// Most recently published frame
    pub fn latest_frame(&self) -> Option<Arc<LiveFrame>> {
        lock(&self.shared.latest).clone()
    }

    /// Last measured frame rate
    pub fn fps(&self) -> Option<f64> {
        let fps = f64::from_bits(self.shared.fps_bits.load(Ordering::Relaxed));
        (!fps.is_nan()).then_some(fps)
    }

    pub fn frames_processed(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    /// Take the most recent command or frame error
    pub fn take_error(&self) -> Option<HoloError> {
        lock(&self.shared.last_error).take()
    }

    /// False once the worker has exited
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the worker and hand back the pipeline with its committed state
    pub fn stop(mut self) -> HoloResult<LiveReconstructionPipeline> {
        self.stop_flag.store(true, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| HoloError::Worker("live worker panicked".to_string())),
            None => Err(HoloError::Worker("live worker already stopped".to_string())),
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
