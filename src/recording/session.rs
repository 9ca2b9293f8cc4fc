//! Recording session lifecycle.
//!
//! A session exclusively owns one capture handle while recording, collects
//! the chunks the device delivers, and optionally runs a countdown that stops
//! the recording on its own. State changes are published on a watch channel
//! so any front end can follow along without polling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::device::{CaptureConstraints, CaptureDevice, CaptureHandle, ChunkSink};
use crate::error::AuthError;

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Lifecycle state of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    /// Capture is being finalized; the handle is no longer reachable.
    Stopping,
}

/// Point-in-time view of a session, published on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub chunk_count: usize,
    /// Seconds left before the automatic stop, while a countdown runs
    pub countdown: Option<u32>,
}

struct Inner {
    state: SessionState,
    handle: Option<Box<dyn CaptureHandle>>,
    countdown_task: Option<JoinHandle<()>>,
    remaining: Option<u32>,
    chunks: Vec<Vec<u8>>,
    /// Chunks delivered while the acquisition was still in flight
    staged: Vec<Vec<u8>>,
    /// Incremented per acquisition so late chunks from an old handle are dropped
    generation: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    notify: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self) {
        let snapshot = {
            let inner = self.lock();
            SessionSnapshot {
                state: inner.state,
                chunk_count: inner.chunks.len(),
                countdown: inner.remaining,
            }
        };
        self.notify.send_replace(snapshot);
    }

    fn sink(self: &Arc<Self>, generation: u64) -> ChunkSink {
        let shared = Arc::downgrade(self);
        Arc::new(move |chunk: Vec<u8>| {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            if chunk.is_empty() {
                return;
            }
            {
                let mut inner = shared.lock();
                if inner.generation != generation {
                    return;
                }
                match inner.state {
                    SessionState::Idle => inner.staged.push(chunk),
                    SessionState::Recording | SessionState::Stopping => inner.chunks.push(chunk),
                }
            }
            shared.publish();
        })
    }

    fn set_remaining(&self, remaining: u32) {
        self.lock().remaining = Some(remaining);
        self.publish();
    }

    /// Stops a recording in progress. No-op unless currently `Recording`.
    ///
    /// The countdown calls this with `cancel_countdown = false`: it detaches
    /// its own task handle instead of aborting itself mid-stop.
    async fn stop(&self, cancel_countdown: bool) -> Result<(), AuthError> {
        let (handle, countdown_task) = {
            let mut inner = self.lock();
            if inner.state != SessionState::Recording {
                return Ok(());
            }
            inner.state = SessionState::Stopping;
            (inner.handle.take(), inner.countdown_task.take())
        };

        if let Some(task) = countdown_task {
            if cancel_countdown {
                task.abort();
                tracing::debug!("Countdown cancelled");
            }
        }
        self.publish();

        let finalized = match handle {
            Some(mut handle) => {
                let result = handle.finalize().await;
                handle.release();
                result
            }
            None => Ok(()),
        };

        let chunk_count = {
            let mut inner = self.lock();
            inner.state = SessionState::Idle;
            inner.remaining = None;
            inner.chunks.len()
        };
        self.publish();

        match finalized {
            Ok(()) => {
                tracing::info!("Recording stopped with {} chunks", chunk_count);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to finalize capture: {}", e);
                Err(AuthError::device(e))
            }
        }
    }
}

/// One microphone recording at a time, owned by a single view.
pub struct RecordingSession {
    device: Arc<dyn CaptureDevice>,
    constraints: CaptureConstraints,
    countdown_from: Option<u32>,
    shared: Arc<Shared>,
}

impl RecordingSession {
    pub fn new(device: Arc<dyn CaptureDevice>, constraints: CaptureConstraints) -> Self {
        let (notify, _) = watch::channel(SessionSnapshot {
            state: SessionState::Idle,
            chunk_count: 0,
            countdown: None,
        });

        Self {
            device,
            constraints,
            countdown_from: None,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: SessionState::Idle,
                    handle: None,
                    countdown_task: None,
                    remaining: None,
                    chunks: Vec::new(),
                    staged: Vec::new(),
                    generation: 0,
                }),
                notify,
            }),
        }
    }

    /// Stops the recording automatically after `seconds`, ticking once per second.
    pub fn with_countdown(mut self, seconds: u32) -> Self {
        self.countdown_from = Some(seconds);
        self
    }

    /// Acquires the device and begins accumulating chunks.
    ///
    /// Prior chunks are discarded only once the device is acquired. Calling
    /// this while a recording is active or stopping does nothing.
    ///
    /// # Errors
    /// - `AuthError::Device` if the device cannot be acquired; state is unchanged
    pub async fn start(&mut self) -> Result<(), AuthError> {
        let generation = {
            let mut inner = self.shared.lock();
            if inner.state != SessionState::Idle {
                tracing::debug!("Start ignored: session is {:?}", inner.state);
                return Ok(());
            }
            inner.generation += 1;
            inner.staged.clear();
            inner.generation
        };

        let sink = self.shared.sink(generation);
        let handle = match self.device.acquire(self.constraints, sink).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Failed to acquire capture device: {}", e);
                let mut inner = self.shared.lock();
                inner.generation += 1;
                inner.staged.clear();
                return Err(AuthError::device(e));
            }
        };

        {
            let mut inner = self.shared.lock();
            inner.chunks = std::mem::take(&mut inner.staged);
            inner.state = SessionState::Recording;
            inner.handle = Some(handle);

            if let Some(seconds) = self.countdown_from {
                inner.remaining = Some(seconds);
                inner.countdown_task = Some(tokio::spawn(run_countdown(
                    Arc::clone(&self.shared),
                    seconds,
                )));
            }
        }
        self.shared.publish();

        tracing::info!("Recording started");
        Ok(())
    }

    /// Stops the recording and waits for the device to flush and release.
    ///
    /// Returns immediately when not recording, including while another stop
    /// is still finalizing.
    pub async fn stop(&self) -> Result<(), AuthError> {
        self.shared.stop(true).await
    }

    /// Forced stop for disposal: cancels the countdown and releases the device.
    pub async fn teardown(&self) -> Result<(), AuthError> {
        let countdown_task = self.shared.lock().countdown_task.take();
        if let Some(task) = countdown_task {
            task.abort();
        }
        self.shared.stop(true).await
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Copy of the chunks collected so far, in delivery order.
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.shared.lock().chunks.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.notify.subscribe()
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        if let Some(task) = inner.countdown_task.take() {
            task.abort();
        }
        if let Some(handle) = inner.handle.take() {
            tracing::debug!("Session dropped while recording; releasing device");
            handle.release();
        }
        inner.remaining = None;
        if inner.state == SessionState::Recording {
            inner.state = SessionState::Idle;
        }
    }
}

async fn run_countdown(shared: Arc<Shared>, from: u32) {
    let start = tokio::time::Instant::now() + COUNTDOWN_TICK;
    let mut ticker = tokio::time::interval_at(start, COUNTDOWN_TICK);
    let mut remaining = from;

    while remaining > 0 {
        ticker.tick().await;
        remaining -= 1;
        shared.set_remaining(remaining);
    }

    tracing::info!("Minimum recording time reached, stopping automatically");
    if let Err(e) = shared.stop(false).await {
        tracing::warn!("Automatic stop failed: {}", e);
    }
}
