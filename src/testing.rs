//! Test doubles: a scripted capture device and a local stub service.

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::auth::AuthClient;
use crate::recording::{CaptureConstraints, CaptureDevice, CaptureHandle, ChunkSink};

/// Emits one numbered chunk per timeslice, and `TAIL` when finalized.
///
/// Switches script the failure and timing cases: failed acquire, failed
/// finalize, slow finalize, and a chunk delivered before `acquire` returns.
pub struct FakeDevice {
    acquired: AtomicUsize,
    finalized: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    fail_next: Mutex<Option<String>>,
    fail_finalize: Arc<AtomicBool>,
    finalize_delay: Mutex<Duration>,
    early_chunk: AtomicBool,
}

impl FakeDevice {
    pub const TAIL: &'static [u8] = b"tail";
    pub const EARLY: &'static [u8] = b"early";

    pub fn new() -> Self {
        Self {
            acquired: AtomicUsize::new(0),
            finalized: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
            fail_next: Mutex::new(None),
            fail_finalize: Arc::new(AtomicBool::new(false)),
            finalize_delay: Mutex::new(Duration::ZERO),
            early_chunk: AtomicBool::new(false),
        }
    }

    /// Makes every later finalize fail after the capture task has stopped.
    pub fn fail_finalize(&self) {
        self.fail_finalize.store(true, Ordering::SeqCst);
    }

    /// Delays finalize by `delay` before capture stops.
    pub fn slow_finalize(&self, delay: Duration) {
        *self.finalize_delay.lock().unwrap() = delay;
    }

    /// Delivers `EARLY` to the sink from inside `acquire`, before it returns.
    pub fn emit_during_acquire(&self) {
        self.early_chunk.store(true, Ordering::SeqCst);
    }

    /// Makes the next acquisition fail with `message`.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn finalized(&self) -> usize {
        self.finalized.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    async fn acquire(
        &self,
        constraints: CaptureConstraints,
        sink: ChunkSink,
    ) -> anyhow::Result<Box<dyn CaptureHandle>> {
        if self.early_chunk.load(Ordering::SeqCst) {
            sink(FakeDevice::EARLY.to_vec());
        }
        let failure = self.fail_next.lock().unwrap().take();
        if let Some(message) = failure {
            return Err(anyhow!(message));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let timeslice = constraints.timeslice;
        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + timeslice, timeslice);
            let mut n: u8 = 0;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        n = n.wrapping_add(1);
                        sink(vec![n]);
                    }
                    _ = &mut stop_rx => {
                        sink(FakeDevice::TAIL.to_vec());
                        break;
                    }
                }
            }
        });

        Ok(Box::new(FakeHandle {
            stop_tx: Some(stop_tx),
            task: Some(task),
            finalized: self.finalized.clone(),
            released: self.released.clone(),
            fail_finalize: self.fail_finalize.clone(),
            finalize_delay: *self.finalize_delay.lock().unwrap(),
        }))
    }
}

struct FakeHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    finalized: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    fail_finalize: Arc<AtomicBool>,
    finalize_delay: Duration,
}

#[async_trait]
impl CaptureHandle for FakeHandle {
    async fn finalize(&mut self) -> anyhow::Result<()> {
        if !self.finalize_delay.is_zero() {
            tokio::time::sleep(self.finalize_delay).await;
        }
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await?;
        }
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(anyhow!("encoder exited with status 1"));
        }
        self.finalized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(self: Box<Self>) {
        if let Some(task) = &self.task {
            task.abort();
        }
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Client for a stub service that bypasses any system proxy.
pub fn test_client(base_url: &str) -> AuthClient {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    AuthClient::new(base_url).with_http_client(http)
}
