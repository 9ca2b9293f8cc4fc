//! Capture device boundary.
//!
//! A device is acquired with fixed constraints and hands encoded audio to a
//! caller-supplied sink in small increments. The handle it returns must be
//! finalized (flushes pending data) and then released (stops the tracks).

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// MIME type of every chunk produced by a capture device.
pub const OPUS_WEBM_MIME: &str = "audio/webm;codecs=opus";

/// Receives each incremental chunk of encoded audio, in capture order.
pub type ChunkSink = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Constraints negotiated with the input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub channels: u16,
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Interval at which buffered audio is handed to the sink
    pub timeslice: Duration,
    /// Encoder bitrate in bits per second
    pub bitrate: u32,
}

impl CaptureConstraints {
    /// Raw mono 16 kHz speech with every DSP stage disabled.
    ///
    /// The verification service models unprocessed audio, so echo
    /// cancellation, noise suppression and gain control must stay off.
    pub const fn voice() -> Self {
        Self {
            channels: 1,
            sample_rate: 16_000,
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
            timeslice: Duration::from_millis(100),
            bitrate: 128_000,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self::voice()
    }
}

/// An audio input that can be exclusively acquired for one recording.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Opens the device and starts delivering chunks to `sink`.
    ///
    /// # Errors
    /// - If permission is denied, no device exists, or it is already in use
    async fn acquire(
        &self,
        constraints: CaptureConstraints,
        sink: ChunkSink,
    ) -> anyhow::Result<Box<dyn CaptureHandle>>;
}

/// Exclusive handle on an acquired device.
#[async_trait]
pub trait CaptureHandle: Send {
    /// Stops capturing and waits until every queued chunk reached the sink.
    async fn finalize(&mut self) -> anyhow::Result<()>;

    /// Stops all underlying tracks. Consumes the handle.
    fn release(self: Box<Self>);
}
