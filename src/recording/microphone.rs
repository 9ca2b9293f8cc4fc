//! Microphone capture through cpal, encoded to Opus/WebM by ffmpeg.
//!
//! The cpal stream lives on its own thread (streams are not `Send`) and
//! pushes mono PCM into a channel. A pump task feeds that PCM to an ffmpeg
//! child, and a reader task slices the encoder's WebM output into chunks
//! for the sink at the configured timeslice.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::process::Stdio;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::device::{CaptureConstraints, CaptureDevice, CaptureHandle, ChunkSink};
use super::ffmpeg::{encoder_args, find_ffmpeg};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// System audio input, selected by name, index or "default".
///
/// cpal applies no echo cancellation, noise suppression or gain control, so
/// the DSP constraints are satisfied by construction. Channel count and
/// sample rate are enforced by the encoder, which resamples from the
/// device's native format.
pub struct Microphone {
    /// Device name, numeric index, or "default" for the system default
    device_name: String,
}

impl Microphone {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
        }
    }
}

#[async_trait]
impl CaptureDevice for Microphone {
    async fn acquire(
        &self,
        constraints: CaptureConstraints,
        sink: ChunkSink,
    ) -> Result<Box<dyn CaptureHandle>> {
        let (pcm_tx, pcm_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let device_name = self.device_name.clone();
        let requested_rate = constraints.sample_rate;

        let capture_thread = thread::Builder::new()
            .name("voicegate-capture".to_string())
            .spawn(move || run_capture(&device_name, requested_rate, pcm_tx, ready_tx, stop_rx))
            .map_err(|e| anyhow!("Failed to spawn capture thread: {e}"))?;

        let device_rate = match ready_rx.await {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = capture_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = capture_thread.join();
                return Err(anyhow!("Capture thread exited before the device opened"));
            }
        };

        // From here on, dropping `handle` tears down whatever was started.
        let mut handle = MicrophoneHandle {
            stop_tx: Some(stop_tx),
            capture_thread: Some(capture_thread),
            encoder: None,
            pump: None,
            reader: None,
        };

        let mut encoder = spawn_encoder(device_rate, &constraints)?;
        let stdin = encoder
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Encoder stdin unavailable"))?;
        let stdout = encoder
            .stdout
            .take()
            .ok_or_else(|| anyhow!("Encoder stdout unavailable"))?;
        handle.encoder = Some(encoder);
        handle.pump = Some(tokio::spawn(pump_pcm(pcm_rx, stdin)));
        handle.reader = Some(tokio::spawn(forward_chunks(
            stdout,
            sink,
            constraints.timeslice,
        )));

        tracing::debug!(
            "Audio capture started: device {}Hz, encoding {}Hz mono at {} bps",
            device_rate,
            constraints.sample_rate,
            constraints.bitrate
        );
        Ok(Box::new(handle))
    }
}

/// Live capture pipeline: cpal thread → PCM pump → ffmpeg → chunk reader.
struct MicrophoneHandle {
    stop_tx: Option<std_mpsc::Sender<()>>,
    capture_thread: Option<thread::JoinHandle<()>>,
    encoder: Option<Child>,
    pump: Option<JoinHandle<Result<()>>>,
    reader: Option<JoinHandle<Result<()>>>,
}

impl MicrophoneHandle {
    /// Asks the capture thread to drop its stream, returning the thread to join.
    fn request_stop(&mut self) -> Option<thread::JoinHandle<()>> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.capture_thread.take()
    }

    fn shutdown(&mut self) {
        if let Some(capture_thread) = self.request_stop() {
            let _ = capture_thread.join();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut encoder) = self.encoder.take() {
            let _ = encoder.start_kill();
        }
    }
}

#[async_trait]
impl CaptureHandle for MicrophoneHandle {
    async fn finalize(&mut self) -> Result<()> {
        if let Some(capture_thread) = self.request_stop() {
            tokio::task::spawn_blocking(move || capture_thread.join())
                .await?
                .map_err(|_| anyhow!("Capture thread panicked"))?;
        }

        // The stream is gone, so the PCM channel closes and the pump closes
        // the encoder's stdin. The reader then drains ffmpeg until EOF.
        if let Some(pump) = self.pump.take() {
            pump.await??;
        }
        if let Some(reader) = self.reader.take() {
            reader.await??;
        }
        if let Some(mut encoder) = self.encoder.take() {
            let status = encoder.wait().await?;
            if !status.success() {
                return Err(anyhow!("Audio encoding failed: ffmpeg exited with {status}"));
            }
        }

        tracing::debug!("Audio capture finalized");
        Ok(())
    }

    fn release(mut self: Box<Self>) {
        self.shutdown();
        tracing::debug!("Audio device released");
    }
}

impl Drop for MicrophoneHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Body of the capture thread.
///
/// Reports the device's native sample rate (or the open error) through
/// `ready_tx`, then keeps the stream alive until a stop is requested.
fn run_capture(
    device_name: &str,
    requested_rate: u32,
    pcm_tx: mpsc::UnboundedSender<Vec<i16>>,
    ready_tx: oneshot::Sender<Result<u32>>,
    stop_rx: std_mpsc::Receiver<()>,
) {
    let (stream, device_rate) = match open_stream(device_name, requested_rate, pcm_tx) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if ready_tx.send(Ok(device_rate)).is_err() {
        return;
    }

    // Returns on an explicit stop or when the handle is dropped.
    let _ = stop_rx.recv();
    drop(stream);
    tracing::debug!("Audio stream closed");
}

fn open_stream(
    device_name: &str,
    requested_rate: u32,
    pcm_tx: mpsc::UnboundedSender<Vec<i16>>,
) -> Result<(cpal::Stream, u32)> {
    let device = suppress_alsa_warnings(|| {
        let host = cpal::default_host();

        if device_name == "default" {
            host.default_input_device()
                .ok_or_else(|| anyhow!("No audio input device available"))
        } else {
            find_device_by_name(&host, device_name)
        }
    })?;

    let name = device
        .name()
        .unwrap_or_else(|_| "Unknown device".to_string());
    tracing::info!("Recording device: {}", name);

    let supported = device
        .default_input_config()
        .map_err(|e| anyhow!("Failed to query input configuration: {e}"))?;
    let device_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;

    if device_rate != requested_rate {
        tracing::debug!(
            "Device runs at {}Hz, encoder resamples to {}Hz",
            device_rate,
            requested_rate
        );
    }

    let config: cpal::StreamConfig = supported.config();
    let stream = match supported.sample_format() {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = pcm_tx.send(downmix(data, channels));
            },
            log_stream_error,
            None,
        )?,
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let pcm: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                let _ = pcm_tx.send(downmix(&pcm, channels));
            },
            log_stream_error,
            None,
        )?,
        other => return Err(anyhow!("Unsupported sample format: {other:?}")),
    };

    stream.play()?;
    Ok((stream, device_rate))
}

fn log_stream_error(err: cpal::StreamError) {
    tracing::error!("Audio stream error: {}", err);
}

/// Converts interleaved multi-channel audio to mono by averaging each frame.
pub(crate) fn downmix(data: &[i16], channels: usize) -> Vec<i16> {
    match channels {
        0 | 1 => data.to_vec(),
        _ => data
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect(),
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn spawn_encoder(input_rate: u32, constraints: &CaptureConstraints) -> Result<Child> {
    let ffmpeg = find_ffmpeg()?;
    let child = Command::new(&ffmpeg)
        .args(encoder_args(input_rate, constraints))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| anyhow!("Failed to start ffmpeg encoder: {e}"))?;

    tracing::debug!("Encoder started: {}", ffmpeg.display());
    Ok(child)
}

/// Writes captured PCM into the encoder until the capture stream closes.
async fn pump_pcm(
    mut pcm_rx: mpsc::UnboundedReceiver<Vec<i16>>,
    mut stdin: ChildStdin,
) -> Result<()> {
    while let Some(samples) = pcm_rx.recv().await {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        stdin
            .write_all(&bytes)
            .await
            .map_err(|e| anyhow!("Failed to feed audio encoder: {e}"))?;
    }

    stdin.flush().await?;
    drop(stdin);
    Ok(())
}

/// Hands encoder output to the sink once per timeslice, then flushes the rest at EOF.
async fn forward_chunks(
    mut stdout: ChildStdout,
    sink: ChunkSink,
    timeslice: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(timeslice);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending = Vec::new();
    let mut buf = vec![0u8; 8192];

    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => {
                let n = read.map_err(|e| anyhow!("Failed to read encoder output: {e}"))?;
                if n == 0 {
                    break;
                }
                pending.extend_from_slice(&buf[..n]);
            }
            _ = ticker.tick() => {
                if !pending.is_empty() {
                    sink(std::mem::take(&mut pending));
                }
            }
        }
    }

    if !pending.is_empty() {
        sink(pending);
    }
    Ok(())
}

/// Finds an audio input device by name or numeric index.
///
/// # Errors
/// - If no device with the specified name/index is found
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    if let Ok(index) = device_spec.parse::<usize>() {
        let mut devices: Vec<_> = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
            .collect();

        if index < devices.len() {
            return Ok(devices.swap_remove(index));
        }
        return Err(anyhow!(
            "Device index {} is out of range (0-{})",
            index,
            devices.len().saturating_sub(1)
        ));
    }

    let devices = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;

    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_spec {
                return Ok(device);
            }
        }
    }

    Err(anyhow!(
        "Audio input device '{device_spec}' not found. Use 'voicegate list-devices' to see available devices."
    ))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
#[cfg(target_os = "linux")]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// ALSA only exists on Linux; elsewhere this just runs the closure.
#[cfg(not(target_os = "linux"))]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}
