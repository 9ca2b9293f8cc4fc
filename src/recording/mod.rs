//! Audio recording feature for voicegate.
//!
//! Provides the capture device boundary, the microphone implementation and
//! the recording session lifecycle shared by the login and registration views.

pub mod device;
pub mod ffmpeg;
pub mod microphone;
pub mod session;

pub use device::{CaptureConstraints, CaptureDevice, CaptureHandle, ChunkSink, OPUS_WEBM_MIME};
pub use microphone::Microphone;
pub use session::{RecordingSession, SessionSnapshot, SessionState};
