//! Registration view: pick a username, read the prompt phrase, enroll.

use std::sync::Arc;

use super::controller::{Outcome, Phase, ViewController};
use crate::auth::{AuthAttempt, AuthClient};
use crate::recording::{CaptureConstraints, CaptureDevice, RecordingSession};

/// Pangram covering every English vowel.
pub const VOWEL_PHRASE: &str = "Please say: 'The quick brown fox jumps over the lazy dog'";
pub const VOWEL_HINT: &str = "This helps us capture all vowel sounds";
pub const MIN_RECORDING_SECS: u32 = 5;

pub struct RegisterView {
    controller: ViewController,
    username: String,
    min_recording_secs: u32,
}

impl RegisterView {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        constraints: CaptureConstraints,
        client: AuthClient,
    ) -> Self {
        Self::with_min_recording(device, constraints, client, MIN_RECORDING_SECS)
    }

    pub fn with_min_recording(
        device: Arc<dyn CaptureDevice>,
        constraints: CaptureConstraints,
        client: AuthClient,
        min_recording_secs: u32,
    ) -> Self {
        let session = RecordingSession::new(device, constraints).with_countdown(min_recording_secs);
        Self {
            controller: ViewController::new(session, client),
            username: String::new(),
            min_recording_secs,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn can_edit_username(&self) -> bool {
        !self.controller.is_processing() && !self.controller.is_recording()
    }

    /// Replaces the username. Ignored while recording or processing.
    pub fn set_username(&mut self, username: impl Into<String>) -> bool {
        if !self.can_edit_username() {
            return false;
        }
        self.username = username.into();
        true
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    pub fn is_recording(&self) -> bool {
        self.controller.is_recording()
    }

    /// True after the recording stopped while the device is still flushing.
    pub fn is_stopping(&self) -> bool {
        self.controller.is_stopping()
    }

    pub fn is_processing(&self) -> bool {
        self.controller.is_processing()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.controller.outcome()
    }

    /// Seconds left before the recording stops on its own.
    ///
    /// Reads 0 from the automatic stop until the device is released.
    pub fn countdown(&self) -> u32 {
        self.controller
            .countdown()
            .unwrap_or(self.min_recording_secs)
    }

    pub fn min_recording_secs(&self) -> u32 {
        self.min_recording_secs
    }

    pub fn can_toggle_recording(&self) -> bool {
        !self.controller.is_processing()
    }

    pub fn can_register(&self) -> bool {
        !self.username.is_empty()
            && !self.controller.is_processing()
            && !self.controller.is_recording()
            && self.controller.chunk_count() > 0
    }

    pub async fn toggle_recording(&mut self) {
        self.controller.toggle_recording().await;
    }

    /// Sends the username and recording for enrollment. Returns whether a request was issued.
    pub fn register(&mut self) -> bool {
        let username = self.username.clone();
        self.controller
            .submit(|chunks| AuthAttempt::registration(&username, chunks))
    }

    pub async fn poll(&mut self) {
        self.controller.poll().await;
    }

    pub async fn settle(&mut self) {
        self.controller.settle().await;
    }

    pub async fn teardown(&mut self) {
        self.controller.teardown().await;
    }
}
