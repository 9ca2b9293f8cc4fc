//! Login view: record a sample, then ask the service who it belongs to.

use std::sync::Arc;

use super::controller::{Outcome, Phase, ViewController};
use crate::auth::{AuthAttempt, AuthClient};
use crate::recording::{CaptureConstraints, CaptureDevice, RecordingSession};

pub struct LoginView {
    controller: ViewController,
}

impl LoginView {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        constraints: CaptureConstraints,
        client: AuthClient,
    ) -> Self {
        let session = RecordingSession::new(device, constraints);
        Self {
            controller: ViewController::new(session, client),
        }
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    pub fn is_recording(&self) -> bool {
        self.controller.is_recording()
    }

    pub fn is_processing(&self) -> bool {
        self.controller.is_processing()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.controller.outcome()
    }

    pub fn can_toggle_recording(&self) -> bool {
        !self.controller.is_processing()
    }

    pub fn can_authenticate(&self) -> bool {
        !self.controller.is_processing()
            && !self.controller.is_recording()
            && self.controller.chunk_count() > 0
    }

    pub async fn toggle_recording(&mut self) {
        self.controller.toggle_recording().await;
    }

    /// Sends the recording for verification. Returns whether a request was issued.
    pub fn authenticate(&mut self) -> bool {
        self.controller.submit(AuthAttempt::login)
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
