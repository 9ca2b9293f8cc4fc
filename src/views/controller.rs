//! Shared orchestration of one recording session and one submission.
//!
//! Each view owns a controller. The controller enforces the view-level
//! guards: no recording toggle and no second submission while a submission
//! is in flight, and no submission while recording.

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::{AuthAttempt, AuthClient, AuthResult};
use crate::error::AuthError;
use crate::recording::{RecordingSession, SessionSnapshot, SessionState};

/// Status marker shown next to an outcome message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
}

/// The single outcome a view displays until the next action clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: Status,
    pub message: String,
}

impl Outcome {
    pub fn error(err: &AuthError) -> Self {
        Self {
            status: Status::Error,
            message: err.to_string(),
        }
    }

    /// Display form of a settled result. `Pending` has nothing to show.
    pub fn from_result(result: &AuthResult) -> Option<Self> {
        let message = result.message()?;
        let status = if result.is_success() {
            Status::Success
        } else {
            Status::Error
        };
        Some(Outcome { status, message })
    }
}

/// Phase of a view, derived from its session and submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Recording,
    Processing,
}

pub struct ViewController {
    session: RecordingSession,
    /// Latest published session state, read by the display accessors
    snapshot: watch::Receiver<SessionSnapshot>,
    client: AuthClient,
    inflight: Option<JoinHandle<AuthAttempt>>,
    outcome: Option<Outcome>,
}

impl ViewController {
    pub fn new(session: RecordingSession, client: AuthClient) -> Self {
        let snapshot = session.subscribe();
        Self {
            session,
            snapshot,
            client,
            inflight: None,
            outcome: None,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.is_processing() {
            Phase::Processing
        } else if self.snapshot.borrow().state == SessionState::Idle {
            Phase::Idle
        } else {
            Phase::Recording
        }
    }

    pub fn is_processing(&self) -> bool {
        self.inflight.is_some()
    }

    /// True while the session is recording or still finalizing.
    pub fn is_recording(&self) -> bool {
        self.snapshot.borrow().state != SessionState::Idle
    }

    /// True while a stop is flushing the device.
    pub fn is_stopping(&self) -> bool {
        self.snapshot.borrow().state == SessionState::Stopping
    }

    pub fn chunk_count(&self) -> usize {
        self.snapshot.borrow().chunk_count
    }

    pub fn countdown(&self) -> Option<u32> {
        self.snapshot.borrow().countdown
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Starts or stops the recording. Ignored while a submission is in flight.
    ///
    /// Starting clears the displayed outcome first. Device failures become
    /// the displayed outcome.
    pub async fn toggle_recording(&mut self) {
        if self.is_processing() {
            tracing::debug!("Record toggle ignored while processing");
            return;
        }

        let result = if self.session.state() == SessionState::Idle {
            self.outcome = None;
            self.session.start().await
        } else {
            self.session.stop().await
        };

        if let Err(err) = result {
            self.outcome = Some(Outcome::error(&err));
        }
    }

    /// Validates and dispatches a submission built from the current chunks.
    ///
    /// Returns `false` without issuing anything while processing or recording,
    /// or when `prepare` rejects the input (the rejection is displayed).
    pub fn submit<F>(&mut self, prepare: F) -> bool
    where
        F: FnOnce(&[Vec<u8>]) -> Result<AuthAttempt, AuthError>,
    {
        if self.is_processing() || self.is_recording() {
            tracing::debug!("Submission ignored: {:?}", self.phase());
            return false;
        }

        let attempt = match prepare(&self.session.chunks()) {
            Ok(attempt) => attempt,
            Err(err) => {
                tracing::debug!("Submission rejected locally: {}", err);
                self.outcome = Some(Outcome::error(&err));
                return false;
            }
        };

        tracing::info!(
            "Submitting {} bytes of audio{}",
            attempt.payload_len(),
            attempt
                .username()
                .map(|name| format!(" for {name}"))
                .unwrap_or_default()
        );

        self.outcome = None;
        let client = self.client.clone();
        self.inflight = Some(tokio::spawn(async move { client.run(attempt).await }));
        true
    }

    /// Records the outcome if the in-flight submission has finished.
    pub async fn poll(&mut self) {
        if self
            .inflight
            .as_ref()
            .is_some_and(|handle| handle.is_finished())
        {
            self.settle().await;
        }
    }

    /// Waits for the in-flight submission, if any, and records its outcome.
    pub async fn settle(&mut self) {
        let Some(handle) = self.inflight.take() else {
            return;
        };

        self.outcome = match handle.await {
            Ok(attempt) => Outcome::from_result(attempt.result()),
            Err(e) => {
                tracing::error!("Submission task failed: {}", e);
                Some(Outcome {
                    status: Status::Error,
                    message: format!("Submission failed: {e}"),
                })
            }
        };
    }

    /// Stops any recording and cancels the countdown before the view goes away.
    ///
    /// An in-flight submission is left to finish on its own; its result is discarded.
    pub async fn teardown(&mut self) {
        if let Err(err) = self.session.teardown().await {
            tracing::warn!("Teardown could not finalize recording: {}", err);
        }
        if self.inflight.take().is_some() {
            tracing::debug!("View closed with a submission in flight");
        }
    }
}
