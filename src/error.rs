//! Error kinds surfaced to the user by the login and registration flows.
//!
//! Every variant carries the exact text the view displays. None of them are
//! retried automatically; the user re-records or re-submits.

use thiserror::Error;

/// Failure of a recording or submission step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The capture device could not be acquired or finalized.
    #[error("{0}")]
    Device(String),
    /// A local precondition failed. No request was issued.
    #[error("{0}")]
    Validation(String),
    /// The request never produced a response (timeout, refused connection).
    #[error("{0}")]
    Transport(String),
    /// The service answered, but with failure semantics.
    #[error("{0}")]
    Server(String),
}

impl AuthError {
    /// Wraps a low-level device failure in the message shown to the user.
    pub fn device(cause: impl std::fmt::Display) -> Self {
        Self::Device(format!("Microphone error: {cause}"))
    }

    /// Short name of the error kind, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Device(_) => "device",
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
            Self::Server(_) => "server",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_the_bare_message() {
        let err = AuthError::Validation("Please record your voice first".to_string());
        assert_eq!(err.to_string(), "Please record your voice first");
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_device_error_is_prefixed() {
        let err = AuthError::device("permission denied");
        assert_eq!(err, AuthError::Device("Microphone error: permission denied".to_string()));
    }
}
