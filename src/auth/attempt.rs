//! A single login or enrollment submission.

use crate::error::AuthError;

pub const MIN_USERNAME_LEN: usize = 3;

const NO_RECORDING: &str = "Please record your voice first";
const USERNAME_TOO_SHORT: &str = "Username must be at least 3 characters";

/// What the service said about an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    Pending,
    Success {
        message: String,
        /// Name the service recognized, for logins
        identity: Option<String>,
    },
    Failure(AuthError),
}

impl AuthResult {
    /// Text shown to the user, if the attempt has settled.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Pending => None,
            Self::Success { message, .. } => Some(message.clone()),
            Self::Failure(err) => Some(err.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Successful outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSuccess {
    pub message: String,
    pub identity: Option<String>,
}

impl AuthSuccess {
    pub fn welcome(identity: Option<String>) -> Self {
        let message = match identity.as_deref() {
            Some(name) if !name.is_empty() => format!("Welcome back, {name}!"),
            _ => "Welcome back!".to_string(),
        };
        Self { message, identity }
    }
}

impl From<Result<AuthSuccess, AuthError>> for AuthResult {
    fn from(result: Result<AuthSuccess, AuthError>) -> Self {
        match result {
            Ok(AuthSuccess { message, identity }) => Self::Success { message, identity },
            Err(err) => Self::Failure(err),
        }
    }
}

/// Audio payload plus metadata for one submission. Never persisted.
#[derive(Debug)]
pub struct AuthAttempt {
    pub(crate) audio: Vec<u8>,
    pub(crate) username: Option<String>,
    result: AuthResult,
}

impl AuthAttempt {
    /// Prepares a login attempt.
    ///
    /// # Errors
    /// - `AuthError::Validation` if nothing was recorded
    pub fn login(chunks: &[Vec<u8>]) -> Result<Self, AuthError> {
        Ok(Self {
            audio: assemble(chunks)?,
            username: None,
            result: AuthResult::Pending,
        })
    }

    /// Prepares an enrollment attempt. The username is checked first.
    ///
    /// # Errors
    /// - `AuthError::Validation` if the username is shorter than 3 characters
    /// - `AuthError::Validation` if nothing was recorded
    pub fn registration(username: &str, chunks: &[Vec<u8>]) -> Result<Self, AuthError> {
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(AuthError::Validation(USERNAME_TOO_SHORT.to_string()));
        }
        Ok(Self {
            audio: assemble(chunks)?,
            username: Some(username.to_string()),
            result: AuthResult::Pending,
        })
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn payload_len(&self) -> usize {
        self.audio.len()
    }

    pub fn result(&self) -> &AuthResult {
        &self.result
    }

    pub(crate) fn settle(&mut self, result: AuthResult) {
        self.result = result;
    }
}

/// Concatenates recorded chunks into one WebM payload.
fn assemble(chunks: &[Vec<u8>]) -> Result<Vec<u8>, AuthError> {
    if chunks.is_empty() {
        return Err(AuthError::Validation(NO_RECORDING.to_string()));
    }
    Ok(chunks.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks() -> Vec<Vec<u8>> {
        vec![b"\x1aE".to_vec(), b"\xdf\xa3".to_vec()]
    }

    #[test]
    fn test_login_requires_chunks() {
        let err = AuthAttempt::login(&[]).unwrap_err();
        assert_eq!(err, AuthError::Validation(NO_RECORDING.to_string()));
    }

    #[test]
    fn test_login_concatenates_in_order() {
        let attempt = AuthAttempt::login(&chunks()).unwrap();
        assert_eq!(attempt.audio, b"\x1aE\xdf\xa3".to_vec());
        assert_eq!(attempt.username(), None);
        assert_eq!(attempt.result(), &AuthResult::Pending);
    }

    #[test]
    fn test_username_length_boundary() {
        let err = AuthAttempt::registration("ab", &chunks()).unwrap_err();
        assert_eq!(err.to_string(), "Username must be at least 3 characters");

        let attempt = AuthAttempt::registration("abc", &chunks()).unwrap();
        assert_eq!(attempt.username(), Some("abc"));
    }

    #[test]
    fn test_username_checked_before_recording() {
        let err = AuthAttempt::registration("", &[]).unwrap_err();
        assert_eq!(err.to_string(), USERNAME_TOO_SHORT);

        let err = AuthAttempt::registration("carol", &[]).unwrap_err();
        assert_eq!(err.to_string(), NO_RECORDING);
    }

    #[test]
    fn test_welcome_message() {
        assert_eq!(
            AuthSuccess::welcome(Some("alice".to_string())).message,
            "Welcome back, alice!"
        );
        assert_eq!(AuthSuccess::welcome(None).message, "Welcome back!");
    }

    #[test]
    fn test_result_from_outcome() {
        let result = AuthResult::from(Err(AuthError::Transport("No response from server".into())));
        assert!(!result.is_success());
        assert_eq!(result.message().as_deref(), Some("No response from server"));
        assert_eq!(AuthResult::Pending.message(), None);
    }
}
