//! Submission of recorded voice samples to the verification service.
//!
//! Provides local precondition checks, multipart packaging of the recording,
//! and interpretation of the service's answers into display-ready results.

pub mod attempt;
pub mod client;
pub mod response;

pub use attempt::{AuthAttempt, AuthResult, AuthSuccess, MIN_USERNAME_LEN};
pub use client::AuthClient;
