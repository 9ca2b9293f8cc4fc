//! HTTP client for the voice verification service.
//!
//! Both endpoints take a multipart body with the recording in an `audio`
//! part. Failures are mapped to the exact text the views display.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;

use super::attempt::{AuthAttempt, AuthResult, AuthSuccess};
use super::response::{detail_message, RegisterResponse, VerifyResponse};
use crate::config::ServerConfig;
use crate::error::AuthError;
use crate::recording::OPUS_WEBM_MIME;

pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);
pub const REGISTER_TIMEOUT: Duration = Duration::from_secs(15);

const LOGIN_FILE_NAME: &str = "voice_login.webm";
const NOT_RECOGNIZED: &str = "Voice not recognized. Please try again.";
const NO_RESPONSE: &str = "No response from server";
const REGISTRATION_FAILED: &str = "Registration failed";
const REGISTRATION_DONE: &str = "Registration successful";

/// Client for `POST /verify` and `POST /register`.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    login_timeout: Duration,
    register_timeout: Duration,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            login_timeout: LOGIN_TIMEOUT,
            register_timeout: REGISTER_TIMEOUT,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.base_url.clone()).with_timeouts(
            Duration::from_secs(config.login_timeout_secs),
            Duration::from_secs(config.register_timeout_secs),
        )
    }

    pub fn with_timeouts(mut self, login: Duration, register: Duration) -> Self {
        self.login_timeout = login;
        self.register_timeout = register;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Verifies a recorded voice sample against enrolled users.
    ///
    /// # Errors
    /// - `Validation` if `chunks` is empty (no request is made)
    /// - `Server` if the voice was not recognized or the service rejected the request
    /// - `Transport` if no response arrived
    pub async fn submit_login(&self, chunks: &[Vec<u8>]) -> Result<AuthSuccess, AuthError> {
        let attempt = AuthAttempt::login(chunks)?;
        self.verify(attempt.audio).await
    }

    /// Enrolls `username` with a recorded voice sample.
    ///
    /// # Errors
    /// - `Validation` if the username is too short or `chunks` is empty
    /// - `Server` if the service rejected the enrollment
    /// - `Transport` if the request could not be completed
    pub async fn submit_registration(
        &self,
        username: &str,
        chunks: &[Vec<u8>],
    ) -> Result<AuthSuccess, AuthError> {
        let attempt = AuthAttempt::registration(username, chunks)?;
        self.enroll(username, attempt.audio).await
    }

    /// Submits a prepared attempt and returns it with its result settled.
    pub async fn run(&self, mut attempt: AuthAttempt) -> AuthAttempt {
        let chunks = [std::mem::take(&mut attempt.audio)];
        let result = match attempt.username.clone() {
            Some(username) => self.submit_registration(&username, &chunks).await,
            None => self.submit_login(&chunks).await,
        };

        match &result {
            Ok(success) => tracing::info!("Submission succeeded: {}", success.message),
            Err(err) => tracing::warn!("Submission failed ({}): {}", err.kind(), err),
        }
        attempt.settle(AuthResult::from(result));
        attempt
    }

    async fn verify(&self, audio: Vec<u8>) -> Result<AuthSuccess, AuthError> {
        let url = self.endpoint("verify");
        let form = Form::new().part("audio", audio_part(audio, LOGIN_FILE_NAME.to_string())?);

        tracing::debug!(
            "Verification call:\n  URL: {}\n  Method: POST\n  Parts: audio={}\n  Timeout: {:?}",
            url,
            LOGIN_FILE_NAME,
            self.login_timeout
        );

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .timeout(self.login_timeout)
            .send()
            .await
            .map_err(|e| login_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            tracing::debug!("Verification rejected with status {}", status);
            return Err(AuthError::Server(
                detail_message(&body).unwrap_or_else(|| status_text(status)),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| login_transport_error(&e))?;
        let verdict: VerifyResponse = serde_json::from_slice(&body).unwrap_or_else(|e| {
            tracing::warn!("Unreadable verification body, treating as not recognized: {}", e);
            VerifyResponse::default()
        });

        tracing::debug!("Verification response: {:?}", verdict);

        if verdict.authenticated {
            Ok(AuthSuccess::welcome(verdict.username))
        } else {
            Err(AuthError::Server(NOT_RECOGNIZED.to_string()))
        }
    }

    async fn enroll(&self, username: &str, audio: Vec<u8>) -> Result<AuthSuccess, AuthError> {
        let url = self.endpoint("register");
        let file_name = format!("{username}_registration.webm");
        let form = Form::new()
            .text("username", username.to_string())
            .part("audio", audio_part(audio, file_name.clone())?);

        tracing::debug!(
            "Registration call:\n  URL: {}\n  Method: POST\n  Parts: username={}, audio={}\n  Timeout: {:?}",
            url,
            username,
            file_name,
            self.register_timeout
        );

        let response = match self
            .http
            .post(&url)
            .multipart(form)
            .timeout(self.register_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(self.registration_transport_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = detail_message(&body)
                .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
            return Err(AuthError::Server(message));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.registration_transport_error(&e))?;
        let enrolled: RegisterResponse = serde_json::from_slice(&body).unwrap_or_default();

        Ok(AuthSuccess {
            message: enrolled
                .message
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| REGISTRATION_DONE.to_string()),
            identity: Some(username.to_string()),
        })
    }

    fn registration_transport_error(&self, err: &reqwest::Error) -> AuthError {
        let text = if err.is_timeout() {
            format!(
                "Registration request timed out after {}s",
                self.register_timeout.as_secs_f32()
            )
        } else {
            err.to_string()
        };

        if text.is_empty() {
            AuthError::Transport(REGISTRATION_FAILED.to_string())
        } else {
            AuthError::Transport(text)
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

fn audio_part(audio: Vec<u8>, file_name: String) -> Result<Part, AuthError> {
    Part::bytes(audio)
        .file_name(file_name)
        .mime_str(OPUS_WEBM_MIME)
        .map_err(|e| AuthError::Transport(format!("Failed to create audio part for upload: {e}")))
}

fn login_transport_error(err: &reqwest::Error) -> AuthError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        AuthError::Transport(NO_RESPONSE.to_string())
    } else {
        AuthError::Transport(err.to_string())
    }
}

/// HTTP reason phrase, or the bare code when the status has none.
fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{serve, test_client};
    use axum::extract::Multipart;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn recording() -> Vec<Vec<u8>> {
        vec![b"webm-head".to_vec(), b"-cluster".to_vec()]
    }

    /// Collects (name, file name, content type, bytes) for each multipart field.
    async fn read_parts(mut multipart: Multipart) -> Vec<(String, Option<String>, Option<String>, Vec<u8>)> {
        let mut parts = Vec::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.unwrap().to_vec();
            parts.push((name, file_name, content_type, bytes));
        }
        parts
    }

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(StatusCode::INTERNAL_SERVER_ERROR), "Internal Server Error");
        assert_eq!(status_text(StatusCode::from_u16(599).unwrap()), "599");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = AuthClient::new("http://localhost:8000/");
        assert_eq!(client.endpoint("verify"), "http://localhost:8000/verify");
    }

    #[tokio::test]
    async fn test_login_success_sends_audio_part() {
        let router = Router::new().route(
            "/verify",
            post(|multipart: Multipart| async move {
                let parts = read_parts(multipart).await;
                assert_eq!(parts.len(), 1);
                let (name, file_name, content_type, bytes) = &parts[0];
                assert_eq!(name, "audio");
                assert_eq!(file_name.as_deref(), Some("voice_login.webm"));
                assert_eq!(content_type.as_deref(), Some("audio/webm;codecs=opus"));
                assert_eq!(bytes, b"webm-head-cluster");
                Json(json!({"authenticated": true, "username": "alice"}))
            }),
        );
        let client = test_client(&serve(router).await);

        let success = client.submit_login(&recording()).await.unwrap();

        assert_eq!(success.message, "Welcome back, alice!");
        assert_eq!(success.identity.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_login_not_recognized() {
        let router = Router::new().route(
            "/verify",
            post(|| async { Json(json!({"authenticated": false})) }),
        );
        let client = test_client(&serve(router).await);

        let err = client.submit_login(&recording()).await.unwrap_err();

        assert_eq!(err, AuthError::Server(NOT_RECOGNIZED.to_string()));
    }

    #[tokio::test]
    async fn test_login_empty_recording_makes_no_request() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/verify",
            post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Json(json!({"authenticated": true})) }
            }),
        );
        let client = test_client(&serve(router).await);

        let err = client.submit_login(&[]).await.unwrap_err();

        assert_eq!(
            err,
            AuthError::Validation("Please record your voice first".to_string())
        );
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_validation_detail_list() {
        let router = Router::new().route(
            "/verify",
            post(|| async {
                (
                    AxumStatus::UNPROCESSABLE_ENTITY,
                    Json(json!({"detail": [{"msg": "field required"}, {"msg": "bad audio"}]})),
                )
            }),
        );
        let client = test_client(&serve(router).await);

        let err = client.submit_login(&recording()).await.unwrap_err();

        assert_eq!(err, AuthError::Server("field required, bad audio".to_string()));
    }

    #[tokio::test]
    async fn test_login_error_without_body_uses_status_text() {
        let router = Router::new().route(
            "/verify",
            post(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "upstream down") }),
        );
        let client = test_client(&serve(router).await);

        let err = client.submit_login(&recording()).await.unwrap_err();

        assert_eq!(err, AuthError::Server("Service Unavailable".to_string()));
    }

    #[tokio::test]
    async fn test_login_timeout_reports_no_response() {
        let router = Router::new().route(
            "/verify",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"authenticated": true}))
            }),
        );
        let client = test_client(&serve(router).await)
            .with_timeouts(Duration::from_millis(200), REGISTER_TIMEOUT);

        let err = client.submit_login(&recording()).await.unwrap_err();

        assert_eq!(err, AuthError::Transport(NO_RESPONSE.to_string()));
    }

    #[tokio::test]
    async fn test_login_refused_connection_reports_no_response() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = test_client(&format!("http://{addr}"));

        let err = client.submit_login(&recording()).await.unwrap_err();

        assert_eq!(err, AuthError::Transport(NO_RESPONSE.to_string()));
    }

    #[tokio::test]
    async fn test_registration_success_sends_username() {
        let router = Router::new().route(
            "/register",
            post(|multipart: Multipart| async move {
                let parts = read_parts(multipart).await;
                let username = parts.iter().find(|p| p.0 == "username").unwrap();
                assert_eq!(username.3, b"carol");
                let audio = parts.iter().find(|p| p.0 == "audio").unwrap();
                assert_eq!(audio.1.as_deref(), Some("carol_registration.webm"));
                assert_eq!(audio.2.as_deref(), Some("audio/webm;codecs=opus"));
                assert_eq!(audio.3, b"webm-head-cluster");
                Json(json!({"message": "Enrolled successfully"}))
            }),
        );
        let client = test_client(&serve(router).await);

        let success = client
            .submit_registration("carol", &recording())
            .await
            .unwrap();

        assert_eq!(success.message, "Enrolled successfully");
    }

    #[tokio::test]
    async fn test_registration_short_username_makes_no_request() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/register",
            post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Json(json!({"message": "ok"})) }
            }),
        );
        let client = test_client(&serve(router).await);

        let err = client
            .submit_registration("ab", &recording())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AuthError::Validation("Username must be at least 3 characters".to_string())
        );
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_registration_detail_and_status_fallback() {
        let router = Router::new()
            .route(
                "/register",
                post(|| async {
                    (
                        AxumStatus::BAD_REQUEST,
                        Json(json!({"detail": "Username already exists"})),
                    )
                }),
            );
        let client = test_client(&serve(router).await);
        let err = client
            .submit_registration("carol", &recording())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Server("Username already exists".to_string()));

        let router = Router::new().route(
            "/register",
            post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, Json(Value::Null)) }),
        );
        let client = test_client(&serve(router).await);
        let err = client
            .submit_registration("carol", &recording())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::Server("Request failed with status code 500".to_string())
        );
    }

    #[tokio::test]
    async fn test_registration_timeout() {
        let router = Router::new().route(
            "/register",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"message": "late"}))
            }),
        );
        let client = test_client(&serve(router).await)
            .with_timeouts(LOGIN_TIMEOUT, Duration::from_millis(250));

        let err = client
            .submit_registration("carol", &recording())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AuthError::Transport("Registration request timed out after 0.25s".to_string())
        );
    }

    #[tokio::test]
    async fn test_run_settles_attempt() {
        let router = Router::new().route(
            "/register",
            post(|| async { Json(json!({})) }),
        );
        let client = test_client(&serve(router).await);
        let attempt = AuthAttempt::registration("dave", &recording()).unwrap();

        let attempt = client.run(attempt).await;

        assert_eq!(
            attempt.result(),
            &AuthResult::Success {
                message: REGISTRATION_DONE.to_string(),
                identity: Some("dave".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_run_settles_rejected_login() {
        let router = Router::new().route(
            "/verify",
            post(|| async { Json(json!({"authenticated": false})) }),
        );
        let client = test_client(&serve(router).await);
        let attempt = AuthAttempt::login(&recording()).unwrap();

        let attempt = client.run(attempt).await;

        assert_eq!(
            attempt.result(),
            &AuthResult::Failure(AuthError::Server(NOT_RECOGNIZED.to_string()))
        );
    }
}
