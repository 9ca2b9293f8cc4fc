//! Response bodies returned by the verification service.

use serde::Deserialize;

/// Body of a successful `POST /verify`.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub username: Option<String>,
}

/// Body of a successful `POST /register`.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// One entry of a per-field validation failure.
#[derive(Debug, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub msg: String,
}

/// The `detail` member of an error body.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Detail {
    Message(String),
    Fields(Vec<FieldError>),
    Other(serde_json::Value),
}

impl Detail {
    /// Renders the detail for display. Empty text counts as no detail.
    pub fn to_message(&self) -> Option<String> {
        let message = match self {
            Self::Message(text) => text.clone(),
            Self::Fields(fields) => fields
                .iter()
                .map(|field| field.msg.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            Self::Other(value) => value.to_string(),
        };
        (!message.is_empty()).then_some(message)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Detail>,
}

/// Extracts the display text of an error body's `detail`, if it has one.
pub fn detail_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()?
        .detail?
        .to_message()
}
