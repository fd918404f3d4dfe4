//! Typed transport for the Netatmo API and snapshot downloads.
//!
//! Responses are dispatched on content type once, here, into
//! [`ApiResponse::Json`] or [`ApiResponse::Binary`].

#[cfg(test)]
pub(crate) mod fake;
mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, SnapshotError};

/// A successful (2xx) response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    Binary { content_type: String, bytes: Vec<u8> },
}

impl ApiResponse {
    /// Deserialize a JSON body, rejecting binary payloads.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            ApiResponse::Json(value) => Ok(serde_json::from_value(value)?),
            ApiResponse::Binary { content_type, .. } => Err(SnapshotError::Transport(format!(
                "expected JSON, got {content_type}"
            ))),
        }
    }

    /// Extract a binary body. A JSON body here is a vendor error document.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            ApiResponse::Binary { bytes, .. } => Ok(bytes),
            ApiResponse::Json(value) => Err(SnapshotError::Transport(format!(
                "expected binary payload, got JSON: {}",
                vendor_error_message(&value)
            ))),
        }
    }
}

/// Outbound calls. One request at a time, each bounded by a fixed timeout.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// POST a form-encoded body to `url`.
    async fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<ApiResponse>;

    /// GET `url` with a bearer token.
    async fn get(&self, url: &str, bearer: &str) -> Result<ApiResponse>;
}

/// Pull the human readable part out of a Netatmo error document.
pub(crate) fn vendor_error_message(value: &Value) -> String {
    let error = value.get("error").unwrap_or(value);
    match error {
        Value::String(s) => s.clone(),
        Value::Object(obj) => {
            let code = obj.get("code").map(|c| c.to_string());
            let message = obj
                .get("message")
                .and_then(Value::as_str)
                .map(String::from);
            match (code, message) {
                (Some(code), Some(message)) => format!("{message} (code {code})"),
                (None, Some(message)) => message,
                _ => error.to_string(),
            }
        }
        other => other.to_string(),
    }
}

/// Whether a content type denotes a JSON document.
pub(crate) fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json") || mime == "text/json"
}
