//! Scripted transport for unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ApiResponse, ApiTransport};
use crate::error::{Result, SnapshotError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Replies by URL; unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct FakeTransport {
    replies: Mutex<HashMap<String, std::result::Result<ApiResponse, String>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn json(self, url: &str, body: Value) -> Self {
        self.reply(url, Ok(ApiResponse::Json(body)))
    }

    pub fn image(self, url: &str, bytes: &[u8]) -> Self {
        self.reply(
            url,
            Ok(ApiResponse::Binary {
                content_type: "image/jpeg".into(),
                bytes: bytes.to_vec(),
            }),
        )
    }

    pub fn failing(self, url: &str, reason: &str) -> Self {
        self.reply(url, Err(reason.to_string()))
    }

    fn reply(self, url: &str, reply: std::result::Result<ApiResponse, String>) -> Self {
        self.replies.lock().unwrap().insert(url.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }

    fn answer(&self, url: &str, params: Vec<(String, String)>) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            params,
        });
        match self.replies.lock().unwrap().get(url) {
            Some(Ok(resp)) => Ok(resp.clone()),
            Some(Err(reason)) => Err(SnapshotError::Transport(reason.clone())),
            None => Err(SnapshotError::Transport(format!("HTTP 404 Not Found: {url}"))),
        }
    }
}

#[async_trait]
impl ApiTransport for FakeTransport {
    async fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<ApiResponse> {
        let params = form
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.answer(url, params)
    }

    async fn get(&self, url: &str, bearer: &str) -> Result<ApiResponse> {
        self.answer(url, vec![("bearer".into(), bearer.to_string())])
    }
}
