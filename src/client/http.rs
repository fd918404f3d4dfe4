use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

use super::{is_json_content_type, vendor_error_message, ApiResponse, ApiTransport};
use crate::error::{Result, SnapshotError};

/// reqwest-backed [`ApiTransport`].
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SnapshotError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    async fn read(&self, resp: reqwest::Response) -> Result<ApiResponse> {
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();

        debug!(status = status.as_u16(), content_type = %content_type, len = bytes.len(), "response");

        if !status.is_success() {
            let detail = serde_json::from_slice::<serde_json::Value>(&bytes)
                .map(|v| vendor_error_message(&v))
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).chars().take(200).collect());
            return Err(SnapshotError::Transport(format!("HTTP {status}: {detail}")));
        }

        if is_json_content_type(&content_type) {
            Ok(ApiResponse::Json(serde_json::from_slice(&bytes)?))
        } else {
            Ok(ApiResponse::Binary {
                content_type,
                bytes,
            })
        }
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<ApiResponse> {
        debug!(url, "POST");
        let resp = self.http.post(url).form(form).send().await?;
        self.read(resp).await
    }

    async fn get(&self, url: &str, bearer: &str) -> Result<ApiResponse> {
        debug!(url, "GET");
        let resp = self.http.get(url).bearer_auth(bearer).send().await?;
        self.read(resp).await
    }
}
