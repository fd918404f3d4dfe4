//! Object detection, delegated to an HTTP inference service.
//!
//! The service receives the raw snapshot and a class filter and answers
//! with labeled boxes. It may also return a JPEG crop per box.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::join_url;
use crate::error::{Result, SnapshotError};

/// Box corners in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// JPEG crop of `bbox`, when the service supplies one.
    pub crop: Option<Vec<u8>>,
}

#[async_trait]
pub trait Detector: Send + Sync {
    /// Detect objects of the given classes. An empty class list means all.
    async fn detect(&self, image: &[u8], classes: &[String]) -> Result<Vec<Detection>>;
}

/// Client of the detection service's `POST /v1/detect`.
pub struct HttpDetector {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    label: String,
    #[serde(alias = "conf")]
    confidence: f32,
    bbox: BoundingBox,
    /// Base64 JPEG.
    #[serde(default)]
    crop: Option<String>,
}

impl HttpDetector {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SnapshotError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, image: &[u8], classes: &[String]) -> Result<Vec<Detection>> {
        let url = join_url(&self.base_url, "v1/detect");

        let form = Form::new()
            .part(
                "image",
                Part::bytes(image.to_vec())
                    .file_name("snapshot.jpg")
                    .mime_str("image/jpeg")
                    .map_err(|e| SnapshotError::Detection(e.to_string()))?,
            )
            .text("classes", classes.join(","));

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SnapshotError::Detection(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SnapshotError::Detection(format!(
                "detector returned HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: DetectResponse = resp
            .json()
            .await
            .map_err(|e| SnapshotError::Detection(format!("invalid detector response: {e}")))?;

        let detections = decode_detections(body, classes)?;
        debug!(count = detections.len(), "Detector answered");
        Ok(detections)
    }
}

/// Decode crops and drop labels outside `classes`.
fn decode_detections(body: DetectResponse, classes: &[String]) -> Result<Vec<Detection>> {
    body.detections
        .into_iter()
        .filter(|d| classes.is_empty() || classes.iter().any(|c| c.eq_ignore_ascii_case(&d.label)))
        .map(|d| -> Result<Detection> {
            let crop = d
                .crop
                .map(|b64| base64::engine::general_purpose::STANDARD.decode(b64))
                .transpose()
                .map_err(|e| SnapshotError::Detection(format!("invalid crop for {}: {e}", d.label)))?;
            Ok(Detection {
                label: d.label,
                confidence: d.confidence,
                bbox: d.bbox,
                crop,
            })
        })
        .collect()
}
