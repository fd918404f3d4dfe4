//! On-disk output, keyed by the formatted event timestamp.
//!
//! Per snapshot:
//! - `<stamp>.json` with the detection list
//! - `<stamp>_<label>_<n>.jpg` for every crop the detector returned
//! - `<stamp>.jpg` with the raw snapshot, when originals are kept

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::detect::{BoundingBox, Detection};
use crate::error::Result;
use crate::events::SnapshotReference;

const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub struct DetectionSink {
    dir: PathBuf,
    keep_original: bool,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    timestamp: DateTime<Utc>,
    module_id: &'a str,
    url: &'a str,
    detections: Vec<ManifestEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    label: &'a str,
    confidence: f32,
    bbox: BoundingBox,
    #[serde(skip_serializing_if = "Option::is_none")]
    crop_file: Option<String>,
}

impl DetectionSink {
    /// Create the output directory if needed.
    pub async fn new(dir: impl Into<PathBuf>, keep_original: bool) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir, keep_original })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write everything for one snapshot and return the created files.
    pub async fn save(
        &self,
        reference: &SnapshotReference,
        image: &[u8],
        detections: &[Detection],
    ) -> Result<Vec<PathBuf>> {
        let stamp = format_stamp(reference.timestamp);
        let mut written = Vec::new();

        if self.keep_original {
            let path = self.dir.join(format!("{stamp}.jpg"));
            fs::write(&path, image).await?;
            written.push(path);
        }

        let mut entries = Vec::with_capacity(detections.len());
        for (n, detection) in detections.iter().enumerate() {
            let crop_file = match &detection.crop {
                Some(crop) => {
                    let name = format!("{stamp}_{}_{n}.jpg", sanitize(&detection.label));
                    let path = self.dir.join(&name);
                    fs::write(&path, crop).await?;
                    written.push(path);
                    Some(name)
                }
                None => None,
            };
            entries.push(ManifestEntry {
                label: &detection.label,
                confidence: detection.confidence,
                bbox: detection.bbox,
                crop_file,
            });
        }

        if !detections.is_empty() || !self.keep_original {
            let manifest = Manifest {
                timestamp: reference.timestamp,
                module_id: &reference.module_id,
                url: &reference.url,
                detections: entries,
            };
            let path = self.dir.join(format!("{stamp}.json"));
            fs::write(&path, serde_json::to_vec_pretty(&manifest)?).await?;
            written.push(path);
        }

        debug!(stamp = %stamp, files = written.len(), "Saved snapshot output");
        Ok(written)
    }
}

pub fn format_stamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(STAMP_FORMAT).to_string()
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> SnapshotReference {
        SnapshotReference {
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            url: "https://s.test/a.jpg".into(),
            module_id: "70:ee:50:95:d5:1c".into(),
        }
    }

    fn person(crop: Option<Vec<u8>>) -> Detection {
        Detection {
            label: "Person".into(),
            confidence: 0.9,
            bbox: BoundingBox {
                x1: 1.0,
                y1: 2.0,
                x2: 3.0,
                y2: 4.0,
            },
            crop,
        }
    }

    #[test]
    fn test_stamp_format() {
        assert_eq!(format_stamp(reference().timestamp), "2023-11-14_22-13-20");
    }

    #[tokio::test]
    async fn test_save_crops_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DetectionSink::new(dir.path().join("out"), false).await.unwrap();

        let files = sink
            .save(&reference(), b"jpeg", &[person(Some(vec![1, 2, 3])), person(None)])
            .await
            .unwrap();

        let crop = sink.dir().join("2023-11-14_22-13-20_person_0.jpg");
        let manifest = sink.dir().join("2023-11-14_22-13-20.json");
        assert_eq!(files, vec![crop.clone(), manifest.clone()]);
        assert_eq!(std::fs::read(&crop).unwrap(), vec![1, 2, 3]);
        assert!(!sink.dir().join("2023-11-14_22-13-20.jpg").exists());

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&manifest).unwrap()).unwrap();
        assert_eq!(json["detections"].as_array().unwrap().len(), 2);
        assert_eq!(json["detections"][0]["crop_file"], "2023-11-14_22-13-20_person_0.jpg");
        assert!(json["detections"][1].get("crop_file").is_none());
        assert_eq!(json["module_id"], "70:ee:50:95:d5:1c");
    }

    #[tokio::test]
    async fn test_keep_original_without_detections() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DetectionSink::new(dir.path(), true).await.unwrap();

        let files = sink.save(&reference(), b"jpeg", &[]).await.unwrap();

        assert_eq!(files, vec![dir.path().join("2023-11-14_22-13-20.jpg")]);
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"jpeg");
    }
}
