//! Snapshot download and on-disk persistence of detection results.

pub mod fetcher;
pub mod sink;

pub use fetcher::SnapshotFetcher;
pub use sink::{format_stamp, DetectionSink};
