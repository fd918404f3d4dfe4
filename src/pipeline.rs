//! Sequential download → detect → persist loop.

use serde::Serialize;
use tracing::{info, warn};

use crate::auth::AccessTokenSource;
use crate::detect::Detector;
use crate::error::Result;
use crate::events::SnapshotReference;
use crate::snapshots::{DetectionSink, SnapshotFetcher};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub references: usize,
    pub processed: usize,
    pub failed: usize,
    pub detections: usize,
}

/// Process `references` one at a time.
///
/// A download, detector or disk failure skips that snapshot. Auth, config
/// and credential persistence failures abort the run.
pub async fn run<A>(
    auth: &mut A,
    references: &[SnapshotReference],
    fetcher: &SnapshotFetcher,
    detector: Option<&dyn Detector>,
    sink: &DetectionSink,
    classes: &[String],
) -> Result<RunSummary>
where
    A: AccessTokenSource + ?Sized,
{
    let mut summary = RunSummary {
        references: references.len(),
        ..RunSummary::default()
    };

    for reference in references {
        match process_one(auth, reference, fetcher, detector, sink, classes).await {
            Ok(found) => {
                summary.processed += 1;
                summary.detections += found;
            }
            Err(e) if e.is_item_scoped() => {
                warn!(url = %reference.url, timestamp = %reference.timestamp, "Skipping snapshot: {e}");
                summary.failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        references = summary.references,
        processed = summary.processed,
        failed = summary.failed,
        detections = summary.detections,
        "Run finished"
    );
    Ok(summary)
}

async fn process_one<A>(
    auth: &mut A,
    reference: &SnapshotReference,
    fetcher: &SnapshotFetcher,
    detector: Option<&dyn Detector>,
    sink: &DetectionSink,
    classes: &[String],
) -> Result<usize>
where
    A: AccessTokenSource + ?Sized,
{
    let image = fetcher.fetch(auth, reference).await?;
    let detections = match detector {
        Some(detector) => detector.detect(&image, classes).await?,
        None => Vec::new(),
    };
    sink.save(reference, &image, &detections).await?;
    Ok(detections.len())
}
