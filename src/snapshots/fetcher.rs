use std::sync::Arc;
use tracing::debug;

use crate::auth::AccessTokenSource;
use crate::client::ApiTransport;
use crate::error::{Result, SnapshotError};
use crate::events::SnapshotReference;

/// Downloads snapshot images, one at a time.
pub struct SnapshotFetcher {
    transport: Arc<dyn ApiTransport>,
}

impl SnapshotFetcher {
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self { transport }
    }

    /// Raw image bytes of `reference`.
    pub async fn fetch<A>(&self, auth: &mut A, reference: &SnapshotReference) -> Result<Vec<u8>>
    where
        A: AccessTokenSource + ?Sized,
    {
        let token = auth.access_token().await?;
        let bytes = self
            .transport
            .get(&reference.url, &token)
            .await?
            .into_bytes()?;

        if bytes.is_empty() {
            return Err(SnapshotError::Transport(format!(
                "empty snapshot at {}",
                reference.url
            )));
        }

        debug!(url = %reference.url, len = bytes.len(), "Downloaded snapshot");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::client::fake::FakeTransport;
    use chrono::DateTime;
    use serde_json::json;

    fn reference(url: &str) -> SnapshotReference {
        SnapshotReference {
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            url: url.into(),
            module_id: "70:ee:50:95:d5:1c".into(),
        }
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_and_returns_bytes() {
        let transport = Arc::new(FakeTransport::default().image("https://s.test/a.jpg", &[0xff, 0xd8, 0xff]));
        let fetcher = SnapshotFetcher::new(transport.clone());

        let bytes = fetcher
            .fetch(&mut StaticToken("tok".into()), &reference("https://s.test/a.jpg"))
            .await
            .unwrap();
        assert_eq!(bytes, vec![0xff, 0xd8, 0xff]);
        assert_eq!(transport.calls()[0].param("bearer"), Some("tok"));
    }

    #[tokio::test]
    async fn test_json_payload_is_transport_error() {
        let transport = Arc::new(FakeTransport::default().json(
            "https://s.test/a.jpg",
            json!({"error": {"code": 13, "message": "Snapshot expired"}}),
        ));
        let fetcher = SnapshotFetcher::new(transport);

        let err = fetcher
            .fetch(&mut StaticToken("tok".into()), &reference("https://s.test/a.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Transport(msg) if msg.contains("Snapshot expired")));
    }

    #[tokio::test]
    async fn test_empty_image_is_rejected() {
        let transport = Arc::new(FakeTransport::default().image("https://s.test/a.jpg", &[]));
        let fetcher = SnapshotFetcher::new(transport);
        assert!(fetcher
            .fetch(&mut StaticToken("tok".into()), &reference("https://s.test/a.jpg"))
            .await
            .is_err());
    }
}
