/// Unified error type for snapshot retrieval and detection.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    // ── Auth Errors ─────────────────────────────────────────────────────
    #[error("Token exchange failed: {0}")]
    Auth(String),

    /// The token exchange succeeded but the rotated refresh token could not
    /// be written back. The old refresh token is already invalid server-side.
    #[error("Failed to persist rotated credentials to {path}: {reason}")]
    CredentialPersist { path: String, reason: String },

    // ── Lookup Errors ───────────────────────────────────────────────────
    #[error("{0} not found")]
    NotFound(String),

    // ── Config Errors ───────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ── Remote Errors ───────────────────────────────────────────────────
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Detector error: {0}")]
    Detection(String),

    // ── Local ───────────────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

impl SnapshotError {
    /// Whether a failure on a single snapshot should only skip that item.
    ///
    /// Auth, config and persistence failures affect every later item too,
    /// so they stop the run.
    pub fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            SnapshotError::Transport(_)
                | SnapshotError::Decode(_)
                | SnapshotError::Detection(_)
                | SnapshotError::Io(_)
        )
    }
}

impl From<reqwest::Error> for SnapshotError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SnapshotError::Transport(format!("request timed out: {e}"))
        } else {
            SnapshotError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(e: serde_json::Error) -> Self {
        SnapshotError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_scoped_classification() {
        assert!(SnapshotError::Transport("boom".into()).is_item_scoped());
        assert!(SnapshotError::Detection("bad".into()).is_item_scoped());
        assert!(!SnapshotError::Auth("denied".into()).is_item_scoped());
        assert!(!SnapshotError::Config("window".into()).is_item_scoped());
        assert!(!SnapshotError::CredentialPersist {
            path: "c.json".into(),
            reason: "disk full".into(),
        }
        .is_item_scoped());
    }
}
