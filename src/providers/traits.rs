use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tokens returned by an authorization endpoint after a refresh exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    /// Present when the server rotates the refresh token.
    pub refresh_token: Option<String>,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: u64,
    pub scope: Vec<String>,
}

/// The refresh side of an OAuth2 authorization server.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Unique provider identifier (e.g., "netatmo").
    fn id(&self) -> &str;

    /// Exchange a refresh token for a fresh access token.
    ///
    /// Single shot: implementations must not retry.
    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenSet>;
}
