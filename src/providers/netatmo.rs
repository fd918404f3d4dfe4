use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{OAuthProvider, TokenSet};
use crate::error::{Result, SnapshotError};

/// Netatmo OAuth 2.0 token endpoint.
///
/// Quirks:
/// - The lifetime field is historically `expire_in`; newer responses also
///   carry `expires_in`. Either is accepted.
/// - `scope` is a JSON array, not a space separated string.
/// - Every refresh may rotate the refresh token.
pub struct NetatmoProvider {
    token_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct NetatmoTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(alias = "expires_in")]
    expire_in: Option<u64>,
    #[serde(default)]
    scope: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NetatmoAuthError {
    error: Option<String>,
    error_description: Option<String>,
}

impl NetatmoProvider {
    pub fn new(token_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SnapshotError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            token_url: token_url.into(),
            http,
        })
    }
}

#[async_trait]
impl OAuthProvider for NetatmoProvider {
    fn id(&self) -> &str {
        "netatmo"
    }

    async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenSet> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|e| SnapshotError::Auth(format!("Refresh request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SnapshotError::Auth(format!("Failed to read refresh response: {e}")))?;

        if !status.is_success() {
            let reason = serde_json::from_str::<NetatmoAuthError>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or(body);
            return Err(SnapshotError::Auth(format!(
                "Netatmo refresh failed (HTTP {status}): {reason}"
            )));
        }

        parse_token_response(&body)
    }
}

fn parse_token_response(body: &str) -> Result<TokenSet> {
    let token_resp: NetatmoTokenResponse = serde_json::from_str(body)
        .map_err(|e| SnapshotError::Auth(format!("Failed to parse refresh response: {e}")))?;

    let access_token = token_resp
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SnapshotError::Auth("no access_token in response".into()))?;
    let expires_in = token_resp
        .expire_in
        .ok_or_else(|| SnapshotError::Auth("no expire_in in response".into()))?;

    Ok(TokenSet {
        access_token,
        refresh_token: token_resp.refresh_token.filter(|t| !t.is_empty()),
        expires_in,
        scope: token_resp.scope,
    })
}
