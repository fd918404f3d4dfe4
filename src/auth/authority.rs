//! Access token lifecycle.
//!
//! The authority is constructed explicitly and passed by reference:
//! load → use → persist-on-rotation → shutdown. Access tokens live only in
//! memory; rotated refresh tokens are written back before the call returns.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};

use super::credentials::{mask_secret, CredentialStore, Credentials};
use crate::error::{Result, SnapshotError};
use crate::providers::OAuthProvider;

/// Anything that can hand out a currently valid bearer token.
#[async_trait]
pub trait AccessTokenSource: Send {
    async fn access_token(&mut self) -> Result<String>;
}

/// A short-lived bearer token.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &mask_secret(&self.token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Whether the token must be renewed at `now`, given a safety margin.
    pub fn is_expired_at(&self, now: DateTime<Utc>, margin: ChronoDuration) -> bool {
        self.expires_at - margin <= now
    }
}

/// Owns the credential set and the current access token.
pub struct TokenAuthority {
    provider: Box<dyn OAuthProvider>,
    store: CredentialStore,
    credentials: Credentials,
    access: Option<AccessToken>,
    refresh_margin: ChronoDuration,
    /// Set when a rotated refresh token could not be written back.
    unpersisted: bool,
}

impl TokenAuthority {
    /// Load credentials from `store` and build an authority around them.
    pub fn load(
        provider: Box<dyn OAuthProvider>,
        store: CredentialStore,
        refresh_margin: Duration,
    ) -> Result<Self> {
        let credentials = store.load()?;
        Ok(Self::new(provider, store, credentials, refresh_margin))
    }

    pub fn new(
        provider: Box<dyn OAuthProvider>,
        store: CredentialStore,
        credentials: Credentials,
        refresh_margin: Duration,
    ) -> Self {
        debug!(
            provider = provider.id(),
            path = %store.path().display(),
            "Token authority ready"
        );
        Self {
            provider,
            store,
            credentials,
            access: None,
            refresh_margin: ChronoDuration::from_std(refresh_margin)
                .unwrap_or_else(|_| ChronoDuration::zero()),
            unpersisted: false,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The currently held access token, if any, without renewing it.
    pub fn current(&self) -> Option<&AccessToken> {
        self.access.as_ref()
    }

    /// Return a bearer token that is not expired, renewing it first if needed.
    pub async fn get_access_token(&mut self) -> Result<String> {
        let now = Utc::now();
        if let Some(access) = &self.access {
            if !access.is_expired_at(now, self.refresh_margin) {
                return Ok(access.token.clone());
            }
            debug!(expires_at = %access.expires_at, "Access token expired");
        }

        self.renew().await
    }

    async fn renew(&mut self) -> Result<String> {
        let tokens = self
            .provider
            .refresh_token(
                &self.credentials.client_id,
                &self.credentials.client_secret,
                &self.credentials.refresh_token,
            )
            .await?;

        // A rotated refresh token is kept even if the rest of the response is unusable.
        if let Some(rotated) = tokens.refresh_token {
            if rotated != self.credentials.refresh_token {
                self.credentials.refresh_token = rotated;
                self.unpersisted = true;
                if let Err(e) = self.store.persist(&self.credentials) {
                    error!(
                        refresh_token = %mask_secret(&self.credentials.refresh_token),
                        "Rotated refresh token was NOT saved: {e}"
                    );
                    return Err(e);
                }
                self.unpersisted = false;
            }
        }

        let expires_at = expiry_after(Utc::now(), tokens.expires_in)?;
        self.access = Some(AccessToken {
            token: tokens.access_token.clone(),
            expires_at,
        });
        info!(
            provider = self.provider.id(),
            expires_at = %expires_at,
            "Refreshed access token"
        );

        Ok(tokens.access_token)
    }

    /// End the lifecycle: retry any failed credential write, drop the access token.
    pub fn shutdown(mut self) -> Result<()> {
        if self.unpersisted {
            self.store.persist(&self.credentials)?;
        }
        self.access = None;
        debug!("Token authority shut down");
        Ok(())
    }
}

/// `now + expires_in` seconds, rejecting lifetimes chrono cannot represent.
fn expiry_after(now: DateTime<Utc>, expires_in: u64) -> Result<DateTime<Utc>> {
    i64::try_from(expires_in)
        .ok()
        .and_then(ChronoDuration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| SnapshotError::Auth(format!("expire_in out of range: {expires_in}")))
}

#[async_trait]
impl AccessTokenSource for TokenAuthority {
    async fn access_token(&mut self) -> Result<String> {
        self.get_access_token().await
    }
}

/// A fixed token, for callers that already hold one.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&mut self) -> Result<String> {
        if self.0.is_empty() {
            return Err(SnapshotError::Auth("empty static access token".into()));
        }
        Ok(self.0.clone())
    }
}
