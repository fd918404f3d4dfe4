//! File-backed OAuth client credentials.
//!
//! The file is a flat JSON object with `CLIENT_ID`, `CLIENT_SECRET` and
//! `REFRESH_TOKEN`. Keys are matched case-insensitively on read and always
//! written upper-cased. Environment variables with the same names win over
//! the file.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, SnapshotError};

pub const CLIENT_ID: &str = "CLIENT_ID";
pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const REFRESH_TOKEN: &str = "REFRESH_TOKEN";

const KEYS: [&str; 3] = [CLIENT_ID, CLIENT_SECRET, REFRESH_TOKEN];

/// OAuth client credentials plus the long-lived refresh token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// The refresh token came from the `REFRESH_TOKEN` environment variable.
    pub refresh_token_from_env: bool,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &mask_secret(&self.client_secret))
            .field("refresh_token", &mask_secret(&self.refresh_token))
            .field("refresh_token_from_env", &self.refresh_token_from_env)
            .finish()
    }
}

/// Durable storage for [`Credentials`].
///
/// Assumes a single process per file; there is no locking.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load credentials, letting process environment variables override the file.
    pub fn load(&self) -> Result<Credentials> {
        self.load_with(|key| std::env::var(key).ok())
    }

    /// Load credentials with an explicit override lookup.
    ///
    /// A missing file is fine as long as the overrides supply every key.
    pub fn load_with<F>(&self, env: F) -> Result<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = self.read_file()?;
        let mut refresh_token_from_env = false;
        for key in KEYS {
            if let Some(value) = env(key).filter(|v| !v.is_empty()) {
                debug!(key, "credential overridden from environment");
                values.insert(key.to_string(), value);
                refresh_token_from_env |= key == REFRESH_TOKEN;
            }
        }

        let mut take = |key: &str| {
            values.remove(key).filter(|v| !v.is_empty()).ok_or_else(|| {
                SnapshotError::Config(format!(
                    "{key} missing from {} and environment",
                    self.path.display()
                ))
            })
        };

        Ok(Credentials {
            client_id: take(CLIENT_ID)?,
            client_secret: take(CLIENT_SECRET)?,
            refresh_token: take(REFRESH_TOKEN)?,
            refresh_token_from_env,
        })
    }

    /// Read the file as an upper-cased key map. A missing file reads as empty.
    fn read_file(&self) -> Result<HashMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "credentials file not found");
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        let object: Map<String, Value> = serde_json::from_str(&raw).map_err(|e| {
            SnapshotError::Config(format!("Invalid credentials file {}: {e}", self.path.display()))
        })?;

        Ok(object
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k.to_uppercase(), s)),
                _ => None,
            })
            .collect())
    }

    /// Atomically write the full credential set.
    ///
    /// Unrelated keys already in the file are kept. The new content is
    /// written to a sibling temp file, synced, then renamed over the original.
    pub fn persist(&self, credentials: &Credentials) -> Result<()> {
        self.write_atomic(credentials)
            .map_err(|e| SnapshotError::CredentialPersist {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

        info!(
            path = %self.path.display(),
            refresh_token = %mask_secret(&credentials.refresh_token),
            "Persisted credentials"
        );
        if credentials.refresh_token_from_env {
            warn!(
                path = %self.path.display(),
                "{REFRESH_TOKEN} is set in the environment and will override the rotated token on the next start; unset it"
            );
        }
        Ok(())
    }

    fn write_atomic(&self, credentials: &Credentials) -> std::io::Result<()> {
        let mut object = fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str::<Map<String, Value>>(&raw).ok())
            .unwrap_or_default();

        object.retain(|k, _| !KEYS.contains(&k.to_uppercase().as_str()));
        object.insert(CLIENT_ID.into(), Value::String(credentials.client_id.clone()));
        object.insert(CLIENT_SECRET.into(), Value::String(credentials.client_secret.clone()));
        object.insert(REFRESH_TOKEN.into(), Value::String(credentials.refresh_token.clone()));

        let json = serde_json::to_string_pretty(&object)?;

        let tmp = self.tmp_path();
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Show only the first few characters of a secret.
pub(crate) fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "***".to_string()
    } else {
        format!("{visible}***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write(dir: &tempfile::TempDir, body: &str) -> CredentialStore {
        let path = dir.path().join("credentials.json");
        fs::write(&path, body).unwrap();
        CredentialStore::new(path)
    }

    #[test]
    fn test_load_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let store = write(
            &dir,
            r#"{"client_id":"id","Client_Secret":"secret","REFRESH_TOKEN":"A"}"#,
        );
        let creds = store.load_with(no_env).unwrap();
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.client_secret, "secret");
        assert_eq!(creds.refresh_token, "A");
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = write(
            &dir,
            r#"{"CLIENT_ID":"id","CLIENT_SECRET":"secret","REFRESH_TOKEN":"A"}"#,
        );
        let creds = store
            .load_with(|key| (key == REFRESH_TOKEN).then(|| "from-env".to_string()))
            .unwrap();
        assert_eq!(creds.refresh_token, "from-env");
        assert!(creds.refresh_token_from_env);
        assert_eq!(creds.client_id, "id");
    }

    #[test]
    fn test_refresh_token_source_is_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let store = write(
            &dir,
            r#"{"CLIENT_ID":"id","CLIENT_SECRET":"secret","REFRESH_TOKEN":"A"}"#,
        );
        assert!(!store.load_with(no_env).unwrap().refresh_token_from_env);

        let from_env = store
            .load_with(|key| (key == CLIENT_ID).then(|| "env-id".to_string()))
            .unwrap();
        assert!(!from_env.refresh_token_from_env);

        let mut rotated = store
            .load_with(|key| (key == REFRESH_TOKEN).then(|| "A".to_string()))
            .unwrap();
        rotated.refresh_token = "B".into();
        store.persist(&rotated).unwrap();
        assert_eq!(store.load_with(no_env).unwrap().refresh_token, "B");
    }

    #[test]
    fn test_missing_file_with_full_env() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("absent.json"));
        let creds = store.load_with(|key| Some(format!("{key}-value"))).unwrap();
        assert_eq!(creds.client_secret, "CLIENT_SECRET-value");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = write(&dir, r#"{"CLIENT_ID":"id","CLIENT_SECRET":"secret"}"#);
        let err = store.load_with(no_env).unwrap_err();
        assert!(matches!(err, SnapshotError::Config(msg) if msg.contains(REFRESH_TOKEN)));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = write(&dir, "not json");
        assert!(matches!(store.load_with(no_env), Err(SnapshotError::Config(_))));
    }

    #[test]
    fn test_persist_replaces_keys_and_keeps_extras() {
        let dir = tempfile::tempdir().unwrap();
        let store = write(
            &dir,
            r#"{"client_id":"id","client_secret":"secret","refresh_token":"A","HOME_NAME":"Cabane"}"#,
        );
        let mut creds = store.load_with(no_env).unwrap();
        creds.refresh_token = "B".into();
        store.persist(&creds).unwrap();

        let raw: Map<String, Value> =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw.get(REFRESH_TOKEN).unwrap(), "B");
        assert_eq!(raw.get("HOME_NAME").unwrap(), "Cabane");
        assert!(raw.get("refresh_token").is_none());
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn test_persist_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("missing-dir").join("c.json"));
        let creds = Credentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
            refresh_token: "B".into(),
            refresh_token_from_env: false,
        };
        assert!(matches!(
            store.persist(&creds),
            Err(SnapshotError::CredentialPersist { .. })
        ));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let creds = Credentials {
            client_id: "id".into(),
            client_secret: "supersecret".into(),
            refresh_token: "refresh-token-value".into(),
            refresh_token_from_env: false,
        };
        let printed = format!("{creds:?}");
        assert!(!printed.contains("supersecret"));
        assert!(!printed.contains("refresh-token-value"));
        assert!(printed.contains("supe***"));
    }
}
