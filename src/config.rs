use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.netatmo.com/api";
pub const DEFAULT_TOKEN_URL: &str = "https://api.netatmo.com/oauth2/token";

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Netatmo ─────────────────────────────────────────────────────────
    pub api_url: Url,
    pub token_url: Url,
    /// JSON file holding CLIENT_ID, CLIENT_SECRET and REFRESH_TOKEN.
    pub credentials_file: PathBuf,

    // ── HTTP ────────────────────────────────────────────────────────────
    /// Applied to every request, including snapshot downloads.
    pub http_timeout: Duration,
    /// Renew the access token this long before it actually expires.
    pub refresh_margin: Duration,

    // ── Detection ───────────────────────────────────────────────────────
    pub detector_url: Option<Url>,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("NETATMO_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let token_url = lookup("NETATMO_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.into());

        Ok(Config {
            api_url: parse_base_url(&api_url).context("Invalid NETATMO_API_URL")?,
            token_url: Url::parse(&token_url).context("Invalid NETATMO_TOKEN_URL")?,
            credentials_file: lookup("NETATMO_CREDENTIALS_FILE")
                .unwrap_or_else(|| "credentials.json".into())
                .into(),

            http_timeout: Duration::from_secs(
                lookup("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|| "10".into())
                    .parse()
                    .context("Invalid HTTP_TIMEOUT_SECS")?,
            ),
            refresh_margin: Duration::from_secs(
                lookup("TOKEN_REFRESH_MARGIN_SECS")
                    .unwrap_or_else(|| "30".into())
                    .parse()
                    .context("Invalid TOKEN_REFRESH_MARGIN_SECS")?,
            ),

            detector_url: lookup("DETECTOR_URL")
                .map(|u| parse_base_url(&u))
                .transpose()
                .context("Invalid DETECTOR_URL")?,
            output_dir: lookup("OUTPUT_DIR")
                .unwrap_or_else(|| "detections".into())
                .into(),
        })
    }

    /// Full URL of a Netatmo API method, e.g. `getevents`.
    pub fn endpoint(&self, method: &str) -> String {
        join_url(&self.api_url, method)
    }
}

/// Parse a base URL so that relative joins append rather than replace the
/// last path segment.
fn parse_base_url(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}

pub(crate) fn join_url(base: &Url, path: &str) -> String {
    base.join(path.trim_start_matches('/'))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}{}", base, path.trim_start_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.endpoint("getevents"), "https://api.netatmo.com/api/getevents");
        assert_eq!(config.token_url.as_str(), DEFAULT_TOKEN_URL);
        assert_eq!(config.credentials_file, PathBuf::from("credentials.json"));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.refresh_margin, Duration::from_secs(30));
        assert!(config.detector_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("NETATMO_API_URL", "http://localhost:9000/api/"),
            ("HTTP_TIMEOUT_SECS", "3"),
            ("DETECTOR_URL", "http://localhost:8500"),
        ])
        .unwrap();
        assert_eq!(config.endpoint("homesdata"), "http://localhost:9000/api/homesdata");
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert_eq!(
            config.detector_url.unwrap().as_str(),
            "http://localhost:8500/"
        );
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        assert!(config_from(&[("HTTP_TIMEOUT_SECS", "ten")]).is_err());
    }
}
