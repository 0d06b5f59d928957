/*
    spotify-features-rs | Rust CLI tool to export track metadata and audio features.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com/";
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1/";
pub const DEFAULT_SCOPE: &str = "user-read-private user-read-email";
pub const DEFAULT_SEARCH_INTERVAL_MS: u64 = 200;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_TRACKS_FILE: &str = "tracks.json";
pub const DEFAULT_VERIFIER_CACHE: &str = ".spotify_pkce_cache.json";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} was not set")]
    Missing(String),
    #[error("{0}")]
    Invalid(String),
}

/// Settings for the PKCE handshake.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: String,
    /// Kept verbatim: the provider compares it byte for byte with the registered URI.
    pub redirect_uri: String,
    pub scope: String,
    pub accounts_base: Url,
}

/// Settings for Web API calls.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_base: Url,
    pub timeout: Duration,
    /// Minimum gap between two successive search requests.
    pub search_interval: Duration,
}

/// Where the input comes from and where the output goes.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub tracks_file: PathBuf,
    pub out_dir: PathBuf,
    pub verifier_cache: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub report: ReportConfig,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Callers that want `.env` support load it before calling this.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required =
            |key: &str| var(key).ok_or_else(|| ConfigError::Missing(key.to_string()));

        let client_id = required("SPOTIFY_CLIENT_ID")?;
        let redirect_uri = required("SPOTIFY_REDIRECT_URI")?;
        Url::parse(&redirect_uri)
            .map_err(|e| ConfigError::Invalid(format!("SPOTIFY_REDIRECT_URI invalid: {e}")))?;

        let accounts_base = base_url(
            "SPOTIFY_ACCOUNTS_URL",
            &var("SPOTIFY_ACCOUNTS_URL").unwrap_or_else(|| DEFAULT_ACCOUNTS_URL.to_string()),
        )?;
        let api_base = base_url(
            "SPOTIFY_API_BASE",
            &var("SPOTIFY_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        )?;

        let scope = var("SPOTIFY_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.to_string());

        let millis = |key: &str, default: u64| -> Result<Duration, ConfigError> {
            match var(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| ConfigError::Invalid(format!("{key} must be milliseconds, got {raw:?}"))),
                None => Ok(Duration::from_millis(default)),
            }
        };

        let search_interval = millis("SPOTIFY_SEARCH_INTERVAL_MS", DEFAULT_SEARCH_INTERVAL_MS)?;
        let timeout = millis("SPOTIFY_HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)?;

        let path = |key: &str, default: &str| PathBuf::from(var(key).unwrap_or_else(|| default.to_string()));

        Ok(Self {
            auth: AuthConfig {
                client_id,
                redirect_uri,
                scope,
                accounts_base,
            },
            api: ApiConfig {
                api_base,
                timeout,
                search_interval,
            },
            report: ReportConfig {
                tracks_file: path("FEATURES_TRACKS_FILE", DEFAULT_TRACKS_FILE),
                out_dir: path("FEATURES_OUT_DIR", "."),
                verifier_cache: path("FEATURES_VERIFIER_CACHE", DEFAULT_VERIFIER_CACHE),
            },
        })
    }
}

/// Parses a base URL, requires https and appends a trailing slash so
/// `Url::join` keeps the existing path.
fn base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw).map_err(|e| ConfigError::Invalid(format!("{key} invalid: {e}")))?;

    if url.scheme() != "https" {
        return Err(ConfigError::Invalid(format!("{key} must be https: {url}")));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "client"),
            ("SPOTIFY_REDIRECT_URI", "http://localhost:8888/callback"),
        ]))
        .unwrap();

        assert_eq!(config.auth.client_id, "client");
        assert_eq!(config.auth.redirect_uri, "http://localhost:8888/callback");
        assert_eq!(config.auth.scope, DEFAULT_SCOPE);
        assert_eq!(config.auth.accounts_base.as_str(), DEFAULT_ACCOUNTS_URL);
        assert_eq!(config.api.api_base.as_str(), DEFAULT_API_BASE);
        assert_eq!(config.api.search_interval, Duration::from_millis(200));
        assert_eq!(config.report.tracks_file, PathBuf::from("tracks.json"));
        assert_eq!(config.report.verifier_cache, PathBuf::from(DEFAULT_VERIFIER_CACHE));
    }

    #[test]
    fn test_missing_client_id() {
        let err = AppConfig::from_lookup(lookup(&[(
            "SPOTIFY_REDIRECT_URI",
            "http://localhost:8888/callback",
        )]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("SPOTIFY_CLIENT_ID".to_string()));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = AppConfig::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "client"),
            ("SPOTIFY_REDIRECT_URI", "   "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("SPOTIFY_REDIRECT_URI".to_string()));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "client"),
            ("SPOTIFY_REDIRECT_URI", "http://localhost:8888/callback"),
            ("SPOTIFY_API_BASE", "https://api.example.com/v2"),
        ]))
        .unwrap();
        assert_eq!(config.api.api_base.as_str(), "https://api.example.com/v2/");
        assert_eq!(
            config.api.api_base.join("search").unwrap().as_str(),
            "https://api.example.com/v2/search"
        );
    }

    #[test]
    fn test_plain_http_base_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "client"),
            ("SPOTIFY_REDIRECT_URI", "http://localhost:8888/callback"),
            ("SPOTIFY_ACCOUNTS_URL", "http://accounts.spotify.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_interval_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "client"),
            ("SPOTIFY_REDIRECT_URI", "http://localhost:8888/callback"),
            ("SPOTIFY_SEARCH_INTERVAL_MS", "fast"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("SPOTIFY_SEARCH_INTERVAL_MS")));
    }
}
