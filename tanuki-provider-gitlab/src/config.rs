//! Provider configuration
//!
//! Read from the `provider` block of the configuration file, with the token
//! and base URL falling back to `GITLAB_TOKEN` / `GITLAB_BASE_URL`.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::GitLabError;
use crate::http::TlsOptions;

pub const DEFAULT_BASE_URL: &str = "https://gitlab.com/api/v4";

fn default_early_auth_check() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub cacert_file: Option<PathBuf>,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub client_cert: Option<PathBuf>,
    #[serde(default)]
    pub client_key: Option<PathBuf>,
    /// Call `GET /user` once at startup to fail fast on a bad token
    #[serde(default = "default_early_auth_check")]
    pub early_auth_check: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: None,
            cacert_file: None,
            insecure: false,
            client_cert: None,
            client_key: None,
            early_auth_check: default_early_auth_check(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Configuration after environment fallback and validation
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub token: String,
    /// REST root, always ending in `/api/v4`
    pub api_url: String,
    pub tls: TlsOptions,
    pub early_auth_check: bool,
    pub request_timeout: Duration,
}

impl ProviderConfig {
    /// Resolve against the process environment
    pub fn resolve(self) -> Result<ResolvedConfig, GitLabError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup
    pub fn resolve_with(
        self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ResolvedConfig, GitLabError> {
        let token = self
            .token
            .filter(|t| !t.is_empty())
            .or_else(|| env("GITLAB_TOKEN").filter(|t| !t.is_empty()))
            .ok_or_else(|| {
                GitLabError::Config(
                    "token is required (set it in the provider block or GITLAB_TOKEN)"
                        .to_string(),
                )
            })?;

        let base_url = self
            .base_url
            .filter(|u| !u.is_empty())
            .or_else(|| env("GITLAB_BASE_URL").filter(|u| !u.is_empty()));
        let api_url = match base_url {
            Some(url) => normalize_base_url(&url)?,
            None => DEFAULT_BASE_URL.to_string(),
        };

        let identity_pem = match (&self.client_cert, &self.client_key) {
            (Some(cert), Some(key)) => {
                let mut pem = read_file(cert)?;
                pem.push(b'\n');
                pem.extend(read_file(key)?);
                Some(pem)
            }
            (Some(_), None) => {
                return Err(GitLabError::Config(
                    "client_key is required when client_cert is set".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(GitLabError::Config(
                    "client_cert is required when client_key is set".to_string(),
                ));
            }
            (None, None) => None,
        };

        let ca_cert_pem = self.cacert_file.as_deref().map(read_file).transpose()?;

        Ok(ResolvedConfig {
            token,
            api_url,
            tls: TlsOptions {
                ca_cert_pem,
                insecure: self.insecure,
                identity_pem,
            },
            early_auth_check: self.early_auth_check,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}

fn read_file(path: &std::path::Path) -> Result<Vec<u8>, GitLabError> {
    std::fs::read(path)
        .map_err(|e| GitLabError::Config(format!("failed to read {}: {}", path.display(), e)))
}

/// Normalize a user-supplied base URL to the `/api/v4` REST root
///
/// Accepts the instance root (`https://gitlab.example.com`) or the REST root
/// with or without a trailing slash. The v3 API is rejected.
pub fn normalize_base_url(url: &str) -> Result<String, GitLabError> {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with("/api/v3") {
        return Err(GitLabError::Config(format!(
            "the v3 API is not supported; please upgrade to /api/v4 in {}",
            url
        )));
    }
    if trimmed.ends_with("/api/v4") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}/api/v4", trimmed))
    }
}
