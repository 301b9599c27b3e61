//! GitLab API error types and classification

use tanuki_core::context::Cancellation;
use tanuki_core::lock::LockError;
use tanuki_core::provider::ProviderError;
use thiserror::Error;

use crate::http::{HttpError, HttpMethod, HttpResponse};

/// Replacement text for GitLab's terse rejection of a masked variable value
pub const MASKED_VARIABLE_MESSAGE: &str = "Invalid value for a masked variable. Check the masked variable requirements: https://docs.gitlab.com/ee/ci/variables/#masked-variable-requirements";

#[derive(Debug, Error)]
pub enum GitLabError {
    /// Non-2xx answer from the REST API
    #[error("{method} {url}: {status} {message}")]
    Api {
        method: HttpMethod,
        url: String,
        status: u16,
        message: String,
    },

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("failed to encode request body: {0}")]
    Encode(serde_json::Error),

    #[error("GraphQL error: {0}")]
    GraphQL(String),

    #[error("unable to extract an integer ID from global ID {0:?}")]
    InvalidGlobalId(String),

    #[error("page {0} was returned twice while listing")]
    RepeatedPage(u32),

    #[error("invalid provider configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Cancelled(#[from] Cancellation),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl GitLabError {
    /// Build an API error from a non-2xx response
    ///
    /// GitLab answers with `{"message": ...}` or `{"error": ...}`; anything
    /// else is reported verbatim.
    pub fn from_response(method: HttpMethod, url: &str, resp: &HttpResponse) -> Self {
        Self::Api {
            method,
            url: url.to_string(),
            status: resp.status,
            message: error_message(&resp.body),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GitLabError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn api_message(&self) -> Option<&str> {
        match self {
            GitLabError::Api { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Repository file conflict: another commit landed on the branch
    pub fn is_refresh_error(&self) -> bool {
        self.status() == Some(400)
            && self
                .api_message()
                .is_some_and(|m| m.contains("Please refresh and try again"))
    }

    /// A 400 whose message complains about an invalid value
    pub fn is_invalid_value_error(&self) -> bool {
        self.status() == Some(400)
            && self
                .api_message()
                .is_some_and(|m| m.contains("value") && m.contains("invalid"))
    }
}

fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("message").or_else(|| map.get("error")) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => serde_json::Value::Object(map).to_string(),
        },
        _ => String::from_utf8_lossy(body).into_owned(),
    }
}

impl From<GitLabError> for ProviderError {
    fn from(err: GitLabError) -> Self {
        ProviderError::from_error(err)
    }
}

/// Rewrite an invalid-value error for a masked variable into a readable one
///
/// Every other error passes through unchanged.
pub fn augment_variable_error(masked: bool, err: GitLabError) -> ProviderError {
    if masked && err.is_invalid_value_error() {
        log::error!("{}", err);
        return ProviderError::new(MASKED_VARIABLE_MESSAGE).with_cause(err);
    }
    err.into()
}
