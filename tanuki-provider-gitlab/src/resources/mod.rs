//! GitLab resource types
//!
//! Each resource is a value implementing `ResourceType<GitLabClient>`. Read
//! clears the ID when GitLab answers 404; Delete treats 404 as done.

pub mod branch;
pub mod cluster_agent_token;
pub mod instance_variable;
pub mod project_issue;
pub mod project_milestone;
pub mod project_share_group;
pub mod repository_file;
pub mod variable;

use tanuki_core::provider::{ProviderError, ProviderResult};
use tanuki_core::resource_data::ResourceData;

use crate::error::GitLabError;

/// The composite ID of `d`, which every non-create operation needs
pub(crate) fn require_id(d: &ResourceData) -> ProviderResult<String> {
    d.id()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::new("resource has no ID"))
}

pub(crate) fn require_str(d: &ResourceData, key: &str) -> ProviderResult<String> {
    d.get_str(key)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::new(format!("{} is required", key)))
}

pub(crate) fn require_int(d: &ResourceData, key: &str) -> ProviderResult<i64> {
    d.get_int(key)
        .ok_or_else(|| ProviderError::new(format!("{} is required", key)))
}

pub(crate) fn opt_string(d: &ResourceData, key: &str) -> Option<String> {
    d.get_str(key).map(str::to_string)
}

/// Clear the ID of `d` on 404, propagate anything else
pub(crate) fn gone_or_err(
    d: &mut ResourceData,
    err: GitLabError,
    what: &str,
) -> ProviderResult<()> {
    if err.is_not_found() {
        log::warn!("{} not found, removing from state", what);
        d.clear_id();
        Ok(())
    } else {
        Err(err.into())
    }
}

/// A delete of something already gone succeeds
pub(crate) fn deleted(result: Result<(), GitLabError>, what: &str) -> Result<(), GitLabError> {
    match result {
        Err(e) if e.is_not_found() => {
            log::debug!("{} was already deleted", what);
            Ok(())
        }
        other => other,
    }
}
