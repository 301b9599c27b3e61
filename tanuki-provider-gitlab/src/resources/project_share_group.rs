//! `gitlab_project_share_group`
//!
//! Schema version 1 renamed `access_level` to `group_access`; state written
//! by version 0 is migrated on load.

use std::collections::HashMap;

use async_trait::async_trait;
use tanuki_core::context::OperationContext;
use tanuki_core::id;
use tanuki_core::provider::{ProviderError, ProviderResult, ResourceType};
use tanuki_core::resource::Value;
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{deleted, require_id, require_int, require_str};
use crate::api::projects::{Project, ShareWithGroupOptions};
use crate::client::{GitLabClient, Query, escape};
use crate::validation::{access_level_name, access_level_value, project_access_level};

pub const SCHEMA_VERSION: u32 = 1;

pub struct ProjectShareGroup;

pub fn project_share_group() -> Box<dyn ResourceType<GitLabClient>> {
    Box::new(ProjectShareGroup)
}

pub fn decode_id(raw: &str) -> Result<(String, i64), id::IdError> {
    let parts = id::decode(raw, "project_id:group_id")?;
    let group_id = id::parse_int(raw, "group_id", &parts[1])?;
    Ok((parts[0].clone(), group_id))
}

/// Configured access level, preferring `group_access` over the deprecated name
fn requested_access(d: &ResourceData) -> ProviderResult<i64> {
    let name = d
        .get_str("group_access")
        .or_else(|| d.get_str("access_level"))
        .ok_or_else(|| ProviderError::new("one of group_access or access_level must be set"))?;
    access_level_value(name)
        .ok_or_else(|| ProviderError::new(format!("unknown access level {:?}", name)))
}

#[async_trait]
impl ResourceType<GitLabClient> for ProjectShareGroup {
    fn name(&self) -> &'static str {
        "gitlab_project_share_group"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("gitlab_project_share_group")
            .with_version(SCHEMA_VERSION)
            .attribute(
                AttributeSchema::new("project_id", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("group_id", AttributeType::Int)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("group_access", project_access_level())
                    .optional_computed()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("access_level", project_access_level())
                    .force_new()
                    .with_description("Deprecated, use group_access"),
            )
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let project = require_str(d, "project_id")?;
        let options = ShareWithGroupOptions {
            group_id: require_int(d, "group_id")?,
            group_access: requested_access(d)?,
        };

        log::debug!("share project {} with group {}", project, options.group_id);
        let _: serde_json::Value = client
            .post(ctx, &format!("/projects/{}/share", escape(&project)), &options)
            .await?;
        d.set_id(id::encode(&[project, options.group_id.to_string()]));

        self.read(ctx, client, d).await
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let (project, group_id) = decode_id(&raw)?;

        let result = client
            .get::<Project>(ctx, &format!("/projects/{}", escape(&project)), &Query::new())
            .await;
        let shared = match result {
            Ok(p) => p
                .shared_with_groups
                .into_iter()
                .find(|g| g.group_id == group_id),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        let Some(shared) = shared else {
            log::warn!("project {} is not shared with group {}, removing from state", project, group_id);
            d.clear_id();
            return Ok(());
        };

        let level = access_level_name(shared.group_access_level);
        d.set("project_id", project)?;
        d.set("group_id", group_id)?;
        d.set("group_access", level)?;
        if d.get_ok("access_level").is_some() {
            d.set("access_level", level)?;
        }
        Ok(())
    }

    async fn delete(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let (project, group_id) = decode_id(&raw)?;

        let path = format!("/projects/{}/share/{}", escape(&project), group_id);
        let result = client.delete(ctx, &path, &Query::new()).await;
        Ok(deleted(result, &raw)?)
    }

    fn upgrade_state(
        &self,
        from_version: u32,
        mut attributes: HashMap<String, Value>,
    ) -> ProviderResult<HashMap<String, Value>> {
        if from_version == 0 {
            let legacy = attributes.remove("access_level").unwrap_or(Value::Null);
            let current = attributes.get("group_access").unwrap_or(&Value::Null);
            if current.is_null() && !legacy.is_null() {
                log::debug!("moving access_level to group_access");
                attributes.insert("group_access".to_string(), legacy);
            }
        }
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_zero_state_moves_access_level() {
        let v0 = HashMap::from([
            ("project_id".to_string(), Value::from("42")),
            ("group_id".to_string(), Value::Int(7)),
            ("access_level".to_string(), Value::from("developer")),
        ]);
        let upgraded = ProjectShareGroup.upgrade_state(0, v0).unwrap();
        assert_eq!(upgraded.get("group_access"), Some(&Value::from("developer")));
        assert!(!upgraded.contains_key("access_level"));
        assert_eq!(upgraded.get("group_id"), Some(&Value::Int(7)));
    }

    #[test]
    fn current_state_is_untouched() {
        let v1 = HashMap::from([("group_access".to_string(), Value::from("guest"))]);
        let upgraded = ProjectShareGroup.upgrade_state(1, v1.clone()).unwrap();
        assert_eq!(upgraded, v1);
    }

    #[test]
    fn schema_is_versioned() {
        assert_eq!(ProjectShareGroup.schema().version, SCHEMA_VERSION);
    }
}
