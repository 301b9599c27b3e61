//! `gitlab_project_variable` and `gitlab_group_variable`
//!
//! Both resources share one implementation; [`VariableScope`] carries the
//! differences (owner attribute, API collection, ID shape).

use async_trait::async_trait;
use tanuki_core::context::OperationContext;
use tanuki_core::id::{self, IdError};
use tanuki_core::provider::{ProviderResult, ResourceType};
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use tanuki_core::state_map::{StateMap, apply_state_map, state_map};

use super::{deleted, gone_or_err, opt_string, require_id, require_str};
use crate::api::variables::{Variable, VariableOptions};
use crate::client::{GitLabClient, Query, escape};
use crate::error::augment_variable_error;
use crate::validation::{variable_key, variable_type};

pub const DEFAULT_ENVIRONMENT_SCOPE: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableScope {
    Project,
    Group,
}

/// Decoded `owner:key:environment_scope`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableId {
    pub owner: String,
    pub key: String,
    pub environment_scope: String,
}

impl VariableScope {
    pub fn resource_name(self) -> &'static str {
        match self {
            VariableScope::Project => "gitlab_project_variable",
            VariableScope::Group => "gitlab_group_variable",
        }
    }

    /// Attribute naming the owning project or group
    pub fn owner_attribute(self) -> &'static str {
        match self {
            VariableScope::Project => "project",
            VariableScope::Group => "group",
        }
    }

    fn collection(self) -> &'static str {
        match self {
            VariableScope::Project => "projects",
            VariableScope::Group => "groups",
        }
    }

    pub fn variables_path(self, owner: &str) -> String {
        format!("/{}/{}/variables", self.collection(), escape(owner))
    }

    pub fn variable_path(self, owner: &str, key: &str) -> String {
        format!("{}/{}", self.variables_path(owner), escape(key))
    }

    pub fn encode_id(self, owner: &str, key: &str, environment_scope: &str) -> String {
        id::encode(&[owner, key, environment_scope])
    }

    /// Decode a variable ID
    ///
    /// Project IDs also accept the legacy `project:key` form, whose scope is
    /// taken from `configured_scope`. Group IDs split at the first two `:`;
    /// a missing scope means `*`.
    pub fn decode_id(self, raw: &str, configured_scope: Option<&str>) -> Result<VariableId, IdError> {
        match self {
            VariableScope::Project => {
                let parts = id::decode_first_of(
                    raw,
                    &["project:key:environment_scope", "project:key"],
                )?;
                let environment_scope = match parts.get(2) {
                    Some(scope) => scope.clone(),
                    None => configured_scope
                        .unwrap_or(DEFAULT_ENVIRONMENT_SCOPE)
                        .to_string(),
                };
                Ok(VariableId {
                    owner: parts[0].clone(),
                    key: parts[1].clone(),
                    environment_scope,
                })
            }
            VariableScope::Group => {
                let parts = id::decode(raw, "group:key")?;
                let mut rest = parts[1].splitn(2, ':');
                let key = rest.next().unwrap_or_default().to_string();
                let environment_scope = rest
                    .next()
                    .unwrap_or(DEFAULT_ENVIRONMENT_SCOPE)
                    .to_string();
                Ok(VariableId {
                    owner: parts[0].clone(),
                    key,
                    environment_scope,
                })
            }
        }
    }

    pub fn schema(self) -> ResourceSchema {
        ResourceSchema::new(self.resource_name())
            .with_description(match self {
                VariableScope::Project => "A CI/CD variable of a project",
                VariableScope::Group => "A CI/CD variable of a group",
            })
            .attribute(
                AttributeSchema::new(self.owner_attribute(), AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("key", variable_key())
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("value", AttributeType::String)
                    .required()
                    .sensitive(),
            )
            .attribute(AttributeSchema::new("variable_type", variable_type()).with_default("env_var"))
            .attribute(AttributeSchema::new("protected", AttributeType::Bool).with_default(false))
            .attribute(
                AttributeSchema::new("masked", AttributeType::Bool)
                    .with_default(false)
                    .with_description("Hide the value in job logs"),
            )
            .attribute(
                AttributeSchema::new("environment_scope", AttributeType::String)
                    .with_default(DEFAULT_ENVIRONMENT_SCOPE)
                    .force_new(),
            )
    }

    pub fn to_state_map(self, owner: &str, variable: &Variable) -> StateMap {
        state_map([
            (self.owner_attribute(), owner.into()),
            ("key", variable.key.as_str().into()),
            ("value", variable.value.as_str().into()),
            ("variable_type", variable.variable_type.as_str().into()),
            ("protected", variable.protected.into()),
            ("masked", variable.masked.into()),
            (
                "environment_scope",
                variable
                    .environment_scope
                    .as_deref()
                    .unwrap_or(DEFAULT_ENVIRONMENT_SCOPE)
                    .into(),
            ),
        ])
    }
}

pub struct ScopedVariable {
    scope: VariableScope,
}

pub fn project_variable() -> Box<dyn ResourceType<GitLabClient>> {
    Box::new(ScopedVariable {
        scope: VariableScope::Project,
    })
}

pub fn group_variable() -> Box<dyn ResourceType<GitLabClient>> {
    Box::new(ScopedVariable {
        scope: VariableScope::Group,
    })
}

fn masked(d: &ResourceData) -> bool {
    d.get_bool("masked").unwrap_or(false)
}

#[async_trait]
impl ResourceType<GitLabClient> for ScopedVariable {
    fn name(&self) -> &'static str {
        self.scope.resource_name()
    }

    fn schema(&self) -> ResourceSchema {
        self.scope.schema()
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let owner = require_str(d, self.scope.owner_attribute())?;
        let key = require_str(d, "key")?;
        let environment_scope = d
            .get_str("environment_scope")
            .unwrap_or(DEFAULT_ENVIRONMENT_SCOPE)
            .to_string();

        let options = VariableOptions {
            key: Some(key.clone()),
            value: Some(require_str(d, "value")?),
            variable_type: opt_string(d, "variable_type"),
            protected: d.get_bool("protected"),
            masked: d.get_bool("masked"),
            environment_scope: Some(environment_scope.clone()),
        };

        log::debug!(
            "create {} {} in {}",
            self.scope.resource_name(),
            key,
            owner
        );
        let _: Variable = client
            .post(ctx, &self.scope.variables_path(&owner), &options)
            .await
            .map_err(|e| augment_variable_error(masked(d), e))?;

        d.set_id(self.scope.encode_id(&owner, &key, &environment_scope));
        self.read(ctx, client, d).await
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let id = self.scope.decode_id(&raw, d.get_str("environment_scope"))?;

        let result = client
            .get::<Variable>(
                ctx,
                &self.scope.variable_path(&id.owner, &id.key),
                &Query::environment_scope(&id.environment_scope),
            )
            .await;

        match result {
            Ok(variable) => {
                apply_state_map(self.scope.to_state_map(&id.owner, &variable), d)?;
                Ok(())
            }
            Err(e) if e.is_not_found() => gone_or_err(d, e, &format!("variable {}", raw)),
            Err(e) => Err(augment_variable_error(masked(d), e)),
        }
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let id = self.scope.decode_id(&raw, d.get_str("environment_scope"))?;

        let mut options = VariableOptions::default();
        if d.has_change("value") {
            options.value = opt_string(d, "value");
        }
        if d.has_change("variable_type") {
            options.variable_type = opt_string(d, "variable_type");
        }
        if d.has_change("protected") {
            options.protected = d.get_bool("protected");
        }
        if d.has_change("masked") {
            options.masked = d.get_bool("masked");
        }

        let _: Variable = client
            .put(
                ctx,
                &self.scope.variable_path(&id.owner, &id.key),
                &Query::environment_scope(&id.environment_scope),
                &options,
            )
            .await
            .map_err(|e| augment_variable_error(masked(d), e))?;

        self.read(ctx, client, d).await
    }

    async fn delete(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let id = self.scope.decode_id(&raw, d.get_str("environment_scope"))?;

        let result = client
            .delete(
                ctx,
                &self.scope.variable_path(&id.owner, &id.key),
                &Query::environment_scope(&id.environment_scope),
            )
            .await;
        deleted(result, &raw).map_err(|e| augment_variable_error(masked(d), e))
    }
}
