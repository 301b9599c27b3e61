//! `gitlab_instance_variable`: a CI/CD variable of the whole instance
//!
//! Addressed by its key alone; requires an administrator token.

use async_trait::async_trait;
use tanuki_core::context::OperationContext;
use tanuki_core::provider::{ProviderResult, ResourceType};
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use tanuki_core::state_map::{StateMap, apply_state_map, state_map};

use super::{deleted, gone_or_err, opt_string, require_id, require_str};
use crate::api::variables::{Variable, VariableOptions};
use crate::client::{GitLabClient, Query, escape};
use crate::error::augment_variable_error;
use crate::validation::{variable_key, variable_type};

pub const VARIABLES_PATH: &str = "/admin/ci/variables";

pub struct InstanceVariable;

pub fn instance_variable() -> Box<dyn ResourceType<GitLabClient>> {
    Box::new(InstanceVariable)
}

pub fn variable_path(key: &str) -> String {
    format!("{}/{}", VARIABLES_PATH, escape(key))
}

pub fn instance_variable_schema() -> ResourceSchema {
    ResourceSchema::new("gitlab_instance_variable")
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
        .attribute(AttributeSchema::new("masked", AttributeType::Bool).with_default(false))
}

pub fn to_state_map(variable: &Variable) -> StateMap {
    state_map([
        ("key", variable.key.as_str().into()),
        ("value", variable.value.as_str().into()),
        ("variable_type", variable.variable_type.as_str().into()),
        ("protected", variable.protected.into()),
        ("masked", variable.masked.into()),
    ])
}

fn masked(d: &ResourceData) -> bool {
    d.get_bool("masked").unwrap_or(false)
}

#[async_trait]
impl ResourceType<GitLabClient> for InstanceVariable {
    fn name(&self) -> &'static str {
        "gitlab_instance_variable"
    }

    fn schema(&self) -> ResourceSchema {
        instance_variable_schema()
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let key = require_str(d, "key")?;
        let options = VariableOptions {
            key: Some(key.clone()),
            value: Some(require_str(d, "value")?),
            variable_type: opt_string(d, "variable_type"),
            protected: d.get_bool("protected"),
            masked: d.get_bool("masked"),
            environment_scope: None,
        };

        let _: Variable = client
            .post(ctx, VARIABLES_PATH, &options)
            .await
            .map_err(|e| augment_variable_error(masked(d), e))?;

        d.set_id(key);
        self.read(ctx, client, d).await
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let key = require_id(d)?;
        match client
            .get::<Variable>(ctx, &variable_path(&key), &Query::new())
            .await
        {
            Ok(variable) => Ok(apply_state_map(to_state_map(&variable), d)?),
            Err(e) => gone_or_err(d, e, &format!("instance variable {}", key)),
        }
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let key = require_id(d)?;
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
            .put(ctx, &variable_path(&key), &Query::new(), &options)
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
        let key = require_id(d)?;
        let result = client.delete(ctx, &variable_path(&key), &Query::new()).await;
        deleted(result, &key).map_err(|e| augment_variable_error(masked(d), e))
    }
}
