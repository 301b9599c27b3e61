//! Variable data sources: one variable by key, or every variable of a
//! project, group or the instance

use async_trait::async_trait;
use tanuki_core::context::OperationContext;
use tanuki_core::provider::{DataSourceType, ProviderResult};
use tanuki_core::resource::Value;
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use tanuki_core::state_map::{StateMap, apply_state_map};

use super::{object_of, schema_from_resource};
use crate::api::variables::Variable;
use crate::client::{GitLabClient, Query};
use crate::resources::instance_variable::{self, instance_variable_schema};
use crate::resources::require_str;
use crate::resources::variable::{DEFAULT_ENVIRONMENT_SCOPE, VariableScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Scoped(VariableScope),
    Instance,
}

impl Level {
    fn single_schema(self, name: &str) -> ResourceSchema {
        match self {
            Level::Scoped(scope) => schema_from_resource(
                scope.schema(),
                name,
                &[scope.owner_attribute(), "key"],
                &["environment_scope"],
            ),
            Level::Instance => schema_from_resource(instance_variable_schema(), name, &["key"], &[]),
        }
    }

    fn flatten(self, owner: &str, variable: &Variable) -> StateMap {
        match self {
            Level::Scoped(scope) => scope.to_state_map(owner, variable),
            Level::Instance => instance_variable::to_state_map(variable),
        }
    }
}

/// Owner and environment scope configured on `d`; empty owner for the instance
fn lookup(level: Level, d: &ResourceData) -> ProviderResult<(String, String)> {
    let owner = match level {
        Level::Scoped(scope) => require_str(d, scope.owner_attribute())?,
        Level::Instance => String::new(),
    };
    let environment_scope = d
        .get_str("environment_scope")
        .unwrap_or(DEFAULT_ENVIRONMENT_SCOPE)
        .to_string();
    Ok((owner, environment_scope))
}

pub struct VariableDataSource {
    level: Level,
}

pub fn project_variable() -> Box<dyn DataSourceType<GitLabClient>> {
    Box::new(VariableDataSource {
        level: Level::Scoped(VariableScope::Project),
    })
}

pub fn group_variable() -> Box<dyn DataSourceType<GitLabClient>> {
    Box::new(VariableDataSource {
        level: Level::Scoped(VariableScope::Group),
    })
}

pub fn instance_variable() -> Box<dyn DataSourceType<GitLabClient>> {
    Box::new(VariableDataSource {
        level: Level::Instance,
    })
}

#[async_trait]
impl DataSourceType<GitLabClient> for VariableDataSource {
    fn name(&self) -> &'static str {
        match self.level {
            Level::Scoped(scope) => scope.resource_name(),
            Level::Instance => "gitlab_instance_variable",
        }
    }

    fn schema(&self) -> ResourceSchema {
        self.level.single_schema(self.name())
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let key = require_str(d, "key")?;
        let (owner, environment_scope) = lookup(self.level, d)?;

        let (variable, id) = match self.level {
            Level::Scoped(scope) => {
                let variable: Variable = client
                    .get(
                        ctx,
                        &scope.variable_path(&owner, &key),
                        &Query::environment_scope(&environment_scope),
                    )
                    .await?;
                (variable, scope.encode_id(&owner, &key, &environment_scope))
            }
            Level::Instance => {
                let variable: Variable = client
                    .get(ctx, &instance_variable::variable_path(&key), &Query::new())
                    .await?;
                (variable, key)
            }
        };

        d.set_id(id);
        apply_state_map(self.level.flatten(&owner, &variable), d)?;
        Ok(())
    }
}

pub struct VariablesDataSource {
    level: Level,
}

pub fn project_variables() -> Box<dyn DataSourceType<GitLabClient>> {
    Box::new(VariablesDataSource {
        level: Level::Scoped(VariableScope::Project),
    })
}

pub fn group_variables() -> Box<dyn DataSourceType<GitLabClient>> {
    Box::new(VariablesDataSource {
        level: Level::Scoped(VariableScope::Group),
    })
}

pub fn instance_variables() -> Box<dyn DataSourceType<GitLabClient>> {
    Box::new(VariablesDataSource {
        level: Level::Instance,
    })
}

#[async_trait]
impl DataSourceType<GitLabClient> for VariablesDataSource {
    fn name(&self) -> &'static str {
        match self.level {
            Level::Scoped(VariableScope::Project) => "gitlab_project_variables",
            Level::Scoped(VariableScope::Group) => "gitlab_group_variables",
            Level::Instance => "gitlab_instance_variables",
        }
    }

    fn schema(&self) -> ResourceSchema {
        let element = object_of(&self.level.single_schema("variable"));
        let mut schema = ResourceSchema::new(self.name()).attribute(
            AttributeSchema::new("variables", AttributeType::List(Box::new(element))).computed(),
        );
        if let Level::Scoped(scope) = self.level {
            schema = schema
                .attribute(
                    AttributeSchema::new(scope.owner_attribute(), AttributeType::String)
                        .required(),
                )
                .attribute(
                    AttributeSchema::new("environment_scope", AttributeType::String)
                        .with_default(DEFAULT_ENVIRONMENT_SCOPE),
                );
        }
        schema
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let (owner, environment_scope) = lookup(self.level, d)?;

        let (variables, id): (Vec<Variable>, String) = match self.level {
            Level::Scoped(scope) => (
                client
                    .list(
                        ctx,
                        &scope.variables_path(&owner),
                        &Query::environment_scope(&environment_scope),
                    )
                    .await?,
                format!("{}:{}", owner, environment_scope),
            ),
            Level::Instance => (
                client
                    .list(ctx, instance_variable::VARIABLES_PATH, &Query::new())
                    .await?,
                "instance_variables".to_string(),
            ),
        };

        log::debug!("read {} variables for {}", variables.len(), id);
        let flattened = variables
            .iter()
            .map(|v| Value::Map(self.level.flatten(&owner, v).into_iter().collect()))
            .collect();

        d.set_id(id);
        d.set("variables", Value::List(flattened))?;
        Ok(())
    }
}
