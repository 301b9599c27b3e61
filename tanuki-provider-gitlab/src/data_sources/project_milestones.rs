//! `gitlab_project_milestones`

use async_trait::async_trait;
use tanuki_core::context::OperationContext;
use tanuki_core::provider::{DataSourceType, ProviderResult, ResourceType};
use tanuki_core::resource::Value;
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::{object_of, schema_from_resource};
use crate::api::milestones::Milestone;
use crate::client::{GitLabClient, Query};
use crate::resources::project_milestone::{self, milestones_path, to_state_map};
use crate::resources::require_str;

pub struct ProjectMilestones;

pub fn project_milestones() -> Box<dyn DataSourceType<GitLabClient>> {
    Box::new(ProjectMilestones)
}

fn filters(d: &ResourceData) -> Query {
    let mut query = Query::new();
    if let Some(iids) = d.get("iids").as_list() {
        let mut iids: Vec<i64> = iids.iter().filter_map(Value::as_int).collect();
        iids.sort_unstable();
        for iid in iids {
            query = query.with("iids[]", iid);
        }
    }
    query
        .with_opt("title", d.get_str("title"))
        .with_opt("state", d.get_str("state"))
        .with_opt("search", d.get_str("search"))
        .with_opt("include_parent_milestones", d.get_bool("include_parent_milestones"))
}

/// ID for one combination of project and filters: the encoded query
fn lookup_id(project: &str, query: &Query) -> String {
    match query.encode() {
        encoded if encoded.is_empty() => format!("{}:all", project),
        encoded => format!("{}:{}", project, encoded),
    }
}

fn milestone_element() -> AttributeType {
    let resource = project_milestone::ProjectMilestone.schema();
    object_of(&schema_from_resource(resource, "milestone", &[], &[]))
}

#[async_trait]
impl DataSourceType<GitLabClient> for ProjectMilestones {
    fn name(&self) -> &'static str {
        "gitlab_project_milestones"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("gitlab_project_milestones")
            .attribute(AttributeSchema::new("project", AttributeType::String).required())
            .attribute(AttributeSchema::new(
                "iids",
                AttributeType::Set(Box::new(AttributeType::Int)),
            ))
            .attribute(AttributeSchema::new(
                "state",
                project_milestone::milestone_state(),
            ))
            .attribute(AttributeSchema::new("title", AttributeType::String))
            .attribute(AttributeSchema::new("search", AttributeType::String))
            .attribute(AttributeSchema::new(
                "include_parent_milestones",
                AttributeType::Bool,
            ))
            .attribute(
                AttributeSchema::new(
                    "milestones",
                    AttributeType::List(Box::new(milestone_element())),
                )
                .computed(),
            )
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let project = require_str(d, "project")?;
        let query = filters(d);

        log::debug!("list milestones of project {}", project);
        let milestones: Vec<Milestone> = client
            .list(ctx, &milestones_path(&project), &query)
            .await?;

        let flattened = milestones
            .iter()
            .map(|m| Value::Map(to_state_map(&project, m).into_iter().collect()))
            .collect();

        d.set_id(lookup_id(&project, &query));
        d.set("milestones", Value::List(flattened))?;
        Ok(())
    }
}
