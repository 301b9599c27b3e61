//! `gitlab_project_milestone`

use async_trait::async_trait;
use tanuki_core::context::OperationContext;
use tanuki_core::id;
use tanuki_core::provider::{ProviderError, ProviderResult, ResourceType};
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use tanuki_core::state_map::{StateMap, apply_state_map, date, state_map, timestamp};

use super::{deleted, gone_or_err, opt_string, require_id, require_str};
use crate::api::milestones::{Milestone, MilestoneOptions};
use crate::client::{GitLabClient, Query, escape};

/// State a milestone is created in
const CREATE_STATE: &str = "active";

pub struct ProjectMilestone;

pub fn project_milestone() -> Box<dyn ResourceType<GitLabClient>> {
    Box::new(ProjectMilestone)
}

pub fn milestones_path(project: &str) -> String {
    format!("/projects/{}/milestones", escape(project))
}

pub fn decode_id(raw: &str) -> Result<(String, i64), id::IdError> {
    let parts = id::decode(raw, "project:milestone_id")?;
    let milestone_id = id::parse_int(raw, "milestone_id", &parts[1])?;
    Ok((parts[0].clone(), milestone_id))
}

fn state_event(state: &str) -> Option<&'static str> {
    match state {
        "active" => Some("activate"),
        "closed" => Some("close"),
        _ => None,
    }
}

pub fn milestone_state() -> AttributeType {
    AttributeType::Enum(vec!["active".to_string(), "closed".to_string()])
}

pub fn to_state_map(project: &str, milestone: &Milestone) -> StateMap {
    state_map([
        ("project", project.into()),
        ("iid", milestone.iid.into()),
        ("milestone_id", milestone.id.into()),
        ("project_id", milestone.project_id.map(|id| id.to_string()).into()),
        ("title", milestone.title.as_str().into()),
        ("description", milestone.description.clone().into()),
        ("due_date", date(milestone.due_date.as_ref())),
        ("start_date", date(milestone.start_date.as_ref())),
        ("state", milestone.state.as_str().into()),
        ("updated_at", timestamp(milestone.updated_at.as_ref())),
        ("created_at", timestamp(milestone.created_at.as_ref())),
        ("web_url", milestone.web_url.clone().into()),
        ("expired", milestone.expired.unwrap_or(false).into()),
    ])
}

#[async_trait]
impl ResourceType<GitLabClient> for ProjectMilestone {
    fn name(&self) -> &'static str {
        "gitlab_project_milestone"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("gitlab_project_milestone")
            .attribute(
                AttributeSchema::new("project", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("title", AttributeType::String).required())
            .attribute(AttributeSchema::new("description", AttributeType::String))
            .attribute(AttributeSchema::new("due_date", types::iso_date()))
            .attribute(AttributeSchema::new("start_date", types::iso_date()))
            .attribute(AttributeSchema::new("state", milestone_state()).with_default(CREATE_STATE))
            .attribute(AttributeSchema::new("iid", AttributeType::Int).computed())
            .attribute(AttributeSchema::new("milestone_id", AttributeType::Int).computed())
            .attribute(AttributeSchema::new("project_id", AttributeType::String).computed())
            .attribute(AttributeSchema::new("updated_at", AttributeType::String).computed())
            .attribute(AttributeSchema::new("created_at", AttributeType::String).computed())
            .attribute(AttributeSchema::new("web_url", AttributeType::String).computed())
            .attribute(AttributeSchema::new("expired", AttributeType::Bool).computed())
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let project = require_str(d, "project")?;
        let options = MilestoneOptions {
            title: Some(require_str(d, "title")?),
            description: opt_string(d, "description"),
            start_date: opt_string(d, "start_date"),
            due_date: opt_string(d, "due_date"),
            state_event: None,
        };

        log::debug!("create milestone in project {}", project);
        let milestone: Milestone = client
            .post(ctx, &milestones_path(&project), &options)
            .await?;
        d.set_id(id::encode(&[project.clone(), milestone.id.to_string()]));

        // The create endpoint has no state; anything but the default needs an edit.
        if let Some(event) = d
            .get_str("state")
            .filter(|s| *s != CREATE_STATE)
            .and_then(state_event)
        {
            let options = MilestoneOptions {
                state_event: Some(event.to_string()),
                ..Default::default()
            };
            let path = format!("{}/{}", milestones_path(&project), milestone.id);
            client
                .put::<_, Milestone>(ctx, &path, &Query::new(), &options)
                .await
                .map_err(|e| {
                    ProviderError::new(format!(
                        "milestone {} was created in project {} but updating it right after creation failed: {}",
                        milestone.id, project, e
                    ))
                    .with_cause(e)
                })?;
        }

        self.read(ctx, client, d).await
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let (project, milestone_id) = decode_id(&raw)?;

        let path = format!("{}/{}", milestones_path(&project), milestone_id);
        match client.get::<Milestone>(ctx, &path, &Query::new()).await {
            Ok(milestone) => Ok(apply_state_map(to_state_map(&project, &milestone), d)?),
            Err(e) => gone_or_err(d, e, &format!("milestone {}", raw)),
        }
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let (project, milestone_id) = decode_id(&raw)?;

        let mut options = MilestoneOptions::default();
        if d.has_change("title") {
            options.title = opt_string(d, "title");
        }
        if d.has_change("description") {
            options.description = Some(opt_string(d, "description").unwrap_or_default());
        }
        if d.has_change("start_date") {
            options.start_date = Some(opt_string(d, "start_date").unwrap_or_default());
        }
        if d.has_change("due_date") {
            options.due_date = Some(opt_string(d, "due_date").unwrap_or_default());
        }
        if d.has_change("state") {
            options.state_event = d
                .get_str("state")
                .and_then(state_event)
                .map(str::to_string);
        }

        if !options.is_empty() {
            let path = format!("{}/{}", milestones_path(&project), milestone_id);
            client
                .put::<_, Milestone>(ctx, &path, &Query::new(), &options)
                .await?;
        }

        self.read(ctx, client, d).await
    }

    async fn delete(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let (project, milestone_id) = decode_id(&raw)?;

        let path = format!("{}/{}", milestones_path(&project), milestone_id);
        let result = client.delete(ctx, &path, &Query::new()).await;
        Ok(deleted(result, &raw)?)
    }
}
