//! `gitlab_project_issue`
//!
//! Destroying an issue closes it; `delete_on_destroy = true` deletes it
//! instead, which needs owner permissions on the project.

use async_trait::async_trait;
use tanuki_core::context::OperationContext;
use tanuki_core::id;
use tanuki_core::provider::{ProviderError, ProviderResult, ResourceType};
use tanuki_core::resource::Value;
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use tanuki_core::state_map::{StateMap, apply_state_map, date, state_map, timestamp};

use super::{deleted, gone_or_err, opt_string, require_id, require_str};
use crate::api::issues::{Issue, IssueOptions};
use crate::client::{GitLabClient, Query, escape};
use crate::validation::rfc3339;

const CREATE_STATE: &str = "opened";

pub struct ProjectIssue;

pub fn project_issue() -> Box<dyn ResourceType<GitLabClient>> {
    Box::new(ProjectIssue)
}

fn issues_path(project: &str) -> String {
    format!("/projects/{}/issues", escape(project))
}

fn issue_path(project: &str, iid: i64) -> String {
    format!("{}/{}", issues_path(project), iid)
}

pub fn decode_id(raw: &str) -> Result<(String, i64), id::IdError> {
    let parts = id::decode(raw, "project:iid")?;
    let iid = id::parse_int(raw, "iid", &parts[1])?;
    Ok((parts[0].clone(), iid))
}

fn state_event(state: &str) -> Option<&'static str> {
    match state {
        "opened" => Some("reopen"),
        "closed" => Some("close"),
        _ => None,
    }
}

fn string_list(d: &ResourceData, key: &str) -> Option<Vec<String>> {
    d.get(key).as_list().map(|items| {
        items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    })
}

fn int_list(d: &ResourceData, key: &str) -> Option<Vec<i64>> {
    d.get(key)
        .as_list()
        .map(|items| items.iter().filter_map(Value::as_int).collect())
}

pub fn to_state_map(project: &str, issue: &Issue) -> StateMap {
    let (time_estimate, total_time_spent, human_time_estimate, human_total_time_spent) =
        match &issue.time_stats {
            Some(stats) => (
                Value::from(stats.time_estimate),
                Value::from(stats.total_time_spent),
                Value::from(stats.human_time_estimate.clone()),
                Value::from(stats.human_total_time_spent.clone()),
            ),
            None => (Value::Null, Value::Null, Value::Null, Value::Null),
        };

    state_map([
        ("project", project.into()),
        ("iid", issue.iid.into()),
        ("issue_id", issue.id.into()),
        ("title", issue.title.as_str().into()),
        ("description", issue.description.clone().into()),
        ("confidential", issue.confidential.into()),
        ("created_at", timestamp(Some(&issue.created_at))),
        ("updated_at", timestamp(issue.updated_at.as_ref())),
        ("closed_at", timestamp(issue.closed_at.as_ref())),
        ("closed_by_user_id", issue.closed_by.as_ref().map(|u| u.id).into()),
        ("due_date", date(issue.due_date.as_ref())),
        (
            "issue_type",
            issue.issue_type.as_deref().unwrap_or("issue").into(),
        ),
        (
            "labels",
            Value::List(issue.labels.iter().map(|l| Value::from(l.as_str())).collect()),
        ),
        (
            "assignee_ids",
            Value::List(issue.assignees.iter().map(|a| Value::Int(a.id)).collect()),
        ),
        ("milestone_id", issue.milestone.as_ref().map(|m| m.id).into()),
        ("author_id", issue.author.as_ref().map(|a| a.id).into()),
        ("weight", issue.weight.into()),
        ("state", issue.state.as_str().into()),
        (
            "discussion_locked",
            issue.discussion_locked.unwrap_or(false).into(),
        ),
        ("upvotes", issue.upvotes.into()),
        ("downvotes", issue.downvotes.into()),
        ("user_notes_count", issue.user_notes_count.into()),
        ("web_url", issue.web_url.clone().into()),
        (
            "references",
            issue
                .references
                .as_ref()
                .map(|refs| {
                    Value::Map(
                        refs.iter()
                            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                            .collect(),
                    )
                })
                .unwrap_or(Value::Null),
        ),
        ("time_estimate", time_estimate),
        ("total_time_spent", total_time_spent),
        ("human_time_estimate", human_time_estimate),
        ("human_total_time_spent", human_total_time_spent),
    ])
}

#[async_trait]
impl ResourceType<GitLabClient> for ProjectIssue {
    fn name(&self) -> &'static str {
        "gitlab_project_issue"
    }

    fn schema(&self) -> ResourceSchema {
        let string = || AttributeType::String;
        let int = || AttributeType::Int;

        ResourceSchema::new("gitlab_project_issue")
            .attribute(AttributeSchema::new("project", string()).required().force_new())
            .attribute(AttributeSchema::new("title", string()).required())
            .attribute(
                AttributeSchema::new("iid", int())
                    .optional_computed()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("description", string()))
            .attribute(AttributeSchema::new("confidential", AttributeType::Bool).with_default(false))
            .attribute(
                AttributeSchema::new("created_at", rfc3339())
                    .optional_computed()
                    .force_new()
                    .with_description("Requires administrator or project owner rights"),
            )
            .attribute(AttributeSchema::new("due_date", types::iso_date()))
            .attribute(
                AttributeSchema::new(
                    "issue_type",
                    AttributeType::Enum(vec![
                        "issue".to_string(),
                        "incident".to_string(),
                        "test_case".to_string(),
                    ]),
                )
                .with_default("issue"),
            )
            .attribute(AttributeSchema::new("labels", AttributeType::Set(Box::new(string()))))
            .attribute(AttributeSchema::new("assignee_ids", AttributeType::Set(Box::new(int()))))
            .attribute(AttributeSchema::new("milestone_id", int()))
            .attribute(AttributeSchema::new("weight", int()))
            .attribute(
                AttributeSchema::new(
                    "state",
                    AttributeType::Enum(vec!["opened".to_string(), "closed".to_string()]),
                )
                .with_default(CREATE_STATE),
            )
            .attribute(AttributeSchema::new("discussion_locked", AttributeType::Bool).with_default(false))
            .attribute(
                AttributeSchema::new("delete_on_destroy", AttributeType::Bool)
                    .with_default(false)
                    .with_description("Delete the issue instead of closing it"),
            )
            .attribute(AttributeSchema::new("issue_id", int()).computed())
            .attribute(AttributeSchema::new("updated_at", string()).computed())
            .attribute(AttributeSchema::new("closed_at", string()).computed())
            .attribute(AttributeSchema::new("closed_by_user_id", int()).computed())
            .attribute(AttributeSchema::new("author_id", int()).computed())
            .attribute(AttributeSchema::new("upvotes", int()).computed())
            .attribute(AttributeSchema::new("downvotes", int()).computed())
            .attribute(AttributeSchema::new("user_notes_count", int()).computed())
            .attribute(AttributeSchema::new("web_url", string()).computed())
            .attribute(
                AttributeSchema::new("references", AttributeType::Map(Box::new(string()))).computed(),
            )
            .attribute(AttributeSchema::new("time_estimate", int()).computed())
            .attribute(AttributeSchema::new("total_time_spent", int()).computed())
            .attribute(AttributeSchema::new("human_time_estimate", string()).computed())
            .attribute(AttributeSchema::new("human_total_time_spent", string()).computed())
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let project = require_str(d, "project")?;
        let options = IssueOptions {
            iid: d.get_int("iid"),
            title: Some(require_str(d, "title")?),
            description: opt_string(d, "description"),
            confidential: d.get_bool("confidential"),
            created_at: opt_string(d, "created_at"),
            due_date: opt_string(d, "due_date"),
            issue_type: opt_string(d, "issue_type"),
            labels: string_list(d, "labels").map(|labels| labels.join(",")),
            assignee_ids: int_list(d, "assignee_ids"),
            milestone_id: d.get_int("milestone_id"),
            weight: d.get_int("weight"),
            ..Default::default()
        };

        log::debug!("create issue in project {}", project);
        let issue: Issue = client.post(ctx, &issues_path(&project), &options).await?;
        d.set_id(id::encode(&[project.clone(), issue.iid.to_string()]));

        // Neither the lock nor a non-default state can be set on create.
        let mut follow_up = IssueOptions::default();
        if d.get_bool("discussion_locked") == Some(true) {
            follow_up.discussion_locked = Some(true);
        }
        if let Some(event) = d
            .get_str("state")
            .filter(|s| *s != CREATE_STATE)
            .and_then(state_event)
        {
            follow_up.state_event = Some(event.to_string());
        }
        if !follow_up.is_empty() {
            client
                .put::<_, Issue>(ctx, &issue_path(&project, issue.iid), &Query::new(), &follow_up)
                .await
                .map_err(|e| {
                    ProviderError::new(format!(
                        "issue {} was created in project {} but updating it right after creation failed: {}",
                        issue.iid, project, e
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
        let (project, iid) = decode_id(&raw)?;

        match client
            .get::<Issue>(ctx, &issue_path(&project, iid), &Query::new())
            .await
        {
            Ok(issue) => Ok(apply_state_map(to_state_map(&project, &issue), d)?),
            Err(e) => gone_or_err(d, e, &format!("issue {}", raw)),
        }
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let (project, iid) = decode_id(&raw)?;

        let mut options = IssueOptions::default();
        if d.has_change("title") {
            options.title = opt_string(d, "title");
        }
        if d.has_change("description") {
            options.description = Some(opt_string(d, "description").unwrap_or_default());
        }
        if d.has_change("confidential") {
            options.confidential = d.get_bool("confidential");
        }
        if d.has_change("due_date") {
            options.due_date = Some(opt_string(d, "due_date").unwrap_or_default());
        }
        if d.has_change("issue_type") {
            options.issue_type = opt_string(d, "issue_type");
        }
        if d.has_change("labels") {
            options.labels = Some(string_list(d, "labels").unwrap_or_default().join(","));
        }
        if d.has_change("assignee_ids") {
            options.assignee_ids = Some(int_list(d, "assignee_ids").unwrap_or_default());
        }
        if d.has_change("milestone_id") {
            // 0 unassigns the milestone
            options.milestone_id = Some(d.get_int("milestone_id").unwrap_or(0));
        }
        if d.has_change("weight") {
            options.weight = d.get_int("weight");
        }
        if d.has_change("discussion_locked") {
            options.discussion_locked = d.get_bool("discussion_locked");
        }
        if d.has_change("state") {
            options.state_event = d
                .get_str("state")
                .and_then(state_event)
                .map(str::to_string);
        }

        if !options.is_empty() {
            client
                .put::<_, Issue>(ctx, &issue_path(&project, iid), &Query::new(), &options)
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
        let (project, iid) = decode_id(&raw)?;
        let path = issue_path(&project, iid);

        if d.get_bool("delete_on_destroy") == Some(true) {
            let result = client.delete(ctx, &path, &Query::new()).await;
            return Ok(deleted(result, &raw)?);
        }

        log::debug!("closing issue {} instead of deleting it", raw);
        let options = IssueOptions {
            state_event: Some("close".to_string()),
            ..Default::default()
        };
        let result = client
            .put::<_, Issue>(ctx, &path, &Query::new(), &options)
            .await
            .map(|_| ());
        Ok(deleted(result, &raw)?)
    }
}
