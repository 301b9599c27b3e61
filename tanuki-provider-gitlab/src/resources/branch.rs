//! `gitlab_branch`

use async_trait::async_trait;
use tanuki_core::context::OperationContext;
use tanuki_core::id;
use tanuki_core::provider::{ProviderResult, ResourceType};
use tanuki_core::resource::Value;
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use tanuki_core::state_map::{StateMap, apply_state_map, state_map, timestamp};

use super::{deleted, gone_or_err, require_id, require_str};
use crate::api::branches::{Branch, Commit, CreateBranchOptions};
use crate::client::{GitLabClient, Query, escape};

pub struct ProjectBranch;

pub fn branch() -> Box<dyn ResourceType<GitLabClient>> {
    Box::new(ProjectBranch)
}

fn branches_path(project: &str) -> String {
    format!("/projects/{}/repository/branches", escape(project))
}

fn branch_path(project: &str, name: &str) -> String {
    format!("{}/{}", branches_path(project), escape(name))
}

/// `project:name`; branch names may contain `:`
pub fn decode_id(raw: &str) -> Result<(String, String), id::IdError> {
    let parts = id::decode(raw, "project:name")?;
    Ok((parts[0].clone(), parts[1].clone()))
}

fn flatten_commit(commit: &Commit) -> Value {
    let entries = [
        ("id", Value::from(commit.id.as_str())),
        ("short_id", commit.short_id.as_str().into()),
        ("title", commit.title.as_str().into()),
        ("message", commit.message.clone().into()),
        ("author_name", commit.author_name.as_str().into()),
        ("author_email", commit.author_email.as_str().into()),
        ("authored_date", timestamp(commit.authored_date.as_ref())),
        ("committed_date", timestamp(commit.committed_date.as_ref())),
        ("committer_name", commit.committer_name.clone().into()),
        ("committer_email", commit.committer_email.clone().into()),
    ];
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

pub fn to_state_map(project: &str, branch: &Branch) -> StateMap {
    state_map([
        ("project", project.into()),
        ("name", branch.name.as_str().into()),
        ("web_url", branch.web_url.clone().into()),
        ("default", branch.default.into()),
        ("can_push", branch.can_push.into()),
        ("merged", branch.merged.into()),
        ("protected", branch.protected.into()),
        ("developer_can_merge", branch.developers_can_merge.into()),
        ("developer_can_push", branch.developers_can_push.into()),
        (
            "commit",
            Value::List(branch.commit.iter().map(flatten_commit).collect()),
        ),
    ])
}

#[async_trait]
impl ResourceType<GitLabClient> for ProjectBranch {
    fn name(&self) -> &'static str {
        "gitlab_branch"
    }

    fn schema(&self) -> ResourceSchema {
        let computed_bool = |name: &str| AttributeSchema::new(name, AttributeType::Bool).computed();

        ResourceSchema::new("gitlab_branch")
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("project", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("ref", AttributeType::String)
                    .required()
                    .force_new()
                    .with_description("Branch name or commit SHA to branch from"),
            )
            .attribute(AttributeSchema::new("web_url", AttributeType::String).computed())
            .attribute(computed_bool("default"))
            .attribute(computed_bool("can_push"))
            .attribute(computed_bool("merged"))
            .attribute(computed_bool("protected"))
            .attribute(computed_bool("developer_can_merge"))
            .attribute(computed_bool("developer_can_push"))
            .attribute(
                AttributeSchema::new(
                    "commit",
                    AttributeType::List(Box::new(AttributeType::Map(Box::new(
                        AttributeType::String,
                    )))),
                )
                .computed(),
            )
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let project = require_str(d, "project")?;
        let options = CreateBranchOptions {
            branch: require_str(d, "name")?,
            git_ref: require_str(d, "ref")?,
        };

        log::debug!(
            "create branch {} from {} in project {}",
            options.branch,
            options.git_ref,
            project
        );
        let branch: Branch = client
            .post(ctx, &branches_path(&project), &options)
            .await?;
        d.set_id(id::encode(&[project.as_str(), branch.name.as_str()]));

        self.read(ctx, client, d).await
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let (project, name) = decode_id(&raw)?;

        match client
            .get::<Branch>(ctx, &branch_path(&project, &name), &Query::new())
            .await
        {
            Ok(branch) => Ok(apply_state_map(to_state_map(&project, &branch), d)?),
            Err(e) => gone_or_err(d, e, &format!("branch {}", raw)),
        }
    }

    async fn delete(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let (project, name) = decode_id(&raw)?;

        let result = client
            .delete(ctx, &branch_path(&project, &name), &Query::new())
            .await;
        Ok(deleted(result, &raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_name_keeps_colons() {
        assert_eq!(
            decode_id("42:release:1.0").unwrap(),
            ("42".to_string(), "release:1.0".to_string())
        );
    }

    #[test]
    fn commit_is_a_single_map() {
        let branch: Branch = serde_json::from_value(serde_json::json!({
            "name": "feature",
            "default": false,
            "commit": {
                "id": "a1b2c3",
                "short_id": "a1b2",
                "title": "Initial commit",
                "author_name": "Dev",
                "author_email": "dev@example.com",
                "committed_date": "2024-01-02T03:04:05Z"
            }
        }))
        .unwrap();

        let map = to_state_map("42", &branch);
        let commits = map["commit"].as_list().unwrap();
        assert_eq!(commits.len(), 1);
        let Value::Map(commit) = &commits[0] else {
            panic!("commit should be a map");
        };
        assert_eq!(commit["id"], Value::from("a1b2c3"));
        assert_eq!(commit["committed_date"], Value::from("2024-01-02T03:04:05Z"));
        assert_eq!(commit["message"], Value::Null);
        assert_eq!(map["web_url"], Value::Null);
    }
}
