//! `gitlab_cluster_agent_token`
//!
//! The token secret is only returned by the create call; refreshes keep the
//! value recorded at creation.

use async_trait::async_trait;
use tanuki_core::context::OperationContext;
use tanuki_core::id;
use tanuki_core::provider::{ProviderResult, ResourceType};
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use tanuki_core::state_map::{StateMap, apply_state_map, state_map, timestamp};

use super::{deleted, gone_or_err, opt_string, require_id, require_int, require_str};
use crate::api::cluster_agents::{AgentToken, AgentTokenOptions};
use crate::client::{GitLabClient, Query, escape};

const ID_PATTERN: &str = "project:agent_id:token_id";

pub struct ClusterAgentToken;

pub fn cluster_agent_token() -> Box<dyn ResourceType<GitLabClient>> {
    Box::new(ClusterAgentToken)
}

fn tokens_path(project: &str, agent_id: i64) -> String {
    format!("/projects/{}/cluster_agents/{}/tokens", escape(project), agent_id)
}

pub fn decode_id(raw: &str) -> Result<(String, i64, i64), id::IdError> {
    let parts = id::decode(raw, ID_PATTERN)?;
    let agent_id = id::parse_int(raw, "agent_id", &parts[1])?;
    let token_id = id::parse_int(raw, "token_id", &parts[2])?;
    Ok((parts[0].clone(), agent_id, token_id))
}

pub fn to_state_map(project: &str, token: &AgentToken) -> StateMap {
    state_map([
        ("project", project.into()),
        ("agent_id", token.agent_id.into()),
        ("token_id", token.id.into()),
        ("name", token.name.as_str().into()),
        ("description", token.description.clone().into()),
        ("status", token.status.as_str().into()),
        ("created_at", timestamp(Some(&token.created_at))),
        ("created_by_user_id", token.created_by_user_id.into()),
        ("last_used_at", timestamp(token.last_used_at.as_ref())),
    ])
}

#[async_trait]
impl ResourceType<GitLabClient> for ClusterAgentToken {
    fn name(&self) -> &'static str {
        "gitlab_cluster_agent_token"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new("gitlab_cluster_agent_token")
            .attribute(
                AttributeSchema::new("project", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("agent_id", AttributeType::Int)
                    .required()
                    .force_new(),
            )
            .attribute(
                AttributeSchema::new("name", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("description", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("token_id", AttributeType::Int).computed())
            .attribute(AttributeSchema::new("status", AttributeType::String).computed())
            .attribute(AttributeSchema::new("created_at", AttributeType::String).computed())
            .attribute(AttributeSchema::new("created_by_user_id", AttributeType::Int).computed())
            .attribute(AttributeSchema::new("last_used_at", AttributeType::String).computed())
            .attribute(
                AttributeSchema::new("token", AttributeType::String)
                    .computed()
                    .sensitive()
                    .with_description("Secret; only known right after creation"),
            )
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let project = require_str(d, "project")?;
        let agent_id = require_int(d, "agent_id")?;
        let options = AgentTokenOptions {
            name: require_str(d, "name")?,
            description: opt_string(d, "description"),
        };

        let token: AgentToken = client
            .post(ctx, &tokens_path(&project, agent_id), &options)
            .await?;

        d.set_id(id::encode(&[
            project.clone(),
            agent_id.to_string(),
            token.id.to_string(),
        ]));
        d.set("token", token.token.clone())?;
        apply_state_map(to_state_map(&project, &token), d)?;

        self.read(ctx, client, d).await
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let (project, agent_id, token_id) = decode_id(&raw)?;

        let path = format!("{}/{}", tokens_path(&project, agent_id), token_id);
        match client.get::<AgentToken>(ctx, &path, &Query::new()).await {
            Ok(token) => Ok(apply_state_map(to_state_map(&project, &token), d)?),
            Err(e) => gone_or_err(d, e, &format!("cluster agent token {}", raw)),
        }
    }

    async fn delete(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let (project, agent_id, token_id) = decode_id(&raw)?;

        let path = format!("{}/{}", tokens_path(&project, agent_id), token_id);
        let result = client.delete(ctx, &path, &Query::new()).await;
        Ok(deleted(result, &raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_segments_must_be_integers() {
        assert_eq!(decode_id("42:7:99").unwrap(), ("42".to_string(), 7, 99));
        let err = decode_id("42:seven:99").unwrap_err();
        assert!(err.to_string().contains("agent_id"));
        assert!(decode_id("42:7").is_err());
        assert!(decode_id("42:7:99:1").is_err());
    }
}
