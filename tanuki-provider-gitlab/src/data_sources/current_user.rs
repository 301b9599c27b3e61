//! `gitlab_current_user`: the user owning the configured token, via GraphQL

use async_trait::async_trait;
use serde::Deserialize;
use tanuki_core::context::OperationContext;
use tanuki_core::provider::{DataSourceType, ProviderResult};
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use tanuki_core::state_map::{StateMap, apply_state_map, state_map};

use crate::client::GitLabClient;
use crate::error::GitLabError;
use crate::graphql::extract_iid_from_global_id;

const QUERY: &str =
    "query {currentUser {name, bot, groupCount, id, namespace{id}, publicEmail, username}}";

#[derive(Debug, Deserialize)]
struct CurrentUserData {
    #[serde(rename = "currentUser")]
    current_user: CurrentUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentUser {
    id: String,
    username: String,
    name: String,
    bot: bool,
    group_count: i64,
    namespace: GlobalIdRef,
    #[serde(default)]
    public_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalIdRef {
    id: String,
}

fn to_state_map(user: &CurrentUser) -> Result<StateMap, GitLabError> {
    let user_id = extract_iid_from_global_id(&user.id)?;
    let namespace_id = extract_iid_from_global_id(&user.namespace.id)?;
    Ok(state_map([
        ("global_id", user.id.as_str().into()),
        ("username", user.username.as_str().into()),
        ("name", user.name.as_str().into()),
        ("bot", user.bot.into()),
        ("group_count", user.group_count.into()),
        ("namespace_id", namespace_id.to_string().into()),
        ("global_namespace_id", user.namespace.id.as_str().into()),
        ("public_email", user.public_email.clone().into()),
        ("user_id", user_id.to_string().into()),
    ]))
}

pub struct CurrentUserDataSource;

pub fn current_user() -> Box<dyn DataSourceType<GitLabClient>> {
    Box::new(CurrentUserDataSource)
}

#[async_trait]
impl DataSourceType<GitLabClient> for CurrentUserDataSource {
    fn name(&self) -> &'static str {
        "gitlab_current_user"
    }

    fn schema(&self) -> ResourceSchema {
        let computed = |name: &str, t: AttributeType| AttributeSchema::new(name, t).computed();

        ResourceSchema::new("gitlab_current_user")
            .with_description("The user the provider token belongs to")
            .attribute(computed("user_id", AttributeType::String))
            .attribute(computed("global_id", AttributeType::String))
            .attribute(computed("username", AttributeType::String))
            .attribute(computed("name", AttributeType::String))
            .attribute(computed("bot", AttributeType::Bool))
            .attribute(computed("group_count", AttributeType::Int))
            .attribute(computed("namespace_id", AttributeType::String))
            .attribute(computed("global_namespace_id", AttributeType::String))
            .attribute(computed("public_email", AttributeType::String))
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let data: CurrentUserData = client.graphql(ctx, QUERY).await?;
        let map = to_state_map(&data.current_user)?;

        d.set_id(extract_iid_from_global_id(&data.current_user.id)?.to_string());
        apply_state_map(map, d)?;
        Ok(())
    }
}
