//! GraphQL requests against `<instance>/api/graphql`

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tanuki_core::context::OperationContext;

use crate::client::GitLabClient;
use crate::error::GitLabError;
use crate::http::HttpMethod;

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQLMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQLMessage {
    message: String,
}

impl GitLabClient {
    /// Run `query` and decode its `data` member into `T`
    ///
    /// A response carrying `errors` fails even when partial data is present.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        ctx: &OperationContext,
        query: &str,
    ) -> Result<T, GitLabError> {
        log::debug!("executing GraphQL query {}", query);
        let url = self.graphql_url().to_string();
        let body = serde_json::to_vec(&json!({ "query": query })).map_err(GitLabError::Encode)?;
        let resp = self.send(ctx, HttpMethod::Post, url.clone(), body).await?;

        let decoded: GraphQLResponse<T> =
            serde_json::from_slice(&resp.body).map_err(|source| GitLabError::Decode { url, source })?;

        if !decoded.errors.is_empty() {
            let messages: Vec<String> = decoded.errors.into_iter().map(|e| e.message).collect();
            return Err(GitLabError::GraphQL(messages.join("; ")));
        }
        decoded
            .data
            .ok_or_else(|| GitLabError::GraphQL("response contained no data".to_string()))
    }
}

/// Integer ID at the end of a global ID such as `gid://gitlab/User/42`
pub fn extract_iid_from_global_id(global_id: &str) -> Result<i64, GitLabError> {
    global_id
        .rsplit('/')
        .next()
        .and_then(|last| last.parse::<i64>().ok())
        .ok_or_else(|| GitLabError::InvalidGlobalId(global_id.to_string()))
}
