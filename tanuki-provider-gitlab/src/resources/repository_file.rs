//! `gitlab_repository_file`
//!
//! GitLab rejects concurrent commits to one branch with "Please refresh and
//! try again". Every mutating call holds the client's file lock and retries
//! that conflict until the operation timeout.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tanuki_core::context::OperationContext;
use tanuki_core::id;
use tanuki_core::provider::{ProviderError, ProviderResult, ResourceType};
use tanuki_core::resource_data::ResourceData;
use tanuki_core::retry::{RetryError, retry_while};
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use tanuki_core::state_map::{StateMap, apply_state_map, state_map};

use super::{gone_or_err, opt_string, require_id, require_str};
use crate::api::repository_files::{FileCommit, FileOptions, RepositoryFile};
use crate::client::{GitLabClient, Query, escape};
use crate::error::GitLabError;

/// Timeout of create, update and delete, lock wait included
pub const FILE_TIMEOUT: Duration = Duration::from_secs(60);

const ID_PATTERN: &str = "project:branch:file_path";
const ENCODING: &str = "base64";

pub struct RepositoryFileResource;

pub fn repository_file() -> Box<dyn ResourceType<GitLabClient>> {
    Box::new(RepositoryFileResource)
}

pub fn file_path(project: &str, path: &str) -> String {
    format!("/projects/{}/repository/files/{}", escape(project), escape(path))
}

/// Decode `project:branch:file_path`; the path may itself contain `:`
pub fn decode_id(raw: &str) -> Result<(String, String, String), id::IdError> {
    let mut parts = id::decode_with_tail(raw, ID_PATTERN)?.into_iter();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(project), Some(branch), Some(path)) => Ok((project, branch, path)),
        _ => Err(id::IdError::UnexpectedFormat {
            id: raw.to_string(),
            pattern: ID_PATTERN.to_string(),
        }),
    }
}

pub fn is_base64(content: &str) -> bool {
    STANDARD.decode(content).is_ok()
}

/// Content as sent to GitLab: base64, encoding plain text first
pub fn encode_content(content: &str) -> String {
    if is_base64(content) {
        content.to_string()
    } else {
        STANDARD.encode(content)
    }
}

/// Content as stored in state: plain text if configured as plain text
fn state_content(api_content: &str, configured: Option<&str>) -> String {
    let configured_plain = configured.is_some_and(|c| !is_base64(c));
    if configured_plain
        && let Ok(bytes) = STANDARD.decode(api_content)
        && let Ok(text) = String::from_utf8(bytes)
    {
        return text;
    }
    api_content.to_string()
}

pub fn repository_file_schema() -> ResourceSchema {
    ResourceSchema::new("gitlab_repository_file")
        .with_description("A file committed to a branch of a project repository")
        .attribute(
            AttributeSchema::new("project", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("file_path", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("branch", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("start_branch", AttributeType::String))
        .attribute(AttributeSchema::new("author_email", AttributeType::String))
        .attribute(AttributeSchema::new("author_name", AttributeType::String))
        .attribute(AttributeSchema::new("commit_message", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("content", AttributeType::String)
                .required()
                .with_description("File content, plain text or base64"),
        )
        .attribute(AttributeSchema::new("execute_filemode", AttributeType::Bool).with_default(false))
        .attribute(AttributeSchema::new("encoding", AttributeType::String).computed())
        .attribute(AttributeSchema::new("ref", AttributeType::String).computed())
        .attribute(AttributeSchema::new("file_name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("size", AttributeType::Int).computed())
        .attribute(AttributeSchema::new("content_sha256", AttributeType::String).computed())
        .attribute(AttributeSchema::new("blob_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("commit_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("last_commit_id", AttributeType::String).computed())
}

pub fn to_state_map(project: &str, file: &RepositoryFile, content: String) -> StateMap {
    state_map([
        ("project", project.into()),
        ("file_name", file.file_name.as_str().into()),
        ("file_path", file.file_path.as_str().into()),
        ("size", file.size.into()),
        ("encoding", file.encoding.as_str().into()),
        ("content", content.into()),
        ("content_sha256", file.content_sha256.as_str().into()),
        ("execute_filemode", file.execute_filemode.into()),
        ("ref", file.git_ref.as_str().into()),
        ("blob_id", file.blob_id.as_str().into()),
        ("commit_id", file.commit_id.as_str().into()),
        ("last_commit_id", file.last_commit_id.as_str().into()),
    ])
}

fn retry_error(err: RetryError<GitLabError>) -> ProviderError {
    match err {
        RetryError::Operation(e) => e.into(),
        other => ProviderError::from_error(other),
    }
}

/// Commit options shared by create and update
fn commit_options(d: &ResourceData, branch: &str) -> ProviderResult<FileOptions> {
    Ok(FileOptions {
        branch: branch.to_string(),
        commit_message: require_str(d, "commit_message")?,
        start_branch: opt_string(d, "start_branch"),
        encoding: Some(ENCODING.to_string()),
        author_email: opt_string(d, "author_email"),
        author_name: opt_string(d, "author_name"),
        content: Some(encode_content(&require_str(d, "content")?)),
        last_commit_id: None,
        execute_filemode: d.get_bool("execute_filemode"),
    })
}

#[async_trait]
impl ResourceType<GitLabClient> for RepositoryFileResource {
    fn name(&self) -> &'static str {
        "gitlab_repository_file"
    }

    fn schema(&self) -> ResourceSchema {
        repository_file_schema()
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let op_ctx = ctx.with_timeout(FILE_TIMEOUT);
        let project = require_str(d, "project")?;
        let branch = require_str(d, "branch")?;
        let path = file_path(&project, &require_str(d, "file_path")?);
        let options = commit_options(d, &branch)?;

        let _guard = client
            .file_lock()
            .acquire(&op_ctx)
            .await
            .map_err(GitLabError::from)?;

        let commit: FileCommit = retry_while(
            &op_ctx,
            FILE_TIMEOUT,
            client.file_retry(),
            GitLabError::is_refresh_error,
            || client.post::<_, FileCommit>(&op_ctx, &path, &options),
        )
        .await
        .map_err(retry_error)?;

        d.set_id(id::encode(&[&project, &commit.branch, &commit.file_path]));
        self.read(&op_ctx, client, d).await
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let raw = require_id(d)?;
        let (project, branch, path) = decode_id(&raw)?;

        let result = client
            .get::<RepositoryFile>(
                ctx,
                &file_path(&project, &path),
                &Query::new().with("ref", &branch),
            )
            .await;

        let file = match result {
            Ok(file) => file,
            Err(e) => return gone_or_err(d, e, &format!("repository file {}", raw)),
        };

        let content = state_content(&file.content, d.get_str("content"));
        apply_state_map(to_state_map(&project, &file, content), d)?;
        d.set("branch", file.git_ref.as_str())?;
        Ok(())
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let op_ctx = ctx.with_timeout(FILE_TIMEOUT);
        let raw = require_id(d)?;
        let (project, branch, path) = decode_id(&raw)?;
        let path = file_path(&project, &path);
        let base = commit_options(d, &branch)?;

        let _guard = client
            .file_lock()
            .acquire(&op_ctx)
            .await
            .map_err(GitLabError::from)?;

        let op_ctx = &op_ctx;
        let path = path.as_str();
        let base = &base;
        let branch = branch.as_str();
        let _: FileCommit = retry_while(
            op_ctx,
            FILE_TIMEOUT,
            client.file_retry(),
            GitLabError::is_refresh_error,
            || async move {
                let current: RepositoryFile = client
                    .get(op_ctx, path, &Query::new().with("ref", branch))
                    .await?;
                let options = FileOptions {
                    last_commit_id: Some(current.last_commit_id),
                    ..base.clone()
                };
                client
                    .put::<_, FileCommit>(op_ctx, path, &Query::new(), &options)
                    .await
            },
        )
        .await
        .map_err(retry_error)?;

        self.read(op_ctx, client, d).await
    }

    async fn delete(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let op_ctx = ctx.with_timeout(FILE_TIMEOUT);
        let raw = require_id(d)?;
        let (project, branch, path) = decode_id(&raw)?;
        let path = file_path(&project, &path);
        let message = format!("[DELETE]: {}", d.get_str("commit_message").unwrap_or_default());
        let author_email = opt_string(d, "author_email");
        let author_name = opt_string(d, "author_name");

        let _guard = client
            .file_lock()
            .acquire(&op_ctx)
            .await
            .map_err(GitLabError::from)?;

        let op_ctx = &op_ctx;
        let path = path.as_str();
        let branch = branch.as_str();
        let message = message.as_str();
        let author_email = &author_email;
        let author_name = &author_name;
        let result = retry_while(
            op_ctx,
            FILE_TIMEOUT,
            client.file_retry(),
            GitLabError::is_refresh_error,
            || async move {
                let current: RepositoryFile = client
                    .get(op_ctx, path, &Query::new().with("ref", branch))
                    .await?;
                let options = FileOptions {
                    branch: branch.to_string(),
                    commit_message: message.to_string(),
                    author_email: author_email.clone(),
                    author_name: author_name.clone(),
                    last_commit_id: Some(current.last_commit_id),
                    ..Default::default()
                };
                client.delete_with_body(op_ctx, path, &options).await
            },
        )
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(RetryError::Operation(e)) if e.is_not_found() => {
                log::debug!("repository file {} was already deleted", raw);
                Ok(())
            }
            Err(RetryError::Operation(e)) => Err(ProviderError::new(format!(
                "{} failed to delete repository file: {}",
                raw, e
            ))
            .with_cause(e)),
            Err(other) => Err(retry_error(other)),
        }
    }
}
