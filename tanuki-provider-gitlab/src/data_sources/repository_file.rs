//! `gitlab_repository_file`: a file at a given ref, content kept as base64

use async_trait::async_trait;
use tanuki_core::context::OperationContext;
use tanuki_core::id;
use tanuki_core::provider::{DataSourceType, ProviderResult};
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use tanuki_core::state_map::apply_state_map;

use super::schema_from_resource;
use crate::api::repository_files::RepositoryFile;
use crate::client::{GitLabClient, Query};
use crate::resources::repository_file::{file_path, repository_file_schema, to_state_map};
use crate::resources::require_str;

pub struct RepositoryFileDataSource;

pub fn repository_file() -> Box<dyn DataSourceType<GitLabClient>> {
    Box::new(RepositoryFileDataSource)
}

#[async_trait]
impl DataSourceType<GitLabClient> for RepositoryFileDataSource {
    fn name(&self) -> &'static str {
        "gitlab_repository_file"
    }

    fn schema(&self) -> ResourceSchema {
        let mut schema = schema_from_resource(
            repository_file_schema(),
            "gitlab_repository_file",
            &["project", "file_path"],
            &[],
        );
        // Resource-only commit attributes
        for name in ["branch", "start_branch", "author_email", "author_name", "commit_message"] {
            schema.attributes.remove(name);
        }
        schema.attribute(
            AttributeSchema::new("ref", AttributeType::String)
                .required()
                .with_description("Branch, tag or commit to read the file at"),
        )
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        client: &GitLabClient,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        let project = require_str(d, "project")?;
        let path = require_str(d, "file_path")?;
        let git_ref = require_str(d, "ref")?;

        let file: RepositoryFile = client
            .get(ctx, &file_path(&project, &path), &Query::new().with("ref", &git_ref))
            .await?;

        d.set_id(id::encode(&[
            project.as_str(),
            file.git_ref.as_str(),
            file.file_path.as_str(),
        ]));
        let content = file.content.clone();
        apply_state_map(to_state_map(&project, &file, content), d)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_keys() {
        let schema = RepositoryFileDataSource.schema();
        for key in ["project", "file_path", "ref"] {
            assert!(schema.get(key).is_some_and(|a| a.required), "{} should be required", key);
        }
        assert!(schema.get("content").is_some_and(|a| a.computed));
        assert!(schema.get("commit_message").is_none());
    }
}
