//! Tanuki GitLab Provider
//!
//! Resources and data sources backed by the GitLab REST and GraphQL APIs.
//!
//! ## Module Structure
//!
//! - `api` - Request and response bodies
//! - `client` - REST client over an HTTP transport
//! - `graphql` - GraphQL requests
//! - `resources` / `data_sources` - Handlers, one per type
//! - `provider` - GitLabProvider, the host-facing side

pub mod api;
pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod graphql;
pub mod http;
pub mod provider;
pub mod resources;
pub mod validation;

// Re-export main types
pub use client::GitLabClient;
pub use config::ProviderConfig;
pub use error::GitLabError;
pub use provider::GitLabProvider;

use std::sync::Arc;

use tanuki_core::context::OperationContext;
use tanuki_core::provider::{BoxFuture, Provider, ProviderResult};
use tanuki_core::registry::Registry;
use tanuki_core::resource::{Resource, ResourceId, State};
use tanuki_core::schema::ResourceSchema;

/// Every resource and data source of this provider
pub fn registry() -> Registry<GitLabClient> {
    let mut registry = Registry::new();

    registry.register_resource("gitlab_project_variable", resources::variable::project_variable);
    registry.register_resource("gitlab_group_variable", resources::variable::group_variable);
    registry.register_resource(
        "gitlab_instance_variable",
        resources::instance_variable::instance_variable,
    );
    registry.register_resource(
        "gitlab_repository_file",
        resources::repository_file::repository_file,
    );
    registry.register_resource(
        "gitlab_cluster_agent_token",
        resources::cluster_agent_token::cluster_agent_token,
    );
    registry.register_resource(
        "gitlab_project_milestone",
        resources::project_milestone::project_milestone,
    );
    registry.register_resource("gitlab_project_issue", resources::project_issue::project_issue);
    registry.register_resource("gitlab_branch", resources::branch::branch);
    registry.register_resource(
        "gitlab_project_share_group",
        resources::project_share_group::project_share_group,
    );

    registry.register_data_source("gitlab_current_user", data_sources::current_user::current_user);
    registry.register_data_source(
        "gitlab_project_variable",
        data_sources::variables::project_variable,
    );
    registry.register_data_source("gitlab_group_variable", data_sources::variables::group_variable);
    registry.register_data_source(
        "gitlab_instance_variable",
        data_sources::variables::instance_variable,
    );
    registry.register_data_source(
        "gitlab_project_variables",
        data_sources::variables::project_variables,
    );
    registry.register_data_source(
        "gitlab_group_variables",
        data_sources::variables::group_variables,
    );
    registry.register_data_source(
        "gitlab_instance_variables",
        data_sources::variables::instance_variables,
    );
    registry.register_data_source(
        "gitlab_project_milestones",
        data_sources::project_milestones::project_milestones,
    );
    registry.register_data_source(
        "gitlab_repository_file",
        data_sources::repository_file::repository_file,
    );

    registry
}

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for GitLabProvider {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    fn resource_schema(&self, resource_type: &str) -> Option<Arc<ResourceSchema>> {
        self.schema_of(resource_type)
    }

    fn data_source_schema(&self, data_source: &str) -> Option<Arc<ResourceSchema>> {
        self.data_source_schema_of(data_source)
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OperationContext,
        current: &'a State,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(self.read_resource(ctx, current))
    }

    fn read_data_source<'a>(
        &'a self,
        ctx: &'a OperationContext,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(self.read_data(ctx, resource))
    }

    fn create<'a>(
        &'a self,
        ctx: &'a OperationContext,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(self.create_resource(ctx, resource))
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OperationContext,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(self.update_resource(ctx, from, to))
    }

    fn delete<'a>(
        &'a self,
        ctx: &'a OperationContext,
        from: &'a State,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.delete_resource(ctx, from))
    }

    fn import<'a>(
        &'a self,
        ctx: &'a OperationContext,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        Box::pin(self.import_resource(ctx, id, identifier))
    }
}
