//! GitLabProvider - Tanuki provider for GitLab
//!
//! Turns host-level states and resources into `ResourceData`, dispatches to
//! the registered handler and turns the result back into a `State`.

use std::collections::HashMap;
use std::sync::Arc;

use tanuki_core::context::OperationContext;
use tanuki_core::provider::{DataSourceType, ProviderError, ProviderResult, ResourceType};
use tanuki_core::registry::Registry;
use tanuki_core::resource::{Resource, ResourceId, State, Value};
use tanuki_core::resource_data::ResourceData;
use tanuki_core::schema::ResourceSchema;

use crate::api::users::CurrentUser;
use crate::client::{GitLabClient, Query};
use crate::config::ProviderConfig;
use crate::error::GitLabError;

struct Handler<T: ?Sized> {
    handler: Box<T>,
    schema: Arc<ResourceSchema>,
}

type ResourceHandler = Handler<dyn ResourceType<GitLabClient>>;
type DataSourceHandler = Handler<dyn DataSourceType<GitLabClient>>;

/// GitLab Provider
pub struct GitLabProvider {
    client: GitLabClient,
    resources: HashMap<&'static str, ResourceHandler>,
    data_sources: HashMap<&'static str, DataSourceHandler>,
}

impl GitLabProvider {
    /// Provider over `client` with every handler in `registry`
    pub fn new(client: GitLabClient, registry: &Registry<GitLabClient>) -> Self {
        let resources = registry
            .resources()
            .iter()
            .map(|(name, factory)| {
                let handler = factory();
                let schema = Arc::new(handler.schema());
                (*name, Handler { handler, schema })
            })
            .collect();
        let data_sources = registry
            .data_sources()
            .iter()
            .map(|(name, factory)| {
                let handler = factory();
                let schema = Arc::new(handler.schema());
                (*name, Handler { handler, schema })
            })
            .collect();

        Self {
            client,
            resources,
            data_sources,
        }
    }

    /// Resolve `config`, build the HTTP client and optionally verify the token
    pub async fn connect(
        ctx: &OperationContext,
        config: ProviderConfig,
    ) -> Result<Self, GitLabError> {
        let resolved = config.resolve()?;
        let client = GitLabClient::from_config(&resolved)?;
        let provider = Self::new(client, &crate::registry());
        if resolved.early_auth_check {
            provider.check_auth(ctx).await?;
        }
        Ok(provider)
    }

    pub fn client(&self) -> &GitLabClient {
        &self.client
    }

    /// Names of all resource types, sorted
    pub fn resource_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.resources.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Names of all data sources, sorted
    pub fn data_source_types(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.data_sources.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn schema_of(&self, resource_type: &str) -> Option<Arc<ResourceSchema>> {
        self.resources
            .get(resource_type)
            .map(|h| Arc::clone(&h.schema))
    }

    pub(crate) fn data_source_schema_of(&self, data_source: &str) -> Option<Arc<ResourceSchema>> {
        self.data_sources
            .get(data_source)
            .map(|h| Arc::clone(&h.schema))
    }

    /// Fail fast on an unusable token
    pub async fn check_auth(&self, ctx: &OperationContext) -> Result<(), GitLabError> {
        let user: CurrentUser = self.client.get(ctx, "/user", &Query::new()).await?;
        log::debug!("authenticated as {} (id {})", user.username, user.id);
        Ok(())
    }

    fn resource(&self, id: &ResourceId) -> ProviderResult<&ResourceHandler> {
        self.resources.get(id.resource_type.as_str()).ok_or_else(|| {
            ProviderError::new(format!("unknown resource type {}", id.resource_type))
                .for_resource(id.clone())
        })
    }

    fn identifier<'s>(state: &'s State) -> ProviderResult<&'s str> {
        state.identifier.as_deref().ok_or_else(|| {
            ProviderError::new("state has no identifier").for_resource(state.id.clone())
        })
    }

    /// Attributes of `state`, migrated to the current schema version
    fn upgraded(&self, handler: &ResourceHandler, state: &State) -> ProviderResult<HashMap<String, Value>> {
        let current = handler.schema.version;
        if state.schema_version >= current {
            return Ok(state.attributes.clone());
        }
        log::debug!(
            "upgrading state of {} from schema version {} to {}",
            state.id,
            state.schema_version,
            current
        );
        handler
            .handler
            .upgrade_state(state.schema_version, state.attributes.clone())
    }

    fn validate(schema: &ResourceSchema, attributes: &HashMap<String, Value>) -> ProviderResult<()> {
        schema.validate(attributes).map_err(|errors| {
            ProviderError::new(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })
    }

    /// State for `d` after a handler ran; a cleared ID means the object is gone
    fn finish(id: &ResourceId, schema: &ResourceSchema, d: ResourceData) -> State {
        match d.id().map(str::to_string) {
            Some(identifier) => State::existing(id.clone(), d.into_attributes())
                .with_identifier(identifier)
                .with_schema_version(schema.version),
            None => State::not_found(id.clone()),
        }
    }

    pub async fn read_resource(
        &self,
        ctx: &OperationContext,
        current: &State,
    ) -> ProviderResult<State> {
        let id = &current.id;
        let handler = self.resource(id)?;
        let Some(identifier) = current.identifier.as_deref() else {
            return Ok(State::not_found(id.clone()));
        };

        let attributes = self.upgraded(handler, current)?;
        let mut d = ResourceData::for_read(Arc::clone(&handler.schema), identifier, &attributes);
        handler
            .handler
            .read(ctx, &self.client, &mut d)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        Ok(Self::finish(id, &handler.schema, d))
    }

    pub async fn create_resource(
        &self,
        ctx: &OperationContext,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let id = &resource.id;
        let handler = self.resource(id)?;
        Self::validate(&handler.schema, &resource.attributes)
            .map_err(|e| e.for_resource(id.clone()))?;

        let mut d = ResourceData::for_create(Arc::clone(&handler.schema), &resource.attributes);
        handler
            .handler
            .create(ctx, &self.client, &mut d)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let state = Self::finish(id, &handler.schema, d);
        if !state.exists {
            return Err(ProviderError::new(
                "object was created but could not be read back",
            )
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    pub async fn update_resource(
        &self,
        ctx: &OperationContext,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let id = &to.id;
        let handler = self.resource(id)?;
        let identifier = Self::identifier(from)?;
        Self::validate(&handler.schema, &to.attributes).map_err(|e| e.for_resource(id.clone()))?;

        let prior = self.upgraded(handler, from)?;
        let mut d = ResourceData::for_update(
            Arc::clone(&handler.schema),
            identifier,
            &prior,
            &to.attributes,
        );
        handler
            .handler
            .update(ctx, &self.client, &mut d)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        Ok(Self::finish(id, &handler.schema, d))
    }

    pub async fn delete_resource(&self, ctx: &OperationContext, from: &State) -> ProviderResult<()> {
        let id = &from.id;
        let handler = self.resource(id)?;
        let identifier = Self::identifier(from)?;

        let attributes = self.upgraded(handler, from)?;
        let mut d = ResourceData::for_read(Arc::clone(&handler.schema), identifier, &attributes);
        handler
            .handler
            .delete(ctx, &self.client, &mut d)
            .await
            .map_err(|e| e.for_resource(id.clone()))
    }

    pub async fn import_resource(
        &self,
        ctx: &OperationContext,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let handler = self.resource(id)?;
        let mut d = ResourceData::for_import(Arc::clone(&handler.schema), identifier);
        handler
            .handler
            .import(ctx, &self.client, &mut d)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let state = Self::finish(id, &handler.schema, d);
        if !state.exists {
            return Err(ProviderError::new(format!(
                "cannot import non-existent remote object {}",
                identifier
            ))
            .for_resource(id.clone()));
        }
        Ok(state)
    }

    pub async fn read_data(&self, ctx: &OperationContext, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let handler = self.data_sources.get(id.resource_type.as_str()).ok_or_else(|| {
            ProviderError::new(format!("unknown data source {}", id.resource_type))
                .for_resource(id.clone())
        })?;
        Self::validate(&handler.schema, &resource.attributes)
            .map_err(|e| e.for_resource(id.clone()))?;

        let mut d = ResourceData::for_data_source(Arc::clone(&handler.schema), &resource.attributes);
        handler
            .handler
            .read(ctx, &self.client, &mut d)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;

        let identifier = d.id().map(str::to_string).ok_or_else(|| {
            ProviderError::new("data source did not set an ID").for_resource(id.clone())
        })?;
        Ok(State::existing(id.clone(), d.into_attributes())
            .with_identifier(identifier)
            .with_schema_version(handler.schema.version))
    }
}
