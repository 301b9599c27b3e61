//! Provider - Traits abstracting resource operations
//!
//! A Provider exposes a set of resource types and data sources for one remote
//! system. The host drives it through [`Provider`]; each resource type is a
//! value implementing [`ResourceType`] against a [`ResourceData`] view.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::OperationContext;
use crate::id::IdError;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::resource_data::ResourceData;
use crate::schema::ResourceSchema;
use crate::state_map::StateMapError;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Wrap an error, using its message as our own
    pub fn from_error(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(cause.to_string()).with_cause(cause)
    }
}

impl From<IdError> for ProviderError {
    fn from(err: IdError) -> Self {
        ProviderError::from_error(err)
    }
}

impl From<StateMapError> for ProviderError {
    fn from(err: StateMapError) -> Self {
        ProviderError::from_error(err)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One managed resource type, generic over the provider's API client `C`
#[async_trait]
pub trait ResourceType<C: Send + Sync>: Send + Sync {
    /// Resource type name (e.g., "gitlab_project_variable")
    fn name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    /// Create the remote object and set the ID on `d`
    async fn create(
        &self,
        ctx: &OperationContext,
        client: &C,
        d: &mut ResourceData,
    ) -> ProviderResult<()>;

    /// Refresh `d` from the remote object; clear the ID if it is gone
    async fn read(
        &self,
        ctx: &OperationContext,
        client: &C,
        d: &mut ResourceData,
    ) -> ProviderResult<()>;

    /// Apply changed attributes in place
    ///
    /// Types whose attributes are all `force_new` are replaced instead and
    /// never reach this method.
    async fn update(
        &self,
        _ctx: &OperationContext,
        _client: &C,
        _d: &mut ResourceData,
    ) -> ProviderResult<()> {
        Err(ProviderError::new(format!(
            "{} does not support in-place update",
            self.name()
        )))
    }

    async fn delete(
        &self,
        ctx: &OperationContext,
        client: &C,
        d: &mut ResourceData,
    ) -> ProviderResult<()>;

    /// Populate `d` from an ID given on the command line
    async fn import(
        &self,
        ctx: &OperationContext,
        client: &C,
        d: &mut ResourceData,
    ) -> ProviderResult<()> {
        self.read(ctx, client, d).await
    }

    /// Rewrite attributes persisted with an older schema version
    fn upgrade_state(
        &self,
        _from_version: u32,
        attributes: HashMap<String, Value>,
    ) -> ProviderResult<HashMap<String, Value>> {
        Ok(attributes)
    }
}

/// One read-only data source, generic over the provider's API client `C`
#[async_trait]
pub trait DataSourceType<C: Send + Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    fn schema(&self) -> ResourceSchema;

    /// Look up the remote object(s) and set an ID on `d`
    async fn read(
        &self,
        ctx: &OperationContext,
        client: &C,
        d: &mut ResourceData,
    ) -> ProviderResult<()>;
}

/// Main Provider trait
///
/// All operations are async and involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "gitlab")
    fn name(&self) -> &'static str;

    fn resource_schema(&self, resource_type: &str) -> Option<Arc<ResourceSchema>>;

    fn data_source_schema(&self, data_source: &str) -> Option<Arc<ResourceSchema>>;

    /// Refresh an existing resource
    ///
    /// Returns `State::not_found()` if the remote object no longer exists.
    fn read<'a>(
        &'a self,
        ctx: &'a OperationContext,
        current: &'a State,
    ) -> BoxFuture<'a, ProviderResult<State>>;

    fn read_data_source<'a>(
        &'a self,
        ctx: &'a OperationContext,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the composite remote ID
    fn create<'a>(
        &'a self,
        ctx: &'a OperationContext,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>>;

    fn update<'a>(
        &'a self,
        ctx: &'a OperationContext,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>>;

    fn delete<'a>(
        &'a self,
        ctx: &'a OperationContext,
        from: &'a State,
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Adopt an existing remote object by its composite ID
    fn import<'a>(
        &'a self,
        ctx: &'a OperationContext,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_schema(&self, resource_type: &str) -> Option<Arc<ResourceSchema>> {
        (**self).resource_schema(resource_type)
    }

    fn data_source_schema(&self, data_source: &str) -> Option<Arc<ResourceSchema>> {
        (**self).data_source_schema(data_source)
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OperationContext,
        current: &'a State,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        (**self).read(ctx, current)
    }

    fn read_data_source<'a>(
        &'a self,
        ctx: &'a OperationContext,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        (**self).read_data_source(ctx, resource)
    }

    fn create<'a>(
        &'a self,
        ctx: &'a OperationContext,
        resource: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        (**self).create(ctx, resource)
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OperationContext,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        (**self).update(ctx, from, to)
    }

    fn delete<'a>(
        &'a self,
        ctx: &'a OperationContext,
        from: &'a State,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        (**self).delete(ctx, from)
    }

    fn import<'a>(
        &'a self,
        ctx: &'a OperationContext,
        id: &'a ResourceId,
        identifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<State>> {
        (**self).import(ctx, id, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        creates: AtomicUsize,
    }

    struct CounterResource;

    #[async_trait]
    impl ResourceType<Counter> for CounterResource {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new("counter")
                .attribute(AttributeSchema::new("value", AttributeType::Int).computed())
        }

        async fn create(
            &self,
            _ctx: &OperationContext,
            client: &Counter,
            d: &mut ResourceData,
        ) -> ProviderResult<()> {
            let n = client.creates.fetch_add(1, Ordering::SeqCst) as i64;
            d.set_id(n.to_string());
            d.set("value", n).map_err(ProviderError::from_error)
        }

        async fn read(
            &self,
            _ctx: &OperationContext,
            _client: &Counter,
            _d: &mut ResourceData,
        ) -> ProviderResult<()> {
            Ok(())
        }

        async fn delete(
            &self,
            _ctx: &OperationContext,
            _client: &Counter,
            _d: &mut ResourceData,
        ) -> ProviderResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn resource_type_writes_through_resource_data() {
        let client = Counter {
            creates: AtomicUsize::new(5),
        };
        let resource = CounterResource;
        let mut d = ResourceData::for_create(Arc::new(resource.schema()), &HashMap::new());

        resource
            .create(&OperationContext::new(), &client, &mut d)
            .await
            .unwrap();

        assert_eq!(d.id(), Some("5"));
        assert_eq!(d.get_int("value"), Some(5));
    }

    #[tokio::test]
    async fn update_defaults_to_error() {
        let resource = CounterResource;
        let client = Counter {
            creates: AtomicUsize::new(0),
        };
        let mut d = ResourceData::for_import(Arc::new(resource.schema()), "1");

        let err = resource
            .update(&OperationContext::new(), &client, &mut d)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not support in-place update"));
    }

    #[test]
    fn provider_error_display_includes_resource() {
        let err = ProviderError::new("boom")
            .for_resource(ResourceId::new("gitlab_branch", "main"));
        assert_eq!(err.to_string(), "[gitlab_branch.main] boom");
    }
}
