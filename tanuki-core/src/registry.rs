//! Registry - resource and data source factories by type name
//!
//! Built once by the provider's initialization function and consumed when
//! the provider is assembled.

use std::collections::BTreeMap;

use crate::provider::{DataSourceType, ResourceType};

pub type ResourceFactory<C> = fn() -> Box<dyn ResourceType<C>>;
pub type DataSourceFactory<C> = fn() -> Box<dyn DataSourceType<C>>;

pub struct Registry<C: Send + Sync> {
    resources: BTreeMap<&'static str, ResourceFactory<C>>,
    data_sources: BTreeMap<&'static str, DataSourceFactory<C>>,
}

impl<C: Send + Sync> Default for Registry<C> {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
        }
    }
}

impl<C: Send + Sync> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource factory
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered.
    pub fn register_resource(&mut self, name: &'static str, factory: ResourceFactory<C>) {
        if self.resources.insert(name, factory).is_some() {
            panic!("resource {} is already registered", name);
        }
    }

    /// Register a data source factory
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered.
    pub fn register_data_source(&mut self, name: &'static str, factory: DataSourceFactory<C>) {
        if self.data_sources.insert(name, factory).is_some() {
            panic!("data source {} is already registered", name);
        }
    }

    pub fn resources(&self) -> &BTreeMap<&'static str, ResourceFactory<C>> {
        &self.resources
    }

    pub fn data_sources(&self) -> &BTreeMap<&'static str, DataSourceFactory<C>> {
        &self.data_sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OperationContext;
    use crate::provider::ProviderResult;
    use crate::resource_data::ResourceData;
    use crate::schema::ResourceSchema;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl DataSourceType<()> for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new("noop")
        }

        async fn read(
            &self,
            _ctx: &OperationContext,
            _client: &(),
            _d: &mut ResourceData,
        ) -> ProviderResult<()> {
            Ok(())
        }
    }

    fn noop() -> Box<dyn DataSourceType<()>> {
        Box::new(Noop)
    }

    #[test]
    fn registered_names_are_listed() {
        let mut registry: Registry<()> = Registry::new();
        registry.register_data_source("noop", noop);

        assert!(registry.data_sources().contains_key("noop"));
        assert!(registry.resources().is_empty());
        let ds = (registry.data_sources()["noop"])();
        assert_eq!(ds.name(), "noop");
    }

    #[test]
    #[should_panic(expected = "data source noop is already registered")]
    fn duplicate_registration_panics() {
        let mut registry: Registry<()> = Registry::new();
        registry.register_data_source("noop", noop);
        registry.register_data_source("noop", noop);
    }
}
