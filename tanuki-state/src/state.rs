//! State file structures for persisting managed GitLab objects

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use tanuki_core::resource::{ResourceId, State, Value};

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of Tanuki that last modified this state
    pub tanuki_version: String,
    /// All managed objects and their last known state
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a new empty state file
    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    /// Create a new state file with a specific lineage
    pub fn with_lineage(lineage: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage,
            tanuki_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Increment serial and update the tool version for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.tanuki_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find_resource(&self, resource_type: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    pub fn find_resource_mut(
        &mut self,
        resource_type: &str,
        name: &str,
    ) -> Option<&mut ResourceState> {
        self.resources
            .iter_mut()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Add or update a resource in the state
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        if let Some(existing) = self.find_resource_mut(&resource.resource_type, &resource.name) {
            *existing = resource;
        } else {
            self.resources.push(resource);
        }
    }

    pub fn remove_resource(&mut self, resource_type: &str, name: &str) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.resource_type == resource_type && r.name == name)?;
        Some(self.resources.remove(pos))
    }

    /// Record the outcome of a provider call: existing states are upserted,
    /// absent ones removed
    pub fn record(&mut self, provider: &str, state: &State) {
        if state.exists {
            self.upsert_resource(ResourceState::from_state(provider, state));
        } else {
            self.remove_resource(&state.id.resource_type, &state.id.name);
        }
    }

    /// Last known state of every managed object
    pub fn states(&self) -> HashMap<ResourceId, State> {
        self.resources
            .iter()
            .map(|r| (r.resource_id(), r.to_state()))
            .collect()
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "gitlab_project_variable")
    pub resource_type: String,
    /// Resource name from the configuration file
    pub name: String,
    /// Provider name (e.g., "gitlab")
    pub provider: String,
    /// Composite remote ID (e.g., "42:FOO:*")
    pub id: String,
    /// Schema version the attributes were written with
    #[serde(default)]
    pub schema_version: u32,
    /// All attributes of the object as JSON values
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ResourceState {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            id: id.into(),
            schema_version: 0,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    /// Persistable form of a provider `State`; null attributes are dropped
    pub fn from_state(provider: &str, state: &State) -> Self {
        let attributes = state
            .attributes
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Self {
            resource_type: state.id.resource_type.clone(),
            name: state.id.name.clone(),
            provider: provider.to_string(),
            id: state.identifier.clone().unwrap_or_default(),
            schema_version: state.schema_version,
            attributes,
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(&self.resource_type, &self.name)
    }

    pub fn to_state(&self) -> State {
        let attributes = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect();
        State::existing(self.resource_id(), attributes)
            .with_identifier(&self.id)
            .with_schema_version(self.schema_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_new() {
        let state = StateFile::new();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(!state.lineage.is_empty());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_state_file_increment_serial() {
        let mut state = StateFile::new();
        state.increment_serial();
        state.increment_serial();
        assert_eq!(state.serial, 2);
    }

    #[test]
    fn test_state_file_upsert_resource() {
        let mut state = StateFile::new();

        state.upsert_resource(
            ResourceState::new("gitlab_project_variable", "foo", "gitlab", "42:FOO:*")
                .with_attribute("value", serde_json::json!("bar")),
        );
        state.upsert_resource(
            ResourceState::new("gitlab_project_variable", "foo", "gitlab", "42:FOO:*")
                .with_attribute("value", serde_json::json!("baz")),
        );

        assert_eq!(state.resources.len(), 1);
        assert_eq!(
            state.resources[0].attributes.get("value"),
            Some(&serde_json::json!("baz"))
        );
    }

    #[test]
    fn test_state_file_remove_resource() {
        let mut state = StateFile::new();
        state.upsert_resource(ResourceState::new("gitlab_branch", "dev", "gitlab", "42:dev"));

        assert!(state.remove_resource("gitlab_branch", "dev").is_some());
        assert!(state.resources.is_empty());
        assert!(state.remove_resource("gitlab_branch", "other").is_none());
    }

    #[test]
    fn test_state_conversion() {
        let id = ResourceId::new("gitlab_project_share_group", "devs");
        let state = State::existing(
            id.clone(),
            HashMap::from([
                ("group_id".to_string(), Value::Int(7)),
                ("group_access".to_string(), Value::from("developer")),
                ("access_level".to_string(), Value::Null),
            ]),
        )
        .with_identifier("42:7")
        .with_schema_version(1);

        let persisted = ResourceState::from_state("gitlab", &state);
        assert_eq!(persisted.id, "42:7");
        assert_eq!(persisted.schema_version, 1);
        assert!(!persisted.attributes.contains_key("access_level"));

        let restored = persisted.to_state();
        assert_eq!(restored.id, id);
        assert_eq!(restored.identifier.as_deref(), Some("42:7"));
        assert_eq!(restored.attributes.get("group_id"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_record_removes_absent_objects() {
        let id = ResourceId::new("gitlab_branch", "dev");
        let mut file = StateFile::new();
        file.record(
            "gitlab",
            &State::existing(id.clone(), HashMap::new()).with_identifier("42:dev"),
        );
        assert_eq!(file.states().len(), 1);

        file.record("gitlab", &State::not_found(id));
        assert!(file.states().is_empty());
    }

    #[test]
    fn test_missing_schema_version_defaults_to_zero() {
        let json = r#"{
            "resource_type": "gitlab_project_share_group",
            "name": "devs",
            "provider": "gitlab",
            "id": "42:7",
            "attributes": {"access_level": "developer"}
        }"#;
        let resource: ResourceState = serde_json::from_str(json).unwrap();
        assert_eq!(resource.schema_version, 0);
    }
}
