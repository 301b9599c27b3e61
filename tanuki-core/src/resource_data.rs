//! ResourceData - the attribute view a handler reads from and writes to
//!
//! Wraps configuration, prior state and the working copy that becomes the new
//! state once the handler returns.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::resource::Value;
use crate::schema::ResourceSchema;
use crate::state_map::StateMapError;

static NULL: Value = Value::Null;

#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: Arc<ResourceSchema>,
    id: Option<String>,
    prior: HashMap<String, Value>,
    attributes: HashMap<String, Value>,
    changed: HashSet<String>,
}

impl ResourceData {
    fn empty(schema: Arc<ResourceSchema>) -> Self {
        Self {
            schema,
            id: None,
            prior: HashMap::new(),
            attributes: HashMap::new(),
            changed: HashSet::new(),
        }
    }

    /// Data for a Create: configuration with schema defaults applied
    pub fn for_create(schema: Arc<ResourceSchema>, config: &HashMap<String, Value>) -> Self {
        let attributes = schema.with_defaults(config);
        let changed = attributes.keys().cloned().collect();
        Self {
            attributes,
            changed,
            ..Self::empty(schema)
        }
    }

    /// Data for a data source read; same shape as a Create
    pub fn for_data_source(schema: Arc<ResourceSchema>, config: &HashMap<String, Value>) -> Self {
        Self::for_create(schema, config)
    }

    /// Data for a Read (refresh) of existing state
    pub fn for_read(
        schema: Arc<ResourceSchema>,
        id: impl Into<String>,
        prior: &HashMap<String, Value>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            prior: prior.clone(),
            attributes: prior.clone(),
            ..Self::empty(schema)
        }
    }

    /// Data for an import: only the ID is known
    pub fn for_import(schema: Arc<ResourceSchema>, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::empty(schema)
        }
    }

    /// Data for an Update from `prior` state towards `config`
    ///
    /// Optional attributes missing from configuration become null unless the
    /// remote side computes them.
    pub fn for_update(
        schema: Arc<ResourceSchema>,
        id: impl Into<String>,
        prior: &HashMap<String, Value>,
        config: &HashMap<String, Value>,
    ) -> Self {
        let config = schema.with_defaults(config);
        let mut attributes = prior.clone();
        let mut changed = HashSet::new();

        for (name, attr) in &schema.attributes {
            if !attr.is_configurable() {
                continue;
            }
            let desired = match config.get(name) {
                Some(v) if !v.is_null() => v.clone(),
                _ if attr.computed => continue,
                _ => Value::Null,
            };
            let before = prior.get(name).unwrap_or(&NULL);
            if !attr.attr_type.values_equal(before, &desired) {
                changed.insert(name.clone());
            }
            attributes.insert(name.clone(), desired);
        }

        Self {
            id: Some(id.into()),
            prior: prior.clone(),
            attributes,
            changed,
            ..Self::empty(schema)
        }
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Mark the remote object as gone; the host drops it from state
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// Current value, or `Value::Null` when unset
    pub fn get(&self, key: &str) -> &Value {
        self.attributes.get(key).unwrap_or(&NULL)
    }

    /// Value if the attribute is present and not null
    ///
    /// `false`, `0` and `""` count as present.
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).as_str()
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).as_int()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).as_bool()
    }

    /// Value recorded in state before this operation
    pub fn prior(&self, key: &str) -> &Value {
        self.prior.get(key).unwrap_or(&NULL)
    }

    pub fn has_change(&self, key: &str) -> bool {
        self.changed.contains(key)
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    /// Write one attribute, checked against the schema
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), StateMapError> {
        let value = value.into();
        let Some(attr) = self.schema.get(key) else {
            return Err(StateMapError::UnknownAttribute {
                field: key.to_string(),
                value,
            });
        };
        if let Err(source) = attr.attr_type.validate(&value) {
            return Err(StateMapError::InvalidValue {
                field: key.to_string(),
                value,
                source,
            });
        }
        self.attributes.insert(key.to_string(), value);
        Ok(())
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    pub fn into_attributes(self) -> HashMap<String, Value> {
        self.attributes
    }
}
