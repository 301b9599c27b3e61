//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the desired state declared in configuration with the current
//! state refreshed through the Provider, and generates the list of Effects
//! (Plan) needed to converge.

use std::collections::{HashMap, HashSet};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::Provider;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A force_new attribute differs -> delete and recreate
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
    /// Resource exists but not in desired state -> needs deletion
    Delete(State),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
///
/// With a schema, defaults are applied, computed attributes left unset are
/// ignored and `force_new` changes turn into a replacement.
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = match schema {
        Some(schema) => find_changed_with_schema(schema, &desired.attributes, &current.attributes),
        None => find_changed_attributes(&desired.attributes, &current.attributes),
    };

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let replace = schema.is_some_and(|s| {
        changed
            .iter()
            .any(|name| s.get(name).is_some_and(|a| a.force_new))
    });

    if replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

fn find_changed_with_schema(
    schema: &ResourceSchema,
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let desired = schema.with_defaults(desired);
    let null = Value::Null;
    let mut changed = Vec::new();

    for (name, attr) in &schema.attributes {
        if !attr.is_configurable() {
            continue;
        }
        let wanted = desired.get(name).unwrap_or(&null);
        if wanted.is_null() && attr.computed {
            continue;
        }
        let have = current.get(name).unwrap_or(&null);
        if !attr.attr_type.values_equal(wanted, have) {
            changed.push(name.clone());
        }
    }

    changed.sort();
    changed
}

/// Compute Diff for every resource and generate a Plan
///
/// Data sources become reads. Current states with no desired counterpart
/// become deletions.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    provider: &dyn Provider,
) -> Plan {
    let mut plan = Plan::new();
    let mut declared = HashSet::new();

    for resource in desired {
        declared.insert(resource.id.clone());

        if resource.is_data_source() {
            plan.add(Effect::Read(resource.clone()));
            continue;
        }

        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        let schema = provider.resource_schema(&resource.id.resource_type);
        match diff(resource, &current, schema.as_deref()) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Replace {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
            Diff::Delete(state) => plan.add(Effect::Delete(state)),
        }
    }

    let mut orphans: Vec<&State> = current_states
        .values()
        .filter(|s| s.exists && !declared.contains(&s.id))
        .collect();
    orphans.sort_by(|a, b| a.id.to_string().cmp(&b.id.to_string()));
    for state in orphans {
        plan.add(Effect::Delete(state.clone()));
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};

    fn variable_schema() -> ResourceSchema {
        ResourceSchema::new("gitlab_project_variable")
            .attribute(
                AttributeSchema::new("project", AttributeType::String)
                    .required()
                    .force_new(),
            )
            .attribute(AttributeSchema::new("value", AttributeType::String).required())
            .attribute(AttributeSchema::new("masked", AttributeType::Bool).with_default(false))
            .attribute(
                AttributeSchema::new("environment_scope", AttributeType::String)
                    .optional_computed(),
            )
    }

    fn existing(attrs: &[(&str, Value)]) -> State {
        State::existing(
            ResourceId::new("gitlab_project_variable", "v"),
            attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("gitlab_branch", "test");
        let current = State::not_found(ResourceId::new("gitlab_branch", "test"));

        let result = diff(&desired, &current, None);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_with_defaults_and_computed() {
        let desired = Resource::new("gitlab_project_variable", "v")
            .with_attribute("project", "42")
            .with_attribute("value", "bar");
        let current = existing(&[
            ("project", "42".into()),
            ("value", "bar".into()),
            ("masked", false.into()),
            ("environment_scope", "*".into()),
        ]);

        let result = diff(&desired, &current, Some(&variable_schema()));
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("gitlab_project_variable", "v")
            .with_attribute("project", "42")
            .with_attribute("value", "baz");
        let current = existing(&[
            ("project", "42".into()),
            ("value", "bar".into()),
            ("masked", false.into()),
        ]);

        match diff(&desired, &current, Some(&variable_schema())) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["value".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_replace_on_force_new() {
        let desired = Resource::new("gitlab_project_variable", "v")
            .with_attribute("project", "43")
            .with_attribute("value", "bar");
        let current = existing(&[
            ("project", "42".into()),
            ("value", "bar".into()),
            ("masked", false.into()),
        ]);

        assert!(matches!(
            diff(&desired, &current, Some(&variable_schema())),
            Diff::Replace { .. }
        ));
    }

    #[test]
    fn unset_collection_matches_empty_remote_value() {
        let schema = variable_schema().attribute(AttributeSchema::new(
            "labels",
            AttributeType::Set(Box::new(AttributeType::String)),
        ));
        let desired = Resource::new("gitlab_project_variable", "v")
            .with_attribute("project", "42")
            .with_attribute("value", "bar");
        let empty = existing(&[
            ("project", "42".into()),
            ("value", "bar".into()),
            ("masked", false.into()),
            ("labels", Value::List(vec![])),
        ]);
        assert!(matches!(diff(&desired, &empty, Some(&schema)), Diff::NoChange(_)));

        let labelled = existing(&[
            ("project", "42".into()),
            ("value", "bar".into()),
            ("masked", false.into()),
            ("labels", Value::List(vec!["bug".into()])),
        ]);
        match diff(&desired, &labelled, Some(&schema)) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["labels".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }
}
