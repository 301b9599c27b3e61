//! GitLab data sources
//!
//! Most data sources reuse the schema and state map of the matching
//! resource, with every attribute but the lookup keys computed.

pub mod current_user;
pub mod project_milestones;
pub mod repository_file;
pub mod variables;

use tanuki_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// Derive a data source schema from a resource schema
///
/// Attributes named in `required` must be configured, those in `optional`
/// may be (keeping their default), and the rest become computed.
pub(crate) fn schema_from_resource(
    resource: ResourceSchema,
    name: &str,
    required: &[&str],
    optional: &[&str],
) -> ResourceSchema {
    let mut schema = ResourceSchema::new(name);
    schema.description = resource.description;

    for (attr_name, attr) in resource.attributes {
        let mut derived = AttributeSchema::new(attr_name.as_str(), attr.attr_type);
        derived.sensitive = attr.sensitive;
        derived.description = attr.description;

        derived = if required.contains(&attr_name.as_str()) {
            derived.required()
        } else if optional.contains(&attr_name.as_str()) {
            derived.default = attr.default;
            derived
        } else {
            derived.computed()
        };
        schema = schema.attribute(derived);
    }
    schema
}

/// Element type of a list of flattened objects shaped like `schema`
pub(crate) fn object_of(schema: &ResourceSchema) -> AttributeType {
    let mut fields: Vec<(String, AttributeType)> = schema
        .attributes
        .values()
        .map(|a| (a.name.clone(), a.attr_type.clone()))
        .collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    AttributeType::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_schema_keeps_lookup_keys_configurable() {
        let resource = ResourceSchema::new("gitlab_thing")
            .attribute(AttributeSchema::new("project", AttributeType::String).required().force_new())
            .attribute(AttributeSchema::new("scope", AttributeType::String).with_default("*"))
            .attribute(AttributeSchema::new("value", AttributeType::String).required().sensitive());

        let schema = schema_from_resource(resource, "gitlab_thing", &["project"], &["scope"]);
        let project = schema.get("project").unwrap();
        assert!(project.required && !project.force_new);
        assert_eq!(schema.get("scope").unwrap().default, Some("*".into()));
        let value = schema.get("value").unwrap();
        assert!(value.computed && !value.required && value.sensitive);
    }
}
