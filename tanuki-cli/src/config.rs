//! Configuration file: provider block, state backend and declared objects

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use tanuki_core::registry::Registry;
use tanuki_core::resource::{Resource, Value};
use tanuki_provider_gitlab::{GitLabClient, ProviderConfig};
use tanuki_state::BackendConfig;

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    /// Managed objects
    #[serde(default)]
    pub resources: Vec<Declaration>,
    /// Data source lookups
    #[serde(default)]
    pub data: Vec<Declaration>,
}

/// One `{"type": ..., "name": ..., "attributes": {...}}` entry
#[derive(Debug, Clone, Deserialize)]
pub struct Declaration {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Declaration {
    fn to_resource(&self, read_only: bool) -> Resource {
        let mut resource =
            Resource::new(&self.resource_type, &self.name).with_read_only(read_only);
        for (key, value) in &self.attributes {
            resource = resource.with_attribute(key, Value::from_json(value));
        }
        resource
    }
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let config: ConfigFile =
            serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))?;

        // Resources and data sources are separate namespaces
        for (kind, decls) in [("resource", &config.resources), ("data source", &config.data)] {
            let mut seen = HashSet::new();
            for decl in decls {
                if !seen.insert((decl.resource_type.as_str(), decl.name.as_str())) {
                    return Err(format!(
                        "{} {}.{} is declared more than once",
                        kind, decl.resource_type, decl.name
                    ));
                }
            }
        }
        Ok(config)
    }

    /// Data sources first, then managed objects, in declaration order
    pub fn desired(&self) -> Vec<Resource> {
        self.data
            .iter()
            .map(|d| d.to_resource(true))
            .chain(self.resources.iter().map(|d| d.to_resource(false)))
            .collect()
    }

    /// Check every declaration against the schemas in `registry`
    pub fn validate(&self, registry: &Registry<GitLabClient>) -> Result<(), String> {
        let mut errors = Vec::new();

        for resource in self.desired() {
            let id = &resource.id;
            let schema = if resource.is_data_source() {
                registry
                    .data_sources()
                    .get(id.resource_type.as_str())
                    .map(|factory| factory().schema())
            } else {
                registry
                    .resources()
                    .get(id.resource_type.as_str())
                    .map(|factory| factory().schema())
            };

            let Some(schema) = schema else {
                let kind = if resource.is_data_source() {
                    "data source"
                } else {
                    "resource type"
                };
                errors.push(format!("{}: unknown {} {}", id, kind, id.resource_type));
                continue;
            };

            if let Err(type_errors) = schema.validate(&resource.attributes) {
                errors.extend(type_errors.iter().map(|e| format!("{}: {}", id, e)));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"{
        "provider": {"base_url": "https://gitlab.example.com", "early_auth_check": false},
        "backend": {"type": "local", "path": "gitlab.state.json"},
        "resources": [
            {
                "type": "gitlab_project_variable",
                "name": "foo",
                "attributes": {"project": "42", "key": "FOO", "value": "bar", "protected": true}
            }
        ],
        "data": [
            {"type": "gitlab_current_user", "name": "me"}
        ]
    }"#;

    #[test]
    fn parses_all_sections() {
        let config = ConfigFile::parse(EXAMPLE).unwrap();
        assert_eq!(config.provider.base_url.as_deref(), Some("https://gitlab.example.com"));
        assert!(!config.provider.early_auth_check);
        assert_eq!(config.backend.get_string("path"), Some("gitlab.state.json"));

        let desired = config.desired();
        assert_eq!(desired.len(), 2);
        assert!(desired[0].is_data_source());
        assert_eq!(desired[1].attributes.get("protected"), Some(&Value::Bool(true)));
    }

    #[test]
    fn load_prefixes_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tanuki.json");

        std::fs::write(&path, EXAMPLE).unwrap();
        assert_eq!(ConfigFile::load(&path).unwrap().resources.len(), 1);

        std::fs::write(&path, "{\"resources\": 3}").unwrap();
        let err = ConfigFile::load(&path).unwrap_err();
        assert!(err.starts_with(&path.display().to_string()), "{}", err);

        let err = ConfigFile::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.starts_with("Failed to read"), "{}", err);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = ConfigFile::parse("{}").unwrap();
        assert_eq!(config.backend.backend_type, "local");
        assert!(config.desired().is_empty());
    }

    #[test]
    fn duplicate_declaration_is_rejected() {
        let err = ConfigFile::parse(
            r#"{"resources": [
                {"type": "gitlab_branch", "name": "dev"},
                {"type": "gitlab_branch", "name": "dev"}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.contains("gitlab_branch.dev is declared more than once"));
    }

    #[test]
    fn data_source_may_share_a_resource_name() {
        let config = ConfigFile::parse(
            r#"{
                "resources": [{"type": "gitlab_repository_file", "name": "readme"}],
                "data": [{"type": "gitlab_repository_file", "name": "readme"}]
            }"#,
        );
        assert!(config.is_ok());
    }

    #[test]
    fn validation_reports_unknown_types_and_bad_values() {
        let registry = tanuki_provider_gitlab::registry();

        let config = ConfigFile::parse(EXAMPLE).unwrap();
        assert!(config.validate(&registry).is_ok());

        let config = ConfigFile::parse(
            r#"{"resources": [
                {"type": "gitlab_nope", "name": "x"},
                {"type": "gitlab_project_variable", "name": "bad", "attributes": {"project": "42", "key": "FOO", "value": "v", "protected": "yes"}}
            ]}"#,
        )
        .unwrap();
        let err = config.validate(&registry).unwrap_err();
        assert!(err.contains("gitlab_nope.x: unknown resource type gitlab_nope"), "{}", err);
        assert!(err.contains("gitlab_project_variable.bad"), "{}", err);
    }
}
