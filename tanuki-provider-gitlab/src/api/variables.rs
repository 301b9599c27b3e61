use serde::{Deserialize, Serialize};

fn default_variable_type() -> String {
    "env_var".to_string()
}

/// Project, group or instance CI/CD variable
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Variable {
    pub key: String,
    pub value: String,
    #[serde(default = "default_variable_type")]
    pub variable_type: String,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub masked: bool,
    /// Absent for instance variables
    #[serde(default)]
    pub environment_scope: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VariableOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_options_are_omitted() {
        let opts = VariableOptions {
            value: Some("bar".to_string()),
            masked: Some(false),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&opts).unwrap(),
            serde_json::json!({"value": "bar", "masked": false})
        );
    }

    #[test]
    fn instance_variable_has_no_scope() {
        let v: Variable =
            serde_json::from_str(r#"{"key":"FOO","value":"bar","protected":true}"#).unwrap();
        assert_eq!(v.variable_type, "env_var");
        assert!(v.protected);
        assert_eq!(v.environment_scope, None);
    }
}
