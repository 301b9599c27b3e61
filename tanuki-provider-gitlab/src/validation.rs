//! Attribute validators shared by several resources

use std::sync::LazyLock;

use regex::Regex;
use tanuki_core::resource::Value;
use tanuki_core::schema::AttributeType;

static VARIABLE_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").ok());

/// CI/CD variable key: 1 to 255 characters of `A-Z`, `a-z`, `0-9` and `_`
pub fn validate_variable_key(key: &str) -> Result<(), String> {
    let len = key.chars().count();
    if !(1..=255).contains(&len) {
        return Err(format!(
            "expected length of key to be in the range (1 - 255), got {}",
            key
        ));
    }
    if !VARIABLE_KEY.as_ref().is_some_and(|re| re.is_match(key)) {
        return Err(format!(
            "{} is an invalid value for argument key. Only A-Z, a-z, 0-9, and _ are allowed",
            key
        ));
    }
    Ok(())
}

pub fn variable_key() -> AttributeType {
    AttributeType::Custom {
        name: "VariableKey".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) => validate_variable_key(s),
            _ => Ok(()),
        },
    }
}

pub fn variable_type() -> AttributeType {
    AttributeType::Enum(vec!["env_var".to_string(), "file".to_string()])
}

/// RFC 3339 timestamp text
pub fn rfc3339() -> AttributeType {
    AttributeType::Custom {
        name: "Timestamp".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|_| ())
                .map_err(|e| format!("{:?} is not a valid RFC 3339 timestamp: {}", s, e)),
            _ => Ok(()),
        },
    }
}

/// Project access level names accepted by the sharing endpoints
pub const ACCESS_LEVELS: &[(&str, i64)] = &[
    ("no one", 0),
    ("minimal", 5),
    ("guest", 10),
    ("reporter", 20),
    ("developer", 30),
    ("maintainer", 40),
    ("owner", 50),
];

pub fn access_level_value(name: &str) -> Option<i64> {
    ACCESS_LEVELS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
}

pub fn access_level_name(value: i64) -> Option<&'static str> {
    ACCESS_LEVELS
        .iter()
        .find(|(_, v)| *v == value)
        .map(|(n, _)| *n)
}

/// Access levels a project can grant to a shared group
pub fn project_access_level() -> AttributeType {
    AttributeType::Enum(
        ["guest", "reporter", "developer", "maintainer"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    )
}
