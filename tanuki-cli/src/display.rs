//! Terminal rendering of plans, apply results and schemas

use colored::Colorize;

use tanuki_core::effect::Effect;
use tanuki_core::interpreter::{ApplyResult, EffectOutcome};
use tanuki_core::plan::Plan;
use tanuki_core::provider::Provider;
use tanuki_core::resource::{Resource, Value};
use tanuki_core::schema::ResourceSchema;

const SENSITIVE: &str = "(sensitive value)";

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut strs: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            strs.sort();
            format!("{{{}}}", strs.join(", "))
        }
        Value::Null => "null".to_string(),
    }
}

/// Display form of `key`, masked when the schema marks it sensitive
fn shown(schema: Option<&ResourceSchema>, key: &str, value: &Value) -> String {
    let sensitive = schema
        .and_then(|s| s.get(key))
        .is_some_and(|a| a.sensitive);
    if sensitive {
        SENSITIVE.to_string()
    } else {
        format_value(value)
    }
}

fn sorted_keys(resource: &Resource) -> Vec<&String> {
    let mut keys: Vec<_> = resource.attributes.keys().collect();
    keys.sort();
    keys
}

pub fn print_plan(plan: &Plan, provider: &dyn Provider) {
    if plan.mutation_count() == 0 {
        println!("{}", "No changes. GitLab is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        let id = effect.resource_id();
        let schema = provider.resource_schema(&id.resource_type);
        let schema = schema.as_deref();

        match effect {
            Effect::Read(_) => {}
            Effect::Create(r) => {
                println!("  {} {}", "+".green().bold(), id.to_string().cyan().bold());
                for key in sorted_keys(r) {
                    println!("      {}: {}", key, shown(schema, key, &r.attributes[key]).green());
                }
            }
            Effect::Update {
                from,
                to,
                changed_attributes,
                ..
            } => {
                println!("  {} {}", "~".yellow().bold(), id.to_string().cyan().bold());
                print_changes(schema, &from.attributes, &to.attributes, changed_attributes);
            }
            Effect::Replace {
                from,
                to,
                changed_attributes,
                ..
            } => {
                println!(
                    "  {} {} {}",
                    "-/+".magenta().bold(),
                    id.to_string().cyan().bold(),
                    "(must be replaced)".magenta()
                );
                print_changes(schema, &from.attributes, &to.attributes, changed_attributes);
            }
            Effect::Delete(state) => {
                let identifier = state.identifier.as_deref().unwrap_or("?");
                println!(
                    "  {} {} ({})",
                    "-".red().bold(),
                    id.to_string().cyan().bold(),
                    identifier
                );
            }
        }
    }

    println!();
    println!("{}", plan.summary().to_string().bold());
}

fn print_changes(
    schema: Option<&ResourceSchema>,
    from: &std::collections::HashMap<String, Value>,
    to: &std::collections::HashMap<String, Value>,
    changed: &[String],
) {
    for key in changed {
        let old = from.get(key).unwrap_or(&Value::Null);
        let new = to.get(key).unwrap_or(&Value::Null);
        println!(
            "      {}: {} → {}",
            key,
            shown(schema, key, old).red(),
            shown(schema, key, new).green()
        );
    }
}

pub fn print_apply_result(result: &ApplyResult) {
    for outcome in &result.outcomes {
        match outcome {
            Ok(EffectOutcome::Created { state }) => {
                println!("  {} {}", "✓ created".green(), state.id)
            }
            Ok(EffectOutcome::Updated { state }) => {
                println!("  {} {}", "✓ updated".green(), state.id)
            }
            Ok(EffectOutcome::Replaced { state }) => {
                println!("  {} {}", "✓ replaced".green(), state.id)
            }
            Ok(EffectOutcome::Deleted { id }) => println!("  {} {}", "✓ deleted".green(), id),
            Ok(EffectOutcome::Read { .. }) | Ok(EffectOutcome::Skipped { .. }) => {}
            Err(e) => println!("  {} {}", "✗".red().bold(), e),
        }
    }

    println!();
    let summary = format!(
        "{} succeeded, {} failed.",
        result.success_count, result.failure_count
    );
    if result.is_success() {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.red().bold());
    }
}

pub fn print_schema(schema: &ResourceSchema) {
    println!("{}", schema.resource_type.cyan().bold());
    if let Some(description) = &schema.description {
        println!("  {}", description);
    }
    if schema.version > 0 {
        println!("  schema version {}", schema.version);
    }

    let mut attributes: Vec<_> = schema.attributes.values().collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name));
    for attr in attributes {
        let mut flags = Vec::new();
        if attr.required {
            flags.push("required");
        }
        if attr.optional {
            flags.push("optional");
        }
        if attr.computed {
            flags.push("computed");
        }
        if attr.force_new {
            flags.push("forces replacement");
        }
        if attr.sensitive {
            flags.push("sensitive");
        }
        println!(
            "    {} {} {}",
            attr.name.bold(),
            attr.attr_type.to_string().dimmed(),
            format!("({})", flags.join(", ")).dimmed()
        );
        if let Some(description) = &attr.description {
            println!("        {}", description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tanuki_core::schema::{AttributeSchema, AttributeType};

    #[test]
    fn values_are_rendered_compactly() {
        assert_eq!(format_value(&Value::from("x")), "\"x\"");
        assert_eq!(format_value(&Value::Int(3)), "3");
        assert_eq!(
            format_value(&Value::List(vec![Value::from("a"), Value::Bool(true)])),
            "[\"a\", true]"
        );
        let map = Value::Map(HashMap::from([
            ("b".to_string(), Value::Int(2)),
            ("a".to_string(), Value::Int(1)),
        ]));
        assert_eq!(format_value(&map), "{a: 1, b: 2}");
        assert_eq!(format_value(&Value::Null), "null");
    }

    #[test]
    fn sensitive_values_are_masked() {
        let schema = ResourceSchema::new("gitlab_project_variable")
            .attribute(AttributeSchema::new("value", AttributeType::String).sensitive())
            .attribute(AttributeSchema::new("key", AttributeType::String));

        assert_eq!(shown(Some(&schema), "value", &Value::from("hunter2")), SENSITIVE);
        assert_eq!(shown(Some(&schema), "key", &Value::from("FOO")), "\"FOO\"");
        assert_eq!(shown(None, "value", &Value::from("x")), "\"x\"");
    }
}
