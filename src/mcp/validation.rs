//! Declarative argument validation.
//!
//! Each tool declares its arguments as a slice of [`FieldRule`]s. The same
//! rules validate incoming arguments and generate the JSON Schema advertised
//! in `tools/list`, so the two cannot drift apart.
//!
//! Validation collects every issue rather than stopping at the first one,
//! drops fields no rule names, and treats `null` the same as an absent field.

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Shape and bounds of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A string whose length in characters lies in `min..=max`.
    Text { min: usize, max: usize },
    /// A list of strings.
    TextList {
        min_items: usize,
        max_items: usize,
        item_min: usize,
        item_max: usize,
    },
}

/// One declared argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldRule {
    /// A required string of `min..=max` characters.
    #[must_use]
    pub const fn required(name: &'static str, description: &'static str, min: usize, max: usize) -> Self {
        Self {
            name,
            description,
            required: true,
            kind: FieldKind::Text { min, max },
        }
    }

    /// An optional string of at most `max` characters.
    #[must_use]
    pub const fn optional(name: &'static str, description: &'static str, max: usize) -> Self {
        Self {
            name,
            description,
            required: false,
            kind: FieldKind::Text { min: 0, max },
        }
    }

    /// A required list of `min_items..=max_items` non-empty strings of at most
    /// `item_max` characters.
    #[must_use]
    pub const fn list(
        name: &'static str,
        description: &'static str,
        min_items: usize,
        max_items: usize,
        item_max: usize,
    ) -> Self {
        Self {
            name,
            description,
            required: true,
            kind: FieldKind::TextList {
                min_items,
                max_items,
                item_min: 1,
                item_max,
            },
        }
    }

    /// JSON Schema fragment for this field.
    fn schema(&self) -> Value {
        match self.kind {
            FieldKind::Text { min, max } => {
                let mut schema = json!({
                    "type": "string",
                    "description": self.description,
                    "maxLength": max,
                });
                if min > 0 {
                    schema["minLength"] = json!(min);
                }
                schema
            }
            FieldKind::TextList {
                min_items,
                max_items,
                item_min,
                item_max,
            } => json!({
                "type": "array",
                "description": self.description,
                "items": {
                    "type": "string",
                    "minLength": item_min,
                    "maxLength": item_max,
                },
                "minItems": min_items,
                "maxItems": max_items,
            }),
        }
    }

    fn check(&self, value: &Value, issues: &mut Vec<String>) {
        let name = self.name;
        match self.kind {
            FieldKind::Text { min, max } => check_text(name, name, value, min, max, issues),
            FieldKind::TextList {
                min_items,
                max_items,
                item_min,
                item_max,
            } => {
                let Some(items) = value.as_array() else {
                    issues.push(format!("{name}: \"{name}\" must be an array"));
                    return;
                };
                if items.len() < min_items {
                    issues.push(format!(
                        "{name}: \"{name}\" must contain at least {min_items} items"
                    ));
                }
                if items.len() > max_items {
                    issues.push(format!(
                        "{name}: \"{name}\" must contain less than or equal to {max_items} items"
                    ));
                }
                for (index, item) in items.iter().enumerate() {
                    let label = format!("{name}[{index}]");
                    check_text(name, &label, item, item_min, item_max, issues);
                }
            }
        }
    }
}

fn check_text(field: &str, label: &str, value: &Value, min: usize, max: usize, issues: &mut Vec<String>) {
    let Some(text) = value.as_str() else {
        issues.push(format!("{field}: \"{label}\" must be a string"));
        return;
    };
    let length = text.chars().count();
    if length == 0 && min > 0 {
        issues.push(format!("{field}: \"{label}\" is not allowed to be empty"));
    } else if length < min {
        issues.push(format!(
            "{field}: \"{label}\" length must be at least {min} characters long"
        ));
    }
    if length > max {
        issues.push(format!(
            "{field}: \"{label}\" length must be less than or equal to {max} characters long"
        ));
    }
}

/// Arguments rejected by their rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Validation failed: {}", .issues.join(", "))]
pub struct ValidationError {
    /// One entry per problem, each prefixed with the field name.
    pub issues: Vec<String>,
}

/// Validates `arguments` against `rules` and returns only the declared fields.
///
/// # Errors
///
/// Returns every issue found when any rule is violated.
pub fn validate_arguments(rules: &[FieldRule], arguments: &Value) -> Result<Map<String, Value>, ValidationError> {
    let empty = Map::new();
    let object = match arguments {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => {
            return Err(ValidationError {
                issues: vec!["arguments: \"arguments\" must be of type object".to_string()],
            })
        }
    };

    let mut issues = Vec::new();
    let mut accepted = Map::new();
    for rule in rules {
        match object.get(rule.name).filter(|v| !v.is_null()) {
            Some(value) => {
                let before = issues.len();
                rule.check(value, &mut issues);
                if issues.len() == before {
                    accepted.insert(rule.name.to_string(), value.clone());
                }
            }
            None if rule.required => {
                issues.push(format!("{0}: \"{0}\" is required", rule.name));
            }
            None => {}
        }
    }

    if issues.is_empty() {
        Ok(accepted)
    } else {
        Err(ValidationError { issues })
    }
}

/// JSON Schema object describing `rules`.
#[must_use]
pub fn input_schema(rules: &[FieldRule]) -> Value {
    let properties: Map<String, Value> = rules
        .iter()
        .map(|rule| (rule.name.to_string(), rule.schema()))
        .collect();
    let required: Vec<&str> = rules
        .iter()
        .filter(|rule| rule.required)
        .map(|rule| rule.name)
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
