//! Parameter schemas declared by tool registrations.
//!
//! A schema is an ordered list of [`ParamSpec`]s. Each spec states the type
//! and range a value must have and, declaratively, where a value comes from
//! when the model collaborator does not supply a valid one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The type (and constraints) of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    Boolean,
    Enum { values: Vec<String> },
}

/// Where a fallback value comes from.
///
/// Table keys are the serialized names of the context enums
/// (`easy`, `anxious`, `visual`, `low`, ...). A table lookup that misses uses
/// `otherwise`, then the chained `then` rule, then the spec's `default`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum FallbackRule {
    /// The spec's `default` value.
    #[default]
    Literal,
    /// Topic phrase of the message, then the last topic in history.
    Topic,
    /// Last topic mentioned in history.
    HistoryTopic,
    /// Concept phrase of the message, title-cased.
    Concept,
    /// A known school subject named in the message or history.
    Subject,
    /// Keyed by context difficulty.
    Difficulty { map: BTreeMap<String, Value> },
    /// Keyed by emotional state.
    Emotion {
        map: BTreeMap<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        then: Option<Box<FallbackRule>>,
    },
    /// Keyed by teaching style.
    Style {
        map: BTreeMap<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        then: Option<Box<FallbackRule>>,
    },
    /// Keyed by mastery band.
    Mastery {
        map: BTreeMap<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        then: Option<Box<FallbackRule>>,
    },
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,

    #[serde(flatten)]
    pub kind: ParamKind,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "is_literal")]
    pub fallback: FallbackRule,
}

fn is_literal(rule: &FallbackRule) -> bool {
    matches!(rule, FallbackRule::Literal)
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

impl ParamSpec {
    /// Check a value against this spec, returning its normalized form.
    ///
    /// Enum values match case-insensitively and come back in the declared
    /// spelling; strings are trimmed.
    pub fn check(&self, value: &Value) -> Result<Value, String> {
        match &self.kind {
            ParamKind::String { min_length } => {
                let s = value.as_str().ok_or("expected a string")?.trim();
                let min = min_length.unwrap_or(1);
                if s.chars().count() < min {
                    return Err(format!("must be at least {min} character(s)"));
                }
                Ok(Value::String(s.to_string()))
            }
            ParamKind::Integer { min, max } => {
                let n = value.as_i64().ok_or("expected an integer")?;
                if let Some(lo) = min
                    && n < *lo
                {
                    return Err(format!("{n} is below the minimum {lo}"));
                }
                if let Some(hi) = max
                    && n > *hi
                {
                    return Err(format!("{n} is above the maximum {hi}"));
                }
                Ok(Value::from(n))
            }
            ParamKind::Boolean => value
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| "expected a boolean".to_string()),
            ParamKind::Enum { values } => {
                let s = value.as_str().ok_or("expected a string")?.trim();
                values
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(s))
                    .map(|v| Value::String(v.clone()))
                    .ok_or_else(|| format!("'{s}' is not one of {}", values.join("/")))
            }
        }
    }

    /// A short type description for model prompts.
    pub fn type_hint(&self) -> String {
        match &self.kind {
            ParamKind::String { .. } => "string".into(),
            ParamKind::Integer { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => format!("integer {lo}-{hi}"),
                _ => "integer".into(),
            },
            ParamKind::Boolean => "boolean".into(),
            ParamKind::Enum { values } => format!("one of {}", values.join("|")),
        }
    }
}

/// The extracted parameters for one tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(pub Map<String, Value>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Validate a parameter set against a schema.
///
/// Every violation is reported: missing required fields, values failing their
/// spec, and fields the schema does not declare.
pub fn validate(schema: &[ParamSpec], params: &ParameterSet) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();

    for spec in schema {
        match params.get(&spec.name) {
            Some(value) => {
                if let Err(reason) = spec.check(value) {
                    violations.push(Violation {
                        field: spec.name.clone(),
                        reason,
                    });
                }
            }
            None if spec.required => violations.push(Violation {
                field: spec.name.clone(),
                reason: "required".into(),
            }),
            None => {}
        }
    }

    for key in params.0.keys() {
        if !schema.iter().any(|s| &s.name == key) {
            violations.push(Violation {
                field: key.clone(),
                reason: "not declared by the schema".into(),
            });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Render a schema as a JSON-Schema-like object for model prompts.
pub fn describe(schema: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    for spec in schema {
        let mut prop = Map::new();
        prop.insert("type".into(), Value::String(spec.type_hint()));
        if !spec.description.is_empty() {
            prop.insert("description".into(), Value::String(spec.description.clone()));
        }
        properties.insert(spec.name.clone(), Value::Object(prop));
    }
    let required: Vec<Value> = schema
        .iter()
        .filter(|s| s.required)
        .map(|s| Value::String(s.name.clone()))
        .collect();
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str, kind: ParamKind, required: bool) -> ParamSpec {
        ParamSpec {
            name: name.into(),
            kind,
            required,
            description: String::new(),
            default: None,
            fallback: FallbackRule::Literal,
        }
    }

    fn quiz_schema() -> Vec<ParamSpec> {
        vec![
            spec("topic", ParamKind::String { min_length: None }, true),
            spec(
                "num_questions",
                ParamKind::Integer {
                    min: Some(1),
                    max: Some(50),
                },
                false,
            ),
            spec(
                "difficulty",
                ParamKind::Enum {
                    values: vec!["beginner".into(), "intermediate".into(), "advanced".into()],
                },
                true,
            ),
        ]
    }

    #[test]
    fn valid_set_passes() {
        let mut params = ParameterSet::new();
        params.insert("topic", json!("derivatives"));
        params.insert("num_questions", json!(10));
        params.insert("difficulty", json!("intermediate"));
        assert!(validate(&quiz_schema(), &params).is_ok());
    }

    #[test]
    fn reports_missing_range_and_unknown() {
        let mut params = ParameterSet::new();
        params.insert("num_questions", json!(80));
        params.insert("difficulty", json!("expert"));
        params.insert("colour", json!("red"));

        let violations = validate(&quiz_schema(), &params).unwrap_err();
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["topic", "num_questions", "difficulty", "colour"]);
    }

    #[test]
    fn enum_check_normalizes_case() {
        let schema = quiz_schema();
        assert_eq!(schema[2].check(&json!("Advanced")).unwrap(), json!("advanced"));
    }

    #[test]
    fn wrong_types_rejected() {
        let schema = quiz_schema();
        assert!(schema[0].check(&json!(5)).is_err());
        assert!(schema[1].check(&json!("ten")).is_err());
        assert!(schema[0].check(&json!("   ")).is_err());
    }

    #[test]
    fn spec_parses_from_toml_shape() {
        let spec: ParamSpec = serde_json::from_value(json!({
            "name": "count",
            "type": "integer",
            "min": 1,
            "max": 20,
            "default": 5,
            "fallback": { "from": "emotion", "map": { "anxious": 3 }, "otherwise": 5 }
        }))
        .unwrap();
        assert_eq!(
            spec.kind,
            ParamKind::Integer {
                min: Some(1),
                max: Some(20)
            }
        );
        assert!(matches!(spec.fallback, FallbackRule::Emotion { .. }));
        assert!(!spec.required);
    }

    #[test]
    fn describe_lists_required() {
        let described = describe(&quiz_schema());
        assert_eq!(described["required"], json!(["topic", "difficulty"]));
        assert_eq!(described["properties"]["num_questions"]["type"], "integer 1-50");
    }
}
