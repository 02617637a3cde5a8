use std::cmp::Ordering;

use jsonschema::error::ValidationErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::document::SchemaDocument;
use crate::testing::json_path::{JsonPath, Segment};

pub const INVALID_JSON_RULE: &str = "invalid-json";

/// One structural mismatch between a JSON value and a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Location in the instance, e.g. `$`, `data.id`, `data[0].email`.
    pub path: String,
    /// The JSON Schema keyword that failed, or `invalid-json`.
    pub rule: String,
    pub message: String,
    /// JSON pointer into the schema that produced the violation.
    pub schema_path: String,
}

impl Violation {
    pub fn invalid_json(reason: impl std::fmt::Display) -> Self {
        Self {
            path: "$".to_string(),
            rule: INVALID_JSON_RULE.to_string(),
            message: format!("response body is not valid JSON: {reason}"),
            schema_path: String::new(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.path, self.rule, self.message)
    }
}

/// Every violation of `schema` by `value`, in schema depth-first order.
pub fn validate(value: &JsonValue, schema: &SchemaDocument) -> Vec<Violation> {
    let mut located: Vec<(Vec<Segment>, Violation)> = schema
        .validator()
        .iter_errors(value)
        .map(|error| {
            let mut segments = instance_segments(value, &error.instance_path.to_string());
            if let ValidationErrorKind::Required { property } = &error.kind {
                if let Some(name) = property.as_str() {
                    segments.push(Segment::Key(name.to_string()));
                }
            }
            let schema_path = error.schema_path.to_string();
            let violation = Violation {
                path: JsonPath::from_segments(segments.clone()).to_string(),
                rule: rule_name(&schema_path),
                message: error.to_string(),
                schema_path,
            };
            (segments, violation)
        })
        .collect();

    located.sort_by(|(a_at, a), (b_at, b)| {
        compare_pointers(&a.schema_path, &b.schema_path)
            .then_with(|| a_at.cmp(b_at))
            .then_with(|| a.message.cmp(&b.message))
    });
    located.into_iter().map(|(_, violation)| violation).collect()
}

/// Like [`validate`], but starts from raw bytes. Unparseable input yields a
/// single `invalid-json` violation at `$`.
pub fn validate_bytes(body: &[u8], schema: &SchemaDocument) -> Vec<Violation> {
    match serde_json::from_slice::<JsonValue>(body) {
        Ok(value) => validate(&value, schema),
        Err(err) => vec![Violation::invalid_json(err)],
    }
}

fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Resolves an instance pointer against `value`, so numeric segments are
/// indices only where the instance holds an array.
fn instance_segments(value: &JsonValue, pointer: &str) -> Vec<Segment> {
    let mut current = Some(value);
    pointer_segments(pointer)
        .into_iter()
        .map(|raw| {
            let index = current
                .filter(|node| node.is_array())
                .and_then(|_| raw.parse::<usize>().ok());
            match index {
                Some(index) => {
                    current = current.and_then(|node| node.get(index));
                    Segment::Index(index)
                }
                None => {
                    current = current.and_then(|node| node.get(raw.as_str()));
                    Segment::Key(raw)
                }
            }
        })
        .collect()
}

fn rule_name(schema_path: &str) -> String {
    pointer_segments(schema_path)
        .into_iter()
        .rev()
        .find(|segment| !segment.is_empty() && !segment.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or_else(|| "schema".to_string())
}

fn compare_pointers(a: &str, b: &str) -> Ordering {
    let left = pointer_segments(a);
    let right = pointer_segments(b);
    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn single_user_schema() -> SchemaDocument {
        SchemaDocument::from_value(
            "GetSingleUserSchema",
            json!({
                "type": "object",
                "required": ["data"],
                "properties": {
                    "data": {
                        "type": "object",
                        "required": ["id", "email"],
                        "properties": {
                            "id": {"type": "integer"},
                            "email": {"type": "string"},
                            "tags": {"type": "array", "items": {"type": "string"}}
                        }
                    }
                }
            }),
        )
        .unwrap()
    }

    #[test]
    fn conforming_value_has_no_violations() {
        let value = json!({"data": {"id": 2, "email": "janet.weaver@reqres.in"}});
        assert!(validate(&value, &single_user_schema()).is_empty());
    }

    #[test]
    fn missing_property_is_reported_at_its_path() {
        let value = json!({"data": {"email": "janet.weaver@reqres.in"}});
        let violations = validate(&value, &single_user_schema());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "data.id");
        assert_eq!(violations[0].rule, "required");
    }

    #[test]
    fn collects_every_violation() {
        let value = json!({"data": {"id": "two", "tags": ["a", 3]}});
        let violations = validate(&value, &single_user_schema());
        let summary: Vec<(&str, &str)> = violations
            .iter()
            .map(|v| (v.path.as_str(), v.rule.as_str()))
            .collect();

        assert_eq!(violations.len(), 3);
        assert!(summary.contains(&("data.id", "type")));
        assert!(summary.contains(&("data.tags[1]", "type")));
        assert!(summary.contains(&("data.email", "required")));
    }

    #[test]
    fn ordering_is_stable_across_runs() {
        let schema = single_user_schema();
        let value = json!({"data": {"id": "two", "tags": (0..12).collect::<Vec<u32>>()}});
        let first = validate(&value, &schema);
        for _ in 0..10 {
            assert_eq!(validate(&value, &schema), first);
        }
        let tag_paths: Vec<_> = first
            .iter()
            .filter(|v| v.path.starts_with("data.tags"))
            .map(|v| v.path.clone())
            .collect();
        let expected: Vec<String> = (0..12).map(|i| format!("data.tags[{i}]")).collect();
        assert_eq!(tag_paths, expected);
    }

    #[test]
    fn invalid_json_is_a_single_root_violation() {
        let violations = validate_bytes(b"<html>oops</html>", &single_user_schema());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "$");
        assert_eq!(violations[0].rule, INVALID_JSON_RULE);
    }

    #[test]
    fn paths_follow_the_instance_shape() {
        let value = json!({"data": [{"email": 1}], "2024": {"x.y": true}});
        assert_eq!(instance_segments(&value, ""), Vec::<Segment>::new());
        assert_eq!(
            JsonPath::from_segments(instance_segments(&value, "/data/0/email")).to_string(),
            "data[0].email"
        );
        let keyed = JsonPath::from_segments(instance_segments(&value, "/2024/x.y"));
        assert_eq!(keyed.to_string(), "2024[\"x.y\"]");
        assert_eq!(JsonPath::parse(&keyed.to_string()).unwrap(), keyed);
        assert_eq!(keyed.lookup(&value), Some(&json!(true)));
    }

    #[test]
    fn numeric_object_keys_stay_keys() {
        let schema = SchemaDocument::from_value(
            "years",
            json!({"type": "object", "additionalProperties": {"type": "integer"}}),
        )
        .unwrap();
        let value = json!({"2024": "many", "2025": 3});
        let violations = validate(&value, &schema);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "2024");
        let path = JsonPath::parse(&violations[0].path).unwrap();
        assert_eq!(path.lookup(&value), Some(&json!("many")));
    }

    #[test]
    fn pointer_comparison_is_numeric_for_indices() {
        assert_eq!(compare_pointers("/items/2", "/items/10"), Ordering::Less);
        assert_eq!(compare_pointers("/properties/a", "/properties/a/type"), Ordering::Less);
    }
}
