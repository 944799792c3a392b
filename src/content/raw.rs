//! Post body normalization
//!
//! A content source may hand over the body as plain Markdown, as a JSON
//! string wrapping `{"parent": "..."}`, or as that object directly. The shape
//! is classified once into [`RawContent`] and [`normalize`] collapses any
//! shape into one Markdown string.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the Markdown body inside a wrapper object
const PARENT_FIELD: &str = "parent";

/// Body of a post before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum RawContent {
    /// A string that is not valid JSON
    PlainString(String),
    /// A string that parsed as JSON
    JsonString { raw: String, parsed: Value },
    /// An object carrying a non-null `parent` field
    ObjectWithParent(Map<String, Value>),
    /// Any other object
    ObjectWithoutParent(Map<String, Value>),
    /// Null, booleans, numbers and arrays
    Other(Value),
}

impl RawContent {
    /// Classify a string by attempting a JSON parse
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => RawContent::JsonString { raw: text, parsed },
            Err(_) => RawContent::PlainString(text),
        }
    }
}

impl From<Value> for RawContent {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => RawContent::from_text(text),
            Value::Object(map) => {
                if has_parent(&map) {
                    RawContent::ObjectWithParent(map)
                } else {
                    RawContent::ObjectWithoutParent(map)
                }
            }
            other => RawContent::Other(other),
        }
    }
}

impl From<String> for RawContent {
    fn from(text: String) -> Self {
        RawContent::from_text(text)
    }
}

impl From<&str> for RawContent {
    fn from(text: &str) -> Self {
        RawContent::from_text(text.to_string())
    }
}

impl From<RawContent> for Value {
    fn from(content: RawContent) -> Self {
        match content {
            RawContent::PlainString(text) | RawContent::JsonString { raw: text, .. } => {
                Value::String(text)
            }
            RawContent::ObjectWithParent(map) | RawContent::ObjectWithoutParent(map) => {
                Value::Object(map)
            }
            RawContent::Other(value) => value,
        }
    }
}

fn has_parent(map: &Map<String, Value>) -> bool {
    map.get(PARENT_FIELD).is_some_and(|v| !v.is_null())
}

/// Collapse a post body into one Markdown string.
///
/// Never fails: text that is not JSON, or JSON without a `parent` wrapper,
/// passes through as-is. Non-string, non-object values yield an empty string.
/// Applying it to its own output returns the same string.
pub fn normalize(content: &RawContent) -> String {
    match content {
        RawContent::PlainString(text) => text.clone(),
        RawContent::JsonString { raw, parsed } => match parsed {
            Value::Object(map) if has_parent(map) => normalize_parent(map),
            // A JSON-quoted string may itself wrap another layer
            Value::String(inner) => normalize(&RawContent::from_text(inner.clone())),
            _ => raw.clone(),
        },
        RawContent::ObjectWithParent(map) => normalize_parent(map),
        RawContent::ObjectWithoutParent(map) => {
            serde_json::to_string(map).unwrap_or_default()
        }
        RawContent::Other(_) => String::new(),
    }
}

fn normalize_parent(map: &Map<String, Value>) -> String {
    map.get(PARENT_FIELD)
        .map(|parent| normalize(&RawContent::from(parent.clone())))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shapes() -> Vec<RawContent> {
        vec![
            RawContent::from("## Plain markdown\n\nbody"),
            RawContent::from(r##"{"parent":"# Hello"}"##),
            RawContent::from(json!({"parent": "body text"})),
            RawContent::from(json!({"title": "no parent", "n": 1})),
            RawContent::from(r#"{"other": true}"#),
            RawContent::from("not json"),
            RawContent::from("\"quoted\""),
            RawContent::from("42"),
            RawContent::from(json!({"parent": r#"{"parent":"deep"}"#})),
            RawContent::from(json!({"parent": {"parent": "nested object"}})),
            RawContent::from(json!(null)),
            RawContent::from(json!([1, 2, 3])),
            RawContent::from(""),
        ]
    }

    #[test]
    fn test_json_string_with_parent() {
        assert_eq!(normalize(&RawContent::from(r##"{"parent":"# Hello"}"##)), "# Hello");
    }

    #[test]
    fn test_object_with_parent() {
        let content = RawContent::from(json!({"parent": "body text"}));
        assert!(matches!(content, RawContent::ObjectWithParent(_)));
        assert_eq!(normalize(&content), "body text");
    }

    #[test]
    fn test_parse_failure_passthrough() {
        let content = RawContent::from("not json");
        assert!(matches!(content, RawContent::PlainString(_)));
        assert_eq!(normalize(&content), "not json");
    }

    #[test]
    fn test_object_without_parent_serializes() {
        let content = RawContent::from(json!({"title": "x"}));
        assert!(matches!(content, RawContent::ObjectWithoutParent(_)));
        assert_eq!(normalize(&content), r#"{"title":"x"}"#);
    }

    #[test]
    fn test_json_string_without_parent_is_unchanged() {
        let text = r#"{ "title": "x" }"#;
        assert_eq!(normalize(&RawContent::from(text)), text);
    }

    #[test]
    fn test_null_parent_counts_as_absent() {
        let content = RawContent::from(json!({"parent": null}));
        assert!(matches!(content, RawContent::ObjectWithoutParent(_)));
    }

    #[test]
    fn test_nested_wrappers() {
        assert_eq!(
            normalize(&RawContent::from(json!({"parent": r#"{"parent":"deep"}"#}))),
            "deep"
        );
        assert_eq!(
            normalize(&RawContent::from(json!({"parent": {"parent": "nested object"}}))),
            "nested object"
        );
    }

    #[test]
    fn test_scalars() {
        assert_eq!(normalize(&RawContent::from("42")), "42");
        assert_eq!(normalize(&RawContent::from("\"quoted\"")), "quoted");
        assert_eq!(normalize(&RawContent::from(json!(null))), "");
        assert_eq!(normalize(&RawContent::from(json!(7))), "");
        assert_eq!(normalize(&RawContent::from(json!([1, 2]))), "");
        assert_eq!(normalize(&RawContent::from(json!({"parent": 5}))), "");
    }

    #[test]
    fn test_idempotent() {
        for content in shapes() {
            let once = normalize(&content);
            let twice = normalize(&RawContent::from(once.clone()));
            assert_eq!(once, twice, "normalization not idempotent for {:?}", content);
        }
    }

    #[test]
    fn test_serde_round_trip_keeps_shape() {
        let content = RawContent::from(json!({"parent": "body", "type": "page"}));
        let encoded = serde_json::to_string(&content).unwrap();
        let decoded: RawContent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, content);
    }
}
