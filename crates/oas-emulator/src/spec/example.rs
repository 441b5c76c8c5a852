//! Spec-derived example bodies.
//!
//! When no sample file covers a route the dispatcher can fall back to the
//! spec itself: pick the best success response, prefer a declared example,
//! otherwise synthesise a placeholder value from the response schema.

use super::loader::SpecProvider;
use super::model::{AdditionalProperties, Response, Schema};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Content types probed, in order, for examples and schemas.
const JSON_CONTENT_TYPES: [&str; 3] = ["application/json", "application/problem+json", "*/*"];

/// Recursion limit for schema-driven stubs; past it a node becomes `{}`.
const MAX_STUB_DEPTH: usize = 6;

const OK_BODY: &[u8] = br#"{"ok":true}"#;

impl SpecProvider {
    /// Produce a JSON body for (template, method) from the spec alone.
    ///
    /// Returns `None` when the spec declares no such operation; otherwise
    /// always produces something, bottoming out at `{"ok":true}`.
    pub fn try_get_example_body(&self, template: &str, method: &str) -> Option<Vec<u8>> {
        let op = self.find_operation(template, method)?;

        let Some(response) = pick_best_response(&op.responses) else {
            return Some(OK_BODY.to_vec());
        };

        if let Some(body) = extract_example(response) {
            return Some(body);
        }
        if let Some(body) = generate_from_schema(response) {
            return Some(body);
        }
        Some(OK_BODY.to_vec())
    }
}

/// Prefer literal `200`/`201`/`202`/`204`, then the numerically smallest
/// 2xx, then `default`, then anything.
fn pick_best_response(responses: &BTreeMap<String, Response>) -> Option<&Response> {
    for code in ["200", "201", "202", "204"] {
        if let Some(r) = responses.get(code) {
            return Some(r);
        }
    }

    let mut twos: Vec<u16> = responses
        .keys()
        .filter_map(|k| k.parse().ok())
        .filter(|n| (200..300).contains(n))
        .collect();
    twos.sort_unstable();
    if let Some(n) = twos.first() {
        return responses.get(&n.to_string());
    }

    if let Some(r) = responses.get("default") {
        return Some(r);
    }
    responses.values().next()
}

/// A single `example` wins over the `examples` map; within the map the
/// first entry with a value is taken.
fn extract_example(response: &Response) -> Option<Vec<u8>> {
    for ct in JSON_CONTENT_TYPES {
        let Some(media) = response.content.get(ct) else {
            continue;
        };
        if let Some(example) = &media.example {
            if let Ok(bytes) = serde_json::to_vec(example) {
                return Some(bytes);
            }
        }
        for ex in media.examples.values() {
            if let Some(value) = &ex.value {
                if let Ok(bytes) = serde_json::to_vec(value) {
                    return Some(bytes);
                }
            }
        }
    }
    None
}

fn generate_from_schema(response: &Response) -> Option<Vec<u8>> {
    for ct in JSON_CONTENT_TYPES {
        let Some(media) = response.content.get(ct) else {
            continue;
        };
        let Some(schema) = &media.schema else {
            continue;
        };
        let value = stub_from_schema(schema, 0);
        return serde_json::to_vec(&value).ok();
    }
    None
}

/// Synthesise a placeholder value for a schema node.
fn stub_from_schema(schema: &Schema, depth: usize) -> Value {
    if depth > MAX_STUB_DEPTH {
        return json!({});
    }

    if let Some(first) = schema.enum_values.first() {
        return first.clone();
    }

    if schema.is_type("array") {
        return match &schema.items {
            Some(items) => json!([stub_from_schema(items, depth + 1)]),
            None => json!([]),
        };
    }

    let has_schema_extras = matches!(
        schema.additional_properties,
        Some(AdditionalProperties::Schema(_))
    );
    if schema.is_type("object") || !schema.properties.is_empty() || has_schema_extras {
        return stub_object(schema, depth);
    }

    if schema.is_type("string") {
        if schema.format.as_deref() == Some("date-time") {
            return json!("2026-01-28T00:00:00Z");
        }
        return json!("string");
    }
    if schema.is_type("integer") {
        return json!(0);
    }
    if schema.is_type("number") {
        return json!(0.0);
    }
    if schema.is_type("boolean") {
        return json!(true);
    }

    json!({"ok": true})
}

fn stub_object(schema: &Schema, depth: usize) -> Value {
    let mut out = serde_json::Map::new();

    match &schema.additional_properties {
        Some(AdditionalProperties::Schema(extra)) => {
            out.insert("key".into(), stub_from_schema(extra, depth + 1));
            return Value::Object(out);
        }
        Some(AdditionalProperties::Allowed(true)) => {
            out.insert("key".into(), json!("value"));
        }
        _ => {}
    }

    for (name, prop) in &schema.properties {
        out.insert(name.clone(), stub_from_schema(prop, depth + 1));
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(v: Value) -> Schema {
        serde_json::from_value(v).unwrap()
    }

    fn responses(v: Value) -> BTreeMap<String, Response> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_pick_best_prefers_200_family_in_order() {
        let rs = responses(json!({
            "204": {"description": "no content"},
            "201": {"description": "created"},
            "500": {"description": "boom"}
        }));
        let picked = pick_best_response(&rs).unwrap();
        assert_eq!(picked.description.as_deref(), Some("created"));
    }

    #[test]
    fn test_pick_best_smallest_2xx_then_default_then_any() {
        let rs = responses(json!({
            "226": {"description": "im used"},
            "206": {"description": "partial"}
        }));
        assert_eq!(
            pick_best_response(&rs).unwrap().description.as_deref(),
            Some("partial")
        );

        let rs = responses(json!({
            "404": {"description": "nope"},
            "default": {"description": "fallback"}
        }));
        assert_eq!(
            pick_best_response(&rs).unwrap().description.as_deref(),
            Some("fallback")
        );

        let rs = responses(json!({"503": {"description": "only"}}));
        assert_eq!(
            pick_best_response(&rs).unwrap().description.as_deref(),
            Some("only")
        );

        assert!(pick_best_response(&BTreeMap::new()).is_none());
    }

    #[test]
    fn test_declared_example_wins_over_schema() {
        let resp: Response = serde_json::from_value(json!({
            "content": {"application/json": {
                "example": {"hello": "world"},
                "schema": {"type": "object", "properties": {"hello": {"type": "string"}}}
            }}
        }))
        .unwrap();
        let body = extract_example(&resp).unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"hello": "world"})
        );
    }

    #[test]
    fn test_examples_map_first_entry() {
        let resp: Response = serde_json::from_value(json!({
            "content": {"application/json": {
                "examples": {
                    "b-second": {"value": {"n": 2}},
                    "a-first": {"value": {"n": 1}}
                }
            }}
        }))
        .unwrap();
        let body = extract_example(&resp).unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"n": 1})
        );
    }

    #[test]
    fn test_problem_json_content_type_is_probed() {
        let resp: Response = serde_json::from_value(json!({
            "content": {"application/problem+json": {"example": {"title": "oops"}}}
        }))
        .unwrap();
        assert!(extract_example(&resp).is_some());
    }

    #[test]
    fn test_stub_primitives() {
        assert_eq!(stub_from_schema(&schema(json!({"type": "string"})), 0), json!("string"));
        assert_eq!(
            stub_from_schema(&schema(json!({"type": "string", "format": "date-time"})), 0),
            json!("2026-01-28T00:00:00Z")
        );
        assert_eq!(stub_from_schema(&schema(json!({"type": "integer"})), 0), json!(0));
        assert_eq!(stub_from_schema(&schema(json!({"type": "number"})), 0), json!(0.0));
        assert_eq!(stub_from_schema(&schema(json!({"type": "boolean"})), 0), json!(true));
        assert_eq!(stub_from_schema(&schema(json!({})), 0), json!({"ok": true}));
    }

    #[test]
    fn test_stub_enum_wins() {
        let s = schema(json!({"type": "string", "enum": ["requested", "running"]}));
        assert_eq!(stub_from_schema(&s, 0), json!("requested"));
    }

    #[test]
    fn test_stub_array_and_object() {
        let s = schema(json!({
            "type": "array",
            "items": {"type": "object", "properties": {"id": {"type": "integer"}}}
        }));
        assert_eq!(stub_from_schema(&s, 0), json!([{"id": 0}]));

        let bare = schema(json!({"type": "array"}));
        assert_eq!(stub_from_schema(&bare, 0), json!([]));
    }

    #[test]
    fn test_stub_additional_properties() {
        let s = schema(json!({"type": "object", "additionalProperties": {"type": "integer"}}));
        assert_eq!(stub_from_schema(&s, 0), json!({"key": 0}));

        let s = schema(json!({
            "type": "object",
            "additionalProperties": true,
            "properties": {"name": {"type": "string"}}
        }));
        assert_eq!(
            stub_from_schema(&s, 0),
            json!({"key": "value", "name": "string"})
        );
    }

    #[test]
    fn test_stub_depth_cap() {
        // Build a nesting deeper than the cap.
        let mut v = json!({"type": "string"});
        for _ in 0..10 {
            v = json!({"type": "object", "properties": {"inner": v}});
        }
        let out = stub_from_schema(&schema(v), 0);
        // The innermost levels collapsed to {} instead of recursing forever.
        let mut cursor = &out;
        for _ in 0..=MAX_STUB_DEPTH {
            match cursor.get("inner") {
                Some(inner) => cursor = inner,
                None => break,
            }
        }
        assert_eq!(cursor, &json!({}));
    }

    #[test]
    fn test_try_get_example_body_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let spec = json!({
            "openapi": "3.0.3",
            "paths": {
                "/x": {
                    "get": {"responses": {"200": {"description": "ok", "content": {
                        "application/json": {"example": {"hello": "world"}}
                    }}}}
                },
                "/empty": {"get": {"responses": {}}}
            }
        });
        let path = dir.path().join("spec.json");
        std::fs::write(&path, serde_json::to_vec(&spec).unwrap()).unwrap();
        let provider = SpecProvider::load(&path).unwrap();

        let body = provider.try_get_example_body("/x", "GET").unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"hello": "world"})
        );

        // Empty responses container still yields the placeholder.
        let body = provider.try_get_example_body("/empty", "GET").unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"ok": true})
        );

        // Unknown operation yields nothing.
        assert!(provider.try_get_example_body("/nope", "GET").is_none());
    }
}
