//! Swagger 2.0 → OpenAPI-3 shape conversion.
//!
//! The conversion runs on the raw JSON tree before `$ref` resolution and
//! typed decoding:
//!
//! * `definitions` moves to `components.schemas`, and every
//!   `#/definitions/` reference is rewritten to `#/components/schemas/`.
//! * `in: body` parameters become a `requestBody` with one media type per
//!   declared `consumes` entry (operation-level over document-level,
//!   defaulting to `application/json`).
//! * Response `schema` and per-content-type `examples` move under
//!   `content`, keyed by the effective `produces` list.
//! * Remaining parameters keep name/in/required and have their inline type
//!   keywords wrapped into a `schema` object.

use crate::error::EmulatorError;
use serde_json::{json, Map, Value};

const METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Convert a Swagger 2.0 document into an equivalent OpenAPI-3-shaped tree.
pub fn convert_to_oas3(root: &Value) -> Result<Value, EmulatorError> {
    let src = root
        .as_object()
        .ok_or_else(|| EmulatorError::SpecParse("swagger document is not an object".into()))?;

    let mut out = Map::new();
    out.insert("openapi".into(), json!("3.0.3"));
    if let Some(info) = src.get("info") {
        out.insert("info".into(), info.clone());
    }

    let doc_consumes = string_list(src.get("consumes"));
    let doc_produces = string_list(src.get("produces"));

    let mut paths = Map::new();
    if let Some(src_paths) = src.get("paths").and_then(Value::as_object) {
        for (path, item) in src_paths {
            paths.insert(
                path.clone(),
                convert_path_item(item, &doc_consumes, &doc_produces)?,
            );
        }
    }
    out.insert("paths".into(), Value::Object(paths));

    if let Some(defs) = src.get("definitions") {
        out.insert("components".into(), json!({ "schemas": defs.clone() }));
    }

    let mut converted = Value::Object(out);
    rewrite_definition_refs(&mut converted);
    Ok(converted)
}

fn convert_path_item(
    item: &Value,
    doc_consumes: &[String],
    doc_produces: &[String],
) -> Result<Value, EmulatorError> {
    let src = match item.as_object() {
        Some(m) => m,
        None => return Ok(item.clone()),
    };

    // Path-level parameters apply to every operation beneath.
    let shared_params: Vec<Value> = src
        .get("parameters")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut out = Map::new();
    for (key, value) in src {
        if key == "parameters" {
            continue;
        }
        if METHODS.contains(&key.as_str()) {
            out.insert(
                key.clone(),
                convert_operation(value, &shared_params, doc_consumes, doc_produces)?,
            );
        } else {
            out.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::Object(out))
}

fn convert_operation(
    op: &Value,
    shared_params: &[Value],
    doc_consumes: &[String],
    doc_produces: &[String],
) -> Result<Value, EmulatorError> {
    let src = op
        .as_object()
        .ok_or_else(|| EmulatorError::SpecParse("operation is not an object".into()))?;

    let consumes = effective_types(src.get("consumes"), doc_consumes);
    let produces = effective_types(src.get("produces"), doc_produces);

    let mut params: Vec<Value> = shared_params.to_vec();
    if let Some(own) = src.get("parameters").and_then(Value::as_array) {
        params.extend(own.iter().cloned());
    }

    let mut out = Map::new();
    for (key, value) in src {
        match key.as_str() {
            "parameters" | "consumes" | "produces" | "responses" => {}
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }

    let mut converted_params = Vec::new();
    for param in &params {
        let location = param.get("in").and_then(Value::as_str);
        if location == Some("body") {
            out.insert("requestBody".into(), convert_body_parameter(param, &consumes));
        } else {
            converted_params.push(convert_plain_parameter(param));
        }
    }
    if !converted_params.is_empty() {
        out.insert("parameters".into(), Value::Array(converted_params));
    }

    if let Some(responses) = src.get("responses").and_then(Value::as_object) {
        let mut converted = Map::new();
        for (code, resp) in responses {
            converted.insert(code.clone(), convert_response(resp, &produces));
        }
        out.insert("responses".into(), Value::Object(converted));
    }

    Ok(Value::Object(out))
}

fn convert_body_parameter(param: &Value, consumes: &[String]) -> Value {
    let required = param
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let schema = param.get("schema").cloned().unwrap_or(json!({}));

    let mut content = Map::new();
    for ct in consumes {
        content.insert(ct.clone(), json!({ "schema": schema.clone() }));
    }
    json!({ "required": required, "content": content })
}

/// Wrap a non-body parameter's inline type keywords into a `schema` object.
fn convert_plain_parameter(param: &Value) -> Value {
    let src = match param.as_object() {
        Some(m) => m,
        None => return param.clone(),
    };

    let mut out = Map::new();
    let mut schema = Map::new();
    for (key, value) in src {
        match key.as_str() {
            "type" | "format" | "enum" | "items" | "default" => {
                schema.insert(key.clone(), value.clone());
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    if !schema.is_empty() {
        out.insert("schema".into(), Value::Object(schema));
    }
    Value::Object(out)
}

fn convert_response(resp: &Value, produces: &[String]) -> Value {
    let src = match resp.as_object() {
        Some(m) => m,
        None => return resp.clone(),
    };

    let mut out = Map::new();
    if let Some(desc) = src.get("description") {
        out.insert("description".into(), desc.clone());
    }
    if let Some(headers) = src.get("headers") {
        out.insert("headers".into(), headers.clone());
    }

    let mut content = Map::new();
    if let Some(schema) = src.get("schema") {
        for ct in produces {
            content.insert(ct.clone(), json!({ "schema": schema.clone() }));
        }
    }
    // Swagger 2 response examples are keyed directly by content type.
    if let Some(examples) = src.get("examples").and_then(Value::as_object) {
        for (ct, example) in examples {
            let media = content
                .entry(ct.clone())
                .or_insert_with(|| json!({}));
            if let Some(m) = media.as_object_mut() {
                m.insert("example".into(), example.clone());
            }
        }
    }
    if !content.is_empty() {
        out.insert("content".into(), Value::Object(content));
    }

    Value::Object(out)
}

fn effective_types(own: Option<&Value>, doc_level: &[String]) -> Vec<String> {
    let own = string_list(own);
    if !own.is_empty() {
        return own;
    }
    if !doc_level.is_empty() {
        return doc_level.to_vec();
    }
    vec![DEFAULT_CONTENT_TYPE.to_string()]
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn rewrite_definition_refs(node: &mut Value) {
    match node {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if key == "$ref" {
                    if let Value::String(target) = value {
                        if let Some(rest) = target.strip_prefix("#/definitions/") {
                            *target = format!("#/components/schemas/{rest}");
                        }
                    }
                } else {
                    rewrite_definition_refs(value);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_definition_refs(item);
            }
        }
        _ => {}
    }
}
