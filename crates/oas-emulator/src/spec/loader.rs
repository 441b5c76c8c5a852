//! Spec loading: version probe, Swagger-2 conversion, `$ref` resolution,
//! typed decode.

use super::model::{Document, Operation};
use super::swagger2;
use crate::error::EmulatorError;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Reference hops allowed before a node collapses to `{}`.
const MAX_REF_HOPS: usize = 32;

/// A loaded, normalised spec. Immutable after construction and shared
/// read-only across the whole request path.
#[derive(Debug)]
pub struct SpecProvider {
    doc: Document,
    path: PathBuf,
}

impl SpecProvider {
    /// Load a spec file. Swagger 2.0 documents (top-level `"swagger": "2.0"`)
    /// are converted to the OpenAPI-3 shape first; `$ref`s are then resolved
    /// eagerly, external ones relative to the file's absolute parent
    /// directory. Validation findings are logged, never fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EmulatorError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| EmulatorError::SpecRead {
            path: path.to_path_buf(),
            source,
        })?;

        let raw: Value = serde_json::from_slice(&bytes)
            .map_err(|e| EmulatorError::SpecParse(format!("invalid JSON: {e}")))?;

        let is_swagger2 = raw.get("swagger").and_then(Value::as_str) == Some("2.0");
        let shaped = if is_swagger2 {
            swagger2::convert_to_oas3(&raw)?
        } else {
            raw
        };

        let abs = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let base_dir = abs.parent().unwrap_or(Path::new(".")).to_path_buf();
        let resolved = resolve_refs(&shaped, &base_dir)?;

        let doc: Document = serde_json::from_value(resolved)
            .map_err(|e| EmulatorError::SpecParse(format!("unexpected document shape: {e}")))?;

        if doc.paths.is_empty() {
            warn!(path = %path.display(), "spec declares no paths; every request will miss");
        }
        for (template, item) in &doc.paths {
            if item.operations().next().is_none() {
                warn!(%template, "path declares no operations");
            }
        }
        info!(
            path = %path.display(),
            version = doc.openapi.as_deref().unwrap_or("unspecified"),
            paths = doc.paths.len(),
            converted = is_swagger2,
            "spec loaded"
        );

        Ok(SpecProvider {
            doc,
            path: path.to_path_buf(),
        })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the operation declared for (template path, method).
    pub fn find_operation(&self, template: &str, method: &str) -> Option<&Operation> {
        self.doc.paths.get(template)?.operation(method)
    }
}

/// Eagerly dereference every `$ref` in the tree. Cycles are broken by a
/// visiting set (the node collapses to `{}`), runaway chains by a hop cap.
fn resolve_refs(root: &Value, base_dir: &Path) -> Result<Value, EmulatorError> {
    let mut visiting = HashSet::new();
    resolve_node(root, root, base_dir, &mut visiting, 0)
}

fn resolve_node(
    root: &Value,
    node: &Value,
    base_dir: &Path,
    visiting: &mut HashSet<String>,
    hops: usize,
) -> Result<Value, EmulatorError> {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                return resolve_reference(root, reference, base_dir, visiting, hops);
            }
            let mut out = Map::new();
            for (key, value) in map {
                out.insert(
                    key.clone(),
                    resolve_node(root, value, base_dir, visiting, hops)?,
                );
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve_node(root, item, base_dir, visiting, hops)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_reference(
    root: &Value,
    reference: &str,
    base_dir: &Path,
    visiting: &mut HashSet<String>,
    hops: usize,
) -> Result<Value, EmulatorError> {
    if hops >= MAX_REF_HOPS || !visiting.insert(reference.to_string()) {
        return Ok(Value::Object(Map::new()));
    }

    let result = if let Some(pointer) = reference.strip_prefix('#') {
        match root.pointer(pointer) {
            Some(target) => {
                let target = target.clone();
                resolve_node(root, &target, base_dir, visiting, hops + 1)
            }
            None => Err(EmulatorError::SpecParse(format!(
                "unresolvable $ref {reference:?}"
            ))),
        }
    } else {
        resolve_external(reference, base_dir, visiting, hops)
    };

    visiting.remove(reference);
    result
}

fn resolve_external(
    reference: &str,
    base_dir: &Path,
    visiting: &mut HashSet<String>,
    hops: usize,
) -> Result<Value, EmulatorError> {
    let (file_part, pointer) = match reference.split_once('#') {
        Some((f, p)) => (f, p),
        None => (reference, ""),
    };

    let file_path = base_dir.join(file_part);
    let bytes = fs::read(&file_path).map_err(|e| {
        EmulatorError::SpecParse(format!("external $ref {reference:?}: {e}"))
    })?;
    let external_root: Value = serde_json::from_slice(&bytes).map_err(|e| {
        EmulatorError::SpecParse(format!("external $ref {reference:?}: invalid JSON: {e}"))
    })?;

    let target = if pointer.is_empty() {
        external_root.clone()
    } else {
        external_root
            .pointer(pointer)
            .cloned()
            .ok_or_else(|| {
                EmulatorError::SpecParse(format!(
                    "external $ref {reference:?}: pointer {pointer:?} not found"
                ))
            })?
    };

    let external_base = file_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| base_dir.to_path_buf());
    resolve_node(&external_root, &target, &external_base, visiting, hops + 1)
}
