//! Sample resolution and loading.
//!
//! The provider walks the layered sources in order: a per-endpoint scenario
//! descriptor, then the folder layout, then the legacy flat layout. Sample
//! files may be bare JSON bodies or envelopes declaring status, headers,
//! and body.

use crate::config::LayoutMode;
use crate::error::EmulatorError;
use crate::scenario::{self, ScenarioResolver};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_dir: PathBuf,
    pub layout: LayoutMode,
    pub scenario_enabled: bool,
    pub scenario_filename: String,
}

pub struct SampleProvider {
    cfg: ProviderConfig,
    resolver: Option<Arc<ScenarioResolver>>,
}

/// A fully materialised response ready to be written to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// On-disk envelope shape; any subset of keys may be present.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: Option<u16>,
    headers: Option<HashMap<String, String>>,
    body: Option<Value>,
}

impl SampleProvider {
    pub fn new(cfg: ProviderConfig, resolver: Option<Arc<ScenarioResolver>>) -> Self {
        SampleProvider { cfg, resolver }
    }

    /// Resolve the sample covering (method, template, concrete path) and
    /// load it. Scenario state takes priority; otherwise the first existing
    /// layout candidate wins.
    pub fn resolve_and_load(
        &self,
        method: &str,
        template: &str,
        concrete_path: &str,
        flat_file: &str,
    ) -> Result<SampleResponse, EmulatorError> {
        let method = method.to_ascii_uppercase();

        if self.cfg.scenario_enabled {
            let descriptor_path = self.scenario_descriptor_path(template);
            if file_exists(&descriptor_path) {
                return self.resolve_scenario(&descriptor_path, &method, template, concrete_path);
            }
            // No scenario here, but this request may still be someone
            // else's reset trigger.
            if let Some(resolver) = &self.resolver {
                let _ = resolver.try_reset_by_request(&method, concrete_path);
            }
        }

        let candidates = build_candidates(self.cfg.layout, &method, template, flat_file);
        for rel in &candidates {
            let full = self.cfg.base_dir.join(rel);
            if file_exists(&full) {
                return load_file(&full);
            }
        }

        info!(path = concrete_path, "no sample found; caller may fall back to a spec example");
        Err(EmulatorError::SampleMissing { tried: candidates })
    }

    fn resolve_scenario(
        &self,
        descriptor_path: &Path,
        method: &str,
        template: &str,
        concrete_path: &str,
    ) -> Result<SampleResponse, EmulatorError> {
        let sc = scenario::load(descriptor_path)?;
        let resolver = self
            .resolver
            .as_ref()
            .ok_or(EmulatorError::ScenarioEngineMissing)?;

        let (file, state) = resolver.resolve_scenario_file(&sc, method, template, concrete_path)?;

        let full = descriptor_path
            .parent()
            .unwrap_or(Path::new("."))
            .join(&file);
        if !file_exists(&full) {
            return Err(EmulatorError::ScenarioFileMissing(full));
        }
        debug!(%state, file = %full.display(), "scenario resolved");
        load_file(&full)
    }

    /// `<base>/<template without leading slash>/<scenario filename>`
    fn scenario_descriptor_path(&self, template: &str) -> PathBuf {
        let mut path = self.cfg.base_dir.join(template_dir(template));
        path.push(&self.cfg.scenario_filename);
        path
    }
}

/// Candidate sample paths relative to the base dir, in resolution order.
fn build_candidates(
    layout: LayoutMode,
    method: &str,
    template: &str,
    flat_file: &str,
) -> Vec<String> {
    let mut out = Vec::new();
    if matches!(layout, LayoutMode::Auto | LayoutMode::Folders) {
        let mut path = template_dir(template);
        path.push(format!("{method}.json"));
        out.push(path.to_string_lossy().into_owned());
    }
    if matches!(layout, LayoutMode::Auto | LayoutMode::Flat) {
        out.push(flat_file.to_string());
    }
    out
}

/// Template path as a relative directory, parameter segments kept verbatim
/// (`items/{id}`), separators native.
fn template_dir(template: &str) -> PathBuf {
    let mut dir = PathBuf::new();
    for segment in template.trim_start_matches('/').split('/') {
        if !segment.is_empty() {
            dir.push(segment);
        }
    }
    dir
}

fn file_exists(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Read a sample file into a response.
///
/// Empty file → `{}`. A JSON object carrying at least one of
/// `status`/`headers`/`body` is treated as an envelope with defaults filled
/// in; anything else (including an object that fails to decode as an
/// envelope) is served verbatim under the default 200/json wrapper.
fn load_file(path: &Path) -> Result<SampleResponse, EmulatorError> {
    let bytes = fs::read(path).map_err(|source| EmulatorError::SampleRead {
        path: path.to_path_buf(),
        source,
    })?;

    let raw = String::from_utf8_lossy(&bytes);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(default_response(b"{}".to_vec()));
    }

    if let Some(envelope) = parse_envelope(trimmed) {
        return Ok(envelope_response(envelope));
    }
    Ok(default_response(trimmed.as_bytes().to_vec()))
}

fn parse_envelope(raw: &str) -> Option<Envelope> {
    if !(raw.starts_with('{') && raw.ends_with('}')) {
        return None;
    }
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    if object.is_empty() {
        return None;
    }
    if !["status", "headers", "body"]
        .iter()
        .any(|k| object.contains_key(*k))
    {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn envelope_response(envelope: Envelope) -> SampleResponse {
    let status = match envelope.status {
        Some(0) | None => 200,
        Some(s) => s,
    };

    let mut headers = envelope.headers.unwrap_or_default();
    let has_content_type = headers
        .keys()
        .any(|k| k.eq_ignore_ascii_case("content-type"));
    if !has_content_type {
        headers.insert("content-type".into(), DEFAULT_CONTENT_TYPE.into());
    }

    let body = match envelope.body {
        None => b"{}".to_vec(),
        Some(value) => serde_json::to_vec(&value).unwrap_or_else(|_| b"{}".to_vec()),
    };

    SampleResponse {
        status,
        headers,
        body,
    }
}

fn default_response(body: Vec<u8>) -> SampleResponse {
    SampleResponse {
        status: 200,
        headers: HashMap::from([("content-type".to_string(), DEFAULT_CONTENT_TYPE.to_string())]),
        body,
    }
}
