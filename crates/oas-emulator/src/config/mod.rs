//! Environment-driven configuration.
//!
//! Every knob is an environment variable with a documented default; the CLI
//! flags in `main.rs` may override the port, spec path, and samples dir after
//! the environment has been read.

use std::env;

/// How to respond when no sample file covers a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackMode {
    /// Reply 501 with a diagnostic.
    None,
    /// Try to synthesise a body from the OpenAPI spec before giving up.
    OpenapiExamples,
}

impl FallbackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackMode::None => "none",
            FallbackMode::OpenapiExamples => "openapi_examples",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(FallbackMode::None),
            "openapi_examples" => Some(FallbackMode::OpenapiExamples),
            _ => None,
        }
    }
}

/// Whether to enforce required request bodies declared in the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    None,
    Required,
}

impl ValidationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMode::None => "none",
            ValidationMode::Required => "required",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(ValidationMode::None),
            "required" => Some(ValidationMode::Required),
            _ => None,
        }
    }
}

/// On-disk sample layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// Folder candidates first, then the legacy flat filename.
    Auto,
    /// Only `<template>/<METHOD>.json` folders.
    Folders,
    /// Only legacy `METHOD__path.json` flat files.
    Flat,
}

impl LayoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutMode::Auto => "auto",
            LayoutMode::Folders => "folders",
            LayoutMode::Flat => "flat",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(LayoutMode::Auto),
            "folders" => Some(LayoutMode::Folders),
            "flat" => Some(LayoutMode::Flat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub enabled: bool,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub spec_path: String,
    pub samples_dir: String,
    pub log_level: String,
    /// Informational only (`docker`, `k8s`, `local`).
    pub running_env: String,
    pub validation_mode: ValidationMode,
    pub fallback_mode: FallbackMode,
    pub layout: LayoutMode,
    pub debug_routes: bool,
    pub scenario: ScenarioConfig,
}

impl Config {
    /// Read the full configuration from the process environment, applying
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        Config {
            server_port: env_as_u16("SERVER_PORT", 8086),
            spec_path: env_or("SPEC_PATH", "/work/swagger.json"),
            samples_dir: env_or("SAMPLES_DIR", "/work/sample"),
            log_level: env_or("LOG_LEVEL", "info"),
            running_env: env_or("RUNNING_ENV", "docker"),
            validation_mode: env_as_mode("VALIDATION_MODE", ValidationMode::parse)
                .unwrap_or(ValidationMode::Required),
            fallback_mode: env_as_mode("FALLBACK_MODE", FallbackMode::parse)
                .unwrap_or(FallbackMode::OpenapiExamples),
            layout: env_as_mode("LAYOUT_MODE", LayoutMode::parse).unwrap_or(LayoutMode::Auto),
            debug_routes: env_as_bool("DEBUG_ROUTES", false),
            scenario: ScenarioConfig {
                enabled: env_as_bool("SCENARIO_ENABLED", true),
                filename: env_or("SCENARIO_FILENAME", "scenario.json"),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

/// Truthy values are exactly `1`, `true`, `yes` (case-insensitive); anything
/// else set in the environment is false. Unset or empty keeps the default.
pub fn env_as_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) if !v.is_empty() => {
            let v = v.to_ascii_lowercase();
            v == "1" || v == "true" || v == "yes"
        }
        _ => default,
    }
}

pub fn env_as_u16(key: &str, default: u16) -> u16 {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v.trim().parse().unwrap_or(default),
        _ => default,
    }
}

fn env_as_mode<T>(key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = parse(&trimmed);
    if parsed.is_none() {
        tracing::warn!(key, value = %raw, "unrecognised value, using default");
    }
    parsed
}
