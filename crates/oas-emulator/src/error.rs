//! Error kinds produced by the response-resolution pipeline.
//!
//! The dispatcher is the only HTTP-facing handler; every variant here is
//! either converted into a spec-example fallback attempt or shaped into a
//! structured JSON diagnostic. Route misses and empty required bodies are
//! shaped directly into 404/400 responses and never pass through this enum.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("read spec {path:?}: {source}")]
    SpecRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse spec: {0}")]
    SpecParse(String),

    #[error("read request body: {0}")]
    BodyRead(String),

    #[error("invalid scenario: {0}")]
    ScenarioInvalid(String),

    #[error("load scenario {path:?}: {reason}")]
    ScenarioLoad { path: PathBuf, reason: String },

    #[error("scenario enabled but no resolver is configured")]
    ScenarioEngineMissing,

    #[error("cannot extract key path param {param:?} from path {path:?} using template {template:?}")]
    ScenarioKeyMissing {
        param: String,
        path: String,
        template: String,
    },

    #[error("scenario resolve: {0}")]
    ScenarioResolve(String),

    #[error("scenario file not found: {0:?}")]
    ScenarioFileMissing(PathBuf),

    #[error("read sample {path:?}: {source}")]
    SampleRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no sample file found (tried: {tried:?})")]
    SampleMissing { tried: Vec<String> },
}
