//! Per-endpoint scenario descriptors.
//!
//! A scenario file sits next to an endpoint's sample folder and drives which
//! sample file is served as per-instance state progresses, either once per
//! matching request (`step`) or by elapsed wall-clock seconds (`time`).

pub mod resolver;

pub use resolver::ScenarioResolver;

use crate::error::EmulatorError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub version: i64,
    /// `step` or `time` (surrounding whitespace tolerated).
    pub mode: String,
    pub key: ScenarioKey,
    /// Step mode: ordered states, one entry served per request.
    #[serde(default)]
    pub sequence: Vec<SequenceEntry>,
    /// Time mode: states keyed by seconds elapsed since the slot started.
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub behavior: Behavior,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioKey {
    /// Name of the path parameter whose value isolates state per resource.
    pub path_param: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceEntry {
    pub state: String,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub after_sec: i64,
    pub state: String,
    pub file: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Behavior {
    #[serde(default)]
    pub advance_on: Vec<MatchRule>,
    #[serde(default)]
    pub reset_on: Vec<MatchRule>,
    #[serde(default)]
    pub start_on: Vec<MatchRule>,
    #[serde(default)]
    pub repeat_last: bool,
    #[serde(default, rename = "loop")]
    pub loops: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchRule {
    pub method: String,
    #[serde(default)]
    pub path: String,
}

/// Load a descriptor from disk and enforce its shape rules.
pub fn load(path: &Path) -> Result<Scenario, EmulatorError> {
    let bytes = fs::read(path).map_err(|e| EmulatorError::ScenarioLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut scenario: Scenario =
        serde_json::from_slice(&bytes).map_err(|e| EmulatorError::ScenarioLoad {
            path: path.to_path_buf(),
            reason: format!("parse: {e}"),
        })?;

    scenario.mode = scenario.mode.trim().to_string();
    validate(&scenario)?;
    Ok(scenario)
}

fn validate(scenario: &Scenario) -> Result<(), EmulatorError> {
    if scenario.version != 1 {
        return Err(EmulatorError::ScenarioInvalid(format!(
            "unsupported version: {}",
            scenario.version
        )));
    }

    match scenario.mode.as_str() {
        "step" => {
            if scenario.sequence.is_empty() {
                return Err(EmulatorError::ScenarioInvalid(
                    "step mode requires a non-empty sequence".into(),
                ));
            }
        }
        "time" => {
            if scenario.timeline.is_empty() {
                return Err(EmulatorError::ScenarioInvalid(
                    "time mode requires a non-empty timeline".into(),
                ));
            }
            for pair in scenario.timeline.windows(2) {
                if pair[1].after_sec < pair[0].after_sec {
                    return Err(EmulatorError::ScenarioInvalid(
                        "timeline must be sorted by afterSec ascending".into(),
                    ));
                }
            }
        }
        other => {
            return Err(EmulatorError::ScenarioInvalid(format!(
                "invalid mode: {other:?}"
            )));
        }
    }

    if scenario.key.path_param.trim().is_empty() {
        return Err(EmulatorError::ScenarioInvalid(
            "key.pathParam is required".into(),
        ));
    }

    Ok(())
}
