//! Stateful scenario resolution.
//!
//! The resolver owns all mutable runtime state: per-(template, instance key)
//! step indices and start timestamps, plus the reset-rule registry. One lock
//! guards everything and is held only around map access, never across I/O.

use super::{MatchRule, Scenario};
use crate::error::EmulatorError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResetRule {
    method: String,
    path_template: String,
}

/// A reset rule together with the scenario it can reset.
#[derive(Debug, Clone)]
struct ResetRegistration {
    rule: ResetRule,
    scenario_template: String,
    key_param: String,
}

#[derive(Default)]
struct ResolverState {
    step_index: HashMap<String, usize>,
    started_at: HashMap<String, Instant>,
    reset_rules: HashMap<String, Vec<ResetRule>>,
    reset_by_method: HashMap<String, Vec<ResetRegistration>>,
}

#[derive(Default)]
pub struct ScenarioResolver {
    state: Mutex<ResolverState>,
}

impl ScenarioResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the current (file, state) for a request against a scenario.
    ///
    /// Extracts the instance key from the concrete path, registers the
    /// scenario's reset rules on first contact with that key, then advances
    /// the step or time machinery.
    pub fn resolve_scenario_file(
        &self,
        scenario: &Scenario,
        method: &str,
        template: &str,
        concrete_path: &str,
    ) -> Result<(String, String), EmulatorError> {
        let method = method.to_ascii_uppercase();

        let key_value = extract_path_param(template, concrete_path, &scenario.key.path_param)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| EmulatorError::ScenarioKeyMissing {
                param: scenario.key.path_param.clone(),
                path: concrete_path.to_string(),
                template: template.to_string(),
            })?;

        let key = runtime_key(template, &key_value);
        self.register_reset_rules(&key, scenario, template);

        match scenario.mode.as_str() {
            "step" => self.resolve_step(&key, scenario, &method),
            "time" => self.resolve_time(&key, scenario, &method, concrete_path),
            other => Err(EmulatorError::ScenarioResolve(format!(
                "unsupported mode {other:?}"
            ))),
        }
    }

    /// Drop runtime slots whose registered reset rule matches this request.
    ///
    /// The rule template is matched against the *tail* of the concrete path,
    /// so a scenario living at `/scans/{id}/status` with a reset on
    /// `DELETE /scans/{id}` resets when `DELETE /scans/1` arrives. Returns
    /// true iff at least one slot was actually deleted.
    pub fn try_reset_by_request(&self, method: &str, concrete_path: &str) -> bool {
        let method = method.to_ascii_uppercase();

        let mut state = self.state.lock();
        let registrations: Vec<ResetRegistration> = match state.reset_by_method.get(&method) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return false,
        };

        let mut reset_any = false;
        for reg in registrations {
            if !match_template_suffix(&reg.rule.path_template, concrete_path) {
                continue;
            }
            let Some(key_value) =
                extract_suffix_param(&reg.rule.path_template, concrete_path, &reg.key_param)
            else {
                continue;
            };
            if key_value.trim().is_empty() {
                continue;
            }

            let key = runtime_key(&reg.scenario_template, &key_value);
            let mut removed = state.step_index.remove(&key).is_some();
            removed |= state.started_at.remove(&key).is_some();
            removed |= state.reset_rules.remove(&key).is_some();
            if removed {
                debug!(%key, %method, path = %concrete_path, "scenario state reset");
                reset_any = true;
            }
        }
        reset_any
    }

    /// Register each reset rule once per (path template, scenario template,
    /// key param) tuple; repeated resolves leave the registry unchanged.
    fn register_reset_rules(&self, runtime_key: &str, scenario: &Scenario, template: &str) {
        let mut state = self.state.lock();

        if !state.reset_rules.contains_key(runtime_key) {
            let rules: Vec<ResetRule> = scenario
                .behavior
                .reset_on
                .iter()
                .map(|r| ResetRule {
                    method: r.method.trim().to_ascii_uppercase(),
                    path_template: r.path.trim().to_string(),
                })
                .collect();
            state.reset_rules.insert(runtime_key.to_string(), rules);
        }

        let rules = state
            .reset_rules
            .get(runtime_key)
            .cloned()
            .unwrap_or_default();
        for rule in rules {
            if rule.method.is_empty() || rule.path_template.is_empty() {
                continue;
            }
            let registrations = state.reset_by_method.entry(rule.method.clone()).or_default();
            let exists = registrations.iter().any(|reg| {
                reg.rule.path_template == rule.path_template
                    && reg.scenario_template == template
                    && reg.key_param == scenario.key.path_param
            });
            if !exists {
                registrations.push(ResetRegistration {
                    rule,
                    scenario_template: template.to_string(),
                    key_param: scenario.key.path_param.clone(),
                });
            }
        }
    }

    fn resolve_step(
        &self,
        key: &str,
        scenario: &Scenario,
        method: &str,
    ) -> Result<(String, String), EmulatorError> {
        if scenario.sequence.is_empty() {
            return Err(EmulatorError::ScenarioResolve(
                "step mode requires a non-empty sequence".into(),
            ));
        }

        let last = scenario.sequence.len() - 1;
        let mut state = self.state.lock();

        let idx = state.step_index.get(key).copied().unwrap_or(0).min(last);
        let entry = &scenario.sequence[idx];

        let next = if matches_any(&scenario.behavior.advance_on, method, "") {
            if idx + 1 > last {
                // Past the end: loop wraps, otherwise the last state sticks.
                if scenario.behavior.loops {
                    0
                } else {
                    last
                }
            } else {
                idx + 1
            }
        } else {
            idx
        };
        state.step_index.insert(key.to_string(), next);

        Ok((entry.file.clone(), entry.state.clone()))
    }

    fn resolve_time(
        &self,
        key: &str,
        scenario: &Scenario,
        method: &str,
        concrete_path: &str,
    ) -> Result<(String, String), EmulatorError> {
        if scenario.timeline.is_empty() {
            return Err(EmulatorError::ScenarioResolve(
                "time mode requires a non-empty timeline".into(),
            ));
        }

        let elapsed_sec = {
            let mut state = self.state.lock();
            match state.started_at.get(key) {
                Some(t0) => t0.elapsed().as_secs() as i64,
                None => {
                    // An empty startOn list starts the clock on first
                    // access; otherwise only a matching request starts it.
                    if scenario.behavior.start_on.is_empty()
                        || matches_any(&scenario.behavior.start_on, method, concrete_path)
                    {
                        state.started_at.insert(key.to_string(), Instant::now());
                    }
                    0
                }
            }
        };

        let total = scenario
            .timeline
            .last()
            .map(|t| t.after_sec)
            .unwrap_or(0)
            .max(0);
        let elapsed = if scenario.behavior.loops && total > 0 {
            elapsed_sec % (total + 1)
        } else {
            elapsed_sec.min(total)
        };

        let mut chosen = &scenario.timeline[0];
        for entry in &scenario.timeline {
            if entry.after_sec <= elapsed {
                chosen = entry;
            } else {
                break;
            }
        }
        Ok((chosen.file.clone(), chosen.state.clone()))
    }

    #[cfg(test)]
    pub(crate) fn backdate_start(
        &self,
        template: &str,
        key_value: &str,
        ago: std::time::Duration,
    ) {
        let key = runtime_key(template, key_value);
        self.state
            .lock()
            .started_at
            .insert(key, Instant::now() - ago);
    }

    #[cfg(test)]
    pub(crate) fn registration_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .reset_by_method
            .get(&method.to_ascii_uppercase())
            .map(Vec::len)
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn has_started(&self, template: &str, key_value: &str) -> bool {
        let key = runtime_key(template, key_value);
        self.state.lock().started_at.contains_key(&key)
    }
}

/// `uppercase(trim(template)) + "::" + keyValue` — the address of a slot.
fn runtime_key(template: &str, key_value: &str) -> String {
    format!("{}::{}", template.trim().to_ascii_uppercase(), key_value)
}

fn segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').collect()
}

fn is_param_segment(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

fn param_name(segment: &str) -> &str {
    segment.trim_start_matches('{').trim_end_matches('}')
}

fn matches_any(rules: &[MatchRule], method: &str, concrete_path: &str) -> bool {
    rules.iter().any(|rule| {
        if !rule.method.trim().eq_ignore_ascii_case(method) {
            return false;
        }
        let path = rule.path.trim();
        path.is_empty() || match_template_suffix(path, concrete_path)
    })
}

/// Template segments must equal the tail of the concrete path's segments;
/// parameter segments accept any non-empty segment.
fn match_template_suffix(template: &str, concrete: &str) -> bool {
    let tpl = segments(template);
    let act = segments(concrete);
    if act.len() < tpl.len() {
        return false;
    }
    let tail = &act[act.len() - tpl.len()..];
    tpl.iter()
        .zip(tail)
        .all(|(t, a)| if is_param_segment(t) { !a.is_empty() } else { t == a })
}

/// Zip template and concrete path segment-by-segment (equal counts required)
/// and return the value of the parameter named `want`.
fn extract_path_param(template: &str, concrete: &str, want: &str) -> Option<String> {
    let tpl = segments(template);
    let act = segments(concrete);
    if tpl.len() != act.len() {
        return None;
    }
    find_param(&tpl, &act, want)
}

/// Like [`extract_path_param`] but aligns the template against the tail of
/// the concrete path, pairing with suffix-based reset matching.
fn extract_suffix_param(template: &str, concrete: &str, want: &str) -> Option<String> {
    let tpl = segments(template);
    let act = segments(concrete);
    if act.len() < tpl.len() {
        return None;
    }
    find_param(&tpl, &act[act.len() - tpl.len()..], want)
}

fn find_param(tpl: &[&str], act: &[&str], want: &str) -> Option<String> {
    tpl.iter().zip(act).find_map(|(t, a)| {
        (is_param_segment(t) && param_name(t) == want).then(|| a.to_string())
    })
}
