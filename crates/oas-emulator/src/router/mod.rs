//! Route table built from the spec.
//!
//! Every (method, template path) pair becomes one [`Route`] with a
//! compiled match pattern and the derived legacy flat sample filename.
//! Matching picks the most specific route: literal segments outweigh
//! parameter segments, longer templates outweigh shorter ones.

use crate::error::EmulatorError;
use crate::spec::model::Document;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct Route {
    /// Upper-cased HTTP method.
    pub method: String,
    /// Template path as declared in the spec, e.g. `/scans/{id}`.
    pub template: String,
    pub pattern: Regex,
    /// Legacy flat sample filename, e.g. `GET__scans_{id}.json`.
    pub flat_file: String,
}

pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Build one route per declared (method, template) pair.
    pub fn from_spec(doc: &Document) -> Result<Self, EmulatorError> {
        let mut routes = Vec::new();
        for (template, item) in &doc.paths {
            for (method, _) in item.operations() {
                routes.push(Route {
                    method: method.to_string(),
                    template: template.clone(),
                    pattern: template_to_regex(template)?,
                    flat_file: flat_sample_name(method, template),
                });
            }
        }
        Ok(Router { routes })
    }

    /// Find the most specific route matching (method, concrete path).
    pub fn find_route(&self, method: &str, path: &str) -> Option<&Route> {
        let method = method.to_ascii_uppercase();

        let mut best: Option<&Route> = None;
        let mut best_score = -1i64;
        for route in &self.routes {
            if route.method != method || !route.pattern.is_match(path) {
                continue;
            }
            let score = specificity(&route.template);
            if score > best_score {
                best = Some(route);
                best_score = score;
            }
        }
        best
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

/// Literal segments are worth 10, parameter segments 0, plus one point per
/// segment so longer templates win among equals.
fn specificity(template: &str) -> i64 {
    let mut score = 0;
    let mut segments = 0;
    for segment in template.trim_matches('/').split('/') {
        segments += 1;
        if !is_param_segment(segment) {
            score += 10;
        }
    }
    score + segments
}

fn is_param_segment(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

/// `/api/v1/items/{id}` + GET → `GET__api_v1_items_{id}.json`
fn flat_sample_name(method: &str, template: &str) -> String {
    let flattened = template.trim_start_matches('/').replace('/', "_");
    format!("{}__{}.json", method.to_ascii_uppercase(), flattened)
}

/// Compile a template into an anchored pattern: literal segments quoted,
/// `{name}` segments matching one non-`/` component, one optional trailing
/// slash tolerated.
fn template_to_regex(template: &str) -> Result<Regex, EmulatorError> {
    let mut parts = Vec::new();
    for segment in template.split('/') {
        if segment.is_empty() {
            continue;
        }
        if is_param_segment(segment) {
            parts.push("([^/]+)".to_string());
        } else {
            parts.push(regex::escape(segment));
        }
    }
    let pattern = format!("^/{}/?$", parts.join("/"));
    Regex::new(&pattern)
        .map_err(|e| EmulatorError::SpecParse(format!("route pattern for {template:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router(paths: serde_json::Value) -> Router {
        let doc: Document =
            serde_json::from_value(json!({"openapi": "3.0.3", "paths": paths})).unwrap();
        Router::from_spec(&doc).unwrap()
    }

    fn ok_op() -> serde_json::Value {
        json!({"responses": {"200": {"description": "ok"}}})
    }

    #[test]
    fn test_one_route_per_method() {
        let r = router(json!({
            "/items": {"get": ok_op(), "post": ok_op()},
            "/items/{id}": {"get": ok_op()}
        }));
        assert_eq!(r.routes().len(), 3);
    }

    #[test]
    fn test_param_segment_matches_single_component() {
        let r = router(json!({"/scans/{id}": {"get": ok_op()}}));

        assert!(r.find_route("GET", "/scans/123").is_some());
        assert!(r.find_route("GET", "/scans/abc-def").is_some());
        assert!(r.find_route("GET", "/scans/1/status").is_none());
        assert!(r.find_route("GET", "/scans").is_none());
    }

    #[test]
    fn test_trailing_slash_tolerated() {
        let r = router(json!({"/items": {"get": ok_op()}}));
        assert!(r.find_route("GET", "/items").is_some());
        assert!(r.find_route("GET", "/items/").is_some());
    }

    #[test]
    fn test_method_is_case_insensitive_and_exact() {
        let r = router(json!({"/items": {"get": ok_op()}}));
        assert!(r.find_route("get", "/items").is_some());
        assert!(r.find_route("GeT", "/items").is_some());
        assert!(r.find_route("POST", "/items").is_none());
    }

    #[test]
    fn test_literal_route_beats_param_route() {
        let r = router(json!({
            "/items/{id}": {"get": ok_op()},
            "/items/latest": {"get": ok_op()}
        }));

        let hit = r.find_route("GET", "/items/latest").unwrap();
        assert_eq!(hit.template, "/items/latest");

        let hit = r.find_route("GET", "/items/42").unwrap();
        assert_eq!(hit.template, "/items/{id}");
    }

    #[test]
    fn test_longer_template_beats_shorter_among_equal_literals() {
        // Both templates carry one literal; the deeper one must win for a
        // path only it can match, and each stays reachable.
        let r = router(json!({
            "/scans/{id}": {"delete": ok_op()},
            "/scans/{id}/status": {"get": ok_op()}
        }));
        assert_eq!(
            r.find_route("GET", "/scans/1/status").unwrap().template,
            "/scans/{id}/status"
        );
        assert_eq!(
            r.find_route("DELETE", "/scans/1").unwrap().template,
            "/scans/{id}"
        );
    }

    #[test]
    fn test_flat_sample_name() {
        assert_eq!(
            flat_sample_name("get", "/api/v1/items"),
            "GET__api_v1_items.json"
        );
        assert_eq!(
            flat_sample_name("DELETE", "/scans/{id}"),
            "DELETE__scans_{id}.json"
        );
    }

    #[test]
    fn test_literal_segments_are_regex_quoted() {
        let r = router(json!({"/items.v2/{id}": {"get": ok_op()}}));
        assert!(r.find_route("GET", "/items.v2/7").is_some());
        // An unquoted dot would have made this match too.
        assert!(r.find_route("GET", "/itemsXv2/7").is_none());
    }

    #[test]
    fn test_specificity_scores() {
        assert_eq!(specificity("/items"), 11);
        assert_eq!(specificity("/items/{id}"), 12);
        assert_eq!(specificity("/items/latest"), 22);
        assert_eq!(specificity("/scans/{id}/status"), 23);
    }

    #[test]
    fn test_no_route_on_unknown_path() {
        let r = router(json!({"/items": {"get": ok_op()}}));
        assert!(r.find_route("GET", "/other").is_none());
    }
}
