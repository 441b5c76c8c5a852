//! The request dispatcher and listener loop.
//!
//! One logical task per inbound connection; each request flows through
//! health check → route lookup → optional body validation → sample
//! resolution → response emission. All failure shaping into HTTP happens
//! here and nowhere else.

mod response;

pub use response::{build_response, json_response};

use crate::config::{Config, FallbackMode, ValidationMode};
use crate::router::Router;
use crate::samples::{ProviderConfig, SampleProvider, SampleResponse};
use crate::scenario::ScenarioResolver;
use crate::spec::{validator, SpecProvider};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

const HEALTH_PATHS: [&str; 3] = ["/health/alive", "/health/ready", "/health/started"];

pub struct EmulatorServer {
    cfg: Config,
    spec: Arc<SpecProvider>,
    router: Arc<Router>,
    samples: Arc<SampleProvider>,
}

impl EmulatorServer {
    /// Load the spec, build the route table, and wire up the sample
    /// provider (with a scenario resolver when scenarios are enabled).
    pub fn new(cfg: Config) -> Result<Self, anyhow::Error> {
        let spec = SpecProvider::load(&cfg.spec_path)?;
        let router = Router::from_spec(spec.document())?;

        let resolver = cfg
            .scenario
            .enabled
            .then(|| Arc::new(ScenarioResolver::new()));
        let samples = SampleProvider::new(
            ProviderConfig {
                base_dir: PathBuf::from(&cfg.samples_dir),
                layout: cfg.layout,
                scenario_enabled: cfg.scenario.enabled,
                scenario_filename: cfg.scenario.filename.clone(),
            },
            resolver,
        );

        Ok(EmulatorServer {
            cfg,
            spec: Arc::new(spec),
            router: Arc::new(router),
            samples: Arc::new(samples),
        })
    }

    /// One line per route, for startup diagnostics.
    pub fn debug_routes(&self) -> String {
        self.router
            .routes()
            .iter()
            .map(|r| format!("{} {} -> {}\n", r.method, r.template, r.flat_file))
            .collect()
    }

    /// Accept connections forever, spawning one task per connection.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.cfg.server_port));
        let listener = TcpListener::bind(addr).await?;

        info!("emulator listening on {}", addr);
        info!(
            spec = %self.cfg.spec_path,
            samples = %self.cfg.samples_dir,
            fallback = self.cfg.fallback_mode.as_str(),
            validation = self.cfg.validation_mode.as_str(),
            layout = self.cfg.layout.as_str(),
            scenario_enabled = self.cfg.scenario.enabled,
            scenario_file = %self.cfg.scenario.filename,
            "configuration"
        );

        let server = Arc::new(self);
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let server = Arc::clone(&server);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, Infallible>(server.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }

    /// Dispatch a single request.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let method = req.method().as_str().to_string();
        let path = req.uri().path().to_string();

        if req.method() == Method::GET && HEALTH_PATHS.contains(&path.as_str()) {
            return json_response(StatusCode::OK, &json!({"ok": true}));
        }

        let Some(route) = self.router.find_route(&method, &path) else {
            return json_response(
                StatusCode::NOT_FOUND,
                &json!({"error": "No route", "method": method, "path": path}),
            );
        };

        if self.cfg.validation_mode == ValidationMode::Required
            && self.spec.requires_body(&route.template, &route.method)
        {
            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    let err = crate::error::EmulatorError::BodyRead(e.to_string());
                    return json_response(
                        StatusCode::BAD_REQUEST,
                        &json!({"error": "Bad Request", "details": err.to_string()}),
                    );
                }
            };
            if validator::is_empty_body(&body) {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &json!({
                        "error": "Bad Request",
                        "details": "Request body is required by the API spec",
                    }),
                );
            }
        }

        match self
            .samples
            .resolve_and_load(&method, &route.template, &path, &route.flat_file)
        {
            Ok(sample) => sample_response(sample),
            Err(err) => {
                warn!(%method, %path, error = %err, "sample resolution failed");

                if self.cfg.fallback_mode == FallbackMode::OpenapiExamples {
                    if let Some(body) =
                        self.spec.try_get_example_body(&route.template, &route.method)
                    {
                        return Response::builder()
                            .status(StatusCode::OK)
                            .header("content-type", "application/json")
                            .body(Full::new(Bytes::from(body)))
                            .unwrap_or_else(|_| {
                                build_response(
                                    StatusCode::INTERNAL_SERVER_ERROR,
                                    "Response build error",
                                )
                            });
                    }
                }

                json_response(
                    StatusCode::NOT_IMPLEMENTED,
                    &json!({
                        "error": "No sample file for route",
                        "method": method,
                        "path": path,
                        "swaggerPath": route.template,
                        "legacyFlatFilename": route.flat_file,
                        "layout": self.cfg.layout.as_str(),
                        "details": err.to_string(),
                        "hint": "Create the sample file under SAMPLES_DIR/<path>/<METHOD>.json (or the legacy flat name), or set FALLBACK_MODE=openapi_examples and add examples to the spec",
                    }),
                )
            }
        }
    }
}

/// Write an envelope out verbatim: its headers, its status, its body bytes.
fn sample_response(sample: SampleResponse) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(sample.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);
    for (key, value) in &sample.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder
        .body(Full::new(Bytes::from(sample.body)))
        .unwrap_or_else(|_| build_response(StatusCode::INTERNAL_SERVER_ERROR, "Response build error"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LayoutMode, ScenarioConfig};
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    fn base_spec() -> Value {
        json!({
            "openapi": "3.0.3",
            "paths": {
                "/items": {
                    "get": {"responses": {"200": {"description": "ok", "content": {
                        "application/json": {"example": {"hello": "world"}}
                    }}}},
                    "post": {
                        "requestBody": {"required": true, "content": {"application/json": {}}},
                        "responses": {"201": {"description": "created"}}
                    }
                },
                "/bare": {"get": {"responses": {"200": {"description": "ok"}}}}
            }
        })
    }

    fn server(dir: &TempDir, spec: &Value, fallback: FallbackMode) -> EmulatorServer {
        let spec_path = dir.path().join("spec.json");
        fs::write(&spec_path, serde_json::to_vec(spec).unwrap()).unwrap();
        let samples_dir = dir.path().join("sample");
        fs::create_dir_all(&samples_dir).unwrap();

        EmulatorServer::new(Config {
            server_port: 0,
            spec_path: spec_path.to_string_lossy().into_owned(),
            samples_dir: samples_dir.to_string_lossy().into_owned(),
            log_level: "info".into(),
            running_env: "local".into(),
            validation_mode: ValidationMode::Required,
            fallback_mode: fallback,
            layout: LayoutMode::Auto,
            debug_routes: false,
            scenario: ScenarioConfig {
                enabled: true,
                filename: "scenario.json".into(),
            },
        })
        .unwrap()
    }

    fn request(method: &str, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_json(resp: Response<Full<Bytes>>) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let dir = TempDir::new().unwrap();
        let srv = server(&dir, &base_spec(), FallbackMode::OpenapiExamples);

        for path in ["/health/alive", "/health/ready", "/health/started"] {
            let resp = srv.handle(request("GET", path, "")).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body_json(resp).await, json!({"ok": true}));
        }

        // Health answers GET only.
        let resp = srv.handle(request("POST", "/health/alive", "")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_no_route_is_404() {
        let dir = TempDir::new().unwrap();
        let srv = server(&dir, &base_spec(), FallbackMode::OpenapiExamples);

        let resp = srv.handle(request("GET", "/unknown", "")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "No route");
        assert_eq!(body["method"], "GET");
        assert_eq!(body["path"], "/unknown");
    }

    #[tokio::test]
    async fn test_required_body_validation() {
        let dir = TempDir::new().unwrap();
        let srv = server(&dir, &base_spec(), FallbackMode::OpenapiExamples);

        // Whitespace-only body is rejected.
        let resp = srv.handle(request("POST", "/items", "  ")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Bad Request");
        assert!(body["details"].as_str().unwrap().contains("required"));

        // A real body passes validation and reaches resolution (which then
        // falls back to the spec example).
        let resp = srv.handle(request("POST", "/items", r#"{"name": "x"}"#)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sample_envelope_served_verbatim() {
        let dir = TempDir::new().unwrap();
        let srv = server(&dir, &base_spec(), FallbackMode::OpenapiExamples);
        let sample_path = dir.path().join("sample/items");
        fs::create_dir_all(&sample_path).unwrap();
        fs::write(
            sample_path.join("GET.json"),
            r#"{"status": 418, "headers": {"x-sample": "yes"}, "body": {"kind": "teapot"}}"#,
        )
        .unwrap();

        let resp = srv.handle(request("GET", "/items", "")).await;
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(resp.headers()["x-sample"], "yes");
        assert_eq!(resp.headers()["content-type"], "application/json");
        assert_eq!(body_json(resp).await, json!({"kind": "teapot"}));
    }

    #[tokio::test]
    async fn test_fallback_to_spec_example() {
        let dir = TempDir::new().unwrap();
        let srv = server(&dir, &base_spec(), FallbackMode::OpenapiExamples);

        let resp = srv.handle(request("GET", "/items", "")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/json");
        assert_eq!(body_json(resp).await, json!({"hello": "world"}));
    }

    #[tokio::test]
    async fn test_no_fallback_is_501_with_diagnostic() {
        let dir = TempDir::new().unwrap();
        let srv = server(&dir, &base_spec(), FallbackMode::None);

        let resp = srv.handle(request("GET", "/items", "")).await;
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "No sample file for route");
        assert_eq!(body["swaggerPath"], "/items");
        assert_eq!(body["legacyFlatFilename"], "GET__items.json");
        assert_eq!(body["layout"], "auto");
        assert!(body["details"].as_str().unwrap().contains("no sample file"));
        assert!(body["hint"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_scenario_step_flow_through_dispatcher() {
        let dir = TempDir::new().unwrap();
        let spec = json!({
            "openapi": "3.0.3",
            "paths": {
                "/scans/{id}/status": {"get": {"responses": {"200": {"description": "ok"}}}},
                "/scans/{id}": {"delete": {"responses": {"204": {"description": "gone"}}}}
            }
        });
        let srv = server(&dir, &spec, FallbackMode::None);

        let status_dir = dir.path().join("sample/scans/{id}/status");
        fs::create_dir_all(&status_dir).unwrap();
        fs::write(
            status_dir.join("scenario.json"),
            serde_json::to_vec(&json!({
                "version": 1,
                "mode": "step",
                "key": {"pathParam": "id"},
                "sequence": [
                    {"state": "requested", "file": "requested.json"},
                    {"state": "running", "file": "running.json"}
                ],
                "behavior": {
                    "advanceOn": [{"method": "GET"}],
                    "resetOn": [{"method": "DELETE", "path": "/scans/{id}"}],
                    "repeatLast": true
                }
            }))
            .unwrap(),
        )
        .unwrap();
        fs::write(status_dir.join("requested.json"), r#"{"body": {"state": "requested"}}"#)
            .unwrap();
        fs::write(status_dir.join("running.json"), r#"{"body": {"state": "running"}}"#).unwrap();

        let delete_dir = dir.path().join("sample/scans/{id}");
        fs::create_dir_all(&delete_dir).unwrap();
        fs::write(delete_dir.join("DELETE.json"), r#"{"status": 204}"#).unwrap();

        let resp = srv.handle(request("GET", "/scans/7/status", "")).await;
        assert_eq!(body_json(resp).await, json!({"state": "requested"}));
        let resp = srv.handle(request("GET", "/scans/7/status", "")).await;
        assert_eq!(body_json(resp).await, json!({"state": "running"}));

        // Deleting the scan resets its scenario slot.
        let resp = srv.handle(request("DELETE", "/scans/7", "")).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = srv.handle(request("GET", "/scans/7/status", "")).await;
        assert_eq!(body_json(resp).await, json!({"state": "requested"}));
    }

    #[tokio::test]
    async fn test_debug_routes_lists_every_pair() {
        let dir = TempDir::new().unwrap();
        let srv = server(&dir, &base_spec(), FallbackMode::None);

        let dump = srv.debug_routes();
        assert!(dump.contains("GET /items -> GET__items.json"));
        assert!(dump.contains("POST /items -> POST__items.json"));
        assert!(dump.contains("GET /bare -> GET__bare.json"));
    }
}
