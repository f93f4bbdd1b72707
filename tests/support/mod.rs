#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;

use auto_centile::app::pipeline::CentileOrchestrator;
use auto_centile::data::{CalculatedValues, GrowthApi, GrowthPayload};
use auto_centile::domain::{MeasurementRequest, Metric};
use auto_centile::error::ApiError;
use auto_centile::request::RequestBuilder;
use auto_centile::scheduler::{FieldEventKind, FormFields, StatusDisplay};
use auto_centile::server::{AppState, create_router};

/// In-process growth API: echoes the value as the centile, fails listed metrics.
#[derive(Default)]
pub struct StubGrowthApi {
    pub failing: Vec<Metric>,
    pub seen: Mutex<Vec<MeasurementRequest>>,
}

impl StubGrowthApi {
    pub fn failing(metrics: &[Metric]) -> Self {
        Self {
            failing: metrics.to_vec(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl GrowthApi for StubGrowthApi {
    fn send(&self, request: &MeasurementRequest) -> Result<GrowthPayload, ApiError> {
        self.seen.lock().unwrap().push(request.clone());
        if self.failing.contains(&request.metric) {
            return Err(ApiError::Upstream {
                status: 422,
                message: format!("{} out of range", request.metric),
            });
        }
        Ok(GrowthPayload {
            measurement_calculated_values: Some(CalculatedValues {
                centile: Some(request.value),
                sds: Some(0.5),
                centile_band: Some("between the 50th and 75th centiles".to_string()),
                ..CalculatedValues::default()
            }),
        })
    }
}

pub fn stub_state(api: StubGrowthApi) -> AppState {
    AppState::new(Arc::new(CentileOrchestrator::new(RequestBuilder::default(), api)))
}

/// Stub shared with the test so calls can be inspected after the request.
pub struct SharedStub(pub Arc<StubGrowthApi>);

impl GrowthApi for SharedStub {
    fn send(&self, request: &MeasurementRequest) -> Result<GrowthPayload, ApiError> {
        self.0.send(request)
    }
}

pub fn shared_stub_state(api: &Arc<StubGrowthApi>) -> AppState {
    let shared = SharedStub(Arc::clone(api));
    AppState::new(Arc::new(CentileOrchestrator::new(RequestBuilder::default(), shared)))
}

/// A request seen by `spawn_upstream`.
#[derive(Debug, Clone)]
pub struct Captured {
    pub authorization: Option<String>,
    pub accept: Option<String>,
    pub body: serde_json::Value,
}

pub struct Upstream {
    pub url: String,
    pub requests: Arc<Mutex<Vec<Captured>>>,
}

/// Serve `app` on a loopback port from its own thread and runtime.
///
/// Blocking clients under test stay outside any async context.
pub fn spawn_router(app: Router) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    format!("http://{addr}")
}

/// Fake growth API answering every POST with a fixed status and body.
pub fn spawn_upstream(status: u16, body: &'static str) -> Upstream {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&requests);

    let app = Router::new().route(
        "/calculation",
        post(move |headers: HeaderMap, raw: Bytes| {
            let captured = Arc::clone(&captured);
            async move {
                let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
                captured.lock().unwrap().push(Captured {
                    authorization: header("authorization"),
                    accept: header("accept"),
                    body: serde_json::from_slice(&raw).unwrap_or(serde_json::Value::Null),
                });
                (StatusCode::from_u16(status).unwrap(), body)
            }
        }),
    );

    let base = spawn_router(app);
    Upstream {
        url: format!("{base}/calculation"),
        requests,
    }
}

/// Serve the real calculation router backed by `state`.
pub fn spawn_app(state: AppState) -> String {
    spawn_router(create_router(state))
}

/// Minimal host form: plain maps, statuses replaced in place.
#[derive(Default)]
pub struct MemoryForm {
    pub values: HashMap<String, String>,
    pub choices: HashMap<String, String>,
    pub writes: Vec<(String, String)>,
    pub statuses: HashMap<String, Vec<StatusDisplay>>,
}

impl MemoryForm {
    pub fn with(values: &[(&str, &str)], sex: &str) -> Self {
        let mut form = MemoryForm::default();
        for (k, v) in values {
            form.values.insert(k.to_string(), v.to_string());
        }
        form.choices.insert("sex".to_string(), sex.to_string());
        form
    }
}

impl FormFields for MemoryForm {
    fn read_field(&self, name: &str) -> String {
        self.values.get(name).cloned().unwrap_or_default()
    }

    fn read_checked_choice(&self, group: &str) -> String {
        self.choices.get(group).cloned().unwrap_or_default()
    }

    fn write_field(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
        self.writes.push((name.to_string(), value.to_string()));
    }

    fn subscribe(&mut self, _name: &str, _kind: FieldEventKind) {}

    fn clear_status(&mut self, anchor: &str) {
        self.statuses.remove(anchor);
    }

    fn append_status(&mut self, anchor: &str, status: &StatusDisplay) {
        self.statuses.entry(anchor.to_string()).or_default().push(status.clone());
    }
}
