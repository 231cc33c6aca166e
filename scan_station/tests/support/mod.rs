// Shared fakes for integration tests: an HTTP check-in service on an ephemeral port and a
// capture device fed through an in-memory pipe.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::post,
};
use scan_station::domain::{Camera, CameraError, DecodeFeed};
use scan_station::interface_adapters::capture::LineFeed;
use scan_station::use_cases::DisplayState;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::{Semaphore, watch};

pub const CODE: &str = r#"{"eventId":"E1","data":{"name":"Ana"}}"#;
pub const TOKEN: &str = "test-token";

// One request as the fake service saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct ServiceState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    replies: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
    // When present, each request waits for a permit before answering.
    gate: Option<Arc<Semaphore>>,
}

pub struct FakeCheckIn {
    pub base_url: String,
    state: ServiceState,
}

impl FakeCheckIn {
    pub async fn start() -> Self {
        Self::spawn(None).await
    }

    pub async fn start_gated() -> Self {
        Self::spawn(Some(Arc::new(Semaphore::new(0)))).await
    }

    async fn spawn(gate: Option<Arc<Semaphore>>) -> Self {
        let state = ServiceState {
            requests: Arc::new(Mutex::new(Vec::new())),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            gate,
        };
        let app = Router::new()
            .route("/api/attendees/validate", post(validate))
            .with_state(state.clone());

        // Bind to an ephemeral port to avoid collisions with local services.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral test port");
        let addr = listener.local_addr().expect("get local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake service failed");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn reply(&self, status: StatusCode, body: Value) {
        self.state
            .replies
            .lock()
            .expect("replies mutex poisoned")
            .push_back((status, body));
    }

    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.state.gate {
            gate.add_permits(count);
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .expect("requests mutex poisoned")
            .clone()
    }
}

async fn validate(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state
        .requests
        .lock()
        .expect("requests mutex poisoned")
        .push(RecordedRequest {
            authorization,
            body,
        });

    if let Some(gate) = &state.gate {
        let permit = gate.acquire().await.expect("gate closed");
        permit.forget();
    }

    let reply = state
        .replies
        .lock()
        .expect("replies mutex poisoned")
        .pop_front();
    let (status, body) = reply.unwrap_or((
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "message": "no scripted reply" }),
    ));
    (status, Json(body))
}

// Base URL of a port nothing listens on.
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    drop(listener);
    format!("http://{addr}")
}

// Capture device backed by an in-memory pipe; the test writes decoded lines into it.
pub struct PipeCamera {
    reader: Mutex<Option<DuplexStream>>,
}

pub fn pipe_camera() -> (Arc<PipeCamera>, DecodeWriter) {
    let (writer, reader) = tokio::io::duplex(4096);
    let camera = Arc::new(PipeCamera {
        reader: Mutex::new(Some(reader)),
    });
    (camera, DecodeWriter { writer })
}

#[async_trait]
impl Camera for PipeCamera {
    async fn acquire(&self) -> Result<Box<dyn DecodeFeed>, CameraError> {
        let reader = self
            .reader
            .lock()
            .expect("pipe mutex poisoned")
            .take()
            .ok_or_else(|| CameraError::new("pipe", "already acquired"))?;
        Ok(Box::new(LineFeed::new(reader)))
    }
}

pub struct DecodeWriter {
    writer: DuplexStream,
}

impl DecodeWriter {
    pub async fn decode(&mut self, payload: &str) {
        self.writer
            .write_all(format!("{payload}\n").as_bytes())
            .await
            .expect("write decode");
        self.writer.flush().await.expect("flush decode");
    }
}

// Waits until the published display state satisfies `predicate`.
pub async fn wait_for<F>(rx: &mut watch::Receiver<DisplayState>, predicate: F) -> DisplayState
where
    F: Fn(&DisplayState) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let state = rx.borrow_and_update();
                if predicate(&state) {
                    return state.clone();
                }
            }
            rx.changed().await.expect("display channel closed");
        }
    })
    .await
    .expect("display state did not reach the expected condition in time")
}
