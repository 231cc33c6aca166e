use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Semaphore, mpsc, watch};

use crate::domain::{
    Attendee, AttendeeStatus, AuthToken, Camera, CameraError, CheckInError, CheckInService,
    DecodeFeed, ValidationReply,
};
use crate::use_cases::display::DisplayState;

pub(crate) fn token() -> AuthToken {
    AuthToken::new("test-token").expect("non-empty token")
}

// Attendee with a single `name` roster column.
pub(crate) fn attendee(id: &str, status: AttendeeStatus, validation_time: Option<&str>) -> Attendee {
    let mut data = BTreeMap::new();
    data.insert("name".to_string(), json!("Ana"));
    Attendee {
        id: id.to_string(),
        data,
        status,
        validation_time: validation_time.map(str::to_string),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedCall {
    pub payload: String,
    pub token: String,
}

// Check-in service fake that records calls and answers from a script. When gated, each call
// waits for a permit before answering so tests can hold a validation in flight.
#[derive(Clone)]
pub(crate) struct RecordingCheckIn {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    replies: Arc<Mutex<VecDeque<Result<ValidationReply, CheckInError>>>>,
    gate: Option<Arc<Semaphore>>,
    panic_next: Arc<Mutex<bool>>,
}

impl RecordingCheckIn {
    pub(crate) fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            gate: None,
            panic_next: Arc::new(Mutex::new(false)),
        }
    }

    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new()
        }
    }

    pub(crate) fn push_reply(&self, reply: Result<ValidationReply, CheckInError>) {
        let mut guard = self.replies.lock().expect("replies mutex poisoned");
        guard.push_back(reply);
    }

    // Lets `count` held calls answer.
    pub(crate) fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub(crate) fn panic_on_next_call(&self) {
        *self.panic_next.lock().expect("panic flag poisoned") = true;
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

#[async_trait]
impl CheckInService for RecordingCheckIn {
    async fn validate(
        &self,
        qr_code_data: &str,
        token: &AuthToken,
    ) -> Result<ValidationReply, CheckInError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(RecordedCall {
                payload: qr_code_data.to_string(),
                token: token.expose().to_string(),
            });

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }

        let should_panic = std::mem::take(&mut *self.panic_next.lock().expect("panic flag poisoned"));
        if should_panic {
            panic!("scripted check-in panic");
        }

        self.replies
            .lock()
            .expect("replies mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(CheckInError::Transport("no scripted reply".to_string())))
    }
}

// Capture device fake. Each acquisition opens a fresh channel; tests push decodes into the
// current one and can check that the feed was dropped.
#[derive(Clone)]
pub(crate) struct ScriptedCamera {
    current: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    fail_with: Arc<Mutex<Option<String>>>,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl ScriptedCamera {
    pub(crate) fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            fail_with: Arc::new(Mutex::new(None)),
            acquired: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn deny(&self, reason: &str) {
        *self.fail_with.lock().expect("camera mutex poisoned") = Some(reason.to_string());
    }

    pub(crate) fn allow(&self) {
        *self.fail_with.lock().expect("camera mutex poisoned") = None;
    }

    pub(crate) fn push(&self, decode: &str) {
        let guard = self.current.lock().expect("camera mutex poisoned");
        let sender = guard.as_ref().expect("camera not acquired");
        let _ = sender.send(decode.to_string());
    }

    // Ends the current feed as if the device was unplugged.
    pub(crate) fn disconnect(&self) {
        self.current.lock().expect("camera mutex poisoned").take();
    }

    pub(crate) fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

struct ScriptedFeed {
    decodes: mpsc::UnboundedReceiver<String>,
    released: Arc<AtomicUsize>,
}

impl Drop for ScriptedFeed {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DecodeFeed for ScriptedFeed {
    async fn next_decode(&mut self) -> Option<String> {
        self.decodes.recv().await
    }
}

#[async_trait]
impl Camera for ScriptedCamera {
    async fn acquire(&self) -> Result<Box<dyn DecodeFeed>, CameraError> {
        if let Some(reason) = self.fail_with.lock().expect("camera mutex poisoned").clone() {
            return Err(CameraError::new("scripted", reason));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.current.lock().expect("camera mutex poisoned") = Some(tx);
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedFeed {
            decodes: rx,
            released: self.released.clone(),
        }))
    }
}

// Waits until the published display state satisfies `predicate`.
pub(crate) async fn wait_for<F>(rx: &mut watch::Receiver<DisplayState>, predicate: F) -> DisplayState
where
    F: Fn(&DisplayState) -> bool,
{
    let result = tokio::time::timeout(Duration::from_secs(2), async {
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
    .await;
    result.expect("display state did not reach the expected condition in time")
}
