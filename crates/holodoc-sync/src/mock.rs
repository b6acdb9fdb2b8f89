//! Scripted in-process document service for deterministic testing.
//!
//! Unscripted calls get a plausible answer: match-or-create mints `doc-1`,
//! `doc-2`, ..., updates echo the request and photo updates return the last
//! known document with the uploaded image. Link calls keep a simple pair
//! table that `are_connected` answers from. Replies can be scripted per
//! endpoint, and individual calls can be held back with a [`Gate`] to force
//! completions to arrive out of order.
//!
//! ```rust
//! use holodoc_core::Endpoint;
//! use holodoc_sync::mock::MockDocumentService;
//!
//! let mock = MockDocumentService::new();
//! mock.push_json(Endpoint::UpdateDocument, serde_json::json!({"error": "locked"}));
//! let gate = mock.gate_next(Endpoint::MatchOrCreate);
//! gate.open();
//! ```

use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

use holodoc_core::wire::{
    BackgroundColorRequest, LinkRequest, MatchOrCreateRequest, PingRequest, UpdatePhotoRequest,
    UpdateRequest,
};
use holodoc_core::{
    defaults, Answer, CameraFrame, ConnectedAnswer, DocumentAnswer, DocumentId, DocumentService,
    Endpoint, PendingEdit, Reply, Rgb, SimpleAnswer, SuccessPolicy,
};

/// One recorded request.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub endpoint: Endpoint,
    pub body: serde_json::Value,
}

/// Holds one call back until opened (or dropped).
#[derive(Debug)]
pub struct Gate(oneshot::Sender<()>);

impl Gate {
    pub fn open(self) {
        let _ = self.0.send(());
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Body(String),
    Transport(String),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<MockCall>,
    scripted: HashMap<Endpoint, VecDeque<Scripted>>,
    gates: HashMap<Endpoint, VecDeque<oneshot::Receiver<()>>>,
    documents: HashMap<String, serde_json::Value>,
    links: Vec<(String, String)>,
    next_document: u32,
}

/// Mock document-matching server.
#[derive(Clone)]
pub struct MockDocumentService {
    state: Arc<Mutex<MockState>>,
    policy: SuccessPolicy,
}

impl Default for MockDocumentService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDocumentService {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            policy: SuccessPolicy::default(),
        }
    }

    /// Classify scripted bodies with `policy` instead of the strict default.
    pub fn with_policy(mut self, policy: SuccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Answer the next unscripted call to `endpoint` with a raw body.
    pub fn push_body(&self, endpoint: Endpoint, body: impl Into<String>) {
        self.script(endpoint, Scripted::Body(body.into()));
    }

    pub fn push_json(&self, endpoint: Endpoint, body: serde_json::Value) {
        self.push_body(endpoint, body.to_string());
    }

    /// Fail the next call to `endpoint` as if the server were unreachable.
    pub fn push_transport_failure(&self, endpoint: Endpoint) {
        self.script(
            endpoint,
            Scripted::Transport("connection refused (mock)".to_string()),
        );
    }

    /// Hold the next call to `endpoint` until the returned gate is opened.
    pub fn gate_next(&self, endpoint: Endpoint) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.lock().gates.entry(endpoint).or_default().push_back(rx);
        Gate(tx)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, endpoint: Endpoint) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.endpoint == endpoint)
            .count()
    }

    pub fn last_call(&self, endpoint: Endpoint) -> Option<MockCall> {
        self.lock()
            .calls
            .iter()
            .rev()
            .find(|call| call.endpoint == endpoint)
            .cloned()
    }

    fn script(&self, endpoint: Endpoint, scripted: Scripted) {
        self.lock()
            .scripted
            .entry(endpoint)
            .or_default()
            .push_back(scripted);
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn respond<B, T, D>(&self, endpoint: Endpoint, request: &B, default: D) -> Reply<T>
    where
        B: Serialize,
        T: Answer,
        D: FnOnce(&mut MockState, &serde_json::Value) -> serde_json::Value,
    {
        let body = serde_json::to_value(request).unwrap_or(serde_json::Value::Null);
        let (gate, scripted) = {
            let mut state = self.lock();
            state.calls.push(MockCall {
                endpoint,
                body: body.clone(),
            });
            let gate = state.gates.get_mut(&endpoint).and_then(VecDeque::pop_front);
            let scripted = state
                .scripted
                .get_mut(&endpoint)
                .and_then(VecDeque::pop_front);
            let scripted =
                scripted.unwrap_or_else(|| Scripted::Body(default(&mut *state, &body).to_string()));
            (gate, scripted)
        };

        if let Some(gate) = gate {
            let _ = gate.await;
        }

        match scripted {
            Scripted::Body(body) => Reply::from_body(&body, self.policy),
            Scripted::Transport(message) => Reply::transport(message),
        }
    }
}

fn no_error() -> serde_json::Value {
    serde_json::json!({ "error": "" })
}

fn field<'a>(body: &'a serde_json::Value, name: &str) -> &'a str {
    body.get(name).and_then(|v| v.as_str()).unwrap_or_default()
}

fn hex_to_base64(image: &str) -> String {
    hex::decode(image)
        .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes))
        .unwrap_or_default()
}

#[async_trait]
impl DocumentService for MockDocumentService {
    async fn ping(&self) -> Reply<SimpleAnswer> {
        self.respond(Endpoint::Ping, &PingRequest::default(), |_, _| no_error())
            .await
    }

    async fn match_or_create(&self, frame: &CameraFrame) -> Reply<DocumentAnswer> {
        let request = match MatchOrCreateRequest::from_frame(frame, defaults::JPEG_QUALITY) {
            Ok(request) => request,
            Err(e) => return Reply::transport(e.to_string()),
        };
        self.respond(Endpoint::MatchOrCreate, &request, |state, _| {
            state.next_document += 1;
            let n = state.next_document;
            let answer = serde_json::json!({
                "id": format!("doc-{}", n),
                "name": format!("document-{}", n),
                "label": defaults::PLACEHOLDER_LABEL,
                "author": defaults::PLACEHOLDER_AUTHOR,
                "desc": defaults::PLACEHOLDER_DESCRIPTION,
                "date": defaults::PLACEHOLDER_DATE,
                "path": format!("/documents/doc-{}.pdf", n),
                "image": "",
                "link": [],
                "error": ""
            });
            state.documents.insert(format!("doc-{}", n), answer.clone());
            answer
        })
        .await
    }

    async fn update_document(&self, edit: &PendingEdit) -> Reply<DocumentAnswer> {
        self.respond(Endpoint::UpdateDocument, &UpdateRequest::from(edit), |state, body| {
            let id = field(body, "id").to_string();
            let mut answer = state
                .documents
                .get(&id)
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));
            for name in ["id", "label", "desc", "author", "date"] {
                answer[name] = body[name].clone();
            }
            answer["error"] = serde_json::Value::from("");
            state.documents.insert(id, answer.clone());
            answer
        })
        .await
    }

    async fn update_photo(&self, identity: &DocumentId, frame: &CameraFrame) -> Reply<DocumentAnswer> {
        let request = match UpdatePhotoRequest::new(identity, frame, defaults::JPEG_QUALITY) {
            Ok(request) => request,
            Err(e) => return Reply::transport(e.to_string()),
        };
        self.respond(Endpoint::UpdatePhoto, &request, |state, body| {
            let id = field(body, "id").to_string();
            let mut answer = state
                .documents
                .get(&id)
                .cloned()
                .unwrap_or_else(|| serde_json::json!({ "id": id.clone() }));
            answer["image"] = serde_json::Value::from(hex_to_base64(field(body, "image")));
            answer["error"] = serde_json::Value::from("");
            state.documents.insert(id, answer.clone());
            answer
        })
        .await
    }

    async fn set_background_color(&self, color: Rgb) -> Reply<SimpleAnswer> {
        self.respond(
            Endpoint::BackgroundColor,
            &BackgroundColorRequest::from(color),
            |_, _| no_error(),
        )
        .await
    }

    async fn create_link(&self, first: &DocumentId, second: &DocumentId) -> Reply<SimpleAnswer> {
        self.respond(Endpoint::CreateLink, &LinkRequest::pair(first, second), |state, body| {
            state
                .links
                .push((field(body, "firstId").to_string(), field(body, "secondId").to_string()));
            no_error()
        })
        .await
    }

    async fn remove_link(&self, first: &DocumentId) -> Reply<SimpleAnswer> {
        self.respond(Endpoint::RemoveLink, &LinkRequest::single(first), |state, body| {
            let id = field(body, "firstId");
            state.links.retain(|(a, b)| a != id && b != id);
            no_error()
        })
        .await
    }

    async fn are_connected(&self, first: &DocumentId, second: &DocumentId) -> Reply<ConnectedAnswer> {
        self.respond(Endpoint::Connected, &LinkRequest::pair(first, second), |state, body| {
            let (a, b) = (field(body, "firstId"), field(body, "secondId"));
            let connected = state
                .links
                .iter()
                .any(|(x, y)| (x == a && y == b) || (x == b && y == a));
            serde_json::json!({ "connected": connected, "error": "" })
        })
        .await
    }
}
