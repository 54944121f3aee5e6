//! Mock transport for testing.
//!
//! Emulates the space service in memory: spaces with idempotent creation,
//! sessions, snapshots with version checks on delta submission, and
//! telemetry stats. Any route can be overridden or made to fail, and every
//! request is captured for verification.

use super::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use async_trait::async_trait;
use serde_json::json;
use spacesync_types::wire::{
    CreateSpace, JoinRequest, SessionEntry, Snapshot, SpaceHandle, Stats,
};
use spacesync_types::{ActorId, Delta, SessionId, SpaceId, Version};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

/// How the mock treats a second creation request with a known idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdempotencyMode {
    /// Return the space created by the first request.
    #[default]
    Replay,
    /// Reject with 409 Conflict.
    Conflict,
    /// Ignore the key and create a duplicate space.
    Ignore,
}

/// A canned reply for an overridden route.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer with a status and JSON body.
    Json {
        /// HTTP status.
        status: u16,
        /// JSON body.
        body: serde_json::Value,
    },
    /// Fail with a transport error.
    Error(TransportError),
}

impl MockReply {
    /// A 200 reply with the given body.
    pub fn ok(body: serde_json::Value) -> Self {
        Self::Json { status: 200, body }
    }

    /// A reply with the given status and an `{"error": ...}` body.
    pub fn status(status: u16, message: &str) -> Self {
        Self::Json {
            status,
            body: json!({ "error": message }),
        }
    }
}

#[derive(Debug, Clone)]
struct Override {
    method: Method,
    path: String,
    reply: MockReply,
    /// Remaining uses; `None` means forever.
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct SpaceRecord {
    handle: Option<SpaceHandle>,
    version: u64,
    state: serde_json::Value,
    coherence: Option<f64>,
    sessions: Vec<SessionEntry>,
    deltas: Vec<Delta>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    clock: u64,
    next_id: u64,
    order: Vec<SpaceId>,
    spaces: HashMap<SpaceId, SpaceRecord>,
    idempotency: HashMap<String, SpaceId>,
    idempotency_mode: IdempotencyMode,
    overrides: Vec<Override>,
    requests: Vec<ApiRequest>,
    conflicts: usize,
    sent_messages: VecDeque<(SessionId, serde_json::Value)>,
}

/// Mock transport for testing.
///
/// Clones share the same emulated service.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    create_barrier: Arc<Mutex<Option<Arc<Barrier>>>>,
}

impl MockTransport {
    /// Create a new mock transport with an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose how repeated idempotency keys are handled.
    pub fn set_idempotency_mode(&self, mode: IdempotencyMode) {
        self.inner.lock().unwrap().idempotency_mode = mode;
    }

    /// Hold every `POST /spaces` until `callers` creation requests have arrived.
    ///
    /// Forces concurrent acquirers to race on creation.
    pub fn hold_creates(&self, callers: usize) {
        *self.create_barrier.lock().unwrap() = Some(Arc::new(Barrier::new(callers)));
    }

    /// Override a route with a reply, for every subsequent call.
    pub fn set_route(&self, method: Method, path: &str, reply: MockReply) {
        self.push_override(method, path, reply, None);
    }

    /// Override a route with a reply for the next `times` calls only.
    ///
    /// `times == 0` adds no override.
    pub fn set_route_times(&self, method: Method, path: &str, reply: MockReply, times: usize) {
        self.push_override(method, path, reply, Some(times));
    }

    /// Cause the next call to a route to fail with the given error.
    pub fn fail_next(&self, method: Method, path: &str, error: TransportError) {
        self.push_override(method, path, MockReply::Error(error), Some(1));
    }

    fn push_override(
        &self,
        method: Method,
        path: &str,
        reply: MockReply,
        remaining: Option<usize>,
    ) {
        if remaining == Some(0) {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        // Newest override wins.
        inner.overrides.insert(
            0,
            Override {
                method,
                path: path.to_string(),
                reply,
                remaining,
            },
        );
    }

    /// Seed a space directly, bypassing the create route.
    pub fn seed_space(&self, name: &str) -> SpaceHandle {
        let mut inner = self.inner.lock().unwrap();
        inner.create_space(name)
    }

    /// Attach a session of another actor to a space.
    pub fn add_remote_session(&self, space: &SpaceId, session: &str, actor: &str, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.spaces.entry(space.clone()).or_default();
        record.sessions.push(SessionEntry {
            session_id: SessionId::from(session),
            actor_id: ActorId::from(actor),
            display_name: name.to_string(),
            online: true,
            last_seen: 0,
        });
    }

    /// Remove a session from a space's telemetry.
    pub fn remove_session(&self, space: &SpaceId, session: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.spaces.get_mut(space) {
            record.sessions.retain(|s| s.session_id.as_str() != session);
        }
    }

    /// Move a space to a new version, as another client's write would.
    pub fn set_version(&self, space: &SpaceId, version: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.spaces.entry(space.clone()).or_default().version = version;
    }

    /// Set the phase coherence reported in snapshots.
    pub fn set_phase_coherence(&self, space: &SpaceId, coherence: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.spaces.entry(space.clone()).or_default().coherence = Some(coherence);
    }

    /// Current version of a space.
    pub fn version(&self, space: &SpaceId) -> u64 {
        let inner = self.inner.lock().unwrap();
        inner.spaces.get(space).map(|r| r.version).unwrap_or(0)
    }

    /// All spaces, in creation order.
    pub fn spaces(&self) -> Vec<SpaceHandle> {
        let inner = self.inner.lock().unwrap();
        inner.list(None)
    }

    /// Deltas accepted for a space, in order.
    pub fn deltas(&self, space: &SpaceId) -> Vec<Delta> {
        let inner = self.inner.lock().unwrap();
        inner
            .spaces
            .get(space)
            .map(|r| r.deltas.clone())
            .unwrap_or_default()
    }

    /// Messages accepted by the messaging session route.
    pub fn sent_messages(&self) -> Vec<(SessionId, serde_json::Value)> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.iter().cloned().collect()
    }

    /// Number of creation requests rejected with 409.
    pub fn create_conflicts(&self) -> usize {
        self.inner.lock().unwrap().conflicts
    }

    /// Get all requests that were sent.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Count requests sent to a route.
    pub fn request_count(&self, method: Method, path: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Clear all state (spaces, overrides, captured requests).
    pub fn reset(&self) {
        *self.inner.lock().unwrap() = MockTransportInner::default();
        *self.create_barrier.lock().unwrap() = None;
    }
}

impl MockTransportInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn create_space(&mut self, name: &str) -> SpaceHandle {
        self.next_id += 1;
        let handle = SpaceHandle {
            id: SpaceId::from(format!("sp_{:04}", self.next_id).as_str()),
            name: name.to_string(),
            created_at: self.tick(),
        };
        let record = self.spaces.entry(handle.id.clone()).or_default();
        record.handle = Some(handle.clone());
        self.order.push(handle.id.clone());
        handle
    }

    fn list(&self, name: Option<&str>) -> Vec<SpaceHandle> {
        self.order
            .iter()
            .filter_map(|id| self.spaces.get(id).and_then(|r| r.handle.clone()))
            .filter(|h| name.map_or(true, |n| h.name == n))
            .collect()
    }

    fn take_override(&mut self, request: &ApiRequest) -> Option<MockReply> {
        let index = self
            .overrides
            .iter()
            .position(|o| o.method == request.method && o.path == request.path)?;
        let reply = self.overrides[index].reply.clone();
        if let Some(remaining) = self.overrides[index].remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.overrides.remove(index);
            }
        }
        Some(reply)
    }

    fn route(&mut self, request: &ApiRequest) -> (u16, serde_json::Value) {
        let segments: Vec<&str> = request
            .path
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["spaces"]) => {
                let spaces = self.list(request.query_param("name"));
                (200, json!(spaces))
            }
            (Method::Post, ["spaces"]) => self.handle_create(request),
            (Method::Post, ["spaces", id, "sessions"]) => self.handle_join(id, request),
            (Method::Get, ["spaces", id, "snapshot"]) => match self.snapshot(id) {
                Some(snapshot) => (200, json!(snapshot)),
                None => not_found(),
            },
            (Method::Get, ["spaces", id, "stats"]) => match self.spaces.get(&SpaceId::from(*id)) {
                Some(record) => (
                    200,
                    json!(Stats {
                        active_sessions: record.sessions.clone(),
                    }),
                ),
                None => not_found(),
            },
            (Method::Post, ["spaces", id, "deltas"]) => self.handle_delta(id, request),
            (Method::Post, ["sessions", sid, "messages"]) => {
                let body = request.body.clone().unwrap_or_default();
                self.sent_messages.push_back((SessionId::from(*sid), body));
                (202, json!({ "accepted": true }))
            }
            _ => not_found(),
        }
    }

    fn handle_create(&mut self, request: &ApiRequest) -> (u16, serde_json::Value) {
        let Some(body) = decode::<CreateSpace>(request) else {
            return (400, json!({ "error": "invalid body" }));
        };

        if let Some(key) = &request.idempotency_key {
            if self.idempotency_mode != IdempotencyMode::Ignore {
                if let Some(existing) = self.idempotency.get(key).cloned() {
                    if self.idempotency_mode == IdempotencyMode::Conflict {
                        self.conflicts += 1;
                        return (409, json!({ "error": "space already exists" }));
                    }
                    let handle = self
                        .spaces
                        .get(&existing)
                        .and_then(|r| r.handle.clone());
                    return (200, json!(handle));
                }
            }
        }

        let handle = self.create_space(&body.name);
        if let Some(key) = &request.idempotency_key {
            self.idempotency
                .entry(key.clone())
                .or_insert_with(|| handle.id.clone());
        }
        (201, json!(handle))
    }

    fn handle_join(&mut self, id: &str, request: &ApiRequest) -> (u16, serde_json::Value) {
        let Some(body) = decode::<JoinRequest>(request) else {
            return (400, json!({ "error": "invalid body" }));
        };
        self.next_id += 1;
        let session_id = SessionId::from(format!("sess_{:04}", self.next_id).as_str());
        let Some(record) = self.spaces.get_mut(&SpaceId::from(id)) else {
            return not_found();
        };
        record.sessions.push(SessionEntry {
            session_id: session_id.clone(),
            actor_id: body.actor_id,
            display_name: body.display_name,
            online: true,
            last_seen: 0,
        });
        (201, json!({ "sessionId": session_id }))
    }

    fn snapshot(&self, id: &str) -> Option<Snapshot> {
        let record = self.spaces.get(&SpaceId::from(id))?;
        Some(Snapshot {
            version: Version::new(record.version),
            state: record.state.clone(),
            phase: record
                .coherence
                .map(|coherence| spacesync_types::wire::Phase { coherence }),
        })
    }

    fn handle_delta(&mut self, id: &str, request: &ApiRequest) -> (u16, serde_json::Value) {
        let Some(delta) = decode::<Delta>(request) else {
            return (400, json!({ "error": "invalid body" }));
        };
        if let Err(e) = delta.validate() {
            return (422, json!({ "error": e.to_string() }));
        }
        let Some(record) = self.spaces.get_mut(&SpaceId::from(id)) else {
            return not_found();
        };
        if delta.from_version.value() != record.version {
            return (
                409,
                json!({
                    "error": "version mismatch",
                    "currentVersion": record.version,
                }),
            );
        }

        record.version = delta.to_version.value();
        for op in &delta.operations {
            // Operations carrying a value are stored under their path.
            if matches!(op.op.as_str(), "set" | "link") {
                if let Some(map) = ensure_object(&mut record.state) {
                    map.insert(op.path.clone(), op.value.clone());
                }
            }
        }
        record.deltas.push(delta);

        let snapshot = Snapshot {
            version: Version::new(record.version),
            state: record.state.clone(),
            phase: record
                .coherence
                .map(|coherence| spacesync_types::wire::Phase { coherence }),
        };
        (200, json!({ "snapshot": snapshot }))
    }
}

fn ensure_object(
    value: &mut serde_json::Value,
) -> Option<&mut serde_json::Map<String, serde_json::Value>> {
    if value.is_null() {
        *value = json!({});
    }
    value.as_object_mut()
}

fn decode<T: serde::de::DeserializeOwned>(request: &ApiRequest) -> Option<T> {
    request
        .body
        .clone()
        .and_then(|body| serde_json::from_value(body).ok())
}

fn not_found() -> (u16, serde_json::Value) {
    (404, json!({ "error": "not found" }))
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        if request.method == Method::Post && request.path == "/spaces" {
            let barrier = self.create_barrier.lock().unwrap().clone();
            if let Some(barrier) = barrier {
                if barrier.wait().await.is_leader() {
                    *self.create_barrier.lock().unwrap() = None;
                }
            }
        }

        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(request.clone());

        let (status, body) = match inner.take_override(&request) {
            Some(MockReply::Error(error)) => return Err(error),
            Some(MockReply::Json { status, body }) => (status, body),
            None => inner.route(&request),
        };

        ApiResponse::from_parts(status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacesync_types::{IdempotencyKey, Operation};

    fn create(name: &str) -> ApiRequest {
        ApiRequest::post("/spaces", json!({ "name": name }))
            .with_idempotency_key(IdempotencyKey::for_space(name).as_str())
    }

    fn delta(from: u64) -> Delta {
        Delta {
            from_version: Version::new(from),
            to_version: Version::new(from + 1),
            causal_vector: vec![1],
            operations: vec![Operation::new("set", "/x").with_value(json!(1))],
            timestamp: 0,
            author_id: "a".into(),
            session_id: "s".into(),
        }
    }

    // ===========================================
    // Space Routes
    // ===========================================

    #[tokio::test]
    async fn create_then_list() {
        let transport = MockTransport::new();
        let created: SpaceHandle = transport.request(create("demo")).await.unwrap().json().unwrap();

        let listed: Vec<SpaceHandle> = transport
            .request(ApiRequest::get("/spaces").with_query("name", "demo"))
            .await
            .unwrap()
            .json()
            .unwrap();

        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn list_filters_by_name() {
        let transport = MockTransport::new();
        transport.seed_space("a");
        transport.seed_space("b");

        let listed: Vec<SpaceHandle> = transport
            .request(ApiRequest::get("/spaces").with_query("name", "b"))
            .await
            .unwrap()
            .json()
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "b");
    }

    #[tokio::test]
    async fn replay_mode_returns_same_space() {
        let transport = MockTransport::new();
        let first: SpaceHandle = transport.request(create("demo")).await.unwrap().json().unwrap();
        let second: SpaceHandle = transport.request(create("demo")).await.unwrap().json().unwrap();
        assert_eq!(first, second);
        assert_eq!(transport.spaces().len(), 1);
    }

    #[tokio::test]
    async fn conflict_mode_rejects_duplicate_key() {
        let transport = MockTransport::new();
        transport.set_idempotency_mode(IdempotencyMode::Conflict);
        transport.request(create("demo")).await.unwrap();

        let err = transport.request(create("demo")).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(transport.create_conflicts(), 1);
    }

    #[tokio::test]
    async fn ignore_mode_creates_duplicates() {
        let transport = MockTransport::new();
        transport.set_idempotency_mode(IdempotencyMode::Ignore);
        transport.request(create("demo")).await.unwrap();
        transport.request(create("demo")).await.unwrap();
        assert_eq!(transport.spaces().len(), 2);
        assert!(transport.spaces()[0].created_at < transport.spaces()[1].created_at);
    }

    // ===========================================
    // Delta Routes
    // ===========================================

    #[tokio::test]
    async fn delta_advances_version() {
        let transport = MockTransport::new();
        let space = transport.seed_space("demo");
        let path = format!("/spaces/{}/deltas", space.id);

        let ack = transport
            .request(ApiRequest::post(&path, json!(delta(0))))
            .await
            .unwrap();
        assert_eq!(ack.body["snapshot"]["version"], 1);
        assert_eq!(transport.version(&space.id), 1);
        assert_eq!(transport.deltas(&space.id).len(), 1);
    }

    #[tokio::test]
    async fn link_operations_land_in_state() {
        let transport = MockTransport::new();
        let space = transport.seed_space("demo");
        let path = format!("/spaces/{}/deltas", space.id);

        let mut link = delta(0);
        link.operations = vec![
            Operation::new("link", "/links/alice/bob").with_value(json!({ "confidence": 0.9 }))
        ];
        let ack = transport.request(ApiRequest::post(&path, json!(link))).await.unwrap();

        assert_eq!(ack.body["snapshot"]["state"]["/links/alice/bob"]["confidence"], 0.9);
    }

    #[tokio::test]
    async fn stale_delta_conflicts() {
        let transport = MockTransport::new();
        let space = transport.seed_space("demo");
        transport.set_version(&space.id, 6);
        let path = format!("/spaces/{}/deltas", space.id);

        let err = transport
            .request(ApiRequest::post(&path, json!(delta(5))))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        match err {
            TransportError::Status { body, .. } => assert_eq!(body["currentVersion"], 6),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.version(&space.id), 6);
    }

    // ===========================================
    // Overrides and Failure Injection
    // ===========================================

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let transport = MockTransport::new();
        let err = transport
            .request(ApiRequest::post("/advisory", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn override_replaces_route() {
        let transport = MockTransport::new();
        transport.set_route(
            Method::Post,
            "/advisory",
            MockReply::ok(json!({ "guidance": "go ahead" })),
        );
        let response = transport
            .request(ApiRequest::post("/advisory", json!({})))
            .await
            .unwrap();
        assert_eq!(response.body["guidance"], "go ahead");
    }

    #[tokio::test]
    async fn fail_next_is_one_shot() {
        let transport = MockTransport::new();
        transport.fail_next(Method::Get, "/spaces", TransportError::Timeout);

        let first = transport.request(ApiRequest::get("/spaces")).await;
        assert!(matches!(first, Err(TransportError::Timeout)));

        let second = transport.request(ApiRequest::get("/spaces")).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn zero_times_override_is_ignored() {
        let transport = MockTransport::new();
        transport.set_route_times(Method::Get, "/spaces", MockReply::status(500, "boom"), 0);

        let response = transport.request(ApiRequest::get("/spaces")).await;
        assert!(response.is_ok());
        assert!(transport.request(ApiRequest::get("/spaces")).await.is_ok());
    }

    #[tokio::test]
    async fn requests_are_captured() {
        let transport = MockTransport::new();
        transport.request(ApiRequest::get("/spaces")).await.unwrap();
        transport.request(ApiRequest::get("/spaces")).await.unwrap();

        assert_eq!(transport.request_count(Method::Get, "/spaces"), 2);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let t1 = MockTransport::new();
        let t2 = t1.clone();
        t1.seed_space("shared");
        assert_eq!(t2.spaces().len(), 1);
    }

    #[tokio::test]
    async fn reset_clears_all() {
        let transport = MockTransport::new();
        transport.seed_space("demo");
        transport.request(ApiRequest::get("/spaces")).await.unwrap();

        transport.reset();

        assert!(transport.spaces().is_empty());
        assert!(transport.requests().is_empty());
    }
}
