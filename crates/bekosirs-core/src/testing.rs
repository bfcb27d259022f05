//! Test doubles shared by the unit tests: an in-memory storage backend, a
//! scripted biometric prompt and an in-process HTTP backend.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::api::ApiClient;
use crate::biometric::{BiometricCapabilities, BiometricKind, BiometricPrompt, PromptOutcome};
use crate::storage::{CredentialKey, CredentialStore, SecureStorage, StorageError};

fn injected_failure() -> StorageError {
    StorageError::Io(std::io::Error::other("injected storage failure"))
}

/// In-memory [`SecureStorage`] with switchable failures.
#[derive(Default)]
pub(crate) struct MemoryStorage {
    entries: Mutex<BTreeMap<CredentialKey, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes_left: Mutex<Option<usize>>,
    failing_key: Mutex<Option<CredentialKey>>,
}

impl MemoryStorage {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fail every set and delete.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Let `n` more sets succeed, then fail the rest.
    pub fn fail_writes_after(&self, n: usize) {
        *self.writes_left.lock().unwrap() = Some(n);
    }

    /// Fail every set of `key`.
    pub fn fail_set_on(&self, key: CredentialKey) {
        *self.failing_key.lock().unwrap() = Some(key);
    }

    /// Write a key without going through the failure switches.
    pub fn insert(&self, key: CredentialKey, value: &str) {
        self.entries.lock().unwrap().insert(key, value.to_string());
    }

    /// Read a key without going through the failure switches.
    pub fn raw(&self, key: CredentialKey) -> Option<String> {
        self.entries.lock().unwrap().get(&key).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<CredentialKey, String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn contains_value(&self, value: &str) -> bool {
        self.entries.lock().unwrap().values().any(|v| v == value)
    }

    fn check_write(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        Ok(())
    }
}

impl SecureStorage for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), StorageError> {
        self.check_write()?;
        if *self.failing_key.lock().unwrap() == Some(key) {
            return Err(injected_failure());
        }
        let mut left = self.writes_left.lock().unwrap();
        match left.as_mut() {
            Some(0) => return Err(injected_failure()),
            Some(n) => *n -= 1,
            None => {}
        }
        self.entries.lock().unwrap().insert(key, value.to_string());
        Ok(())
    }

    fn get(&self, key: CredentialKey) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        Ok(self.raw(key))
    }

    fn delete(&self, key: CredentialKey) -> Result<(), StorageError> {
        self.check_write()?;
        self.entries.lock().unwrap().remove(&key);
        Ok(())
    }
}

/// A [`BiometricPrompt`] that answers challenges from a queue. An empty
/// queue grants.
pub(crate) struct ScriptedPrompt {
    capabilities: BiometricCapabilities,
    outcomes: Mutex<VecDeque<PromptOutcome>>,
    challenges: AtomicUsize,
}

impl ScriptedPrompt {
    fn with_capabilities(capabilities: BiometricCapabilities) -> Self {
        Self {
            capabilities,
            outcomes: Mutex::new(VecDeque::new()),
            challenges: AtomicUsize::new(0),
        }
    }

    pub fn granting() -> Self {
        Self::with_capabilities(BiometricCapabilities {
            has_hardware: true,
            is_enrolled: true,
            kinds: vec![BiometricKind::Face],
        })
    }

    pub fn declining() -> Self {
        let prompt = Self::granting();
        prompt.push(PromptOutcome::Declined);
        prompt
    }

    pub fn without_hardware() -> Self {
        Self::with_capabilities(BiometricCapabilities::unavailable())
    }

    pub fn push(&self, outcome: PromptOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Number of challenges presented so far.
    pub fn challenges(&self) -> usize {
        self.challenges.load(Ordering::SeqCst)
    }
}

impl BiometricPrompt for ScriptedPrompt {
    async fn capabilities(&self) -> BiometricCapabilities {
        self.capabilities.clone()
    }

    async fn challenge(&self, _reason: &str) -> PromptOutcome {
        self.challenges.fetch_add(1, Ordering::SeqCst);
        if !self.capabilities.is_available() {
            return PromptOutcome::Unavailable;
        }
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PromptOutcome::Granted)
    }
}

/// One request seen by [`MockBackend`]. `path` is relative to `/api/`.
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
enum Reply {
    Json { status: u16, body: Value },
    Slow(Duration),
}

#[derive(Clone, Default)]
struct MockState {
    replies: Arc<Mutex<HashMap<(String, String), Reply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

/// In-process HTTP backend on a loopback port. Unscripted routes answer 404.
pub(crate) struct MockBackend {
    pub base_url: String,
    state: MockState,
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = MockState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{}/api/", addr),
            state,
        }
    }

    /// A base URL nothing is listening on.
    pub async fn closed_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/api/", addr)
    }

    pub fn respond(&self, method: &str, path: &str, status: u16, body: Value) {
        self.script(method, path, Reply::Json { status, body });
    }

    /// Answer `200 {}` after `delay`.
    pub fn respond_slowly(&self, method: &str, path: &str, delay: Duration) {
        self.script(method, path, Reply::Slow(delay));
    }

    fn script(&self, method: &str, path: &str, reply: Reply) {
        self.state
            .replies
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri
        .path()
        .strip_prefix("/api/")
        .unwrap_or(uri.path())
        .to_string();
    let call = RecordedCall {
        method: method.to_string(),
        path: path.clone(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    state.calls.lock().unwrap().push(call);

    let reply = state
        .replies
        .lock()
        .unwrap()
        .get(&(method.to_string(), path))
        .cloned();
    match reply {
        Some(Reply::Json { status, body }) => {
            (StatusCode::from_u16(status).unwrap(), Json(body)).into_response()
        }
        Some(Reply::Slow(delay)) => {
            tokio::time::sleep(delay).await;
            Json(json!({})).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

/// A mock backend with a client and a memory-backed credential store wired to it.
pub(crate) struct Harness {
    pub backend: MockBackend,
    pub memory: Arc<MemoryStorage>,
    pub store: CredentialStore,
    pub api: ApiClient,
}

impl Harness {
    pub async fn start() -> Self {
        let backend = MockBackend::start().await;
        let memory = Arc::new(MemoryStorage::default());
        let store = CredentialStore::new(memory.clone());
        let api = ApiClient::with_timeout(&backend.base_url, Duration::from_secs(5), store.clone())
            .unwrap();
        Self {
            backend,
            memory,
            store,
            api,
        }
    }

    /// Point the client somewhere other than the mock backend.
    pub fn retarget(&mut self, base_url: &str) {
        self.api =
            ApiClient::with_timeout(base_url, Duration::from_secs(5), self.store.clone()).unwrap();
    }
}
