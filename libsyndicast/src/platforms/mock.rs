//! Test doubles for the platform layer
//!
//! [`MockClient`] is a configurable [`PlatformClient`] for exercising the
//! dispatcher without credentials or network access. [`ScriptedTransport`]
//! sits one level lower and answers HTTP requests from a script, so the real
//! adapters can be tested end to end. Both are available outside `cfg(test)`
//! for use by integration tests.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::platforms::http::{HttpReply, HttpRequest, HttpTransport, TransportError};
use crate::platforms::PlatformClient;
use crate::response::{FailureKind, Response};
use crate::types::PostOptions;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Configuration for mock client behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name reported by the client
    pub name: String,

    /// Whether authenticate (and get_user_info) should succeed
    pub auth_succeeds: bool,

    /// Whether post_content should succeed
    pub post_succeeds: bool,

    /// Error text for failed calls
    pub error: Option<String>,

    /// Failure classification for failed posts
    pub failure_kind: FailureKind,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    /// Number of times authenticate has been called
    pub auth_call_count: Arc<AtomicUsize>,

    /// Number of times post_content has been called
    pub post_call_count: Arc<AtomicUsize>,

    /// Text of every post_content call
    pub posted_content: Arc<Mutex<Vec<String>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            auth_succeeds: true,
            post_succeeds: true,
            error: None,
            failure_kind: FailureKind::Rejection,
            delay: Duration::from_millis(0),
            auth_call_count: Arc::new(AtomicUsize::new(0)),
            post_call_count: Arc::new(AtomicUsize::new(0)),
            posted_content: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockConfig {
    pub fn auth_call_count(&self) -> usize {
        self.auth_call_count.load(Ordering::SeqCst)
    }

    pub fn post_call_count(&self) -> usize {
        self.post_call_count.load(Ordering::SeqCst)
    }

    pub fn posted_content(&self) -> Vec<String> {
        lock(&self.posted_content).clone()
    }
}

/// Mock platform client
pub struct MockClient {
    config: MockConfig,
}

impl MockClient {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A client whose calls all succeed
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// A client whose posts are rejected by the "platform"
    pub fn post_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            post_succeeds: false,
            error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// A client whose credentials are refused
    pub fn auth_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            auth_succeeds: false,
            error: Some(error.to_string()),
            ..Default::default()
        })
    }

    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    fn failure(&self, default: &str, kind: FailureKind) -> Response {
        let message = self
            .config
            .error
            .clone()
            .unwrap_or_else(|| default.to_string());
        Response::failure(kind, message)
    }

    async fn simulate_latency(&self) {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
    }
}

#[async_trait]
impl PlatformClient for MockClient {
    fn platform(&self) -> &str {
        &self.config.name
    }

    async fn authenticate(&self) -> Response {
        self.config.auth_call_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.config.auth_succeeds {
            Response::success(json!({"id": "mock-user"}), Some(200))
        } else {
            self.failure("Mock authentication failed", FailureKind::Rejection)
        }
    }

    async fn post_content(&self, text: &str, media_refs: &[String], _options: &PostOptions) -> Response {
        self.config.post_call_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if !self.config.post_succeeds {
            return self.failure("Mock posting failed", self.config.failure_kind);
        }

        lock(&self.config.posted_content).push(text.to_string());
        let post_id = format!("{}:mock-{}", self.config.name, uuid::Uuid::new_v4());
        let response = Response::success(json!({"id": post_id}), Some(200));
        if media_refs.is_empty() {
            response
        } else {
            response.with_warning(format!("{} media reference(s) not uploaded", media_refs.len()))
        }
    }

    async fn get_user_info(&self) -> Response {
        self.simulate_latency().await;

        if self.config.auth_succeeds {
            Response::success(json!({"id": "mock-user", "name": "Mock User"}), Some(200))
        } else {
            self.failure("Mock user lookup failed", FailureKind::Rejection)
        }
    }
}

enum Scripted {
    Reply(HttpReply),
    Fail(String),
}

/// HTTP transport that answers from a script keyed by URL (query excluded)
///
/// Unscripted URLs get a 404. Every request is recorded for later inspection.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests to `url` with `status` and `body`
    pub fn respond(&self, url: &str, status: u16, body: &str) {
        lock(&self.routes).insert(
            url.to_string(),
            Scripted::Reply(HttpReply {
                status,
                body: body.to_string(),
            }),
        );
    }

    /// Fail requests to `url` without a response
    pub fn fail(&self, url: &str, message: &str) {
        lock(&self.routes).insert(url.to_string(), Scripted::Fail(message.to_string()));
    }

    /// All requests received so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests received for `url`
    pub fn calls_to(&self, url: &str) -> usize {
        lock(&self.requests).iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpReply, TransportError> {
        let url = request.url.clone();
        lock(&self.requests).push(request);

        match lock(&self.routes).get(&url) {
            Some(Scripted::Reply(reply)) => Ok(reply.clone()),
            Some(Scripted::Fail(message)) => Err(TransportError::new(message.clone())),
            None => Ok(HttpReply {
                status: 404,
                body: r#"{"error":"no scripted response"}"#.to_string(),
            }),
        }
    }
}
