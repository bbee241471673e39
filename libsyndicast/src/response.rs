//! Normalized result of every outbound platform call
//!
//! Adapters never return errors to their callers. Network failures, HTTP
//! rejections and local configuration problems all become a [`Response`]
//! with `success == false`, so the dispatcher handles every platform the
//! same way.

use serde::Serialize;
use serde_json::Value;

use crate::platforms::http::{HttpReply, TransportError};

/// Why a call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Required credential or setting is missing; the request was never sent
    Configuration,
    /// No HTTP response was received
    Transport,
    /// The platform answered with status >= 400
    Rejection,
}

/// Success/failure envelope returned by every [`PlatformClient`](crate::platforms::PlatformClient) call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    success: bool,
    data: Option<Value>,
    error: Option<String>,
    status_code: Option<u16>,
    platform_response: Option<Value>,
    failure: Option<FailureKind>,
    warnings: Vec<String>,
    timestamp: i64,
}

impl Response {
    /// Successful call. `platform_response` mirrors `data` when it is a JSON object.
    pub fn success(data: Value, status_code: Option<u16>) -> Self {
        let platform_response = data.is_object().then(|| data.clone());
        Self {
            success: true,
            data: Some(data),
            error: None,
            status_code,
            platform_response,
            failure: None,
            warnings: Vec::new(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn failure(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            status_code: None,
            platform_response: None,
            failure: Some(kind),
            warnings: Vec::new(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn configuration_error(error: impl Into<String>) -> Self {
        Self::failure(FailureKind::Configuration, error)
    }

    pub fn transport_error(error: &TransportError) -> Self {
        Self::failure(FailureKind::Transport, format!("Request failed: {}", error))
    }

    /// HTTP status >= 400. The raw body is kept in the error text and, if it
    /// parses as JSON, as the platform response.
    pub fn rejected(status: u16, body: &str) -> Self {
        let mut response = Self::failure(
            FailureKind::Rejection,
            format!("HTTP {}: {}", status, body),
        );
        response.status_code = Some(status);
        response.platform_response = serde_json::from_str::<Value>(body).ok();
        response
    }

    /// Classify a completed HTTP exchange
    pub fn from_reply(reply: HttpReply) -> Self {
        if reply.status >= 400 {
            return Self::rejected(reply.status, &reply.body);
        }

        let data = serde_json::from_str::<Value>(&reply.body)
            .unwrap_or_else(|_| Value::String(reply.body.clone()));
        Self::success(data, Some(reply.status))
    }

    /// Classify the outcome of a transport call, whether or not a reply arrived
    pub fn from_exchange(result: std::result::Result<HttpReply, TransportError>) -> Self {
        match result {
            Ok(reply) => Self::from_reply(reply),
            Err(e) => Self::transport_error(&e),
        }
    }

    /// Attach an advisory note (the call itself is unaffected)
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn platform_response(&self) -> Option<&Value> {
        self.platform_response.as_ref()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Identifier the platform assigned to the created object.
    ///
    /// Looks at `id` and then `data.id`, accepting strings or numbers.
    pub fn platform_post_id(&self) -> Option<String> {
        let data = self.data.as_ref()?;
        ["/id", "/data/id"]
            .iter()
            .filter_map(|pointer| data.pointer(pointer))
            .find_map(|value| match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}
