//! Twitter (X) API v2 client

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::PlatformConfig;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::platforms::http::{ApiClient, HttpRequest, HttpTransport};
use crate::platforms::{endpoint, media_not_uploaded, with_optional_warning, PlatformClient};
use crate::response::Response;
use crate::types::PostOptions;

pub const PLATFORM: &str = "twitter";
pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2";
pub const DEFAULT_CALLS_PER_MINUTE: u32 = 300;

pub struct TwitterClient {
    api: ApiClient,
    base_url: String,
}

impl TwitterClient {
    /// Requires `bearer_token`
    pub fn new(
        credentials: &Credentials,
        transport: Arc<dyn HttpTransport>,
        settings: &PlatformConfig,
    ) -> Result<Self> {
        let bearer_token = credentials.require(PLATFORM, "bearer_token")?;

        Ok(Self {
            api: ApiClient::new(
                PLATFORM,
                transport,
                settings.calls_per_minute_or(DEFAULT_CALLS_PER_MINUTE),
            )
            .with_bearer_token(bearer_token),
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }
}

#[async_trait]
impl PlatformClient for TwitterClient {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn authenticate(&self) -> Response {
        self.api
            .request(HttpRequest::get(endpoint(&self.base_url, "users/me")))
            .await
    }

    async fn post_content(&self, text: &str, media_refs: &[String], options: &PostOptions) -> Response {
        let warning = media_not_uploaded(PLATFORM, media_refs);

        let mut body = json!({ "text": text });
        if let Some(Value::String(reply_to)) = options.get("reply_to") {
            body["reply"] = json!({ "in_reply_to_tweet_id": reply_to });
        }

        let request = HttpRequest::post(endpoint(&self.base_url, "tweets")).json(body);
        with_optional_warning(self.api.request(request).await, warning)
    }

    async fn get_user_info(&self) -> Response {
        let request = HttpRequest::get(endpoint(&self.base_url, "users/me"))
            .query("user.fields", "id,name,username,profile_image_url,public_metrics");
        self.api.request(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::http::RequestBody;
    use crate::platforms::mock::ScriptedTransport;
    use crate::response::FailureKind;

    const BASE: &str = "https://twitter.test/2";

    fn client(transport: Arc<ScriptedTransport>) -> TwitterClient {
        let settings = PlatformConfig {
            calls_per_minute: Some(10),
            base_url: Some(BASE.to_string()),
        };
        TwitterClient::new(
            &Credentials::new().with("bearer_token", "tw-bearer"),
            transport,
            &settings,
        )
        .unwrap()
    }

    #[test]
    fn test_requires_bearer_token() {
        let transport = Arc::new(ScriptedTransport::new());
        let credentials = Credentials::new().with("access_token", "wrong-field");
        assert!(TwitterClient::new(&credentials, transport, &PlatformConfig::default()).is_err());
    }

    #[test]
    fn test_rate_limit_override() {
        let transport = Arc::new(ScriptedTransport::new());
        assert_eq!(client(transport).api.limiter().calls_per_minute(), 10);
    }

    #[tokio::test]
    async fn test_post_tweet() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            &format!("{}/tweets", BASE),
            201,
            r#"{"data":{"id":"1789","text":"hello"}}"#,
        );
        let client = client(transport.clone());

        let response = client.post_content("hello", &[], &PostOptions::new()).await;

        assert!(response.is_success());
        assert_eq!(response.status_code(), Some(201));
        assert_eq!(response.platform_post_id().as_deref(), Some("1789"));

        let sent = transport.requests();
        assert_eq!(sent[0].header_value("Authorization"), Some("Bearer tw-bearer"));
        assert_eq!(sent[0].body, RequestBody::Json(json!({"text": "hello"})));
    }

    #[tokio::test]
    async fn test_reply_option() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(&format!("{}/tweets", BASE), 201, r#"{"data":{"id":"2"}}"#);
        let client = client(transport.clone());

        let mut options = PostOptions::new();
        options.insert("reply_to".to_string(), json!("1"));
        client.post_content("thread", &[], &options).await;

        assert_eq!(
            transport.requests()[0].body,
            RequestBody::Json(json!({"text": "thread", "reply": {"in_reply_to_tweet_id": "1"}}))
        );
    }

    #[tokio::test]
    async fn test_rate_limited_by_platform() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(&format!("{}/tweets", BASE), 429, r#"{"title":"Too Many Requests"}"#);
        let client = client(transport);

        let response = client.post_content("hello", &[], &PostOptions::new()).await;
        assert!(!response.is_success());
        assert_eq!(response.status_code(), Some(429));
        assert_eq!(response.failure_kind(), Some(FailureKind::Rejection));
    }

    #[tokio::test]
    async fn test_network_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail(&format!("{}/users/me", BASE), "dns error");
        let client = client(transport);

        let response = client.authenticate().await;
        assert!(!response.is_success());
        assert_eq!(response.failure_kind(), Some(FailureKind::Transport));
    }
}
