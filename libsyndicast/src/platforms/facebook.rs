//! Facebook Graph API client
//!
//! Posts to a Page feed. The page access token is sent as the
//! `access_token` parameter rather than a header, following the Graph API
//! convention.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;

use crate::config::PlatformConfig;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::platforms::http::{ApiClient, HttpRequest, HttpTransport};
use crate::platforms::{endpoint, media_not_uploaded, with_optional_warning, PlatformClient};
use crate::response::Response;
use crate::types::PostOptions;

pub const PLATFORM: &str = "facebook";
pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v18.0";
pub const DEFAULT_CALLS_PER_MINUTE: u32 = 200;

pub struct FacebookClient {
    api: ApiClient,
    base_url: String,
    access_token: SecretString,
    page_id: Option<String>,
}

impl FacebookClient {
    /// Requires `access_token`. `page_id` is optional here but needed to post.
    pub fn new(
        credentials: &Credentials,
        transport: Arc<dyn HttpTransport>,
        settings: &PlatformConfig,
    ) -> Result<Self> {
        let access_token = credentials.require(PLATFORM, "access_token")?;
        let page_id = credentials.value("page_id");

        Ok(Self {
            api: ApiClient::new(
                PLATFORM,
                transport,
                settings.calls_per_minute_or(DEFAULT_CALLS_PER_MINUTE),
            ),
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
            access_token,
            page_id,
        })
    }

    pub fn page_id(&self) -> Option<&str> {
        self.page_id.as_deref()
    }

    fn token(&self) -> String {
        self.access_token.expose_secret().to_string()
    }
}

#[async_trait]
impl PlatformClient for FacebookClient {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn authenticate(&self) -> Response {
        let request = HttpRequest::get(endpoint(&self.base_url, "me")).query("access_token", self.token());
        self.api.request(request).await
    }

    async fn post_content(&self, text: &str, media_refs: &[String], options: &PostOptions) -> Response {
        let Some(page_id) = &self.page_id else {
            return Response::configuration_error("Page ID required for posting");
        };

        let warning = media_not_uploaded(PLATFORM, media_refs);

        let mut fields = vec![
            ("message".to_string(), text.to_string()),
            ("access_token".to_string(), self.token()),
        ];
        if let Some(Value::String(link)) = options.get("link") {
            fields.push(("link".to_string(), link.clone()));
        }

        let request = HttpRequest::post(endpoint(&self.base_url, &format!("{}/feed", page_id))).form(fields);
        with_optional_warning(self.api.request(request).await, warning)
    }

    async fn get_user_info(&self) -> Response {
        let request = HttpRequest::get(endpoint(&self.base_url, "me"))
            .query("access_token", self.token())
            .query("fields", "id,name,email,picture");
        self.api.request(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CredentialError, SyndicastError};
    use crate::platforms::http::RequestBody;
    use crate::platforms::mock::ScriptedTransport;
    use crate::response::FailureKind;
    use serde_json::json;

    const BASE: &str = "https://graph.test/v18.0";

    fn settings() -> PlatformConfig {
        PlatformConfig {
            calls_per_minute: None,
            base_url: Some(BASE.to_string()),
        }
    }

    fn client(transport: Arc<ScriptedTransport>, page_id: Option<&str>) -> FacebookClient {
        let mut credentials = Credentials::new().with("access_token", "fb-token");
        if let Some(page_id) = page_id {
            credentials.insert("page_id", page_id);
        }
        FacebookClient::new(&credentials, transport, &settings()).unwrap()
    }

    fn form_field<'a>(body: &'a RequestBody, key: &str) -> Option<&'a str> {
        match body {
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_missing_access_token() {
        let transport = Arc::new(ScriptedTransport::new());
        let result = FacebookClient::new(&Credentials::new(), transport, &settings());
        assert!(matches!(
            result,
            Err(SyndicastError::Credential(CredentialError::MissingField { .. }))
        ));
    }

    #[test]
    fn test_default_rate_limit() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = FacebookClient::new(
            &Credentials::new().with("access_token", "t"),
            transport,
            &PlatformConfig::default(),
        )
        .unwrap();
        assert_eq!(client.api.limiter().calls_per_minute(), 200);
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn test_post_without_page_id_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(transport.clone(), None);

        let response = client.post_content("hello", &[], &PostOptions::new()).await;

        assert!(!response.is_success());
        assert_eq!(response.failure_kind(), Some(FailureKind::Configuration));
        assert!(response.error().unwrap().contains("Page ID"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_post_to_page_feed() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(&format!("{}/42/feed", BASE), 200, r#"{"id":"42_1001"}"#);
        let client = client(transport.clone(), Some("42"));

        let mut options = PostOptions::new();
        options.insert("link".to_string(), json!("https://example.com/article"));
        let response = client.post_content("New article", &[], &options).await;

        assert!(response.is_success());
        assert_eq!(response.platform_post_id().as_deref(), Some("42_1001"));

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(form_field(&sent[0].body, "message"), Some("New article"));
        assert_eq!(form_field(&sent[0].body, "access_token"), Some("fb-token"));
        assert_eq!(form_field(&sent[0].body, "link"), Some("https://example.com/article"));
        assert!(sent[0].header_value("authorization").is_none());
    }

    #[tokio::test]
    async fn test_media_is_flagged_and_post_goes_out_text_only() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(&format!("{}/42/feed", BASE), 200, r#"{"id":"42_7"}"#);
        let client = client(transport.clone(), Some("42"));

        let media = vec!["photo.jpg".to_string()];
        let response = client.post_content("caption", &media, &PostOptions::new()).await;

        assert!(response.is_success());
        assert_eq!(response.warnings().len(), 1);
        assert!(form_field(&transport.requests()[0].body, "photo.jpg").is_none());
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            &format!("{}/me", BASE),
            401,
            r#"{"error":{"message":"Invalid OAuth access token."}}"#,
        );
        let client = client(transport.clone(), Some("42"));

        let response = client.authenticate().await;
        assert!(!response.is_success());
        assert_eq!(response.status_code(), Some(401));
        assert!(response.error().unwrap().starts_with("HTTP 401"));
        assert_eq!(transport.requests()[0].query_value("access_token"), Some("fb-token"));
    }

    #[tokio::test]
    async fn test_user_info_requests_fields() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(&format!("{}/me", BASE), 200, r#"{"id":"7","name":"Page Admin"}"#);
        let client = client(transport.clone(), None);

        let response = client.get_user_info().await;
        assert!(response.is_success());
        assert_eq!(
            transport.requests()[0].query_value("fields"),
            Some("id,name,email,picture")
        );
    }
}
