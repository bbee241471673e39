//! LinkedIn UGC posts client
//!
//! Posting needs the member's URN, so every post first looks up the
//! authenticated profile and only then creates the share.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::PlatformConfig;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::platforms::http::{ApiClient, HttpRequest, HttpTransport};
use crate::platforms::{endpoint, media_not_uploaded, with_optional_warning, PlatformClient};
use crate::response::{FailureKind, Response};
use crate::types::PostOptions;

pub const PLATFORM: &str = "linkedin";
pub const DEFAULT_BASE_URL: &str = "https://api.linkedin.com/v2";
pub const DEFAULT_CALLS_PER_MINUTE: u32 = 500;

const DEFAULT_VISIBILITY: &str = "PUBLIC";

pub struct LinkedInClient {
    api: ApiClient,
    base_url: String,
}

impl LinkedInClient {
    /// Requires `access_token`
    pub fn new(
        credentials: &Credentials,
        transport: Arc<dyn HttpTransport>,
        settings: &PlatformConfig,
    ) -> Result<Self> {
        let access_token = credentials.require(PLATFORM, "access_token")?;

        Ok(Self {
            api: ApiClient::new(
                PLATFORM,
                transport,
                settings.calls_per_minute_or(DEFAULT_CALLS_PER_MINUTE),
            )
            .with_bearer_token(access_token),
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn share_body(person_id: &str, text: &str, visibility: &str) -> Value {
        json!({
            "author": format!("urn:li:person:{}", person_id),
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": text },
                    "shareMediaCategory": "NONE"
                }
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": visibility
            }
        })
    }
}

#[async_trait]
impl PlatformClient for LinkedInClient {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn authenticate(&self) -> Response {
        self.api
            .request(HttpRequest::get(endpoint(&self.base_url, "people/~")))
            .await
    }

    async fn post_content(&self, text: &str, media_refs: &[String], options: &PostOptions) -> Response {
        let profile = self.get_user_info().await;
        if !profile.is_success() {
            return profile;
        }

        let person_id = match profile.data().and_then(|d| d.get("id")).and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Response::failure(
                    FailureKind::Rejection,
                    "LinkedIn profile response did not include an id",
                )
            }
        };

        let warning = media_not_uploaded(PLATFORM, media_refs);
        let visibility = options
            .get("visibility")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_VISIBILITY);

        let request = HttpRequest::post(endpoint(&self.base_url, "ugcPosts"))
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(Self::share_body(&person_id, text, visibility));
        with_optional_warning(self.api.request(request).await, warning)
    }

    async fn get_user_info(&self) -> Response {
        let request = HttpRequest::get(endpoint(&self.base_url, "people/~"))
            .query("projection", "(id,firstName,lastName,profilePicture)");
        self.api.request(request).await
    }
}
