//! Placeholder clients for platforms without an integration yet
//!
//! Instagram and TikTok accounts can be connected, but every call answers
//! with a configuration failure and no request is ever sent. Distributions
//! targeting them therefore end in `error` rather than `failed`.

use async_trait::async_trait;

use crate::platforms::PlatformClient;
use crate::response::Response;
use crate::types::PostOptions;

pub const INSTAGRAM: &str = "instagram";
pub const TIKTOK: &str = "tiktok";

pub struct UnsupportedClient {
    platform: &'static str,
}

impl UnsupportedClient {
    pub fn instagram() -> Self {
        Self { platform: INSTAGRAM }
    }

    pub fn tiktok() -> Self {
        Self { platform: TIKTOK }
    }

    fn not_implemented(&self) -> Response {
        Response::configuration_error(format!(
            "{} integration is not implemented",
            self.platform
        ))
    }
}

#[async_trait]
impl PlatformClient for UnsupportedClient {
    fn platform(&self) -> &str {
        self.platform
    }

    async fn authenticate(&self) -> Response {
        self.not_implemented()
    }

    async fn post_content(&self, _text: &str, _media_refs: &[String], _options: &PostOptions) -> Response {
        self.not_implemented()
    }

    async fn get_user_info(&self) -> Response {
        self.not_implemented()
    }
}
