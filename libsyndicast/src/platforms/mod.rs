//! Platform abstraction and implementations
//!
//! Every supported network implements [`PlatformClient`]. A client is built
//! per account from that account's credentials and owns its own rate limiter,
//! so clients never share state.
//!
//! Calls never fail past this boundary. Whatever goes wrong (missing
//! configuration, network errors, HTTP rejections) comes back as a
//! [`Response`] with `success == false`.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use libsyndicast::config::{HttpConfig, PlatformConfig};
//! use libsyndicast::credentials::Credentials;
//! use libsyndicast::platforms::{twitter::TwitterClient, PlatformClient};
//! use libsyndicast::platforms::http::ReqwestTransport;
//! use libsyndicast::types::PostOptions;
//!
//! # async fn example() -> libsyndicast::Result<()> {
//! let transport = Arc::new(ReqwestTransport::new(&HttpConfig::default())?);
//! let credentials = Credentials::new().with("bearer_token", "AAAA...");
//! let client = TwitterClient::new(&credentials, transport, &PlatformConfig::default())?;
//!
//! let response = client.post_content("Hello from Rust", &[], &PostOptions::new()).await;
//! if response.is_success() {
//!     println!("Posted: {:?}", response.platform_post_id());
//! } else {
//!     eprintln!("Failed: {}", response.error().unwrap_or("unknown error"));
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use tracing::warn;

use crate::response::Response;
use crate::types::PostOptions;

pub mod facebook;
pub mod http;
pub mod linkedin;
pub mod twitter;
pub mod unsupported;

// Mock client is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Capability set shared by all platform adapters
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Lowercase platform name (e.g. "facebook", "twitter", "linkedin")
    fn platform(&self) -> &str;

    /// Check that the stored credentials are accepted by the platform.
    ///
    /// Success means the credential is valid, not that posting will succeed.
    async fn authenticate(&self) -> Response;

    /// Publish `text` to the platform.
    ///
    /// Media upload is not implemented: when `media_refs` is non-empty the
    /// post still goes out text-only and the response carries a warning.
    /// `options` holds platform-specific extras (e.g. `link` for Facebook).
    async fn post_content(&self, text: &str, media_refs: &[String], options: &PostOptions) -> Response;

    /// Identity of the authenticated principal
    async fn get_user_info(&self) -> Response;
}

/// Lowercase platform name with aliases folded (`x` is `twitter`)
pub fn canonical_platform(name: &str) -> String {
    let name = name.to_lowercase();
    match name.as_str() {
        "x" => "twitter".to_string(),
        _ => name,
    }
}

/// Log that media was dropped and return the warning to attach to the response
pub(crate) fn media_not_uploaded(platform: &str, media_refs: &[String]) -> Option<String> {
    if media_refs.is_empty() {
        return None;
    }
    warn!(
        platform,
        media = ?media_refs,
        "Media files provided but upload is not implemented; posting text only"
    );
    Some(format!(
        "{} media reference(s) not uploaded to {}; posted text only",
        media_refs.len(),
        platform
    ))
}

/// Attach an optional warning to a response
pub(crate) fn with_optional_warning(response: Response, warning: Option<String>) -> Response {
    match warning {
        Some(w) => response.with_warning(w),
        None => response,
    }
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
