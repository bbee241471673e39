//! Core types for Syndicast
//!
//! Posts and accounts are owned by the surrounding application; the
//! distribution pipeline only reads them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::platforms::canonical_platform;

/// Extra per-platform parameters passed through to `post_content`
/// (e.g. `{"link": "https://..."}` for Facebook).
pub type PostOptions = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub content: String,
    /// Opaque references to media files attached to the post
    #[serde(default)]
    pub media_refs: Vec<String>,
    /// Platform name -> options for that platform
    #[serde(default)]
    pub platform_options: HashMap<String, PostOptions>,
    pub scheduled_for: Option<i64>,
    pub created_at: i64,
}

impl Post {
    pub fn new(content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            media_refs: Vec::new(),
            platform_options: HashMap::new(),
            scheduled_for: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Options for a single platform, empty if none were set.
    ///
    /// An exact key wins; otherwise options stored under an alias of the
    /// same platform are used (`x` and `twitter` share options).
    pub fn options_for(&self, platform: &str) -> PostOptions {
        if let Some(options) = self.platform_options.get(platform) {
            return options.clone();
        }

        let wanted = canonical_platform(platform);
        self.platform_options
            .iter()
            .find(|(name, _)| canonical_platform(name) == wanted)
            .map(|(_, options)| options.clone())
            .unwrap_or_default()
    }
}

/// Connection state of a social media account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Active,
    Inactive,
    Expired,
    Revoked,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            _ => Err(format!("Invalid connection status: '{}'", s)),
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A connected account on one platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    /// Lowercase platform name (e.g. "facebook", "twitter")
    pub platform: String,
    pub username: Option<String>,
    pub connection_status: ConnectionStatus,
    pub authentication_expires_at: Option<i64>,
    pub created_at: i64,
}

impl Account {
    pub fn new(platform: &str, username: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            platform: platform.to_lowercase(),
            username,
            connection_status: ConnectionStatus::Active,
            authentication_expires_at: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.connection_status == ConnectionStatus::Active
    }

    /// Active and not past its authentication expiry
    pub fn is_authenticated(&self, now: i64) -> bool {
        if !self.is_active() {
            return false;
        }
        match self.authentication_expires_at {
            Some(expires_at) => expires_at >= now,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_new_default_values() {
        let post = Post::new("Test content".to_string());

        assert_eq!(post.content, "Test content");
        assert!(post.media_refs.is_empty());
        assert!(post.platform_options.is_empty());
        assert_eq!(post.scheduled_for, None);
        assert!(Uuid::parse_str(&post.id).is_ok());
    }

    #[test]
    fn test_options_for_missing_platform_is_empty() {
        let mut post = Post::new("hello".to_string());
        let mut fb = PostOptions::new();
        fb.insert("link".to_string(), Value::String("https://example.com".to_string()));
        post.platform_options.insert("facebook".to_string(), fb);

        assert_eq!(post.options_for("facebook").len(), 1);
        assert!(post.options_for("twitter").is_empty());
    }

    #[test]
    fn test_options_for_alias_shares_options() {
        let mut post = Post::new("hello".to_string());
        let mut reply = PostOptions::new();
        reply.insert("reply_to".to_string(), Value::String("1790".to_string()));
        post.platform_options.insert("twitter".to_string(), reply);

        assert_eq!(post.options_for("x"), post.options_for("twitter"));
        assert_eq!(post.options_for("X")["reply_to"], "1790");

        // A key for the alias itself takes precedence
        let mut own = PostOptions::new();
        own.insert("reply_to".to_string(), Value::String("42".to_string()));
        post.platform_options.insert("x".to_string(), own);
        assert_eq!(post.options_for("x")["reply_to"], "42");
        assert_eq!(post.options_for("twitter")["reply_to"], "1790");
    }

    #[test]
    fn test_account_authenticated_without_expiry() {
        let account = Account::new("twitter", Some("alice".to_string()));
        assert!(account.is_authenticated(chrono::Utc::now().timestamp()));
    }

    #[test]
    fn test_account_expired_token_is_not_authenticated() {
        let mut account = Account::new("facebook", None);
        account.authentication_expires_at = Some(1_000);
        assert!(account.is_active());
        assert!(!account.is_authenticated(2_000));
        assert!(account.is_authenticated(1_000));
    }

    #[test]
    fn test_inactive_account_is_not_authenticated() {
        let mut account = Account::new("linkedin", None);
        account.connection_status = ConnectionStatus::Inactive;
        assert!(!account.is_authenticated(0));
    }

    #[test]
    fn test_account_platform_is_lowercased() {
        let account = Account::new("LinkedIn", None);
        assert_eq!(account.platform, "linkedin");
    }

    #[test]
    fn test_connection_status_round_trip_str() {
        for status in [
            ConnectionStatus::Active,
            ConnectionStatus::Inactive,
            ConnectionStatus::Expired,
            ConnectionStatus::Revoked,
        ] {
            assert_eq!(status.as_str().parse::<ConnectionStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<ConnectionStatus>().is_err());
    }
}
