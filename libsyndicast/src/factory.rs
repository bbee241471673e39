//! Platform client construction
//!
//! [`ClientFactory`] maps platform names to constructors. Unknown platforms
//! and constructors that fail (usually missing credential fields) both yield
//! `None`, which the dispatcher records as an `error` distribution.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{Config, PlatformConfig};
use crate::credentials::Credentials;
use crate::error::Result;
use crate::platforms::facebook::FacebookClient;
use crate::platforms::http::{HttpTransport, ReqwestTransport};
use crate::platforms::linkedin::LinkedInClient;
use crate::platforms::twitter::TwitterClient;
use crate::platforms::unsupported::UnsupportedClient;
use crate::platforms::{canonical_platform, PlatformClient};

/// Builds one client from an account's credentials
pub type ClientConstructor = Arc<
    dyn Fn(&Credentials, Arc<dyn HttpTransport>, &PlatformConfig) -> Result<Box<dyn PlatformClient>>
        + Send
        + Sync,
>;

pub struct ClientFactory {
    constructors: HashMap<String, ClientConstructor>,
    transport: Arc<dyn HttpTransport>,
    settings: HashMap<String, PlatformConfig>,
}

impl ClientFactory {
    /// Factory with the built-in platforms registered
    ///
    /// Registers `facebook`, `twitter` (alias `x`), `linkedin`, and the
    /// `instagram` and `tiktok` placeholders.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        let mut factory = Self::empty(transport);
        factory.register("facebook", facebook_client);
        factory.register("twitter", twitter_client);
        factory.register("x", twitter_client);
        factory.register("linkedin", linkedin_client);
        factory.register("instagram", |_, _, _| -> Result<Box<dyn PlatformClient>> {
            Ok(Box::new(UnsupportedClient::instagram()))
        });
        factory.register("tiktok", |_, _, _| -> Result<Box<dyn PlatformClient>> {
            Ok(Box::new(UnsupportedClient::tiktok()))
        });

        factory
    }

    /// Factory with nothing registered
    pub fn empty(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            constructors: HashMap::new(),
            transport,
            settings: HashMap::new(),
        }
    }

    /// Built-in platforms over a `reqwest` transport, with per-platform
    /// overrides from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config.http)?);
        Ok(Self::new(transport).with_settings(config.platforms.clone()))
    }

    pub fn with_settings(mut self, settings: HashMap<String, PlatformConfig>) -> Self {
        self.settings = settings
            .into_iter()
            .map(|(name, s)| (name.to_lowercase(), s))
            .collect();
        self
    }

    /// Add or replace the constructor for `platform`
    pub fn register<F>(&mut self, platform: &str, constructor: F)
    where
        F: Fn(&Credentials, Arc<dyn HttpTransport>, &PlatformConfig) -> Result<Box<dyn PlatformClient>>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(platform.to_lowercase(), Arc::new(constructor));
    }

    pub fn supports(&self, platform: &str) -> bool {
        self.constructors.contains_key(&platform.to_lowercase())
    }

    /// Registered platform names (aliases included), sorted
    pub fn supported_platforms(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a client, or `None` if the platform is unknown or construction fails
    pub fn create_client(&self, platform: &str, credentials: &Credentials) -> Option<Box<dyn PlatformClient>> {
        let name = platform.to_lowercase();
        let Some(constructor) = self.constructors.get(&name) else {
            warn!(platform = %name, "No client registered for platform");
            return None;
        };

        let settings = self
            .settings
            .get(&name)
            .or_else(|| self.settings.get(&canonical_platform(&name)))
            .cloned()
            .unwrap_or_default();
        match constructor(credentials, Arc::clone(&self.transport), &settings) {
            Ok(client) => {
                debug!(platform = %name, "Created platform client");
                Some(client)
            }
            Err(e) => {
                warn!(platform = %name, error = %e, "Failed to create platform client");
                None
            }
        }
    }
}

fn facebook_client(
    credentials: &Credentials,
    transport: Arc<dyn HttpTransport>,
    settings: &PlatformConfig,
) -> Result<Box<dyn PlatformClient>> {
    Ok(Box::new(FacebookClient::new(credentials, transport, settings)?))
}

fn twitter_client(
    credentials: &Credentials,
    transport: Arc<dyn HttpTransport>,
    settings: &PlatformConfig,
) -> Result<Box<dyn PlatformClient>> {
    Ok(Box::new(TwitterClient::new(credentials, transport, settings)?))
}

fn linkedin_client(
    credentials: &Credentials,
    transport: Arc<dyn HttpTransport>,
    settings: &PlatformConfig,
) -> Result<Box<dyn PlatformClient>> {
    Ok(Box::new(LinkedInClient::new(credentials, transport, settings)?))
}
