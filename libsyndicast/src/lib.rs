//! Syndicast - publish one post to many social media accounts
//!
//! The library takes a post and a list of connected accounts, creates one
//! distribution record per account, and publishes to each platform
//! concurrently. Every outcome (success, platform rejection, missing
//! configuration) is recorded on the distribution, and failed distributions
//! can be reset and retried.
//!
//! Main pieces:
//! - [`dispatcher::Dispatcher`]: publish, retry, list
//! - [`platforms`]: the [`platforms::PlatformClient`] trait and the
//!   Facebook, Twitter and LinkedIn adapters
//! - [`factory::ClientFactory`]: platform name to client
//! - [`db::Database`]: SQLite storage for posts, accounts and distributions

pub mod config;
pub mod credentials;
pub mod db;
pub mod dispatcher;
pub mod distribution;
pub mod error;
pub mod factory;
pub mod logging;
pub mod platforms;
pub mod rate_limiter;
pub mod response;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use credentials::{CredentialStore, Credentials};
pub use db::Database;
pub use dispatcher::{Dispatcher, PersistError, PublishOutcome};
pub use distribution::{Distribution, DistributionStatus};
pub use error::{Result, SyndicastError};
pub use factory::ClientFactory;
pub use platforms::PlatformClient;
pub use response::{FailureKind, Response};
pub use types::{Account, ConnectionStatus, Post, PostOptions};
