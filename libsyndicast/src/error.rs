//! Error types for Syndicast
//!
//! Remote-call failures never appear here: they are normalized into a
//! [`Response`](crate::response::Response) by the platform layer and recorded
//! on the distribution. These types cover the local failures around that
//! pipeline (configuration, storage, credentials, illegal state changes).

use thiserror::Error;

use crate::distribution::DistributionStatus;

pub type Result<T> = std::result::Result<T, SyndicastError>;

#[derive(Error, Debug)]
pub enum SyndicastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Distribution error: {0}")]
    Distribution(#[from] DistributionError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyndicastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SyndicastError::InvalidInput(_) => 3,
            SyndicastError::NotFound(_) => 3,
            SyndicastError::Distribution(_) => 3,
            SyndicastError::Config(_) => 2,
            SyndicastError::Database(_) => 2,
            SyndicastError::Credential(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Missing credential '{field}' for {platform}")]
    MissingField { platform: String, field: String },

    #[error("OS keyring unavailable: {0}")]
    KeyringUnavailable(String),

    #[error("Keyring operation failed: {0}")]
    Keyring(String),

    #[error("Failed to read credentials file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse credentials: {0}")]
    Parse(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    #[error("Distribution {id} cannot move from {from} to {to}")]
    IllegalTransition {
        id: String,
        from: DistributionStatus,
        to: DistributionStatus,
    },
}
