//! Per-account credential storage
//!
//! Each account's secrets form a [`Credentials`] bundle: a flat map of field
//! names (`access_token`, `page_id`, `bearer_token`, ...) to values. Bundles
//! are looked up by account id through a [`CredentialStore`]:
//!
//! - [`FileCredentialStore`]: TOML file, one table per account id (mode 600 on Unix)
//! - [`KeyringCredentialStore`]: OS keyring, one JSON bundle per account id
//! - [`MemoryCredentialStore`]: in-process map for tests and embedding
//!
//! # Example
//!
//! ```toml
//! # ~/.config/syndicast/credentials.toml
//! ["0b6f2a5e-..."]
//! access_token = "EAAB..."
//! page_id = "1029384756"
//!
//! ["9d1c7b44-..."]
//! bearer_token = "AAAA..."
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use crate::config::{CredentialConfig, StorageBackend};
use crate::error::{CredentialError, Result};
use crate::types::Account;

/// Keyring service name; the keyring user is the account id
pub const KEYRING_SERVICE: &str = "syndicast";

/// Secret fields for one account
#[derive(Default)]
pub struct Credentials {
    values: HashMap<String, SecretString>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        self.values
            .insert(field.to_string(), SecretString::from(value.into()));
    }

    pub fn get(&self, field: &str) -> Option<&SecretString> {
        self.values.get(field)
    }

    /// A field that must be present and non-blank
    pub fn require(&self, platform: &str, field: &str) -> Result<SecretString> {
        match self.value(field) {
            Some(value) => Ok(SecretString::from(value)),
            None => Err(CredentialError::MissingField {
                platform: platform.to_string(),
                field: field.to_string(),
            }
            .into()),
        }
    }

    /// A non-secret field (e.g. a page id), if present and non-blank
    pub fn value(&self, field: &str) -> Option<String> {
        self.values
            .get(field)
            .map(|v| v.expose_secret().trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.values.keys().map(String::as_str).collect();
        fields.sort_unstable();
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn to_json(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.expose_secret().to_string())))
            .collect();
        serde_json::Value::Object(map).to_string()
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), SecretString::from(v.expose_secret().to_string())))
                .collect(),
        }
    }
}

// Field names only.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("fields", &self.fields())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut credentials = Credentials::new();
        for (k, v) in iter {
            credentials.insert(&k.into(), v);
        }
        credentials
    }
}

/// Lookup of credential bundles by account
pub trait CredentialStore: Send + Sync {
    /// The bundle for `account`, or `None` if nothing is stored for it
    fn credentials_for(&self, account: &Account) -> Result<Option<Credentials>>;

    /// Store (replace) the bundle for `account_id`
    fn store(&self, account_id: &str, credentials: &Credentials) -> Result<()>;

    /// Remove the bundle for `account_id`. Missing bundles are not an error.
    fn delete(&self, account_id: &str) -> Result<()>;

    /// Name of the backend (for logs and diagnostics)
    fn backend_name(&self) -> &str;
}

/// Build the store selected in configuration
pub fn store_from_config(config: &CredentialConfig) -> Box<dyn CredentialStore> {
    match config.storage {
        StorageBackend::File => Box::new(FileCredentialStore::new(config.expand_path())),
        StorageBackend::Keyring => Box::new(KeyringCredentialStore::new()),
    }
}

/// Parse a JSON object of string fields into a bundle
fn parse_json_bundle(account_id: &str, raw: &str) -> Result<Credentials> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        CredentialError::Parse(format!("bundle for account {}: {}", account_id, e))
    })?;
    let object = value.as_object().ok_or_else(|| {
        CredentialError::Parse(format!("bundle for account {} is not an object", account_id))
    })?;

    let mut credentials = Credentials::new();
    for (field, value) in object {
        let value = value.as_str().ok_or_else(|| {
            CredentialError::Parse(format!(
                "field '{}' for account {} must be a string",
                field, account_id
            ))
        })?;
        credentials.insert(field, value);
    }
    Ok(credentials)
}

/// TOML file store
///
/// The file is re-read on every lookup so rotated tokens are picked up
/// without a restart.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_table(&self) -> Result<toml::Table> {
        if !self.path.exists() {
            return Ok(toml::Table::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(CredentialError::Io)?;
        let table: toml::Table = toml::from_str(&content)
            .map_err(|e| CredentialError::Parse(format!("{}: {}", self.path.display(), e)))?;
        Ok(table)
    }

    fn write_table(&self, table: &toml::Table) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(CredentialError::Io)?;
        }
        let content = toml::to_string(table)
            .map_err(|e| CredentialError::Parse(format!("serialize credentials: {}", e)))?;
        std::fs::write(&self.path, content).map_err(CredentialError::Io)?;

        // Set file permissions to 600 on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms).map_err(CredentialError::Io)?;
        }

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn credentials_for(&self, account: &Account) -> Result<Option<Credentials>> {
        let table = self.read_table()?;
        let Some(entry) = table.get(&account.id) else {
            return Ok(None);
        };

        let fields = entry.as_table().ok_or_else(|| {
            CredentialError::Parse(format!("entry for account {} is not a table", account.id))
        })?;

        let mut credentials = Credentials::new();
        for (field, value) in fields {
            let value = value.as_str().ok_or_else(|| {
                CredentialError::Parse(format!(
                    "field '{}' for account {} must be a string",
                    field, account.id
                ))
            })?;
            credentials.insert(field, value);
        }

        tracing::debug!(account_id = %account.id, "Loaded credentials from file");
        Ok(Some(credentials))
    }

    fn store(&self, account_id: &str, credentials: &Credentials) -> Result<()> {
        let mut table = self.read_table()?;
        let entry: toml::Table = credentials
            .values
            .iter()
            .map(|(k, v)| (k.clone(), toml::Value::String(v.expose_secret().to_string())))
            .collect();
        table.insert(account_id.to_string(), toml::Value::Table(entry));
        self.write_table(&table)?;

        tracing::debug!(account_id, "Stored credentials in file");
        Ok(())
    }

    fn delete(&self, account_id: &str) -> Result<()> {
        let mut table = self.read_table()?;
        if table.remove(account_id).is_some() {
            self.write_table(&table)?;
        }
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "file"
    }
}

/// OS keyring store (macOS Keychain, Windows Credential Manager, Secret Service)
#[derive(Default)]
pub struct KeyringCredentialStore;

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(account_id: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, account_id)
            .map_err(|e| CredentialError::KeyringUnavailable(e.to_string()).into())
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn credentials_for(&self, account: &Account) -> Result<Option<Credentials>> {
        let entry = Self::entry(&account.id)?;
        match entry.get_password() {
            Ok(raw) => {
                tracing::debug!(account_id = %account.id, "Retrieved credentials from OS keyring");
                parse_json_bundle(&account.id, &raw).map(Some)
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CredentialError::Keyring(e.to_string()).into()),
        }
    }

    fn store(&self, account_id: &str, credentials: &Credentials) -> Result<()> {
        let entry = Self::entry(account_id)?;
        entry
            .set_password(&credentials.to_json())
            .map_err(|e| CredentialError::Keyring(e.to_string()))?;

        tracing::debug!(account_id, "Stored credentials in OS keyring");
        Ok(())
    }

    fn delete(&self, account_id: &str) -> Result<()> {
        let entry = Self::entry(account_id)?;
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CredentialError::Keyring(e.to_string()).into()),
        }
    }

    fn backend_name(&self) -> &str {
        "keyring"
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryCredentialStore {
    bundles: RwLock<HashMap<String, Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style store
    pub fn with(self, account_id: &str, credentials: Credentials) -> Self {
        self.bundles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(account_id.to_string(), credentials);
        self
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credentials_for(&self, account: &Account) -> Result<Option<Credentials>> {
        let bundles = self
            .bundles
            .read()
            .map_err(|_| CredentialError::Keyring("credential map poisoned".to_string()))?;
        Ok(bundles.get(&account.id).cloned())
    }

    fn store(&self, account_id: &str, credentials: &Credentials) -> Result<()> {
        let mut bundles = self
            .bundles
            .write()
            .map_err(|_| CredentialError::Keyring("credential map poisoned".to_string()))?;
        bundles.insert(account_id.to_string(), credentials.clone());
        Ok(())
    }

    fn delete(&self, account_id: &str) -> Result<()> {
        let mut bundles = self
            .bundles
            .write()
            .map_err(|_| CredentialError::Keyring("credential map poisoned".to_string()))?;
        bundles.remove(account_id);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyndicastError;
    use tempfile::TempDir;

    #[test]
    fn test_require_missing_field() {
        let credentials = Credentials::new().with("page_id", "42");

        let result = credentials.require("facebook", "access_token");
        match result {
            Err(SyndicastError::Credential(CredentialError::MissingField { platform, field })) => {
                assert_eq!(platform, "facebook");
                assert_eq!(field, "access_token");
            }
            _ => panic!("Expected MissingField"),
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let credentials = Credentials::new().with("bearer_token", "   ");
        assert!(credentials.require("twitter", "bearer_token").is_err());
        assert!(credentials.value("bearer_token").is_none());
    }

    #[test]
    fn test_debug_hides_values() {
        let credentials = Credentials::new().with("access_token", "very-secret-token");
        let debug = format!("{:?}", credentials);

        assert!(debug.contains("access_token"));
        assert!(!debug.contains("very-secret-token"));
    }

    #[test]
    fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(temp_dir.path().join("creds").join("credentials.toml"));
        let account = Account::new("facebook", None);

        assert!(store.credentials_for(&account).unwrap().is_none());

        store
            .store(
                &account.id,
                &Credentials::new()
                    .with("access_token", "EAAB123")
                    .with("page_id", "987"),
            )
            .unwrap();

        let loaded = store.credentials_for(&account).unwrap().unwrap();
        assert_eq!(loaded.value("page_id").as_deref(), Some("987"));
        assert_eq!(
            loaded.require("facebook", "access_token").unwrap().expose_secret(),
            "EAAB123"
        );

        store.delete(&account.id).unwrap();
        assert!(store.credentials_for(&account).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.toml");
        let store = FileCredentialStore::new(path.clone());
        store
            .store("acct", &Credentials::new().with("bearer_token", "t"))
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_store_rejects_non_string_field() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.toml");
        let mut account = Account::new("twitter", None);
        account.id = "acct-1".to_string();
        std::fs::write(&path, "[acct-1]\nbearer_token = 12\n").unwrap();

        let store = FileCredentialStore::new(path);
        let result = store.credentials_for(&account);
        assert!(matches!(
            result,
            Err(SyndicastError::Credential(CredentialError::Parse(_)))
        ));
    }

    #[test]
    fn test_parse_json_bundle() {
        let credentials =
            parse_json_bundle("a", r#"{"access_token":"tok","page_id":"1"}"#).unwrap();
        assert_eq!(credentials.fields(), vec!["access_token", "page_id"]);

        assert!(parse_json_bundle("a", "[]").is_err());
        assert!(parse_json_bundle("a", r#"{"page_id":1}"#).is_err());
        assert!(parse_json_bundle("a", "not json").is_err());
    }

    #[test]
    fn test_json_bundle_round_trip() {
        let credentials = Credentials::new().with("bearer_token", "abc");
        let parsed = parse_json_bundle("a", &credentials.to_json()).unwrap();
        assert_eq!(parsed.value("bearer_token").as_deref(), Some("abc"));
    }

    #[test]
    fn test_memory_store() {
        let account = Account::new("linkedin", None);
        let store = MemoryCredentialStore::new()
            .with(&account.id, Credentials::new().with("access_token", "x"));

        assert!(store.credentials_for(&account).unwrap().is_some());
        store.delete(&account.id).unwrap();
        assert!(store.credentials_for(&account).unwrap().is_none());
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_memory_store_with_survives_poisoned_lock() {
        let store = MemoryCredentialStore::new();
        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.bundles.write().unwrap();
            panic!("writer died holding the lock");
        }));
        assert!(poisoned.is_err());
        assert!(store.bundles.is_poisoned());

        let store = store.with("acct-1", Credentials::new().with("bearer_token", "t"));

        let bundles = store.bundles.read().unwrap_or_else(PoisonError::into_inner);
        assert!(bundles.contains_key("acct-1"));
    }
}
