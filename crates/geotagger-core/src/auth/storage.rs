//! Durable key-value storage for session state.
//!
//! `KeyValueStore` is the host-provided persistent store: string keys,
//! string values, get/set/remove. It never returns errors. A backend that
//! cannot read reports the key as absent, and a backend that cannot write
//! logs the failure and drops it, so a session can always be opened even
//! when nothing can be persisted.
//!
//! `SessionStorage` sits on top and knows the four session keys.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use tracing::{debug, warn};

use crate::models::User;

/// Storage key for the serialized user record (JSON).
pub const USER_KEY: &str = "auth_user";
/// Storage key for the raw bearer credential.
pub const TOKEN_KEY: &str = "auth_token";
/// Storage key for the authorization scheme.
pub const TOKEN_TYPE_KEY: &str = "auth_token_type";
/// Storage key for the ISO-8601 expiry timestamp.
pub const TOKEN_EXPIRY_KEY: &str = "auth_token_expires_at";

/// Keychain service name used by `KeyringStore`.
const KEYRING_SERVICE: &str = "geotagger";

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);

    /// Whether writes can actually persist.
    fn is_available(&self) -> bool {
        true
    }
}

// ============================================================================
// Backends
// ============================================================================

/// In-memory store. Clones share the same map, which lets tests simulate
/// a restart by opening a second session over a clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&mut self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

/// Stand-in for a host without persistent storage: reads nothing,
/// drops every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&mut self, key: &str, _value: &str) {
        debug!(key, "Storage unavailable, dropping write");
    }

    fn remove(&mut self, _key: &str) {}

    fn is_available(&self) -> bool {
        false
    }
}

/// All keys in one JSON object file, rewritten through a temp file and
/// rename on every change.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data_dir>/geotagger/session.json`, or `None` when the
    /// platform has no data directory.
    pub fn in_data_dir() -> Option<Self> {
        dirs::data_dir().map(|dir| Self::new(dir.join("geotagger").join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&contents).context("Failed to parse session file")
    }

    /// Read the map, treating an unreadable file as empty.
    fn load(&self) -> HashMap<String, String> {
        self.read_map().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
            HashMap::new()
        })
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let contents = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, contents.as_bytes()).context("Failed to write session file")?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace session file")?;
        Ok(())
    }

    fn update(&mut self, f: impl FnOnce(&mut HashMap<String, String>)) {
        let mut map = self.load();
        f(&mut map);
        if let Err(e) = self.write_map(&map) {
            warn!(path = %self.path.display(), error = %e, "Failed to persist session");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&mut self, key: &str) {
        if !self.path.exists() {
            return;
        }
        self.update(|map| {
            map.remove(key);
        });
    }
}

/// Write `contents` to a fresh file readable only by the owner.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    // A leftover temp file keeps its old mode, so start from a new inode.
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// One OS keychain entry per key.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Option<Entry> {
        match Entry::new(&self.service, key) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "Failed to create keyring entry");
                None
            }
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.entry(key)?.get_password() {
            Ok(value) => Some(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read from keychain");
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.entry(key) {
            if let Err(e) = entry.set_password(value) {
                warn!(key, error = %e, "Failed to store value in keychain");
            }
        }
    }

    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entry(key) {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => warn!(key, error = %e, "Failed to delete keychain entry"),
            }
        }
    }
}

// ============================================================================
// Session adapter
// ============================================================================

/// Typed accessors for the four session fields over any `KeyValueStore`.
pub struct SessionStorage {
    backend: Box<dyn KeyValueStore>,
}

impl fmt::Debug for SessionStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStorage")
            .field("available", &self.backend.is_available())
            .finish()
    }
}

impl SessionStorage {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    // ===== User =====

    /// The stored user record. A corrupt record reads as absent.
    pub fn get_user(&self) -> Option<User> {
        let raw = self.backend.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Failed to parse stored user record");
                None
            }
        }
    }

    pub fn set_user(&mut self, user: &User) {
        match serde_json::to_string(user) {
            Ok(json) => self.backend.set(USER_KEY, &json),
            Err(e) => warn!(error = %e, "Failed to serialize user record"),
        }
    }

    pub fn clear_user(&mut self) {
        self.backend.remove(USER_KEY);
    }

    // ===== Access token =====

    pub fn get_token(&self) -> Option<String> {
        self.backend.get(TOKEN_KEY)
    }

    pub fn set_token(&mut self, token: &str) {
        self.backend.set(TOKEN_KEY, token);
    }

    pub fn clear_token(&mut self) {
        self.backend.remove(TOKEN_KEY);
    }

    // ===== Token type =====

    pub fn get_token_type(&self) -> Option<String> {
        self.backend.get(TOKEN_TYPE_KEY)
    }

    pub fn set_token_type(&mut self, token_type: &str) {
        self.backend.set(TOKEN_TYPE_KEY, token_type);
    }

    pub fn clear_token_type(&mut self) {
        self.backend.remove(TOKEN_TYPE_KEY);
    }

    // ===== Token expiry =====

    pub fn get_token_expiry(&self) -> Option<String> {
        self.backend.get(TOKEN_EXPIRY_KEY)
    }

    pub fn set_token_expiry(&mut self, expiry: &str) {
        self.backend.set(TOKEN_EXPIRY_KEY, expiry);
    }

    pub fn clear_token_expiry(&mut self) {
        self.backend.remove(TOKEN_EXPIRY_KEY);
    }

    /// Remove every session key.
    pub fn clear_all(&mut self) {
        self.clear_user();
        self.clear_token();
        self.clear_token_type();
        self.clear_token_expiry();
    }

    /// True when no expiry is stored, the stored expiry does not parse,
    /// or it is not in the future.
    pub fn is_token_expired(&self) -> bool {
        match self.get_token_expiry().as_deref().and_then(parse_expiry) {
            Some(expiry) => Utc::now() >= expiry,
            None => true,
        }
    }
}

/// Parse an ISO-8601 expiry. Accepts RFC 3339 and the offset-less
/// `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` forms, read as UTC.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
