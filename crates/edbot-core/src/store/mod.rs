//! Override store
//!
//! The override store is the shared key-value store holding runtime flag
//! overrides. It is usually Redis; an in-process implementation exists for
//! local development and tests.
//!
//! Keys are namespaced as `flag:<name>`.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Namespace prefix for flag override keys
pub const FLAG_KEY_PREFIX: &str = "flag:";

/// Glob matching every flag override key
pub const FLAG_KEY_PATTERN: &str = "flag:*";

/// Errors raised by override store backends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached
    #[error("Store connection error: {0}")]
    Connection(String),

    /// The store rejected or failed a command
    #[error("Store backend error: {0}")]
    Backend(String),

    /// A value could not be encoded or decoded
    #[error("Store serialization error: {0}")]
    Serialization(String),

    /// The command did not complete in time
    #[error("Store operation timed out: {0}")]
    Timeout(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Remaining lifetime of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Expires after this many seconds
    Expires(u64),
    /// Exists with no expiration
    Persistent,
    /// Does not exist
    Missing,
}

impl KeyTtl {
    /// Map a Redis `TTL` reply (`-2` missing, `-1` no expiry)
    pub fn from_redis_reply(reply: i64) -> Self {
        match reply {
            -2 => KeyTtl::Missing,
            n if n < 0 => KeyTtl::Persistent,
            n => KeyTtl::Expires(n as u64),
        }
    }

    /// Seconds remaining, if the key expires
    pub fn seconds(&self) -> Option<u64> {
        match self {
            KeyTtl::Expires(secs) => Some(*secs),
            _ => None,
        }
    }
}

/// Key-value store for flag overrides
///
/// Implementations must be cheap to share across tasks. Per-key `get`, `set`
/// and `delete` are assumed atomic; nothing stronger is required.
#[async_trait::async_trait]
pub trait OverrideStore: Send + Sync + fmt::Debug {
    /// Short backend name, e.g. `redis`
    fn provider_name(&self) -> &'static str;

    /// Fetch a value; `None` when the key is absent or expired
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store a value, expiring after `ttl` when given
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Delete keys in one batch, returning how many existed
    async fn delete(&self, keys: &[String]) -> StoreResult<u64>;

    /// Keys matching a glob pattern (`*` and `?`)
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Remaining lifetime of a key
    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl>;

    /// Round-trip liveness check
    async fn ping(&self) -> StoreResult<bool>;

    /// Best-effort server information (version, memory, clients)
    async fn info(&self) -> StoreResult<HashMap<String, String>> {
        Ok(HashMap::new())
    }
}

/// Store key for a flag name
pub fn flag_key(name: &str) -> String {
    format!("{}{}", FLAG_KEY_PREFIX, name)
}

/// Flag name for a store key, if it is in the flag namespace
pub fn flag_name_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(FLAG_KEY_PREFIX).filter(|name| !name.is_empty())
}
