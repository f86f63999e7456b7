//! In-process override store
//!
//! A moka cache with per-key expiry. Selected with a `memory://` store URL
//! for local development and used throughout the tests, where
//! `set_unavailable` simulates an unreachable store.

use super::{KeyTtl, OverrideStore, StoreError, StoreResult};
use moka::future::Cache;
use moka::Expiry;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Option<Duration>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            ttl,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Each write sets the key's expiry from its own TTL, like Redis `SET EX`
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

/// In-memory implementation of [`OverrideStore`]
pub struct MemoryStore {
    entries: Cache<String, Entry>,
    unavailable: AtomicBool,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entry_count", &self.entries.entry_count())
            .field("unavailable", &self.unavailable.load(Ordering::SeqCst))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().expire_after(EntryExpiry).build(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every operation fail with a connection error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Connection("memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }

    async fn live(&self, key: &str) -> Option<Entry> {
        let now = Instant::now();
        self.entries
            .get(key)
            .await
            .filter(|entry| !entry.is_expired(now))
    }
}

#[async_trait::async_trait]
impl OverrideStore for MemoryStore {
    fn provider_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_available()?;
        Ok(self.live(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.check_available()?;
        self.entries
            .insert(key.to_string(), Entry::new(value, ttl))
            .await;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<u64> {
        self.check_available()?;
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = self.entries.remove(key).await {
                if !entry.is_expired(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.check_available()?;
        let matcher = glob_to_regex(pattern)?;
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired(now) && matcher.is_match(key))
            .map(|(key, _)| key.to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        self.check_available()?;
        let now = Instant::now();
        Ok(match self.live(key).await {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(now).as_secs()),
        })
    }

    async fn ping(&self) -> StoreResult<bool> {
        self.check_available()?;
        Ok(true)
    }

    async fn info(&self) -> StoreResult<HashMap<String, String>> {
        self.check_available()?;
        let mut info = HashMap::new();
        info.insert("provider".to_string(), "memory".to_string());
        info.insert("keys".to_string(), self.len().to_string());
        Ok(info)
    }
}

fn glob_to_regex(pattern: &str) -> StoreResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| StoreError::Backend(format!("invalid key pattern: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set("flag:a", "true", None).await.unwrap();

        assert_eq!(store.get("flag:a").await.unwrap().as_deref(), Some("true"));
        assert_eq!(store.delete(&["flag:a".to_string()]).await.unwrap(), 1);
        assert_eq!(store.get("flag:a").await.unwrap(), None);
        assert_eq!(store.delete(&["flag:a".to_string()]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expiry() {
        let store = MemoryStore::new();
        store
            .set("flag:short", "true", Some(Duration::from_millis(30)))
            .await
            .unwrap();
        assert!(matches!(store.ttl("flag:short").await.unwrap(), KeyTtl::Expires(_)));

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.get("flag:short").await.unwrap(), None);
        assert_eq!(store.ttl("flag:short").await.unwrap(), KeyTtl::Missing);
        assert!(store.keys("flag:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ttl_variants() {
        let store = MemoryStore::new();
        store.set("flag:perm", "false", None).await.unwrap();
        store
            .set("flag:temp", "true", Some(Duration::from_secs(600)))
            .await
            .unwrap();

        assert_eq!(store.ttl("flag:perm").await.unwrap(), KeyTtl::Persistent);
        assert_eq!(store.ttl("flag:missing").await.unwrap(), KeyTtl::Missing);
        match store.ttl("flag:temp").await.unwrap() {
            KeyTtl::Expires(secs) => assert!(secs > 590 && secs <= 600),
            other => panic!("unexpected ttl {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_keys_glob() {
        let store = MemoryStore::new();
        store.set("flag:one", "true", None).await.unwrap();
        store.set("flag:two", "true", None).await.unwrap();
        store.set("session:x", "1", None).await.unwrap();
        store.set("flag.dot", "1", None).await.unwrap();

        assert_eq!(
            store.keys("flag:*").await.unwrap(),
            vec!["flag:one".to_string(), "flag:two".to_string()]
        );
        assert_eq!(store.keys("flag:on?").await.unwrap(), vec!["flag:one".to_string()]);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(matches!(store.get("flag:a").await, Err(StoreError::Connection(_))));
        assert!(store.ping().await.is_err());

        store.set_unavailable(false);
        assert!(store.ping().await.unwrap());
    }
}
