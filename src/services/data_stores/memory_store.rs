use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{KeyTtl, KeyValueStore, ScanPage, StoreError};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process TTL map with the same semantics as the Redis store.
///
/// Suitable for tests and single-instance deployments; nothing is shared
/// between processes.
#[derive(Default)]
pub struct MemoryStore {
    // key -> entry; expired entries are dropped lazily
    entries: RwLock<HashMap<String, Entry>>,
    // open scan cursor -> last key returned
    cursors: RwLock<HashMap<u64, String>>,
    last_cursor: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.write().await.retain(|_, e| e.is_live(now));
    }
}

fn deadline(ttl_secs: u64) -> Option<Instant> {
    // Clamp TTL to at least 1 second to avoid immediate expiration
    Some(Instant::now() + Duration::from_secs(ttl_secs.max(1)))
}

/// Redis-style glob supporting `*` only.
fn glob_match(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or("");
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: deadline(ttl_secs),
            },
        );
        Ok(())
    }

    async fn set_nx_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: deadline(ttl_secs),
            },
        );
        Ok(true)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|e| e.is_live(now)))
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                value: "0".to_string(),
                expires_at: None,
            });
        if !entry.is_live(now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }
        let next = entry
            .value
            .parse::<i64>()
            .map_err(|_| StoreError::Backend(format!("value at {key} is not an integer")))?
            + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key).filter(|e| e.is_live(now)) {
            Some(entry) => {
                entry.expires_at = deadline(ttl_secs);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(match entries.get(key).filter(|e| e.is_live(now)) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expiring(at.saturating_duration_since(now).as_secs()),
        })
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, StoreError> {
        // Resume after the last key handed out, so keys deleted mid-scan never
        // shift the remaining ones out of view.
        let after = match cursor {
            0 => None,
            c => match self.cursors.write().await.remove(&c) {
                Some(key) => Some(key),
                None => return Ok(ScanPage::default()),
            },
        };

        self.purge_expired().await;
        let entries = self.entries.read().await;
        let mut keys: Vec<&String> = entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .filter(|k| after.as_ref().map_or(true, |a| k.as_str() > a.as_str()))
            .collect();
        keys.sort();

        let take = count.max(1);
        if keys.len() <= take {
            return Ok(ScanPage {
                cursor: 0,
                keys: keys.into_iter().cloned().collect(),
            });
        }

        let page: Vec<String> = keys[..take].iter().map(|k| k.to_string()).collect();
        let next = self.last_cursor.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(last) = page.last() {
            self.cursors.write().await.insert(next, last.clone());
        }
        Ok(ScanPage {
            cursor: next,
            keys: page,
        })
    }
}
