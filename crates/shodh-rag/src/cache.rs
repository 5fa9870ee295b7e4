//! QueryCache (C8) — exact-match, TTL-bounded result cache.
//!
//! Grounded on `original_source/l88_backend/cache.py`. That implementation's
//! `cache_invalidate_session` inspects `entry["session_id"]`, a field never
//! actually stored on a cache entry, so it never matches anything in
//! practice. This keeps a real `session_id -> key set` secondary index
//! instead (see DESIGN.md "Open Question Decisions").

use dashmap::{DashMap, DashSet};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Clone)]
struct CacheEntry<T> {
    value: T,
    ts: i64,
}

pub struct QueryCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    by_session: DashMap<String, Arc<DashSet<String>>>,
    ttl_seconds: i64,
}

impl<T: Clone> QueryCache<T> {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            entries: DashMap::new(),
            by_session: DashMap::new(),
            ttl_seconds,
        }
    }

    fn make_key(session_id: &str, query: &str) -> String {
        let normalized = query.trim().to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(session_id.as_bytes());
        hasher.update(b":");
        hasher.update(normalized.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Returns `None` if absent or expired. An expired entry is evicted on
    /// read (a concurrent reader that raced the expiry check may observe a
    /// stale hit; per distilled §5 that is acceptable).
    pub fn get(&self, session_id: &str, query: &str) -> Option<T> {
        let key = Self::make_key(session_id, query);
        let now = chrono::Utc::now().timestamp();
        let hit = self.entries.get(&key).map(|e| (e.value.clone(), e.ts));
        match hit {
            Some((value, ts)) if now - ts <= self.ttl_seconds => Some(value),
            Some(_) => {
                self.entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, session_id: &str, query: &str, value: T) {
        let key = Self::make_key(session_id, query);
        self.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                ts: chrono::Utc::now().timestamp(),
            },
        );
        self.by_session
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(DashSet::new()))
            .insert(key);
    }

    /// Removes every entry associated with `session_id`.
    pub fn invalidate(&self, session_id: &str) {
        if let Some((_, keys)) = self.by_session.remove(session_id) {
            for key in keys.iter() {
                self.entries.remove(&*key);
            }
        }
    }
}
