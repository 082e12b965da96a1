use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

const TEXT_KEY_NAMESPACE: &str = "json:";
const IMAGE_KEY_NAMESPACE: &str = "image:";

#[derive(Debug, Clone, PartialEq)]
pub enum CachedResponse {
    Character(Value),
    ImageUrl(String),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    stored_at: Instant,
    value: CachedResponse,
}

/// In-memory response cache shared by both pipelines.
///
/// Entries expire `ttl` after they were written. Expired entries are never
/// returned: `get` drops them on sight and `purge_expired` sweeps the rest.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        ResponseCache {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        self.get_at(key, Instant::now())
    }

    pub fn set(&self, key: impl Into<String>, value: CachedResponse) {
        self.set_at(key, value, Instant::now());
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) >= self.ttl
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<CachedResponse> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !self.is_expired(entry, now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write();
        // Another task may have refreshed the entry between the two locks.
        match entries.get(key) {
            Some(entry) if !self.is_expired(entry, now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set_at(&self, key: impl Into<String>, value: CachedResponse, now: Instant) {
        let entry = CacheEntry {
            stored_at: now,
            value,
        };
        self.entries.write().insert(key.into(), entry);
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        before - entries.len()
    }
}

/// Periodically drops expired entries so idle keys do not pile up.
pub fn spawn_cache_sweeper(cache: Arc<ResponseCache>, interval: Duration) {
    if interval.is_zero() {
        info!("Cache sweeper disabled; expired entries are dropped on read only");
        return;
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                debug!(
                    "Cache sweeper removed {} expired entries ({} remaining)",
                    removed,
                    cache.len()
                );
            }
        }
    });
}

pub fn text_cache_key(prompt: &str) -> String {
    format!("{TEXT_KEY_NAMESPACE}{prompt}")
}

pub fn image_cache_key(document: &Value) -> String {
    format!("{IMAGE_KEY_NAMESPACE}{}", canonical_json(document))
}

/// Serializes `value` with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
