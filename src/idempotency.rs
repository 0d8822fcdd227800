use crate::models::ImportResponse;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

const KEY_PREFIX: &str = "maison:import:idem:";

fn namespaced(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// Replayed response for `key`, if one was stored. Redis failures read as a miss.
pub async fn redis_get(client: &redis::Client, key: &str) -> Option<ImportResponse> {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(err) => {
            warn!(target = "maison.api", error = %err, "idempotency_redis_unavailable");
            return None;
        }
    };
    let s: Option<String> = conn.get(namespaced(key)).await.ok();
    s.and_then(|v| serde_json::from_str(&v).ok())
}

pub async fn redis_set(client: &redis::Client, key: &str, value: &ImportResponse, ttl_secs: u64) {
    if let Ok(mut conn) = client.get_multiplexed_async_connection().await
        && let Ok(json) = serde_json::to_string(value)
    {
        let stored: Result<(), _> = conn.set_ex(namespaced(key), json, ttl_secs).await;
        if let Err(err) = stored {
            warn!(target = "maison.api", error = %err, "idempotency_store_failed");
        }
    }
}

/// Outcome of claiming a key in the in-memory store.
#[derive(Debug)]
pub enum Claim {
    /// A finished import already answered this key.
    Replay(ImportResponse),
    /// Another request holds the key and has not finished.
    InFlight,
    /// The caller now holds the key and must `complete` or `release` it.
    Claimed,
}

struct Entry {
    response: Option<ImportResponse>,
    expires_at: Instant,
}

/// Process-local replay store used when Redis is not configured.
///
/// A key is claimed before the import runs, so a concurrent retry with the
/// same key is turned away instead of committing the batch twice. Claims and
/// stored responses both expire after `ttl`; an abandoned claim cannot pin a
/// key forever.
#[derive(Clone)]
pub struct MemoryIdempotency {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl MemoryIdempotency {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn claim(&self, key: &str) -> Claim {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        match entries.get(key) {
            Some(Entry {
                response: Some(response),
                ..
            }) => Claim::Replay(response.clone()),
            Some(_) => Claim::InFlight,
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        response: None,
                        expires_at: now + self.ttl,
                    },
                );
                Claim::Claimed
            }
        }
    }

    pub async fn complete(&self, key: &str, response: &ImportResponse) {
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                response: Some(response.clone()),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drops an unfinished claim so the key can be retried.
    pub async fn release(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|entry| entry.response.is_none()) {
            entries.remove(key);
        }
    }
}
