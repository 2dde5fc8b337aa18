//! Session store: a per-session TTL cache holding the state a
//! research conversation accumulates across turns.
//!
//! In-memory, grounded on `InMemoryCheckpointer`'s
//! `Arc<RwLock<HashMap<String, ThreadStorage<S>>>>` idiom. `SessionLocks`
//! hands out one `tokio::sync::Mutex` per session id, mirroring the same
//! file's per-thread storage keying, so a caller can hold a session-scoped
//! guard across the whole request instead of just across one map access. A
//! background reaper evicts entries whose sliding TTL expired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

/// Subset of a Paper plus the grading outcome, as cached for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedPaper {
    pub pmid: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub publication_year: Option<i32>,
    pub journal: Option<String>,
    pub relevance_score: f64,
    pub methodology_score: f64,
    pub study_type: String,
    pub quality_score: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub original_query: String,
    pub query_embedding: Vec<f32>,
    pub retrieved_papers: Vec<CachedPaper>,
    pub synthesis_summary: String,
    pub turn_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(session_id: Uuid, original_query: String, query_embedding: Vec<f32>, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            original_query,
            query_embedding,
            retrieved_papers: Vec::new(),
            synthesis_summary: String::new(),
            turn_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Formats the cache key: `aesop:session:{id}`.
pub fn session_key(session_id: &Uuid) -> String {
    format!("aesop:session:{session_id}")
}

pub struct SessionStore {
    entries: Arc<RwLock<HashMap<String, SessionContext>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Arc::new(RwLock::new(HashMap::new())), ttl }
    }

    pub async fn get(&self, session_id: &Uuid) -> Option<SessionContext> {
        let key = session_key(session_id);
        let entries = self.entries.read().await;
        let ctx = entries.get(&key)?;
        if is_expired(ctx.updated_at, self.ttl) {
            return None;
        }
        Some(ctx.clone())
    }

    /// Writes or replaces a session and resets its sliding TTL.
    pub async fn put(&self, mut ctx: SessionContext, now: DateTime<Utc>) {
        ctx.updated_at = now;
        let key = session_key(&ctx.session_id);
        let mut entries = self.entries.write().await;
        entries.insert(key, ctx);
    }

    pub async fn delete(&self, session_id: &Uuid) -> bool {
        let key = session_key(session_id);
        let mut entries = self.entries.write().await;
        entries.remove(&key).is_some()
    }

    /// Removes every entry whose sliding TTL has lapsed as of `now`. Intended
    /// to be called from a periodic background task.
    pub async fn reap_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, ctx| !is_expired_as_of(ctx.updated_at, self.ttl, now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Hands out a per-session `Mutex` so a caller can serialize an entire
/// request against concurrent requests on the same session, not just a
/// single store access.
#[derive(Clone, Default)]
pub struct SessionLocks {
    locks: Arc<RwLock<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        let existing = self.locks.read().await.get(&session_id).cloned();
        let lock = match existing {
            Some(lock) => lock,
            None => {
                let mut locks = self.locks.write().await;
                locks.entry(session_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
            }
        };
        lock.lock_owned().await
    }
}

fn is_expired(updated_at: DateTime<Utc>, ttl: Duration) -> bool {
    is_expired_as_of(updated_at, ttl, Utc::now())
}

fn is_expired_as_of(updated_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    let age = now.signed_duration_since(updated_at);
    age.to_std().map(|age| age > ttl).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn sample(now: DateTime<Utc>) -> SessionContext {
        SessionContext::new(Uuid::new_v4(), "KRAS inhibitors".to_string(), vec![0.0; 1536], now)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let now = Utc::now();
        let ctx = sample(now);
        let id = ctx.session_id;
        store.put(ctx, now).await;

        let fetched = store.get(&id).await.unwrap();
        assert_eq!(fetched.original_query, "KRAS inhibitors");
    }

    #[tokio::test]
    async fn get_after_ttl_expiry_returns_none() {
        let store = SessionStore::new(Duration::from_secs(60));
        let stale = Utc::now() - ChronoDuration::seconds(120);
        let ctx = sample(stale);
        let id = ctx.session_id;
        store.put(ctx, stale).await;

        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let now = Utc::now();
        let ctx = sample(now);
        let id = ctx.session_id;
        store.put(ctx, now).await;

        assert!(store.delete(&id).await);
        assert!(!store.delete(&id).await);
    }

    #[tokio::test]
    async fn reap_expired_evicts_only_stale_entries() {
        let store = SessionStore::new(Duration::from_secs(60));
        let now = Utc::now();
        let fresh = sample(now);
        let stale = sample(now - ChronoDuration::seconds(120));
        let fresh_id = fresh.session_id;
        let stale_id = stale.session_id;
        store.put(fresh, now).await;
        store.put(stale, now - ChronoDuration::seconds(120)).await;

        let reaped = store.reap_expired(now).await;
        assert_eq!(reaped, 1);
        assert!(store.get(&fresh_id).await.is_some());
        assert!(store.get(&stale_id).await.is_none());
    }

    #[tokio::test]
    async fn session_locks_serialize_same_session_id() {
        let locks = SessionLocks::new();
        let id = Uuid::new_v4();
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3 {
            let locks = locks.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
                order.lock().await.push(i);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(order.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn session_locks_are_independent_across_sessions() {
        let locks = SessionLocks::new();
        let a = locks.acquire(Uuid::new_v4()).await;
        let b = locks.acquire(Uuid::new_v4()).await;
        drop(a);
        drop(b);
    }
}
