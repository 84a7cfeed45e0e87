//! Session persistence layer
//!
//! Maps a user id to that user's conversation state. Entries expire a fixed
//! time after their last write and are only purged when looked up: there is
//! no background sweep, so a dead entry keeps occupying memory until the next
//! `get` for that user.

use crate::models::UserSession;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use tracing::debug;

/// Default time-to-live of a session, measured from its last write.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(10 * 60);

/// Held while a user's session is read, decided on and written back.
pub type SessionGuard = OwnedMutexGuard<()>;

/// Trait for session persistence
///
/// Contract:
/// - `set` overwrites unconditionally and restarts the TTL.
/// - `get` returns `None` for unknown users and for entries whose TTL has
///   elapsed; reads never extend an entry's life.
/// - `lock` serializes read-then-write per user. Callers that make a decision
///   from `get` and persist it with `set` must hold the guard across both.
///   Different users never contend.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserSession>>;
    async fn set(&self, session: UserSession) -> Result<()>;
    async fn expire(&self, user_id: &str) -> Result<()>;
    async fn lock(&self, user_id: &str) -> SessionGuard;
    /// Stored entries, including expired ones not yet looked up
    async fn len(&self) -> usize;
}

struct Entry {
    session: UserSession,
    expires_at: Instant,
}

/// In-process session store
pub struct InMemorySessionStore {
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserSession>> {
        let now = Instant::now();

        {
            let sessions = self.sessions.read().await;
            match sessions.get(user_id) {
                None => return Ok(None),
                Some(entry) if now < entry.expires_at => {
                    return Ok(Some(entry.session.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: purge, unless a writer refreshed it in between
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get(user_id) {
            if now < entry.expires_at {
                return Ok(Some(entry.session.clone()));
            }
            sessions.remove(user_id);
            debug!(user_id = %user_id, "Expired session purged");
        }

        Ok(None)
    }

    async fn set(&self, session: UserSession) -> Result<()> {
        let entry = Entry {
            expires_at: Instant::now() + self.ttl,
            session,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(entry.session.user_id.clone(), entry);
        Ok(())
    }

    async fn expire(&self, user_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(user_id);
        Ok(())
    }

    async fn lock(&self, user_id: &str) -> SessionGuard {
        let user_lock = {
            let mut locks = self.locks.lock().await;

            // Drop locks nobody holds or waits on
            locks.retain(|_, l| Arc::strong_count(l) > 1);

            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        user_lock.lock_owned().await
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
