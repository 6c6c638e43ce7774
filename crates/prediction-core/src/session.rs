//! Session Manager
//!
//! Owns session records and mediates every call into the stateless core
//! engine: load the session, run the pure `observe`/`learn`/`predict`
//! function with the session's state and effective config, persist the
//! returned state, touch `last_accessed`, and renew the TTL if
//! `auto_extend` is set. Expiry is enforced at access time; there is no
//! background sweep — the session store itself is responsible for eviction.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::instrument;

use crate::config::ConfigOverrides;
use crate::engine::EngineState;
use crate::tenant::TenantId;

/// Session-layer error type. Converts into [`crate::error::CoreError`] at
/// the engine boundary.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session expired: {0}")]
    Expired(String),
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}

/// Session-layer result alias.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Per-session state the core engine reads and writes on every call.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub tenant_id: TenantId,
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub ttl: Duration,
    pub auto_extend: bool,
    pub config: ConfigOverrides,
    pub state: EngineState,
}

impl SessionRecord {
    fn new(session_id: String, tenant_id: TenantId, ttl: Duration, auto_extend: bool) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            tenant_id,
            created_at: now,
            last_accessed: now,
            ttl,
            auto_extend,
            config: ConfigOverrides::default(),
            state: EngineState::default(),
        }
    }

    fn is_expired(&self) -> bool {
        self.last_accessed.elapsed() > self.ttl
    }
}

/// In-memory session store. Per-session critical sections are implemented
/// as one `Mutex` per record inside a map guarded by an outer `RwLock`, so
/// distinct sessions never contend on each other's lock — only insert and
/// remove take the outer write lock.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, std::sync::Mutex<SessionRecord>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Open a new session under `tenant_id`, returning its id.
    #[instrument(skip(self))]
    pub fn open(&self, tenant_id: TenantId, ttl: Duration, auto_extend: bool) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        let record = SessionRecord::new(session_id.clone(), tenant_id, ttl, auto_extend);
        self.sessions
            .write()
            .expect("session map lock poisoned")
            .insert(session_id.clone(), std::sync::Mutex::new(record));
        session_id
    }

    /// Run `f` against the session's record under its per-session critical
    /// section, touching `last_accessed` and renewing TTL if `auto_extend`.
    /// Returns `Expired`/`NotFound` without running `f` if the session is
    /// gone or past its TTL.
    pub fn with_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionRecord) -> T,
    ) -> Result<T> {
        let sessions = self.sessions.read().expect("session map lock poisoned");
        let entry = sessions
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        let mut record = entry.lock().expect("session record lock poisoned");

        if record.is_expired() {
            return Err(SessionError::Expired(session_id.to_string()));
        }

        let result = f(&mut record);
        if record.auto_extend {
            record.last_accessed = Instant::now();
        }
        Ok(result)
    }

    /// Remove a session immediately (used by callers that want to evict
    /// eagerly rather than waiting for lazy expiry-on-access).
    pub fn close(&self, session_id: &str) {
        self.sessions
            .write()
            .expect("session map lock poisoned")
            .remove(session_id);
    }

    /// Number of sessions currently tracked (expired or not).
    pub fn len(&self) -> usize {
        self.sessions.read().expect("session map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
