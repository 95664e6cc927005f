//! Per-stream session storage.
//!
//! One session bridges the split decode/encode callback sequences of one
//! transcoded exchange. The store is scoped to a single worker thread's
//! streams, so no locking happens here; hosts running per-thread filter
//! chains own one store per instance.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use bridge_core::HttpMethodAndPath;
use bytes::BytesMut;
use thiserror::Error;
use tracing::debug;

/// Stream identifier assigned by the host, unique per exchange.
pub type SessionId = u64;

/// How long an untouched session survives before the sweep reclaims it.
/// Abandoned half-streams have no cancellation callback, so the sweep is
/// the only cleanup guarantee; the bound is best-effort, not exact.
pub const DEFAULT_STALE_SESSION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} already exists")]
    AlreadyExists(SessionId),

    #[error("no session found for stream {0}")]
    NotFound(SessionId),
}

/// Mutable per-call state. Buffers are cleared as soon as a transcoding
/// step consumes them; partial state is never forwarded.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub method_and_path: Option<HttpMethodAndPath>,
    pub decoder_data: BytesMut,
    pub encoder_data: BytesMut,
    pub response_status: Option<u16>,
    pub response_content_type: Option<String>,
    last_access: Instant,
}

impl Session {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            method_and_path: None,
            decoder_data: BytesMut::new(),
            encoder_data: BytesMut::new(),
            response_status: None,
            response_content_type: None,
            last_access: Instant::now(),
        }
    }
}

/// Owner of all sessions for one filter instance.
#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<SessionId, Session>,
    stale_after: Duration,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_stale_timeout(DEFAULT_STALE_SESSION_TIMEOUT)
    }

    pub fn with_stale_timeout(stale_after: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            stale_after,
        }
    }

    /// Open a scoped guard for one callback invocation. Sessions touched
    /// through the guard are deleted when it drops unless
    /// [`SessionGuard::keep_accessed_sessions_alive`] was called, so an
    /// error path inside one callback can never leak a session.
    pub fn guard(&mut self) -> SessionGuard<'_> {
        SessionGuard {
            store: self,
            touched: HashSet::new(),
            keep_alive: false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped accessor tracking every session touched during its lifetime.
pub struct SessionGuard<'a> {
    store: &'a mut SessionStore,
    touched: HashSet<SessionId>,
    keep_alive: bool,
}

impl SessionGuard<'_> {
    /// Create a new session. A second create before cleanup is a caller
    /// bug and is surfaced as an error, never silently overwritten.
    pub fn create_session(&mut self, id: SessionId) -> Result<&mut Session, SessionError> {
        if self.store.sessions.contains_key(&id) {
            return Err(SessionError::AlreadyExists(id));
        }
        self.touched.insert(id);
        Ok(self
            .store
            .sessions
            .entry(id)
            .or_insert_with(|| Session::new(id)))
    }

    /// Look up an existing session and refresh its last-access time.
    pub fn lookup_session(&mut self, id: SessionId) -> Result<&mut Session, SessionError> {
        let session = self
            .store
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;
        self.touched.insert(id);
        session.last_access = Instant::now();
        Ok(session)
    }

    /// Keep every session touched through this guard alive past guard
    /// destruction, because the exchange is not finished yet.
    pub fn keep_accessed_sessions_alive(&mut self) {
        self.keep_alive = true;
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if !self.keep_alive {
            for id in self.touched.drain() {
                self.store.sessions.remove(&id);
            }
        }

        // Independently of keep-alive, sweep sessions nothing has touched
        // for longer than the stale threshold.
        let stale_after = self.store.stale_after;
        let now = Instant::now();
        self.store.sessions.retain(|id, session| {
            let stale = now.duration_since(session.last_access) > stale_after;
            if stale {
                debug!(session = *id, "sweeping stale session");
            }
            !stale
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::HttpMethod;

    #[test]
    fn test_create_then_lookup_returns_same_state() {
        let mut store = SessionStore::new();
        let mut guard = store.guard();

        let session = guard.create_session(7).unwrap();
        session.method_and_path = Some(HttpMethodAndPath::new(HttpMethod::Post, "/a/B"));
        session.decoder_data.extend_from_slice(b"abc");
        guard.keep_accessed_sessions_alive();
        drop(guard);

        let mut guard = store.guard();
        let session = guard.lookup_session(7).unwrap();
        assert_eq!(&session.decoder_data[..], b"abc");
        assert_eq!(
            session.method_and_path,
            Some(HttpMethodAndPath::new(HttpMethod::Post, "/a/B"))
        );
    }

    #[test]
    fn test_duplicate_create_fails() {
        let mut store = SessionStore::new();
        let mut guard = store.guard();
        guard.create_session(1).unwrap();
        assert!(matches!(
            guard.create_session(1),
            Err(SessionError::AlreadyExists(1))
        ));
    }

    #[test]
    fn test_lookup_missing_fails() {
        let mut store = SessionStore::new();
        let mut guard = store.guard();
        assert!(matches!(
            guard.lookup_session(42),
            Err(SessionError::NotFound(42))
        ));
    }

    #[test]
    fn test_guard_drop_deletes_touched_sessions() {
        let mut store = SessionStore::new();
        {
            let mut guard = store.guard();
            guard.create_session(1).unwrap();
            // No keep_accessed_sessions_alive: error-path semantics.
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_keep_alive_preserves_sessions() {
        let mut store = SessionStore::new();
        {
            let mut guard = store.guard();
            guard.create_session(1).unwrap();
            guard.keep_accessed_sessions_alive();
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_untouched_sessions_survive_other_guards() {
        let mut store = SessionStore::new();
        {
            let mut guard = store.guard();
            guard.create_session(1).unwrap();
            guard.keep_accessed_sessions_alive();
        }
        {
            let mut guard = store.guard();
            guard.create_session(2).unwrap();
            // Guard for session 2 drops without keep-alive.
        }
        assert_eq!(store.len(), 1);
        assert!(store.guard().lookup_session(1).is_ok());
    }

    #[test]
    fn test_stale_sessions_are_swept() {
        let mut store = SessionStore::with_stale_timeout(Duration::from_millis(5));
        {
            let mut guard = store.guard();
            guard.create_session(1).unwrap();
            guard.keep_accessed_sessions_alive();
        }
        std::thread::sleep(Duration::from_millis(10));
        {
            let mut guard = store.guard();
            guard.create_session(2).unwrap();
            guard.keep_accessed_sessions_alive();
        }
        assert_eq!(store.len(), 1);
        assert!(matches!(
            store.guard().lookup_session(1),
            Err(SessionError::NotFound(1))
        ));
    }
}
