use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::cart::Cart;
use crate::error::StoreError;

/// Opaque handle identifying one shopper's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| StoreError::InvalidSessionId(s.to_string()))
    }
}

/// A live session and the cart it owns
#[derive(Debug, Default)]
pub struct Session {
    pub cart: Cart,
    /// Milliseconds since the store's epoch at the last access
    last_seen: AtomicU64,
}

impl Session {
    fn touch(&self, at: u64) {
        self.last_seen.fetch_max(at, Ordering::Relaxed);
    }

    fn idle_for(&self, now: u64) -> Duration {
        Duration::from_millis(now.saturating_sub(self.last_seen.load(Ordering::Relaxed)))
    }
}

/// In-memory session table; carts never leak across entries.
///
/// Every lookup refreshes the session's last access, so `expire_idle` only
/// reclaims sessions nobody has touched for the whole TTL.
pub struct SessionStore {
    epoch: Instant,
    sessions: HashMap<SessionId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            sessions: HashMap::new(),
        }
    }

    fn millis_at(&self, at: Instant) -> u64 {
        u64::try_from(at.saturating_duration_since(self.epoch).as_millis()).unwrap_or(u64::MAX)
    }

    fn now(&self) -> u64 {
        self.millis_at(Instant::now())
    }

    /// Start a session with an empty cart
    pub fn create(&mut self) -> SessionId {
        let id = SessionId::new();
        let session = Session::default();
        session.touch(self.now());
        self.sessions.insert(id, session);
        id
    }

    pub fn get(&self, id: &SessionId) -> Result<&Session, StoreError> {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))?;
        session.touch(self.now());
        Ok(session)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Result<&mut Session, StoreError> {
        let now = self.now();
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))?;
        session.touch(now);
        Ok(session)
    }

    /// Discard a session along with its cart
    pub fn end(&mut self, id: &SessionId) -> Result<Session, StoreError> {
        self.sessions
            .remove(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }

    /// Drop every session idle for longer than `ttl`; returns how many went
    pub fn expire_idle(&mut self, ttl: Duration) -> usize {
        self.expire_idle_as_of(Instant::now(), ttl)
    }

    fn expire_idle_as_of(&mut self, at: Instant, ttl: Duration) -> usize {
        let now = self.millis_at(at);
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.idle_for(now) <= ttl);
        before - self.sessions.len()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn test_session_lifecycle() {
        let mut store = SessionStore::new();
        assert!(store.is_empty());

        let id = store.create();
        assert!(store.get(&id).unwrap().cart.is_empty());

        store.end(&id).unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.get(&id), Err(StoreError::SessionNotFound(_))));
        assert!(matches!(store.end(&id), Err(StoreError::SessionNotFound(_))));
    }

    #[test]
    fn test_sessions_are_isolated() {
        let catalog = Catalog::default_menu();
        let item = catalog.resolve("Grated Coconut").unwrap();
        let mut store = SessionStore::new();
        let first = store.create();
        let second = store.create();

        store.get_mut(&first).unwrap().cart.add(&item, 4);

        assert_eq!(store.get(&first).unwrap().cart.quantity(&item), Some(4));
        assert!(store.get(&second).unwrap().cart.is_empty());
    }

    #[test]
    fn test_idle_sessions_expire() {
        let mut store = SessionStore::new();
        let id = store.create();
        let ttl = Duration::from_secs(60);

        assert_eq!(store.expire_idle_as_of(Instant::now() + Duration::from_secs(30), ttl), 0);
        assert!(store.get(&id).is_ok());

        assert_eq!(store.expire_idle_as_of(Instant::now() + Duration::from_secs(120), ttl), 1);
        assert!(matches!(store.get(&id), Err(StoreError::SessionNotFound(_))));
    }

    #[test]
    fn test_access_keeps_session_alive() {
        let mut store = SessionStore::new();
        let active = store.create();
        let abandoned = store.create();
        let ttl = Duration::from_secs(60);

        let later = Instant::now() + Duration::from_secs(100);
        let at = store.millis_at(later);
        store.get(&active).unwrap().touch(at);

        assert_eq!(store.expire_idle_as_of(later + Duration::from_secs(30), ttl), 1);
        assert!(store.get(&active).is_ok());
        assert!(store.get(&abandoned).is_err());
    }

    #[test]
    fn test_many_abandoned_sessions_are_reclaimed() {
        let mut store = SessionStore::new();
        for _ in 0..1_000 {
            store.create();
        }

        let removed =
            store.expire_idle_as_of(Instant::now() + Duration::from_secs(3600), Duration::from_secs(60));
        assert_eq!(removed, 1_000);
        assert!(store.is_empty());
    }

    #[test]
    fn test_parse_session_id() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        let err = "not-a-uuid".parse::<SessionId>().unwrap_err();
        assert!(matches!(err, StoreError::InvalidSessionId(_)));
    }
}
