//! Administrator sessions
//!
//! A session is persisted as one durable record and is usable while it is
//! younger than the hard lifetime ceiling and the far side still answers a
//! liveness probe. Expiry is checked locally before any transport call.

use crate::error::{ClientError, ClientResult};
use crate::storage::{DurableStore, SESSION_RECORD};
use crate::types::Identity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use qaboard_cache::clock::{age, Clock};
use qaboard_transport::{normalize, ResponseEnvelope, TransportBroker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Authenticated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token issued at login
    #[serde(rename = "sessionToken")]
    pub token: String,
    /// Who is signed in
    #[serde(rename = "adminInfo")]
    pub identity: Identity,
    /// Login instant
    #[serde(rename = "loginTime")]
    pub issued_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from a successful login response
    ///
    /// The token and identity may sit at the top level or under `data`.
    pub fn from_login(response: &ResponseEnvelope, issued_at: DateTime<Utc>) -> ClientResult<Self> {
        let token = response
            .field("sessionToken")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ClientError::Session("login response has no session token".into()))?;
        let identity = response
            .field("adminInfo")
            .cloned()
            .ok_or_else(|| ClientError::Session("login response has no identity".into()))?;
        let identity: Identity = serde_json::from_value(identity)
            .map_err(|e| ClientError::Decode(format!("identity: {e}")))?;

        Ok(Self {
            token: token.to_string(),
            identity,
            issued_at,
        })
    }

    /// Age at `now`
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        age(now, self.issued_at)
    }

    /// Check if at or past `ttl`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) >= ttl
    }
}

/// Cheap round trip confirming the far side still accepts calls
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// `true` if the far side answered successfully
    async fn probe(&self) -> bool;
}

#[async_trait]
impl LivenessProbe for TransportBroker {
    async fn probe(&self) -> bool {
        match self.ping().await.map(normalize) {
            Ok(ResponseEnvelope::Success(_)) => true,
            Ok(ResponseEnvelope::Failure(message)) => {
                warn!(%message, "liveness probe rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "liveness probe failed");
                false
            }
        }
    }
}

/// Owns the current session and its durable record
#[derive(Debug)]
pub struct SessionManager {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    current: RwLock<Option<Session>>,
}

impl SessionManager {
    /// Create manager
    pub fn new(store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            current: RwLock::new(None),
        }
    }

    /// Lifetime ceiling
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Check if a session is past the lifetime ceiling now
    #[must_use]
    pub fn is_expired(&self, session: &Session) -> bool {
        session.is_expired(self.clock.now(), self.ttl)
    }

    /// Active session, if one is committed and not expired
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .as_ref()
            .filter(|session| !self.is_expired(session))
            .cloned()
    }

    /// Load the persisted session if it is present and within its lifetime
    ///
    /// Unreadable, malformed and expired records are discarded.
    pub async fn restore(&self) -> Option<Session> {
        let raw = match self.store.get(SESSION_RECORD).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "cannot read persisted session");
                return None;
            }
        };

        let session: Session = match serde_json::from_value(raw) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "discarding malformed session record");
                self.discard_record().await;
                return None;
            }
        };

        if self.is_expired(&session) {
            info!(admin = %session.identity.id, "persisted session expired");
            self.discard_record().await;
            return None;
        }
        Some(session)
    }

    /// Check lifetime, then liveness; an expired session never reaches the probe
    pub async fn validate(&self, session: &Session, probe: &dyn LivenessProbe) -> bool {
        if self.is_expired(session) {
            debug!(admin = %session.identity.id, "session past lifetime ceiling");
            return false;
        }
        probe.probe().await
    }

    /// Restore and validate; on success the session becomes current,
    /// otherwise the record is cleared
    pub async fn resume(&self, probe: &dyn LivenessProbe) -> Option<Session> {
        let session = self.restore().await?;
        if self.validate(&session, probe).await {
            info!(admin = %session.identity.id, "session resumed");
            *self.current.write() = Some(session.clone());
            Some(session)
        } else {
            info!(admin = %session.identity.id, "session rejected, signing out");
            if let Err(e) = self.clear().await {
                warn!(error = %e, "failed to clear rejected session");
            }
            None
        }
    }

    /// Persist and activate a session; on failure nothing changes
    pub async fn commit(&self, session: Session) -> ClientResult<()> {
        let record = serde_json::to_value(&session).map_err(|e| {
            ClientError::Storage(crate::error::StorageError::Encode {
                record: SESSION_RECORD.to_string(),
                reason: e.to_string(),
            })
        })?;
        self.store.put(SESSION_RECORD, record).await?;
        info!(admin = %session.identity.id, "session committed");
        *self.current.write() = Some(session);
        Ok(())
    }

    /// Drop the active session and its record
    pub async fn clear(&self) -> ClientResult<()> {
        let previous = self.current.write().take();
        self.store.remove(SESSION_RECORD).await?;
        if let Some(session) = previous {
            info!(admin = %session.identity.id, "session cleared");
        }
        Ok(())
    }

    async fn discard_record(&self) {
        if let Err(e) = self.store.remove(SESSION_RECORD).await {
            warn!(error = %e, "failed to discard session record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use qaboard_cache::ManualClock;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[derive(Default)]
    struct CountingProbe {
        alive: bool,
        calls: AtomicUsize,
    }

    impl CountingProbe {
        fn alive() -> Self {
            Self {
                alive: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl LivenessProbe for CountingProbe {
        async fn probe(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.alive
        }
    }

    fn manager() -> (SessionManager, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let manager = SessionManager::new(store.clone(), clock.clone(), DAY);
        (manager, store, clock)
    }

    fn session(issued_at: DateTime<Utc>) -> Session {
        Session {
            token: "tok".into(),
            identity: Identity {
                id: "admin01".into(),
                display_name: "Admin".into(),
                ..Identity::default()
            },
            issued_at,
        }
    }

    #[test]
    fn login_response_fields_at_either_level() {
        let now = Utc::now();
        let flat = normalize(json!({
            "success": true,
            "sessionToken": "abc",
            "adminInfo": {"adminId": "a1", "name": "A"}
        }));
        let nested = normalize(json!({
            "status": "success",
            "data": {"sessionToken": "abc", "adminInfo": {"adminId": "a1", "name": "A"}}
        }));

        let a = Session::from_login(&flat, now).unwrap();
        let b = Session::from_login(&nested, now).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.identity.display_name, "A");

        let missing = normalize(json!({"status": "success", "data": {"adminInfo": {}}}));
        assert!(matches!(
            Session::from_login(&missing, now),
            Err(ClientError::Session(_))
        ));
    }

    #[tokio::test]
    async fn commit_persists_and_activates() {
        let (manager, store, clock) = manager();
        manager.commit(session(clock.now())).await.unwrap();

        assert!(manager.current().is_some());
        let record = store.get(SESSION_RECORD).await.unwrap().unwrap();
        assert_eq!(record["sessionToken"], json!("tok"));
        assert_eq!(record["adminInfo"]["name"], json!("Admin"));
    }

    #[tokio::test]
    async fn expired_session_skips_probe() {
        let (manager, store, clock) = manager();
        manager.commit(session(clock.now())).await.unwrap();
        clock.advance(DAY);

        let probe = CountingProbe::alive();
        assert!(manager.resume(&probe).await.is_none());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.get(SESSION_RECORD).await.unwrap(), None);
        assert!(manager.current().is_none());
    }

    #[tokio::test]
    async fn failed_probe_clears_session() {
        let (manager, store, clock) = manager();
        manager.commit(session(clock.now())).await.unwrap();
        clock.advance(Duration::from_secs(60));

        let probe = CountingProbe::default();
        assert!(manager.resume(&probe).await.is_none());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(SESSION_RECORD).await.unwrap(), None);
    }

    #[tokio::test]
    async fn live_session_resumes() {
        let (manager, _store, clock) = manager();
        manager.commit(session(clock.now())).await.unwrap();
        clock.advance(DAY - Duration::from_secs(1));

        let probe = CountingProbe::alive();
        let resumed = manager.resume(&probe).await.unwrap();
        assert_eq!(resumed.token, "tok");
        assert_eq!(manager.current(), Some(resumed));
    }

    #[tokio::test]
    async fn malformed_record_is_discarded() {
        let (manager, store, _clock) = manager();
        store.put(SESSION_RECORD, json!({"sessionToken": 7})).await.unwrap();

        assert!(manager.restore().await.is_none());
        assert_eq!(store.get(SESSION_RECORD).await.unwrap(), None);
    }

    #[tokio::test]
    async fn current_hides_expired_session() {
        let (manager, _store, clock) = manager();
        manager.commit(session(clock.now())).await.unwrap();
        clock.advance(DAY + Duration::from_secs(1));

        assert!(manager.current().is_none());
        manager.clear().await.unwrap();
    }
}
