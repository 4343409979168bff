//! In-flight callback registry
//!
//! Bridges the fire-and-forget channel into request/response semantics.
//! Every attempt allocates a uniquely named slot; the far side resolves it by
//! invoking the matching [`Responder`]. Lifecycle per slot:
//! `allocate -> single resolution or timeout -> release`.
//!
//! The first invocation wins. Invocations after resolution or release find no
//! slot and are ignored.

use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Unique, single-use response handle name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleName(String);

impl HandleName {
    /// Generate a fresh process-wide unique name
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("qa_cb_{}", Uuid::new_v4().simple()))
    }

    /// Name as sent on the wire
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandleName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// What a slot resolves with
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Signal {
    /// Far side invoked the handle with a payload (`Null` when it passed nothing)
    Payload(Value),
    /// The channel reported it could not deliver
    LoadFailed(String),
}

/// Keyed table of armed response handles
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    slots: DashMap<HandleName, oneshot::Sender<Signal>>,
}

impl CallbackRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Arm a new handle
    pub fn allocate(self: &Arc<Self>) -> (Responder, PendingResponse) {
        let name = HandleName::generate();
        let (tx, rx) = oneshot::channel();
        self.slots.insert(name.clone(), tx);

        (
            Responder {
                name,
                registry: Arc::downgrade(self),
            },
            PendingResponse { rx },
        )
    }

    /// Drop a handle; later invocations become no-ops
    pub fn release(&self, name: &HandleName) -> bool {
        self.slots.remove(name).is_some()
    }

    /// Number of armed handles
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.slots.len()
    }

    /// Check if a handle is still armed
    #[inline]
    #[must_use]
    pub fn is_armed(&self, name: &HandleName) -> bool {
        self.slots.contains_key(name)
    }

    fn deliver(&self, name: &HandleName, signal: Signal) -> bool {
        match self.slots.remove(name) {
            Some((_, tx)) => tx.send(signal).is_ok(),
            None => {
                tracing::debug!(handle = %name, "ignoring invocation of released handle");
                false
            }
        }
    }
}

/// The far side's end of one handle
///
/// Cloneable so a channel can hand it to a background task; every clone
/// addresses the same single-use slot.
#[derive(Debug, Clone)]
pub struct Responder {
    name: HandleName,
    registry: Weak<CallbackRegistry>,
}

impl Responder {
    /// Handle name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &HandleName {
        &self.name
    }

    /// Invoke the handle with a payload; `false` if it was already resolved or released
    pub fn respond(&self, payload: Value) -> bool {
        self.signal(Signal::Payload(payload))
    }

    /// Report a channel-level failure; `false` if the handle was already resolved or released
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.signal(Signal::LoadFailed(reason.into()))
    }

    fn signal(&self, signal: Signal) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.deliver(&self.name, signal),
            None => false,
        }
    }
}

/// The broker's end of one handle
#[derive(Debug)]
pub struct PendingResponse {
    rx: oneshot::Receiver<Signal>,
}

impl PendingResponse {
    /// Wait for resolution; `None` if the slot was released unresolved
    pub(crate) async fn wait(self) -> Option<Signal> {
        self.rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handle_names_are_unique() {
        let a = HandleName::generate();
        let b = HandleName::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("qa_cb_"));
    }

    #[tokio::test]
    async fn first_invocation_wins() {
        let registry = CallbackRegistry::new();
        let (responder, pending) = registry.allocate();

        assert!(responder.respond(json!({"n": 1})));
        assert!(!responder.respond(json!({"n": 2})));
        assert!(!responder.fail("late"));

        assert_eq!(pending.wait().await, Some(Signal::Payload(json!({"n": 1}))));
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn response_after_channel_error_is_ignored() {
        let registry = CallbackRegistry::new();
        let (responder, pending) = registry.allocate();

        assert!(responder.fail("script load failed"));
        assert!(!responder.respond(json!({"n": 1})));
        assert!(!responder.fail("again"));

        assert_eq!(
            pending.wait().await,
            Some(Signal::LoadFailed("script load failed".to_string()))
        );
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn release_makes_handle_unreachable() {
        let registry = CallbackRegistry::new();
        let (responder, pending) = registry.allocate();

        assert!(registry.is_armed(responder.name()));
        assert!(registry.release(responder.name()));
        assert!(!responder.respond(json!(null)));
        assert_eq!(pending.wait().await, None);
    }

    #[test]
    fn responder_outliving_registry_is_inert() {
        let registry = CallbackRegistry::new();
        let (responder, _pending) = registry.allocate();
        drop(registry);

        assert!(!responder.respond(json!([])));
    }

    #[test]
    fn abandoned_receiver_reports_undelivered() {
        let registry = CallbackRegistry::new();
        let (responder, pending) = registry.allocate();
        drop(pending);

        assert!(!responder.fail("nobody listening"));
        assert_eq!(registry.pending_count(), 0);
    }
}
