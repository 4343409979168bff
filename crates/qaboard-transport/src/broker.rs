//! Transport broker
//!
//! Turns a fire-and-forget [`ScriptChannel`] into `send -> Result<raw payload>`:
//! - one fresh response handle and channel lease per attempt
//! - per-attempt timeout
//! - retry on channel error or timeout with linear backoff
//!   (`backoff_base * n` after the n-th failed attempt)
//! - handle and lease released on every exit path, including cancellation
//!
//! The broker does not interpret payloads; see [`crate::normalize`].
//! Identical concurrent sends are not deduplicated.

use crate::channel::{ChannelLease, ScriptChannel};
use crate::config::{TransportConfig, PING_ACTION};
use crate::error::TransportError;
use crate::registry::{CallbackRegistry, HandleName, Signal};
use crate::wire::{OutboundRequest, Params, RequestDescriptor};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Request/response broker over a callback channel
#[derive(Debug)]
pub struct TransportBroker {
    channel: Arc<dyn ScriptChannel>,
    registry: Arc<CallbackRegistry>,
    config: TransportConfig,
}

impl TransportBroker {
    /// Create broker over channel
    #[must_use]
    pub fn new(channel: Arc<dyn ScriptChannel>, config: TransportConfig) -> Self {
        Self {
            channel,
            registry: CallbackRegistry::new(),
            config,
        }
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Number of response handles currently armed
    #[inline]
    #[must_use]
    pub fn pending_handles(&self) -> usize {
        self.registry.pending_count()
    }

    /// Delay before the attempt following failed attempt number `attempt` (1-based)
    #[inline]
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.config.backoff_base() * attempt
    }

    /// Send one logical request, retrying up to `max_retries` times
    ///
    /// # Returns
    /// The raw payload delivered to the response handle (`Null` if the far
    /// side invoked it with nothing)
    ///
    /// # Errors
    /// - `TransportError::InvalidRequest` before any attempt for bad input
    /// - `TransportError::Exhausted` once every attempt failed; its `last`
    ///   field says whether the final attempt timed out or hit a channel error
    pub async fn send(
        &self,
        action: &str,
        params: Params,
        max_retries: u32,
    ) -> Result<Value, TransportError> {
        let mut descriptor = RequestDescriptor::new(action, params, max_retries)?;
        let mut attempt: u32 = 1;

        loop {
            match self.attempt(&descriptor, attempt).await {
                Ok(payload) => {
                    if attempt > 1 {
                        info!(action, attempt, "request succeeded after retry");
                    }
                    return Ok(payload);
                }
                Err(failure) => match descriptor.next_attempt() {
                    Some(next) => {
                        let delay = self.backoff_for(attempt);
                        warn!(
                            action,
                            attempt,
                            retries_remaining = next.retries_remaining(),
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %failure,
                            "attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        descriptor = next;
                        attempt += 1;
                    }
                    None => {
                        error!(action, attempts = attempt, error = %failure, "all attempts failed");
                        return Err(TransportError::Exhausted {
                            action: action.to_string(),
                            attempts: attempt,
                            last: Box::new(failure),
                        });
                    }
                },
            }
        }
    }

    /// Send with the configured default retry budget
    pub async fn send_default(&self, action: &str, params: Params) -> Result<Value, TransportError> {
        self.send(action, params, self.config.default_retries).await
    }

    /// Liveness probe: one `testAPI` attempt, no retries
    pub async fn ping(&self) -> Result<Value, TransportError> {
        self.send(PING_ACTION, Params::new(), 0).await
    }

    async fn attempt(
        &self,
        descriptor: &RequestDescriptor,
        attempt: u32,
    ) -> Result<Value, TransportError> {
        let (responder, pending) = self.registry.allocate();
        let request = OutboundRequest::new(descriptor, responder.name().clone());
        debug!(
            action = descriptor.action(),
            attempt,
            handle = %request.callback(),
            "injecting request"
        );

        let lease = self.channel.inject(&request, responder);
        let _guard = AttemptGuard {
            registry: &self.registry,
            handle: request.callback().clone(),
            _lease: lease,
        };

        let timeout = self.config.request_timeout();
        match tokio::time::timeout(timeout, pending.wait()).await {
            Ok(Some(Signal::Payload(payload))) => Ok(payload),
            Ok(Some(Signal::LoadFailed(reason))) => {
                Err(TransportError::channel(descriptor.action(), reason))
            }
            Ok(None) => Err(TransportError::channel(
                descriptor.action(),
                "response handle released before delivery",
            )),
            Err(_) => Err(TransportError::timeout(descriptor.action(), timeout)),
        }
    }
}

/// Releases the handle, then the channel lease, when an attempt ends for any reason
struct AttemptGuard<'a> {
    registry: &'a CallbackRegistry,
    handle: HandleName,
    _lease: ChannelLease,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.handle);
    }
}
