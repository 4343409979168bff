//! One-shot callback channel abstraction
//!
//! A channel "injects" a request and walks away. Whatever happens next, the
//! only way a result reaches the broker is through the [`Responder`] it was
//! handed. The returned [`ChannelLease`] is the per-attempt resource; the
//! broker drops it on every exit path.

use crate::registry::Responder;
use crate::wire::OutboundRequest;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Fire-and-forget transport mechanism
pub trait ScriptChannel: Send + Sync + fmt::Debug {
    /// Inject a request; the far side answers by invoking `responder` once
    fn inject(&self, request: &OutboundRequest, responder: Responder) -> ChannelLease;
}

impl<T: ScriptChannel + ?Sized> ScriptChannel for Arc<T> {
    fn inject(&self, request: &OutboundRequest, responder: Responder) -> ChannelLease {
        (**self).inject(request, responder)
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Resources held by one in-flight attempt
///
/// Dropping the lease aborts its background task and runs release hooks.
#[derive(Default)]
pub struct ChannelLease {
    task: Option<JoinHandle<()>>,
    hooks: Vec<ReleaseHook>,
}

impl ChannelLease {
    /// Lease with nothing to release
    #[inline]
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Lease owning a background task
    #[inline]
    #[must_use]
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self {
            task: Some(task),
            hooks: Vec::new(),
        }
    }

    /// Run `hook` when the lease is released
    #[must_use]
    pub fn on_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Release now
    #[inline]
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        for hook in self.hooks.drain(..) {
            hook();
        }
    }
}

impl fmt::Debug for ChannelLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelLease")
            .field("has_task", &self.task.is_some())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
