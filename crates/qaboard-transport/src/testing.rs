//! Scripted channel for tests and simulations
//!
//! Each injected request consumes the next [`Script`] queued for its action,
//! or the fallback script when that queue is empty. Every lease handed out is
//! counted until released so tests can assert nothing leaked.

use crate::channel::{ChannelLease, ScriptChannel};
use crate::registry::Responder;
use crate::wire::OutboundRequest;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the far side does for one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Invoke the handle with a payload
    Respond(Value),
    /// Report a channel-level load failure
    Fail(String),
    /// Never answer
    Silent,
    /// Invoke the handle twice
    Twice(Value, Value),
    /// Keep the responder for the test to invoke later
    Hold,
    /// Run the inner script after a delay
    After(Duration, Box<Script>),
}

impl Script {
    /// Respond with payload
    #[must_use]
    pub fn respond(payload: Value) -> Self {
        Self::Respond(payload)
    }

    /// Fail with reason
    #[must_use]
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }

    /// Delay another script
    #[must_use]
    pub fn after(delay: Duration, script: Script) -> Self {
        Self::After(delay, Box::new(script))
    }
}

#[derive(Debug)]
struct ScriptState {
    queues: HashMap<String, VecDeque<Script>>,
    fallback: Script,
    requests: Vec<OutboundRequest>,
    held: Vec<Responder>,
}

/// Programmable [`ScriptChannel`]
#[derive(Debug)]
pub struct ScriptedChannel {
    state: Mutex<ScriptState>,
    open_leases: Arc<AtomicUsize>,
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedChannel {
    /// Create channel whose unscripted requests fail
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState {
                queues: HashMap::new(),
                fallback: Script::fail("no script for action"),
                requests: Vec::new(),
                held: Vec::new(),
            }),
            open_leases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a script for the next unscripted attempt of `action`
    pub fn on(&self, action: &str, script: Script) -> &Self {
        self.state
            .lock()
            .queues
            .entry(action.to_string())
            .or_default()
            .push_back(script);
        self
    }

    /// Script used when an action's queue is empty
    pub fn otherwise(&self, script: Script) -> &Self {
        self.state.lock().fallback = script;
        self
    }

    /// Every request injected so far
    #[must_use]
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of attempts injected for `action`
    #[must_use]
    pub fn attempts_for(&self, action: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|request| request.action() == action)
            .count()
    }

    /// Total attempts injected
    #[must_use]
    pub fn total_attempts(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Leases handed out and not yet released
    #[must_use]
    pub fn open_leases(&self) -> usize {
        self.open_leases.load(Ordering::SeqCst)
    }

    /// Responders captured by [`Script::Hold`]
    pub fn take_held(&self) -> Vec<Responder> {
        std::mem::take(&mut self.state.lock().held)
    }

    fn next_script(&self, request: &OutboundRequest) -> Script {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        let queued = state
            .queues
            .get_mut(request.action())
            .and_then(VecDeque::pop_front);
        queued.unwrap_or_else(|| state.fallback.clone())
    }

    fn hold(&self, responder: Responder) {
        self.state.lock().held.push(responder);
    }
}

impl ScriptChannel for ScriptedChannel {
    fn inject(&self, request: &OutboundRequest, responder: Responder) -> ChannelLease {
        let script = self.next_script(request);
        self.open_leases.fetch_add(1, Ordering::SeqCst);
        let open = Arc::clone(&self.open_leases);

        let lease = match script {
            Script::After(delay, inner) => ChannelLease::from_task(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                play(*inner, &responder);
            })),
            Script::Hold => {
                self.hold(responder);
                ChannelLease::detached()
            }
            other => {
                play(other, &responder);
                ChannelLease::detached()
            }
        };

        lease.on_release(move || {
            open.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

fn play(script: Script, responder: &Responder) {
    match script {
        Script::Respond(payload) => {
            responder.respond(payload);
        }
        Script::Fail(reason) => {
            responder.fail(reason);
        }
        Script::Twice(first, second) => {
            responder.respond(first);
            responder.respond(second);
        }
        Script::Silent | Script::Hold => {}
        Script::After(_, inner) => play(*inner, responder),
    }
}
