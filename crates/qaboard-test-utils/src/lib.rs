//! Testing utilities for the qaboard workspace
//!
//! Shared fixtures and a client wired to a scripted channel, a manual clock
//! and an in-memory store.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use qaboard_cache::ManualClock;
use qaboard_core::storage::MemoryStore;
use qaboard_core::{
    AnswerState, ClientConfig, Credentials, Identity, QaClient, Question, Session,
};
use qaboard_transport::testing::{Script, ScriptedChannel};
use serde_json::{json, Value};
use std::sync::Arc;

pub use qaboard_transport::testing;

/// `{status: "success", data}`
pub fn success(data: Value) -> Value {
    json!({ "status": "success", "data": data })
}

/// `{status: "error", message}`
pub fn failure(message: &str) -> Value {
    json!({ "status": "error", "message": message })
}

pub fn question(id: &str, visible: bool) -> Question {
    Question {
        id: id.into(),
        topic: "General".into(),
        content: format!("Question {id}"),
        visibility: visible,
        ..Question::default()
    }
}

pub fn answered_question(id: &str, visible: bool) -> Question {
    Question {
        state: AnswerState::Answered,
        answer: Some(format!("Answer to {id}")),
        answered_by: Some("Admin".into()),
        ..question(id, visible)
    }
}

/// Q1 public and answered, Q2 private and waiting, Q3 public and waiting
pub fn sample_questions() -> Vec<Question> {
    vec![
        answered_question("Q1", true),
        question("Q2", false),
        question("Q3", true),
    ]
}

pub fn questions_payload(questions: &[Question]) -> Value {
    success(json!(questions))
}

pub fn topics_payload(names: &[&str]) -> Value {
    let topics: Vec<Value> = names.iter().map(|name| json!({ "topicName": name })).collect();
    success(Value::Array(topics))
}

pub fn login_payload(token: &str, admin_id: &str, name: &str) -> Value {
    success(json!({
        "sessionToken": token,
        "adminInfo": { "adminId": admin_id, "name": name },
    }))
}

pub fn admin_identity() -> Identity {
    Identity {
        id: "admin01".into(),
        display_name: "Admin".into(),
        ..Identity::default()
    }
}

pub fn session_issued_at(issued_at: DateTime<Utc>) -> Session {
    Session {
        token: "test-token".into(),
        identity: admin_identity(),
        issued_at,
    }
}

/// Client with every collaborator under test control
pub struct TestHarness {
    pub client: QaClient,
    pub channel: Arc<ScriptedChannel>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Harness sharing an existing store, e.g. to simulate a restart
    pub fn with_store(config: ClientConfig, store: Arc<MemoryStore>) -> Self {
        let channel = Arc::new(ScriptedChannel::new());
        let clock = Arc::new(ManualClock::starting_now());
        let client = QaClient::builder(config)
            .channel(channel.clone())
            .clock(clock.clone())
            .store(store.clone())
            .build()
            .expect("test client builds");
        Self {
            client,
            channel,
            clock,
            store,
        }
    }

    pub fn script(&self, action: &str, script: Script) -> &Self {
        self.channel.on(action, script);
        self
    }

    pub fn respond(&self, action: &str, payload: Value) -> &Self {
        self.script(action, Script::respond(payload))
    }

    /// Sign in as `admin01`
    pub async fn sign_in(&self) -> Session {
        self.respond("adminLogin", login_payload("test-token", "admin01", "Admin"));
        self.client
            .login(Credentials::new("admin01", "secret"))
            .await
            .expect("scripted login succeeds")
    }

    /// Load `questions` into the shared list as an administrator
    pub async fn seed_questions(&self, questions: &[Question]) {
        self.respond("getQuestions", questions_payload(questions));
        self.client
            .load_questions(&qaboard_core::ViewerContext::elevated())
            .await
            .expect("scripted load succeeds");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
