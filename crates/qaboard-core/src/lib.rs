//! qaboard Core
//!
//! Client for a question/answer board served over an unreliable callback
//! channel. Builds on [`qaboard_transport`] for request/response and
//! [`qaboard_cache`] for snapshots, and adds:
//!
//! - **Domain types**: questions, topics, drafts, ratings, identities
//! - **Sessions**: 24-hour administrator sessions with a liveness check
//! - **Optimistic mutations**: apply locally, confirm remotely, roll back on failure
//! - **Durable records**: session, rated questions and preferences
//! - **[`QaClient`]**: the facade hosts call into
//!
//! # Example
//!
//! ```rust,ignore
//! use qaboard_core::prelude::*;
//!
//! let client = QaClient::new(ClientConfig::from_env())?;
//! let viewer = client.viewer();
//! let questions = client.load_questions(&viewer).await?;
//! println!("{} questions ({:?})", questions.items.len(), questions.source);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod client;
pub mod collection;
pub mod config;
pub mod error;
pub mod optimistic;
pub mod query;
pub mod session;
pub mod storage;
pub mod types;

pub use client::{Collection, Loaded, QaClient, QaClientBuilder, Refreshed, Source, Submission};
pub use collection::QuestionSet;
pub use config::{ClientConfig, Freshness, FreshnessPolicy};
pub use error::{ClientError, ClientResult, ErrorKind, StorageError};
pub use optimistic::{Mutation, OptimisticCoordinator, UndoToken};
pub use query::{QuestionStats, StateFilter};
pub use session::{LivenessProbe, Session, SessionManager};
pub use storage::{DurableStore, FileStore, MemoryStore};
pub use types::{
    AnswerState, Attachment, Credentials, Identity, Question, QuestionDraft, QuestionField,
    QuestionId, Rating, SystemStatus, Topic, ViewerContext,
};

pub use qaboard_cache::{CollectionKind, ViewerRole};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::client::{Loaded, QaClient, Source, Submission};
    pub use crate::config::ClientConfig;
    pub use crate::error::{ClientError, ClientResult, ErrorKind};
    pub use crate::types::{
        Credentials, Question, QuestionDraft, QuestionField, QuestionId, Rating, Topic,
        ViewerContext,
    };
    pub use qaboard_cache::CollectionKind;
}
