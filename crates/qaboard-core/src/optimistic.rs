//! Optimistic mutations
//!
//! A mutation is applied to the shared question list at once, then sent.
//! Success runs the commit hook, by default evicting the cache partitions
//! the question appears in. Failure reverts the change from its
//! [`UndoToken`] and surfaces the error.
//!
//! ```text
//! apply ──▶ remote ── success ──▶ on_commit ─────────▶ Ok(data)
//!   │          │
//!   │          └──── failure ───▶ token.revert ──────▶ Err
//!   └─ target missing ──────────────────────────────▶ Err(Validation)
//! ```

use crate::collection::QuestionSet;
use crate::error::{ClientError, ClientResult};
use crate::types::{AnswerState, Question, QuestionId};
use chrono::{DateTime, Utc};
use qaboard_cache::{CacheStore, CollectionKind};
use qaboard_transport::{normalize, Params, ResponseEnvelope, TransportBroker, TransportError};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Answer-related fields captured before an answer is recorded
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSnapshot {
    state: AnswerState,
    answer: Option<String>,
    answered_by: Option<String>,
    answer_date: Option<String>,
    visibility: bool,
}

impl AnswerSnapshot {
    fn capture(question: &Question) -> Self {
        Self {
            state: question.state,
            answer: question.answer.clone(),
            answered_by: question.answered_by.clone(),
            answer_date: question.answer_date.clone(),
            visibility: question.visibility,
        }
    }

    fn restore(self, question: &mut Question) {
        question.state = self.state;
        question.answer = self.answer;
        question.answered_by = self.answered_by;
        question.answer_date = self.answer_date;
        question.visibility = self.visibility;
    }
}

/// Everything needed to undo one applied mutation
#[derive(Debug, Clone, PartialEq)]
pub enum UndoToken {
    /// Visibility flag before the change
    Visibility {
        /// Question
        id: QuestionId,
        /// Previous flag
        previous: bool,
    },
    /// Answer fields before the change
    AnswerState {
        /// Question
        id: QuestionId,
        /// Previous fields
        previous: Box<AnswerSnapshot>,
    },
    /// Question removed from `index`
    Removed {
        /// Position it occupied
        index: usize,
        /// The removed question
        question: Box<Question>,
    },
}

impl UndoToken {
    /// Question the token belongs to
    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        match self {
            Self::Visibility { id, .. } | Self::AnswerState { id, .. } => id,
            Self::Removed { question, .. } => &question.id,
        }
    }

    /// Put the captured state back
    ///
    /// A question that vanished meanwhile is left alone; a removed question
    /// that reappeared meanwhile is not duplicated.
    pub fn revert(self, questions: &mut Vec<Question>) {
        match self {
            Self::Visibility { id, previous } => {
                if let Some(q) = questions.iter_mut().find(|q| q.id == id) {
                    q.visibility = previous;
                }
            }
            Self::AnswerState { id, previous } => {
                if let Some(q) = questions.iter_mut().find(|q| q.id == id) {
                    previous.restore(q);
                }
            }
            Self::Removed { index, question } => {
                if questions.iter().all(|q| q.id != question.id) {
                    let index = index.min(questions.len());
                    questions.insert(index, *question);
                }
            }
        }
    }
}

/// One optimistic change to a question
pub trait Mutation: Send + Sync {
    /// Question being changed
    fn target(&self) -> &QuestionId;

    /// Change the list in place; `None` if the target is not present
    fn apply(&self, questions: &mut Vec<Question>) -> Option<UndoToken>;

    /// Remote action confirming the change
    fn action(&self) -> &'static str;

    /// Remote parameters
    fn params(&self) -> Params;

    /// Error text when the far side gives no reason
    fn failure_message(&self) -> &'static str;

    /// Collections whose cached snapshots the change makes stale
    fn invalidates(&self) -> &'static [CollectionKind] {
        &[CollectionKind::Questions]
    }
}

/// Set the public visibility flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetVisibility {
    /// Question
    pub id: QuestionId,
    /// Target value
    pub visible: bool,
}

impl Mutation for SetVisibility {
    fn target(&self) -> &QuestionId {
        &self.id
    }

    fn apply(&self, questions: &mut Vec<Question>) -> Option<UndoToken> {
        let q = questions.iter_mut().find(|q| q.id == self.id)?;
        let previous = std::mem::replace(&mut q.visibility, self.visible);
        Some(UndoToken::Visibility {
            id: self.id.clone(),
            previous,
        })
    }

    fn action(&self) -> &'static str {
        "togglePublicDisplay"
    }

    fn params(&self) -> Params {
        Params::new().with("questionId", self.id.as_str())
    }

    fn failure_message(&self) -> &'static str {
        "unable to change question visibility"
    }
}

/// Record an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAnswer {
    /// Question
    pub id: QuestionId,
    /// Answer text
    pub content: String,
    /// Display name of the answering administrator
    pub answered_by: String,
    /// Publish together with the answer
    pub visibility: bool,
    /// When the answer was written
    pub answered_at: DateTime<Utc>,
}

impl Mutation for RecordAnswer {
    fn target(&self) -> &QuestionId {
        &self.id
    }

    fn apply(&self, questions: &mut Vec<Question>) -> Option<UndoToken> {
        let q = questions.iter_mut().find(|q| q.id == self.id)?;
        let previous = Box::new(AnswerSnapshot::capture(q));
        q.state = AnswerState::Answered;
        q.answer = Some(self.content.clone());
        q.answered_by = Some(self.answered_by.clone());
        q.answer_date = Some(self.answered_at.to_rfc3339());
        if self.visibility {
            q.visibility = true;
        }
        Some(UndoToken::AnswerState {
            id: self.id.clone(),
            previous,
        })
    }

    fn action(&self) -> &'static str {
        "answerQuestion"
    }

    fn params(&self) -> Params {
        Params::new().with(
            "answerData",
            json!({
                "questionId": self.id,
                "answerContent": self.content,
                "answeredBy": self.answered_by,
                "publicDisplay": self.visibility,
            }),
        )
    }

    fn failure_message(&self) -> &'static str {
        "unable to record answer"
    }
}

/// Delete a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveQuestion {
    /// Question
    pub id: QuestionId,
}

impl Mutation for RemoveQuestion {
    fn target(&self) -> &QuestionId {
        &self.id
    }

    fn apply(&self, questions: &mut Vec<Question>) -> Option<UndoToken> {
        let index = questions.iter().position(|q| q.id == self.id)?;
        let question = Box::new(questions.remove(index));
        Some(UndoToken::Removed { index, question })
    }

    fn action(&self) -> &'static str {
        "deleteQuestion"
    }

    fn params(&self) -> Params {
        Params::new().with("questionId", self.id.as_str())
    }

    fn failure_message(&self) -> &'static str {
        "unable to delete question"
    }
}

/// Runs mutations against the shared list, the broker and the cache
#[derive(Debug, Clone)]
pub struct OptimisticCoordinator {
    broker: Arc<TransportBroker>,
    cache: CacheStore,
    questions: QuestionSet,
}

impl OptimisticCoordinator {
    /// Create coordinator
    pub fn new(broker: Arc<TransportBroker>, cache: CacheStore, questions: QuestionSet) -> Self {
        Self {
            broker,
            cache,
            questions,
        }
    }

    /// Apply, send with the broker's default retries, then commit or roll back
    pub async fn mutate(&self, mutation: &dyn Mutation) -> ClientResult<Value> {
        let broker = &self.broker;
        self.run(
            mutation.target(),
            |questions| mutation.apply(questions),
            || async move {
                broker
                    .send_default(mutation.action(), mutation.params())
                    .await
                    .map(normalize)
            },
            || self.evict(mutation.invalidates()),
            mutation.failure_message(),
        )
        .await
    }

    /// Evict every role partition of `collections`
    pub async fn evict(&self, collections: &[CollectionKind]) {
        for collection in collections {
            self.cache.evict_partitions(*collection).await;
        }
    }

    /// Apply `apply`, await `remote`, then run `on_commit` or roll back
    ///
    /// `on_commit` runs only after the far side confirmed the change.
    pub async fn run<A, R, Fut, C, CFut>(
        &self,
        target: &QuestionId,
        apply: A,
        remote: R,
        on_commit: C,
        failure_message: &str,
    ) -> ClientResult<Value>
    where
        A: FnOnce(&mut Vec<Question>) -> Option<UndoToken>,
        R: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResponseEnvelope, TransportError>>,
        C: FnOnce() -> CFut,
        CFut: Future<Output = ()>,
    {
        let token = self
            .questions
            .update(apply)
            .ok_or_else(|| ClientError::validation(format!("question {target} not found")))?;
        debug!(question = %target, "optimistic change applied");

        let outcome = match remote().await {
            Ok(ResponseEnvelope::Success(data)) => Ok(data),
            Ok(ResponseEnvelope::Failure(message)) => {
                Err(ClientError::remote_or(message, failure_message))
            }
            Err(e) => Err(ClientError::Network(e)),
        };

        match outcome {
            Ok(data) => {
                on_commit().await;
                info!(question = %target, "mutation committed");
                Ok(data)
            }
            Err(error) => {
                self.questions.update(|questions| token.revert(questions));
                warn!(question = %target, error = %error, "mutation rolled back");
                Err(error)
            }
        }
    }
}
