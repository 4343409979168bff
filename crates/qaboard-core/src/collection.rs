//! Shared in-memory question list
//!
//! The list reads reload into and optimistic mutations edit. The lock is
//! never held across an await point.

use crate::types::{Question, QuestionId};
use parking_lot::RwLock;
use std::sync::Arc;

/// Cloneable handle to the question list
#[derive(Debug, Clone, Default)]
pub struct QuestionSet {
    inner: Arc<RwLock<Vec<Question>>>,
}

impl QuestionSet {
    /// Create empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list
    pub fn replace(&self, questions: Vec<Question>) {
        *self.inner.write() = questions;
    }

    /// Copy of the list
    #[must_use]
    pub fn snapshot(&self) -> Vec<Question> {
        self.inner.read().clone()
    }

    /// Copy of one question
    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<Question> {
        self.inner.read().iter().find(|q| &q.id == id).cloned()
    }

    /// Number of questions
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Run `f` with exclusive access
    pub fn update<R>(&self, f: impl FnOnce(&mut Vec<Question>) -> R) -> R {
        f(&mut self.inner.write())
    }
}
