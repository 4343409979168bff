//! Search, filtering and statistics over a loaded question list

use crate::types::{AnswerState, Question};
use qaboard_cache::ViewerRole;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Answer-state filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    /// Everything
    #[default]
    All,
    /// Answered only
    Answered,
    /// Waiting only
    Waiting,
}

impl StateFilter {
    /// Check a question against the filter
    #[must_use]
    pub fn matches(self, question: &Question) -> bool {
        match self {
            Self::All => true,
            Self::Answered => question.state == AnswerState::Answered,
            Self::Waiting => question.state == AnswerState::Waiting,
        }
    }
}

impl FromStr for StateFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "answered" => Ok(Self::Answered),
            "waiting" => Ok(Self::Waiting),
            other => Err(format!("unknown state filter '{other}'")),
        }
    }
}

/// Questions visible to `role` matching an optional topic and search term
///
/// The term is matched case-insensitively against content, answer, topic and
/// the submitter's name when the question is not anonymous.
#[must_use]
pub fn search<'a>(
    questions: &'a [Question],
    term: &str,
    topic: Option<&str>,
    role: ViewerRole,
) -> Vec<&'a Question> {
    let term = term.trim().to_lowercase();
    let topic = topic.filter(|t| !t.is_empty());

    questions
        .iter()
        .filter(|q| q.visible_to(role))
        .filter(|q| topic.map_or(true, |t| q.topic == t))
        .filter(|q| term.is_empty() || matches_term(q, &term))
        .collect()
}

fn matches_term(question: &Question, term: &str) -> bool {
    let contains = |text: &str| text.to_lowercase().contains(term);
    contains(&question.content)
        || question.answer.as_deref().is_some_and(contains)
        || contains(&question.topic)
        || (!question.is_anonymous && question.full_name.as_deref().is_some_and(contains))
}

/// Questions visible to `role` in the given answer state
#[must_use]
pub fn filter_by_state(questions: &[Question], filter: StateFilter, role: ViewerRole) -> Vec<&Question> {
    questions
        .iter()
        .filter(|q| q.visible_to(role) && filter.matches(q))
        .collect()
}

/// Counts shown on the administrator dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuestionStats {
    /// All questions
    pub total: usize,
    /// Answered
    pub answered: usize,
    /// Awaiting an answer
    pub waiting: usize,
    /// Visible to the public
    pub public: usize,
}

impl From<&[Question]> for QuestionStats {
    fn from(questions: &[Question]) -> Self {
        questions.iter().fold(Self::default(), |mut stats, q| {
            stats.total += 1;
            match q.state {
                AnswerState::Answered => stats.answered += 1,
                AnswerState::Waiting => stats.waiting += 1,
                AnswerState::Rejected => {}
            }
            if q.visibility {
                stats.public += 1;
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<Question> {
        vec![
            Question {
                id: "Q1".into(),
                topic: "Admissions".into(),
                content: "When does enrolment open?".into(),
                state: AnswerState::Answered,
                answer: Some("In May".into()),
                visibility: true,
                ..Question::default()
            },
            Question {
                id: "Q2".into(),
                topic: "Documents".into(),
                content: "How do I get a transcript?".into(),
                full_name: Some("Malee".into()),
                visibility: false,
                ..Question::default()
            },
            Question {
                id: "Q3".into(),
                topic: "Documents".into(),
                content: "Lost my card".into(),
                is_anonymous: true,
                full_name: Some("Hidden".into()),
                visibility: true,
                ..Question::default()
            },
        ]
    }

    fn ids(found: &[&Question]) -> Vec<String> {
        found.iter().map(|q| q.id.to_string()).collect()
    }

    #[test]
    fn public_search_hides_private_questions() {
        let qs = sample();
        assert_eq!(ids(&search(&qs, "", None, ViewerRole::Public)), ["Q1", "Q3"]);
        assert_eq!(ids(&search(&qs, "", None, ViewerRole::Admin)), ["Q1", "Q2", "Q3"]);
    }

    #[test]
    fn term_matches_answer_and_named_submitter_only() {
        let qs = sample();
        assert_eq!(ids(&search(&qs, "MAY", None, ViewerRole::Public)), ["Q1"]);
        assert_eq!(ids(&search(&qs, "malee", None, ViewerRole::Admin)), ["Q2"]);
        assert!(search(&qs, "hidden", None, ViewerRole::Admin).is_empty());
    }

    #[test]
    fn topic_filter_is_exact() {
        let qs = sample();
        assert_eq!(
            ids(&search(&qs, "", Some("Documents"), ViewerRole::Admin)),
            ["Q2", "Q3"]
        );
    }

    #[test]
    fn state_filter_and_stats() {
        let qs = sample();
        assert_eq!(
            ids(&filter_by_state(&qs, StateFilter::Waiting, ViewerRole::Public)),
            ["Q3"]
        );
        assert_eq!("answered".parse::<StateFilter>(), Ok(StateFilter::Answered));
        assert!("bogus".parse::<StateFilter>().is_err());

        let stats = QuestionStats::from(qs.as_slice());
        assert_eq!(
            stats,
            QuestionStats {
                total: 3,
                answered: 1,
                waiting: 2,
                public: 2
            }
        );
    }
}
