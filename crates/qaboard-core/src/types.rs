//! Domain types
//!
//! Wire names follow the backend's camelCase records; aliases accept the
//! shorter spellings some deployments return.

use crate::error::{ClientError, ClientResult};
use qaboard_cache::ViewerRole;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Largest accepted attachment, in bytes
pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

/// Attachment MIME types the backend stores
pub const ALLOWED_ATTACHMENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// Question identifier assigned by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    /// Wrap an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// As string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for QuestionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Answer lifecycle of a question
///
/// Serialized with the backend's stored values. Decoding accepts those and
/// the English names; any other value, blank included, reads as
/// [`AnswerState::Rejected`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum AnswerState {
    /// Awaiting an answer
    #[default]
    #[serde(rename = "รอตอบ")]
    Waiting,
    /// Answered
    #[serde(rename = "ตอบแล้ว")]
    Answered,
    /// Declined by an administrator
    #[serde(rename = "ปฏิเสธ")]
    Rejected,
}

impl<'de> Deserialize<'de> for AnswerState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw.as_str().map(str::trim) {
            Some("รอตอบ" | "waiting" | "Waiting") => Self::Waiting,
            Some("ตอบแล้ว" | "answered" | "Answered") => Self::Answered,
            _ => Self::Rejected,
        })
    }
}

impl AnswerState {
    /// Stable English name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Answered => "answered",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for AnswerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One question record
///
/// Rows come from a spreadsheet, so every cell decodes leniently: a blank or
/// mistyped cell falls back to its empty value instead of failing the list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Question {
    /// Identifier
    #[serde(rename = "questionId", alias = "id", deserialize_with = "cell::id")]
    pub id: QuestionId,
    /// Topic name
    #[serde(rename = "questionTopic", alias = "topic", deserialize_with = "cell::text")]
    pub topic: String,
    /// Question text
    #[serde(rename = "questionContent", alias = "content", deserialize_with = "cell::text")]
    pub content: String,
    /// Submitted without a name
    #[serde(deserialize_with = "cell::flag")]
    pub is_anonymous: bool,
    /// Submitter name
    #[serde(deserialize_with = "cell::optional_text")]
    pub full_name: Option<String>,
    /// Submitter email
    #[serde(deserialize_with = "cell::optional_text")]
    pub email: Option<String>,
    /// Submission time as reported by the backend
    #[serde(deserialize_with = "cell::optional_text")]
    pub timestamp: Option<String>,
    /// Answer lifecycle
    #[serde(rename = "answerStatus", alias = "state")]
    pub state: AnswerState,
    /// Answer text
    #[serde(
        rename = "answerContent",
        alias = "answer",
        deserialize_with = "cell::optional_text"
    )]
    pub answer: Option<String>,
    /// Who answered
    #[serde(deserialize_with = "cell::optional_text")]
    pub answered_by: Option<String>,
    /// When it was answered
    #[serde(deserialize_with = "cell::optional_text")]
    pub answer_date: Option<String>,
    /// Visible to the public role
    #[serde(rename = "publicDisplay", alias = "visibility", deserialize_with = "cell::flag")]
    pub visibility: bool,
    /// Mean rating
    #[serde(deserialize_with = "cell::number")]
    pub average_rating: Option<f64>,
    /// Number of ratings
    #[serde(deserialize_with = "cell::count")]
    pub total_ratings: Option<u32>,
    /// Link to the stored attachment
    #[serde(deserialize_with = "cell::optional_text")]
    pub attachment_link: Option<String>,
}

/// Lenient spreadsheet cell decoders
mod cell {
    use super::QuestionId;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn raw<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn as_text(value: Value) -> Option<String> {
        match value {
            Value::String(text) => Some(text),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub(super) fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<QuestionId, D::Error> {
        Ok(QuestionId::new(as_text(raw(deserializer)?).unwrap_or_default()))
    }

    pub(super) fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(as_text(raw(deserializer)?).unwrap_or_default())
    }

    pub(super) fn optional_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(as_text(raw(deserializer)?))
    }

    /// Truthy like the sheet's checkbox cells; `"false"` and `"0"` read as false
    pub(super) fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match raw(deserializer)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::String(text) => {
                let text = text.trim();
                !(text.is_empty() || text == "0" || text.eq_ignore_ascii_case("false"))
            }
            Value::Null => false,
            Value::Array(_) | Value::Object(_) => true,
        })
    }

    fn as_number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|n| n.is_finite())
    }

    pub(super) fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(as_number(&raw(deserializer)?))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub(super) fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        Ok(as_number(&raw(deserializer)?)
            .filter(|n| *n >= 0.0 && *n <= f64::from(u32::MAX))
            .map(|n| n.round() as u32))
    }
}

impl Question {
    /// Check if answered
    #[inline]
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.state == AnswerState::Answered
    }

    /// Check if `role` may see this question
    #[inline]
    #[must_use]
    pub fn visible_to(&self, role: ViewerRole) -> bool {
        role.is_privileged() || self.visibility
    }
}

/// One topic record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic name
    #[serde(rename = "topicName", alias = "name", deserialize_with = "cell::text")]
    pub name: String,
}

impl Topic {
    /// Create topic
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Authenticated administrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Account id
    #[serde(rename = "adminId", alias = "id", default)]
    pub id: String,
    /// Display name
    #[serde(rename = "name", alias = "displayName", default)]
    pub display_name: String,
    /// Any further fields the backend returns
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Login credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account id
    pub admin_id: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(admin_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            admin_id: admin_id.into(),
            password: password.into(),
        }
    }

    /// Reject blank fields
    pub fn validate(&self) -> ClientResult<()> {
        if self.admin_id.trim().is_empty() {
            return Err(ClientError::validation("admin id is required"));
        }
        if self.password.is_empty() {
            return Err(ClientError::validation("password is required"));
        }
        Ok(())
    }

    /// Login record sent to the backend
    #[must_use]
    pub fn to_wire(&self) -> Value {
        json!({ "adminId": self.admin_id.trim(), "password": self.password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("admin_id", &self.admin_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// File attached to a new question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name
    pub name: String,
    /// MIME type
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Base64 body
    pub base64: String,
}

impl Attachment {
    /// Decoded size estimated from the base64 length
    #[must_use]
    pub fn decoded_len(&self) -> usize {
        let body = self.base64.trim_end_matches('=');
        body.len() * 3 / 4
    }

    /// Check type and size
    pub fn validate(&self) -> ClientResult<()> {
        if !ALLOWED_ATTACHMENT_TYPES.contains(&self.mime_type.as_str()) {
            return Err(ClientError::validation(format!(
                "unsupported attachment type '{}'",
                self.mime_type
            )));
        }
        if self.decoded_len() > MAX_ATTACHMENT_BYTES {
            return Err(ClientError::validation(format!(
                "attachment exceeds {}MB",
                MAX_ATTACHMENT_BYTES / (1024 * 1024)
            )));
        }
        Ok(())
    }
}

/// New question as entered by a visitor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionDraft {
    /// Topic name
    pub topic: String,
    /// Question text
    pub content: String,
    /// Submit without a name
    pub is_anonymous: bool,
    /// Submitter name, required unless anonymous
    pub full_name: String,
    /// Submitter email
    pub email: String,
    /// Optional attachment
    pub attachment: Option<Attachment>,
}

impl QuestionDraft {
    /// Create a draft
    pub fn new(topic: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Set submitter
    #[must_use]
    pub fn from_person(mut self, full_name: impl Into<String>, email: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self.email = email.into();
        self.is_anonymous = false;
        self
    }

    /// Submit anonymously
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.is_anonymous = true;
        self
    }

    /// Attach a file
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Check required fields
    pub fn validate(&self) -> ClientResult<()> {
        if self.topic.trim().is_empty() {
            return Err(ClientError::validation("topic is required"));
        }
        if self.content.trim().is_empty() {
            return Err(ClientError::validation("question content is required"));
        }
        if !self.is_anonymous && self.full_name.trim().is_empty() {
            return Err(ClientError::validation("name is required unless anonymous"));
        }
        if let Some(attachment) = &self.attachment {
            attachment.validate()?;
        }
        Ok(())
    }

    /// Question record sent to the backend; anonymous drafts carry no contact
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let (full_name, email) = if self.is_anonymous {
            ("", "")
        } else {
            (self.full_name.trim(), self.email.trim())
        };
        let mut record = json!({
            "questionTopic": self.topic.trim(),
            "questionContent": self.content.trim(),
            "isAnonymous": self.is_anonymous,
            "fullName": full_name,
            "email": email,
        });
        if let (Some(attachment), Some(map)) = (&self.attachment, record.as_object_mut()) {
            map.insert("attachment".into(), json!(attachment));
        }
        record
    }
}

/// Rating for an answered question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rating {
    /// Rated question
    pub question_id: QuestionId,
    /// Stars, 1 to 5
    pub stars: u8,
    /// Optional comment
    pub comment: String,
}

impl Rating {
    /// Create and check a rating
    pub fn new(question_id: QuestionId, stars: u8, comment: impl Into<String>) -> ClientResult<Self> {
        if !(1..=5).contains(&stars) {
            return Err(ClientError::validation("rating must be between 1 and 5"));
        }
        if question_id.as_str().is_empty() {
            return Err(ClientError::validation("question id is required"));
        }
        Ok(Self {
            question_id,
            stars,
            comment: comment.into(),
        })
    }

    /// Rating record sent to the backend
    #[must_use]
    pub fn to_wire(&self) -> Value {
        json!({
            "questionId": self.question_id,
            "rating": self.stars,
            "comment": self.comment.trim(),
        })
    }
}

/// Change requested on an existing question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionField {
    /// Show or hide from the public role
    Visibility(bool),
    /// Record an answer
    Answer {
        /// Answer text
        content: String,
        /// Publish with the answer
        visibility: bool,
    },
    /// Remove the question
    Delete,
}

impl QuestionField {
    /// Name used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Visibility(_) => "visibility",
            Self::Answer { .. } => "answer",
            Self::Delete => "delete",
        }
    }
}

/// Explicit viewer context for reads and mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerContext {
    role: ViewerRole,
}

impl ViewerContext {
    /// Anonymous visitor
    #[must_use]
    pub fn public() -> Self {
        Self {
            role: ViewerRole::Public,
        }
    }

    /// Signed-in administrator
    #[must_use]
    pub fn elevated() -> Self {
        Self {
            role: ViewerRole::Admin,
        }
    }

    /// Role
    #[inline]
    #[must_use]
    pub fn role(&self) -> ViewerRole {
        self.role
    }

    /// Check if privileged
    #[inline]
    #[must_use]
    pub fn is_elevated(&self) -> bool {
        self.role.is_privileged()
    }
}

impl Default for ViewerContext {
    fn default() -> Self {
        Self::public()
    }
}

/// Reported backend health
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    /// Liveness probe succeeded
    pub reachable: bool,
    /// Status record, if the backend returned one
    pub details: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn question_decodes_backend_record() {
        let q: Question = serde_json::from_value(json!({
            "questionId": "Q001",
            "questionTopic": "Admissions",
            "questionContent": "When does enrolment open?",
            "isAnonymous": true,
            "fullName": null,
            "answerStatus": "ตอบแล้ว",
            "answerContent": "In May",
            "publicDisplay": true,
            "averageRating": 4.5,
            "totalRatings": 2
        }))
        .unwrap();

        assert_eq!(q.id.as_str(), "Q001");
        assert_eq!(q.state, AnswerState::Answered);
        assert_eq!(q.answer.as_deref(), Some("In May"));
        assert!(q.visibility);
        assert_eq!(q.full_name, None);
        assert_eq!(q.total_ratings, Some(2));
    }

    #[test]
    fn question_accepts_short_field_names() {
        let q: Question = serde_json::from_value(json!({
            "id": "Q2",
            "visibility": false,
            "state": "waiting"
        }))
        .unwrap();

        assert_eq!(q.id, QuestionId::from("Q2"));
        assert_eq!(q.state, AnswerState::Waiting);
        assert!(!q.visible_to(ViewerRole::Public));
        assert!(q.visible_to(ViewerRole::Admin));
    }

    #[test]
    fn unrecognized_status_reads_as_rejected() {
        for raw in [json!("ปฏิเสธ"), json!(""), json!("on hold"), json!(null), json!(3)] {
            let state: AnswerState = serde_json::from_value(raw.clone()).unwrap();
            assert_eq!(state, AnswerState::Rejected, "{raw}");
        }
        let missing: Question = serde_json::from_value(json!({"questionId": "Q1"})).unwrap();
        assert_eq!(missing.state, AnswerState::Waiting);
    }

    #[test]
    fn blank_and_mistyped_cells_fall_back() {
        let q: Question = serde_json::from_value(json!({
            "questionId": 42,
            "questionTopic": null,
            "questionContent": "Where is the library?",
            "isAnonymous": "",
            "fullName": 7,
            "answerStatus": "ตอบแล้ว",
            "publicDisplay": "TRUE",
            "averageRating": "",
            "totalRatings": "3"
        }))
        .unwrap();

        assert_eq!(q.id.as_str(), "42");
        assert_eq!(q.topic, "");
        assert!(!q.is_anonymous);
        assert_eq!(q.full_name.as_deref(), Some("7"));
        assert!(q.visibility);
        assert_eq!(q.average_rating, None);
        assert_eq!(q.total_ratings, Some(3));
    }

    #[test]
    fn visibility_cell_follows_sheet_truthiness() {
        let visible = |cell: Value| -> bool {
            serde_json::from_value::<Question>(json!({ "publicDisplay": cell }))
                .unwrap()
                .visibility
        };
        assert!(visible(json!(true)));
        assert!(visible(json!(1)));
        assert!(visible(json!("yes")));
        assert!(!visible(json!(false)));
        assert!(!visible(json!("FALSE")));
        assert!(!visible(json!("0")));
        assert!(!visible(json!(null)));
    }

    #[test]
    fn question_survives_cache_round_trip() {
        let original: Question = serde_json::from_value(json!({
            "questionId": "Q5",
            "answerStatus": "ปฏิเสธ",
            "publicDisplay": true,
            "averageRating": 4.0,
            "totalRatings": 2
        }))
        .unwrap();

        let stored = serde_json::to_value(&original).unwrap();
        assert_eq!(stored["answerStatus"], json!("ปฏิเสธ"));
        let restored: Question = serde_json::from_value(stored).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn identity_keeps_extra_fields() {
        let id: Identity = serde_json::from_value(json!({
            "adminId": "admin01",
            "name": "Somchai",
            "role": "registrar"
        }))
        .unwrap();

        assert_eq!(id.display_name, "Somchai");
        assert_eq!(id.extra.get("role"), Some(&json!("registrar")));
    }

    #[test]
    fn draft_requires_name_unless_anonymous() {
        let draft = QuestionDraft::new("General", "Hello?");
        assert!(draft.validate().is_err());
        assert!(draft.clone().anonymous().validate().is_ok());
        assert!(draft.from_person("Anan", "a@example.com").validate().is_ok());
        assert!(QuestionDraft::new(" ", "x").anonymous().validate().is_err());
        assert!(QuestionDraft::new("General", "  ").anonymous().validate().is_err());
    }

    #[test]
    fn anonymous_draft_drops_contact() {
        let mut draft = QuestionDraft::new("General", " Hi ").from_person("Anan", "a@x");
        draft.is_anonymous = true;
        let wire = draft.to_wire();

        assert_eq!(wire["questionContent"], json!("Hi"));
        assert_eq!(wire["fullName"], json!(""));
        assert_eq!(wire["email"], json!(""));
    }

    #[test]
    fn attachment_limits() {
        let ok = Attachment {
            name: "a.png".into(),
            mime_type: "image/png".into(),
            base64: "aGVsbG8=".into(),
        };
        assert!(ok.validate().is_ok());

        let wrong_type = Attachment {
            mime_type: "application/x-sh".into(),
            ..ok.clone()
        };
        assert!(wrong_type.validate().is_err());

        let too_big = Attachment {
            base64: "A".repeat(MAX_ATTACHMENT_BYTES / 3 * 4 + 8),
            ..ok
        };
        assert!(too_big.validate().is_err());
    }

    #[test]
    fn rating_range_is_enforced() {
        assert!(Rating::new("Q1".into(), 0, "").is_err());
        assert!(Rating::new("Q1".into(), 6, "").is_err());
        let rating = Rating::new("Q1".into(), 5, " great ").unwrap();
        assert_eq!(rating.to_wire()["comment"], json!("great"));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("admin", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert!(Credentials::new(" ", "x").validate().is_err());
    }
}
