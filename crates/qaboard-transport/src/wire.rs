//! Outbound call shape
//!
//! A logical call is an action name plus a parameter map. On the wire every
//! parameter becomes a URL-safe key/value pair; composite values travel as
//! compact JSON text and `null` values are dropped.

use crate::error::TransportError;
use crate::registry::HandleName;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Query key carrying the action name
pub const ACTION_KEY: &str = "action";

/// Query key carrying the response handle name
pub const CALLBACK_KEY: &str = "callback";

/// Ordered parameter map for one call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    /// Create empty parameter map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw parameter value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of parameters (including ones that encode to nothing)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wire form of every non-null parameter, in key order
    #[must_use]
    pub fn encoded(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter_map(|(key, value)| encode_value(value).map(|text| (key.clone(), text)))
            .collect()
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Encode one parameter value; `None` means the parameter is not sent
#[must_use]
pub fn encode_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// One logical request; immutable per attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    action: String,
    params: Arc<Params>,
    retries_remaining: u32,
}

impl RequestDescriptor {
    /// Create descriptor for the first attempt
    ///
    /// # Errors
    /// - `TransportError::InvalidRequest` if the action is blank or a
    ///   parameter collides with a reserved query key
    pub fn new(
        action: impl Into<String>,
        params: Params,
        max_retries: u32,
    ) -> Result<Self, TransportError> {
        let action = action.into();
        if action.trim().is_empty() {
            return Err(TransportError::InvalidRequest(
                "action must not be empty".to_string(),
            ));
        }
        for reserved in [ACTION_KEY, CALLBACK_KEY] {
            if params.get(reserved).is_some() {
                return Err(TransportError::InvalidRequest(format!(
                    "parameter name '{reserved}' is reserved"
                )));
            }
        }

        Ok(Self {
            action,
            params: Arc::new(params),
            retries_remaining: max_retries,
        })
    }

    /// Action name
    #[inline]
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Parameters
    #[inline]
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Retries left after this attempt
    #[inline]
    #[must_use]
    pub fn retries_remaining(&self) -> u32 {
        self.retries_remaining
    }

    /// Descriptor for the next attempt, or `None` when the budget is spent
    #[must_use]
    pub fn next_attempt(&self) -> Option<Self> {
        self.retries_remaining.checked_sub(1).map(|retries_remaining| Self {
            action: self.action.clone(),
            params: Arc::clone(&self.params),
            retries_remaining,
        })
    }
}

/// What a channel actually transmits for one attempt
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    action: String,
    callback: HandleName,
    params: Arc<Params>,
}

impl OutboundRequest {
    /// Bind a descriptor to the response handle of one attempt
    #[must_use]
    pub fn new(descriptor: &RequestDescriptor, callback: HandleName) -> Self {
        Self {
            action: descriptor.action.clone(),
            callback,
            params: Arc::clone(&descriptor.params),
        }
    }

    /// Action name
    #[inline]
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Response handle the far side must invoke
    #[inline]
    #[must_use]
    pub fn callback(&self) -> &HandleName {
        &self.callback
    }

    /// Parameters
    #[inline]
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Full query: action, callback, then every encoded parameter
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            (ACTION_KEY.to_string(), self.action.clone()),
            (CALLBACK_KEY.to_string(), self.callback.to_string()),
        ];
        pairs.extend(self.params.encoded());
        pairs
    }

    /// Resolve against an endpoint URL
    #[must_use]
    pub fn to_url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        url.query_pairs_mut().extend_pairs(self.query_pairs());
        url
    }
}
