//! Collaborator-facing client
//!
//! [`QaClient`] is the one object a host (CLI, UI bridge) talks to. Reads go
//! cache-first with a stale fallback, writes go through the optimistic
//! coordinator, and the administrator session is owned by the session
//! manager. Every call takes the viewer context explicitly.

use crate::collection::QuestionSet;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, StorageError};
use crate::optimistic::{Mutation, OptimisticCoordinator, RecordAnswer, RemoveQuestion, SetVisibility};
use crate::session::{LivenessProbe, Session, SessionManager};
use crate::storage::{DurableStore, FileStore, MemoryStore, PREFERENCES_RECORD, RATED_RECORD};
use crate::types::{
    Credentials, Question, QuestionDraft, QuestionField, QuestionId, Rating, SystemStatus, Topic,
    ViewerContext,
};
use qaboard_cache::{CacheKey, CacheStore, Clock, CollectionKind, SystemClock, ViewerRole};
use qaboard_transport::{
    normalize, HttpScriptChannel, Params, ResponseEnvelope, ScriptChannel, TransportBroker,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a collection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Fresh cache entry
    Cache,
    /// Live transport call
    Remote,
    /// Expired cache entry served because the transport gave up
    StaleCache,
    /// Built-in defaults
    Defaults,
}

impl Source {
    /// Check if the data may be out of date
    #[must_use]
    pub fn is_degraded(self) -> bool {
        matches!(self, Self::StaleCache | Self::Defaults)
    }
}

/// Loaded items and their origin
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    /// Items
    pub items: T,
    /// Origin
    pub source: Source,
}

/// Either collection
#[derive(Debug, Clone, PartialEq)]
pub enum Collection {
    /// Question list
    Questions(Vec<Question>),
    /// Topic list
    Topics(Vec<Topic>),
}

impl Collection {
    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Questions(items) => items.len(),
            Self::Topics(items) => items.len(),
        }
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Something a visitor submits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// New question
    Question(QuestionDraft),
    /// Rating of an answered question
    Rating(Rating),
}

/// Result of a full reload
#[derive(Debug, Clone, PartialEq)]
pub struct Refreshed {
    /// Topic list
    pub topics: Loaded<Vec<Topic>>,
    /// Question list as visible to the caller
    pub questions: Loaded<Vec<Question>>,
}

/// Name recorded on answers when the session has no display name
const DEFAULT_ANSWERER: &str = "Administrator";

/// Builder for [`QaClient`]
#[derive(Debug)]
pub struct QaClientBuilder {
    config: ClientConfig,
    channel: Option<Arc<dyn ScriptChannel>>,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Arc<dyn DurableStore>>,
}

impl QaClientBuilder {
    /// Use this channel instead of HTTP
    #[must_use]
    pub fn channel(mut self, channel: Arc<dyn ScriptChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Use this clock instead of the system clock
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use this durable store instead of the configured one
    #[must_use]
    pub fn store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate configuration and assemble the client
    pub fn build(self) -> ClientResult<QaClient> {
        self.config.validate()?;

        let channel: Arc<dyn ScriptChannel> = match self.channel {
            Some(channel) => channel,
            None => Arc::new(HttpScriptChannel::new(&self.config.transport.endpoint)?),
        };
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self.store.unwrap_or_else(|| match &self.config.storage_path {
            Some(path) => Arc::new(FileStore::new(path)) as Arc<dyn DurableStore>,
            None => Arc::new(MemoryStore::new()),
        });

        let broker = Arc::new(TransportBroker::new(channel, self.config.transport.clone()));
        let cache = CacheStore::new(self.config.cache.clone(), clock.clone());
        let questions = QuestionSet::new();
        let sessions = SessionManager::new(store.clone(), clock.clone(), self.config.session_ttl());
        let coordinator = OptimisticCoordinator::new(broker.clone(), cache.clone(), questions.clone());

        Ok(QaClient {
            config: self.config,
            broker,
            cache,
            clock,
            store,
            sessions,
            questions,
            coordinator,
        })
    }
}

/// Question board client
#[derive(Debug)]
pub struct QaClient {
    config: ClientConfig,
    broker: Arc<TransportBroker>,
    cache: CacheStore,
    clock: Arc<dyn Clock>,
    store: Arc<dyn DurableStore>,
    sessions: SessionManager,
    questions: QuestionSet,
    coordinator: OptimisticCoordinator,
}

impl QaClient {
    /// Start building a client
    #[must_use]
    pub fn builder(config: ClientConfig) -> QaClientBuilder {
        QaClientBuilder {
            config,
            channel: None,
            clock: None,
            store: None,
        }
    }

    /// Client over HTTP with the configured store
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::builder(config).build()
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Broker
    #[must_use]
    pub fn broker(&self) -> &TransportBroker {
        &self.broker
    }

    /// Snapshot cache
    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Shared in-memory question list
    #[must_use]
    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    /// Context matching the current session
    #[must_use]
    pub fn viewer(&self) -> ViewerContext {
        if self.sessions.current().is_some() {
            ViewerContext::elevated()
        } else {
            ViewerContext::public()
        }
    }

    // ---- reads ----

    /// Load a collection as seen by `viewer`
    pub async fn load_collection(
        &self,
        kind: CollectionKind,
        viewer: &ViewerContext,
    ) -> ClientResult<Loaded<Collection>> {
        Ok(match kind {
            CollectionKind::Questions => {
                let loaded = self.load_questions(viewer).await?;
                Loaded {
                    items: Collection::Questions(loaded.items),
                    source: loaded.source,
                }
            }
            CollectionKind::Topics => {
                let loaded = self.load_topics(viewer).await;
                Loaded {
                    items: Collection::Topics(loaded.items),
                    source: loaded.source,
                }
            }
        })
    }

    /// Questions visible to `viewer`; the shared list receives everything fetched
    pub async fn load_questions(&self, viewer: &ViewerContext) -> ClientResult<Loaded<Vec<Question>>> {
        let role = viewer.role();
        let params = Params::new().with("includePrivate", role.is_privileged());
        let loaded = self
            .read_through::<Question>(CollectionKind::Questions, role, "getQuestions", params)
            .await?;

        self.questions.replace(loaded.items.clone());
        let items = loaded
            .items
            .into_iter()
            .filter(|q| q.visible_to(role))
            .collect();
        Ok(Loaded {
            items,
            source: loaded.source,
        })
    }

    /// Topic list; falls back to the configured defaults when nothing else is available
    pub async fn load_topics(&self, viewer: &ViewerContext) -> Loaded<Vec<Topic>> {
        match self
            .read_through::<Topic>(CollectionKind::Topics, viewer.role(), "getTopics", Params::new())
            .await
        {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "topics unavailable, using defaults");
                Loaded {
                    items: self.config.default_topics.iter().map(Topic::new).collect(),
                    source: Source::Defaults,
                }
            }
        }
    }

    /// Drop every cached snapshot and reload topics and questions concurrently
    pub async fn refresh(&self, viewer: &ViewerContext) -> ClientResult<Refreshed> {
        self.cache.evict(None).await;
        let (topics, questions) =
            futures::join!(self.load_topics(viewer), self.load_questions(viewer));
        Ok(Refreshed {
            topics,
            questions: questions?,
        })
    }

    async fn read_through<T>(
        &self,
        kind: CollectionKind,
        role: ViewerRole,
        action: &str,
        params: Params,
    ) -> ClientResult<Loaded<Vec<T>>>
    where
        T: DeserializeOwned + Serialize,
    {
        let key = CacheKey::new(kind, role);
        let freshness = self.config.freshness.for_collection(kind);

        if let Some(items) = self.cache.read_as::<Vec<T>>(&key, freshness.fresh()).await {
            return Ok(Loaded {
                items,
                source: Source::Cache,
            });
        }

        let error = match self.fetch_list::<T>(action, params).await {
            Ok(items) => {
                self.cache.write_as(key, &items).await;
                debug!(collection = %kind, %role, count = items.len(), "collection loaded");
                return Ok(Loaded {
                    items,
                    source: Source::Remote,
                });
            }
            Err(e) => e,
        };

        if error.allows_stale_fallback() {
            if let Some(items) = self.cache.read_as::<Vec<T>>(&key, freshness.fallback()).await {
                warn!(collection = %kind, %role, error = %error, "serving stale snapshot");
                return Ok(Loaded {
                    items,
                    source: Source::StaleCache,
                });
            }
        }
        Err(error)
    }

    async fn fetch_list<T: DeserializeOwned>(&self, action: &str, params: Params) -> ClientResult<Vec<T>> {
        let data = self
            .call(action, params, self.config.read_retries, "unable to load data")
            .await?
            .into_result()
            .map_err(ClientError::remote)?;
        serde_json::from_value(data).map_err(|e| ClientError::Decode(format!("{action}: {e}")))
    }

    /// Send, normalize, and map a failure envelope to a remote error
    async fn call(
        &self,
        action: &str,
        params: Params,
        retries: u32,
        failure_message: &str,
    ) -> ClientResult<ResponseEnvelope> {
        let envelope = normalize(self.broker.send(action, params, retries).await?);
        match envelope {
            ResponseEnvelope::Failure(message) => Err(ClientError::remote_or(message, failure_message)),
            success => Ok(success),
        }
    }

    // ---- submissions ----

    /// Submit a question or rating; returns the affected question id
    pub async fn submit(&self, submission: Submission) -> ClientResult<QuestionId> {
        match submission {
            Submission::Question(draft) => self.submit_question(draft).await,
            Submission::Rating(rating) => {
                let id = rating.question_id.clone();
                self.rate(rating).await?;
                Ok(id)
            }
        }
    }

    /// Submit a new question
    pub async fn submit_question(&self, draft: QuestionDraft) -> ClientResult<QuestionId> {
        draft.validate()?;
        let params = Params::new().with("questionData", draft.to_wire());
        let envelope = self
            .call(
                "submitQuestion",
                params,
                self.config.transport.default_retries,
                "unable to submit question",
            )
            .await?;

        let id = match envelope.field("questionId") {
            Some(Value::String(id)) if !id.is_empty() => QuestionId::new(id.clone()),
            Some(Value::Number(n)) => QuestionId::new(n.to_string()),
            _ => return Err(ClientError::Decode("submit response has no question id".into())),
        };
        self.cache.evict_partitions(CollectionKind::Questions).await;
        info!(question = %id, topic = %draft.topic, "question submitted");
        Ok(id)
    }

    /// Rate an answered question once
    pub async fn rate(&self, rating: Rating) -> ClientResult<()> {
        if self.has_rated(&rating.question_id).await {
            return Err(ClientError::validation(format!(
                "question {} already rated",
                rating.question_id
            )));
        }
        let params = Params::new().with("ratingData", rating.to_wire());
        self.call(
            "submitRating",
            params,
            self.config.transport.default_retries,
            "unable to submit rating",
        )
        .await?;

        let mut rated = self.rated_ids().await;
        rated.push(rating.question_id.clone());
        self.put_record(RATED_RECORD, &rated).await?;
        self.cache.evict_partitions(CollectionKind::Questions).await;
        info!(question = %rating.question_id, stars = rating.stars, "rating submitted");
        Ok(())
    }

    /// Check if this client already rated `id`
    pub async fn has_rated(&self, id: &QuestionId) -> bool {
        self.rated_ids().await.contains(id)
    }

    async fn rated_ids(&self) -> Vec<QuestionId> {
        match self.store.get(RATED_RECORD).await {
            Ok(Some(raw)) => serde_json::from_value(raw).unwrap_or_else(|e| {
                warn!(error = %e, "ignoring malformed rated list");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "cannot read rated list");
                Vec::new()
            }
        }
    }

    // ---- mutations ----

    /// Change a question optimistically; requires an elevated context
    pub async fn mutate(
        &self,
        id: &QuestionId,
        field: QuestionField,
        viewer: &ViewerContext,
    ) -> ClientResult<()> {
        if !viewer.is_elevated() {
            return Err(ClientError::Session(format!(
                "{} requires an administrator session",
                field.name()
            )));
        }

        let mutation: Box<dyn Mutation> = match field {
            QuestionField::Visibility(visible) => {
                let current = self
                    .questions
                    .get(id)
                    .ok_or_else(|| ClientError::validation(format!("question {id} not found")))?;
                if current.visibility == visible {
                    debug!(question = %id, visible, "visibility already set");
                    return Ok(());
                }
                Box::new(SetVisibility {
                    id: id.clone(),
                    visible,
                })
            }
            QuestionField::Answer { content, visibility } => {
                let content = content.trim();
                if content.is_empty() {
                    return Err(ClientError::validation("answer content is required"));
                }
                let answered_by = self
                    .sessions
                    .current()
                    .map(|s| s.identity.display_name)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| DEFAULT_ANSWERER.to_string());
                Box::new(RecordAnswer {
                    id: id.clone(),
                    content: content.to_string(),
                    answered_by,
                    visibility,
                    answered_at: self.clock.now(),
                })
            }
            QuestionField::Delete => Box::new(RemoveQuestion { id: id.clone() }),
        };

        self.coordinator.mutate(mutation.as_ref()).await.map(|_| ())
    }

    // ---- session ----

    /// Sign in and persist the session
    pub async fn login(&self, credentials: Credentials) -> ClientResult<Session> {
        credentials.validate()?;
        let params = Params::new().with("loginData", credentials.to_wire());
        let envelope = self
            .call(
                "adminLogin",
                params,
                self.config.transport.default_retries,
                "login failed",
            )
            .await?;

        let session = Session::from_login(&envelope, self.clock.now())?;
        self.sessions.commit(session.clone()).await?;
        info!(admin = %session.identity.id, "signed in");
        Ok(session)
    }

    /// Sign out; private questions leave the shared list
    pub async fn logout(&self) -> ClientResult<()> {
        self.sessions.clear().await?;
        self.questions
            .update(|qs| qs.retain(|q| q.visible_to(ViewerRole::Public)));
        info!("signed out");
        Ok(())
    }

    /// Active session
    #[must_use]
    pub fn get_session(&self) -> Option<Session> {
        self.sessions.current()
    }

    /// Restore the persisted session if it is within its lifetime and the
    /// far side is reachable
    pub async fn restore_session(&self) -> Option<Session> {
        self.sessions.resume(self.broker.as_ref()).await
    }

    // ---- status & preferences ----

    /// Liveness and the backend's status record
    pub async fn system_status(&self) -> SystemStatus {
        if !self.broker.probe().await {
            return SystemStatus {
                reachable: false,
                details: None,
            };
        }
        let details = match self
            .call("getSystemStatus", Params::new(), 0, "status unavailable")
            .await
        {
            Ok(ResponseEnvelope::Success(data)) => Some(data),
            Ok(ResponseEnvelope::Failure(_)) => None,
            Err(e) => {
                warn!(error = %e, "status request failed");
                None
            }
        };
        SystemStatus {
            reachable: true,
            details,
        }
    }

    /// Persisted preferences
    pub async fn preferences(&self) -> ClientResult<Map<String, Value>> {
        Ok(match self.store.get(PREFERENCES_RECORD).await? {
            Some(Value::Object(map)) => map,
            Some(_) => {
                warn!("ignoring malformed preferences");
                Map::new()
            }
            None => Map::new(),
        })
    }

    /// Shallow-merge `updates` into the persisted preferences
    pub async fn save_preferences(&self, updates: Map<String, Value>) -> ClientResult<Map<String, Value>> {
        let mut merged = self.preferences().await?;
        merged.extend(updates);
        self.put_record(PREFERENCES_RECORD, &merged).await?;
        Ok(merged)
    }

    async fn put_record<T: Serialize>(&self, record: &str, value: &T) -> ClientResult<()> {
        let value = serde_json::to_value(value).map_err(|e| StorageError::Encode {
            record: record.to_string(),
            reason: e.to_string(),
        })?;
        self.store.put(record, value).await?;
        Ok(())
    }
}
