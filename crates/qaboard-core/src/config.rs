//! Client configuration
//!
//! Loaded from defaults, then a TOML file and environment overrides.

use crate::error::{ClientError, ClientResult};
use qaboard_cache::{CacheConfig, CollectionKind};
use qaboard_transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Endpoint override
pub const ENV_ENDPOINT: &str = "QABOARD_ENDPOINT";
/// Per-attempt timeout override, milliseconds
pub const ENV_TIMEOUT_MS: &str = "QABOARD_TIMEOUT_MS";
/// Default retry budget override
pub const ENV_RETRIES: &str = "QABOARD_RETRIES";
/// Durable store path override
pub const ENV_STORAGE: &str = "QABOARD_STORAGE";

/// Freshness ceilings for one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freshness {
    /// Maximum age served without a transport call
    pub fresh_secs: u64,
    /// Maximum age served when live data is unattainable
    pub fallback_secs: u64,
}

impl Freshness {
    /// Create ceilings
    #[must_use]
    pub const fn new(fresh_secs: u64, fallback_secs: u64) -> Self {
        Self {
            fresh_secs,
            fallback_secs,
        }
    }

    /// Primary ceiling
    #[inline]
    #[must_use]
    pub fn fresh(&self) -> Duration {
        Duration::from_secs(self.fresh_secs)
    }

    /// Fallback ceiling
    #[inline]
    #[must_use]
    pub fn fallback(&self) -> Duration {
        Duration::from_secs(self.fallback_secs)
    }
}

/// Freshness ceilings per collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessPolicy {
    /// Question list: 30s fresh, 5 minutes fallback
    pub questions: Freshness,
    /// Topic list: 5 minutes fresh, 1 hour fallback
    pub topics: Freshness,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            questions: Freshness::new(30, 300),
            topics: Freshness::new(300, 3_600),
        }
    }
}

impl FreshnessPolicy {
    /// Ceilings for a collection
    #[must_use]
    pub fn for_collection(&self, kind: CollectionKind) -> Freshness {
        match kind {
            CollectionKind::Questions => self.questions,
            CollectionKind::Topics => self.topics,
        }
    }
}

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker settings
    pub transport: TransportConfig,
    /// Snapshot cache settings
    pub cache: CacheConfig,
    /// Read freshness ceilings
    pub freshness: FreshnessPolicy,
    /// Retries for collection reads
    pub read_retries: u32,
    /// Hard session lifetime in seconds
    pub session_ttl_secs: u64,
    /// Durable store file; in-memory when unset
    pub storage_path: Option<PathBuf>,
    /// Topics served when neither transport nor cache can supply any
    pub default_topics: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            cache: CacheConfig::default(),
            freshness: FreshnessPolicy::default(),
            read_retries: 1,
            session_ttl_secs: 24 * 60 * 60,
            storage_path: None,
            default_topics: vec![
                "Admissions".to_string(),
                "Documents".to_string(),
                "Academics".to_string(),
                "Student Affairs".to_string(),
                "General".to_string(),
            ],
        }
    }
}

impl ClientConfig {
    /// Defaults with environment overrides
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Parse TOML; omitted fields keep their defaults
    pub fn from_toml_str(source: &str) -> ClientResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Apply overrides from a variable lookup; unparsable values are ignored
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|s| !s.trim().is_empty()) {
            self.transport.endpoint = endpoint;
        }
        if let Some(timeout_ms) = lookup(ENV_TIMEOUT_MS).and_then(|s| s.parse().ok()) {
            self.transport.timeout_ms = timeout_ms;
        }
        if let Some(retries) = lookup(ENV_RETRIES).and_then(|s| s.parse().ok()) {
            self.transport.default_retries = retries;
        }
        if let Some(path) = lookup(ENV_STORAGE).filter(|s| !s.trim().is_empty()) {
            self.storage_path = Some(PathBuf::from(path));
        }
        self
    }

    /// With endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.transport.endpoint = endpoint.into();
        self
    }

    /// With durable store file
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Session lifetime
    #[inline]
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Check consistency
    pub fn validate(&self) -> ClientResult<()> {
        self.transport.validate().map_err(ClientError::Config)?;
        for kind in CollectionKind::ALL {
            let freshness = self.freshness.for_collection(kind);
            if freshness.fallback_secs < freshness.fresh_secs {
                return Err(ClientError::Config(format!(
                    "{kind} fallback ceiling must not be shorter than its fresh ceiling"
                )));
            }
            if freshness.fallback_secs > self.cache.retention_secs {
                return Err(ClientError::Config(format!(
                    "{kind} fallback ceiling exceeds cache retention"
                )));
            }
        }
        if self.session_ttl_secs == 0 {
            return Err(ClientError::Config("session ttl must be positive".into()));
        }
        if self.cache.max_capacity == 0 {
            return Err(ClientError::Config("cache capacity must be positive".into()));
        }
        Ok(())
    }
}
