//! Cache keys
//!
//! A key names one (collection, viewer role) partition. Privileged and public
//! snapshots of the same collection never share an entry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Collections the client reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Question list
    Questions,
    /// Topic list
    Topics,
}

impl CollectionKind {
    /// Every collection
    pub const ALL: [CollectionKind; 2] = [CollectionKind::Questions, CollectionKind::Topics];

    /// Stable name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Questions => "questions",
            Self::Topics => "topics",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Viewer role a read is performed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerRole {
    /// Signed-in administrator; sees private items
    Admin,
    /// Anonymous visitor
    Public,
}

impl ViewerRole {
    /// Every role, for partition-wide eviction
    pub const ALL: [ViewerRole; 2] = [ViewerRole::Admin, ViewerRole::Public];

    /// Stable name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Public => "public",
        }
    }

    /// Check if privileged
    #[inline]
    #[must_use]
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for ViewerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cache partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    collection: CollectionKind,
    role: ViewerRole,
}

impl CacheKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(collection: CollectionKind, role: ViewerRole) -> Self {
        Self { collection, role }
    }

    /// Collection
    #[inline]
    #[must_use]
    pub fn collection(&self) -> CollectionKind {
        self.collection
    }

    /// Role
    #[inline]
    #[must_use]
    pub fn role(&self) -> ViewerRole {
        self.role
    }

    /// Every role partition of a collection
    #[must_use]
    pub fn partitions(collection: CollectionKind) -> [CacheKey; 2] {
        ViewerRole::ALL.map(|role| CacheKey::new(collection, role))
    }

    /// Rendered name inside a namespace, e.g. `qa:questions:admin`
    #[must_use]
    pub fn qualified(&self, namespace: &str) -> String {
        format!("{namespace}:{}:{}", self.collection, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_partition_keys() {
        let admin = CacheKey::new(CollectionKind::Questions, ViewerRole::Admin);
        let public = CacheKey::new(CollectionKind::Questions, ViewerRole::Public);

        assert_ne!(admin, public);
        assert_eq!(admin.qualified("qa"), "qa:questions:admin");
        assert_eq!(public.qualified("qa"), "qa:questions:public");
    }

    #[test]
    fn partitions_cover_every_role() {
        let keys = CacheKey::partitions(CollectionKind::Topics);
        assert_eq!(keys.len(), ViewerRole::ALL.len());
        assert!(keys.iter().all(|key| key.collection() == CollectionKind::Topics));
    }
}
