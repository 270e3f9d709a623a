use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Difference between two corpus versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Added, modified or copied keys.
    pub added_or_modified: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    /// `(old_key, new_key)` pairs.
    pub renamed: BTreeSet<(String, String)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added_or_modified.is_empty() && self.deleted.is_empty() && self.renamed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added_or_modified.len() + self.deleted.len() + self.renamed.len()
    }
}

/// File attributes of a corpus file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: String,
}

/// A versioned corpus of text files the index is synchronized from.
pub trait DocumentSource: Send + Sync {
    /// Bring the corpus up to date with its upstream and return the new head
    /// version. Only fast-forwards are accepted; a diverged upstream is
    /// [`Error::SyncConflict`](crate::error::Error::SyncConflict).
    fn refresh(&self) -> Result<String>;

    /// Current head version, or `None` before the first refresh.
    fn head_version(&self) -> Result<Option<String>>;

    /// Changes between `old` and `new`. With no `old` version every file
    /// present at `new` counts as added.
    fn diff(&self, old: Option<&str>, new: &str) -> Result<ChangeSet>;

    /// Every key currently in the corpus that passes [`DocumentSource::accepts`].
    fn list_accepted_keys(&self) -> Result<BTreeSet<String>>;

    /// Raw bytes of `key`, or [`Error::NotFound`](crate::error::Error::NotFound).
    fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Time `key` first appeared in the corpus history.
    fn created_at(&self, key: &str) -> Result<DateTime<Utc>>;

    /// Whether `key` belongs in the index.
    fn accepts(&self, key: &str) -> bool;

    fn metadata(&self, key: &str) -> Result<Option<Metadata>>;
}
