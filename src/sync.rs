use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::git::source::{ChangeSet, DocumentSource};
use crate::models::Document;
use crate::render::Renderer;
use crate::search::engine::IndexEngine;

/// Outcome of one synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Corpus version the index now reflects.
    pub head: Option<String>,
    pub upserted: usize,
    pub deleted: usize,
    /// Files that could not be read and were left out.
    pub skipped: usize,
    /// Index keys removed because the corpus no longer has them.
    pub reconciled: usize,
    pub committed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Updating,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Last corpus version fully applied to the index.
    pub synced: Option<String>,
}

/// Keeps the index in step with the corpus.
///
/// Calls are single-flight: a second `update` waits for the running one.
pub struct SyncCoordinator {
    source: Arc<dyn DocumentSource>,
    engine: Arc<IndexEngine>,
    renderer: Arc<dyn Renderer>,
    flight: Mutex<()>,
    synced: RwLock<Option<String>>,
    updating: AtomicBool,
}

struct Busy<'a>(&'a AtomicBool);

impl<'a> Busy<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncCoordinator {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        engine: Arc<IndexEngine>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            source,
            engine,
            renderer,
            flight: Mutex::new(()),
            synced: RwLock::new(None),
            updating: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            state: if self.updating.load(Ordering::SeqCst) {
                SyncState::Updating
            } else {
                SyncState::Idle
            },
            synced: self.synced.read().clone(),
        }
    }

    /// Pull corpus changes and apply them to the index.
    pub fn update(&self) -> Result<SyncReport> {
        let _flight = self.flight.lock();
        self.update_locked()
    }

    /// Remove index entries whose keys are no longer in the corpus. Returns the
    /// number removed.
    pub fn reconcile(&self) -> Result<usize> {
        let _flight = self.flight.lock();
        self.reconcile_locked()
    }

    /// An update followed by a reconcile pass, as one flight.
    pub fn update_and_reconcile(&self) -> Result<SyncReport> {
        let _flight = self.flight.lock();
        let mut report = self.update_locked()?;
        report.reconciled = self.reconcile_locked()?;
        report.committed |= report.reconciled > 0;
        Ok(report)
    }

    /// Wait for a running pass to finish.
    pub fn close(&self) -> Result<()> {
        let _flight = self.flight.lock();
        tracing::info!("Sync coordinator stopped at {:?}", self.synced.read());
        Ok(())
    }

    fn update_locked(&self) -> Result<SyncReport> {
        let _busy = Busy::new(&self.updating);

        let head = self.source.refresh()?;
        let marker = self.synced.read().clone();
        let mut report = SyncReport {
            head: Some(head.clone()),
            ..SyncReport::default()
        };

        if marker.as_deref() == Some(head.as_str()) {
            tracing::debug!("Corpus unchanged at {head}");
            return Ok(report);
        }
        tracing::info!(
            "Syncing corpus {} -> {head}",
            marker.as_deref().unwrap_or("(none)")
        );

        let changes = self.source.diff(marker.as_deref(), &head)?;
        tracing::debug!(changes = changes.len(), "Diffed corpus");
        if let Err(e) = self.apply(&changes, &mut report) {
            if e.is_io_failure() {
                tracing::error!("Sync aborted on I/O failure: {e}");
            } else {
                tracing::warn!("Sync aborted: {e}");
            }
            if let Err(rollback) = self.engine.rollback() {
                tracing::error!("Rollback after failed sync also failed: {rollback}");
            }
            return Err(e);
        }

        if self.engine.pending() > 0 {
            self.engine.commit()?;
            report.committed = true;
        }
        *self.synced.write() = Some(head);

        tracing::info!(
            upserted = report.upserted,
            deleted = report.deleted,
            skipped = report.skipped,
            "Sync complete"
        );
        Ok(report)
    }

    /// Stage the accepted part of `changes`. Deletes are staged first so a key
    /// that is both removed and re-added ends up present.
    fn apply(&self, changes: &ChangeSet, report: &mut SyncReport) -> Result<()> {
        let mut upserts = BTreeSet::new();
        let mut deletes = BTreeSet::new();

        for key in &changes.added_or_modified {
            upserts.insert(key.as_str());
        }
        for key in &changes.deleted {
            deletes.insert(key.as_str());
        }
        for (from, to) in &changes.renamed {
            upserts.insert(to.as_str());
            deletes.insert(from.as_str());
        }

        let deletes: BTreeSet<String> = deletes
            .into_iter()
            .filter(|key| !upserts.contains(key) && self.source.accepts(key))
            .map(str::to_string)
            .collect();
        report.deleted = deletes.len();
        self.engine.delete(&deletes);

        for key in upserts.into_iter().filter(|key| self.source.accepts(key)) {
            match self.load(key) {
                Ok(document) => {
                    self.engine.upsert(&document)?;
                    report.upserted += 1;
                }
                Err(e @ (Error::NotFound(_) | Error::Io(_) | Error::InvalidUtf8(_))) => {
                    tracing::warn!("Skipping {key}: {e}");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Document> {
        let bytes = self.source.read(key)?;
        let content = String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8(key.to_string()))?;
        let html = self.renderer.render(&content);
        let created_at = self.source.created_at(key)?;
        Ok(Document {
            key: key.to_string(),
            content,
            html,
            created_at,
        })
    }

    fn reconcile_locked(&self) -> Result<usize> {
        let corpus = self.source.list_accepted_keys()?;
        let surplus: BTreeSet<String> = self
            .engine
            .list_keys()?
            .into_iter()
            .filter(|key| !corpus.contains(key))
            .collect();

        if surplus.is_empty() {
            return Ok(0);
        }
        tracing::info!("Removing {} keys missing from the corpus", surplus.len());
        self.engine.delete(&surplus);
        self.engine.commit()?;
        Ok(surplus.len())
    }
}
