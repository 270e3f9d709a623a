use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tantivy::directory::MmapDirectory;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Term};

use crate::analysis::tokenizer;
use crate::error::Result;
use crate::models::Document;
use crate::search::snapshot::{Fields, Reaper, Snapshot};

/// Smallest per-thread heap tantivy accepts for an index writer.
const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Directory holding the index files; `None` keeps the index in RAM.
    pub index_dir: Option<PathBuf>,
    /// Memory budget of the index writer in bytes
    pub writer_heap_bytes: usize,
    /// How long a superseded snapshot stays alive after a commit
    pub snapshot_grace: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            index_dir: None,
            writer_heap_bytes: 50_000_000,
            snapshot_grace: Duration::from_secs(60),
        }
    }
}

struct Staging {
    writer: IndexWriter,
    pending: usize,
}

/// Full-text index with staged writes and published snapshots.
///
/// One writer stages upserts and deletes, which become visible all at once on
/// [`IndexEngine::commit`]. Readers take the current [`Snapshot`] and keep
/// using it for the whole call.
pub struct IndexEngine {
    fields: Fields,
    reader: IndexReader,
    staging: Mutex<Staging>,
    current: RwLock<Arc<Snapshot>>,
    reaper: Mutex<Option<Reaper>>,
}

impl IndexEngine {
    /// Open the index in `options.index_dir`, creating it if needed, or
    /// build a fresh in-memory index.
    pub fn open(options: &EngineOptions) -> Result<Self> {
        let schema = Fields::schema();
        let index = match &options.index_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let directory = MmapDirectory::open(dir)?;
                Index::open_or_create(directory, schema)?
            }
            None => Index::create_in_ram(schema),
        };
        tokenizer::register(&index);

        let fields = Fields::from_schema(&index.schema())?;
        let writer: IndexWriter =
            index.writer_with_num_threads(1, options.writer_heap_bytes.max(MIN_WRITER_HEAP_BYTES))?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        let snapshot = Arc::new(Snapshot::new(reader.searcher(), fields, 0));
        tracing::info!(
            documents = snapshot.num_docs(),
            in_memory = options.index_dir.is_none(),
            "Opened index"
        );

        Ok(Self {
            fields,
            reader,
            staging: Mutex::new(Staging { writer, pending: 0 }),
            current: RwLock::new(snapshot),
            reaper: Mutex::new(Some(Reaper::spawn(options.snapshot_grace)?)),
        })
    }

    pub fn fields(&self) -> Fields {
        self.fields
    }

    /// Stage `document`, replacing any document with the same key.
    pub fn upsert(&self, document: &Document) -> Result<()> {
        tracing::debug!("Staging upsert of {}", document.key);
        let mut staging = self.staging.lock();
        staging
            .writer
            .delete_term(Term::from_field_text(self.fields.key, &document.key));
        staging.writer.add_document(self.fields.to_tantivy(document))?;
        staging.pending += 1;
        Ok(())
    }

    /// Stage the removal of every document in `keys`.
    pub fn delete(&self, keys: &BTreeSet<String>) {
        if keys.is_empty() {
            return;
        }
        let mut staging = self.staging.lock();
        for key in keys {
            tracing::debug!("Staging delete of {key}");
            staging
                .writer
                .delete_term(Term::from_field_text(self.fields.key, key));
            staging.pending += 1;
        }
    }

    /// Operations staged since the last commit.
    pub fn pending(&self) -> usize {
        self.staging.lock().pending
    }

    /// Apply all staged operations and publish a new snapshot.
    ///
    /// On failure the staged batch is rolled back and the previous snapshot
    /// stays current.
    pub fn commit(&self) -> Result<Arc<Snapshot>> {
        let mut staging = self.staging.lock();
        let pending = std::mem::take(&mut staging.pending);

        if let Err(e) = staging.writer.commit() {
            tracing::error!("Commit of {pending} staged operations failed: {e}");
            if let Err(rollback) = staging.writer.rollback() {
                tracing::error!("Rollback after failed commit also failed: {rollback}");
            }
            return Err(e.into());
        }
        self.reader.reload()?;

        // The staging lock is still held, so generations follow commit order.
        let generation = self.current.read().generation() + 1;
        let snapshot = Arc::new(Snapshot::new(self.reader.searcher(), self.fields, generation));
        let previous = std::mem::replace(&mut *self.current.write(), Arc::clone(&snapshot));
        drop(staging);

        self.retire(previous);
        tracing::info!(
            generation,
            documents = snapshot.num_docs(),
            "Committed {pending} operations"
        );
        Ok(snapshot)
    }

    /// The current snapshot. Later commits do not affect the returned value.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read())
    }

    pub fn list_keys(&self) -> Result<BTreeSet<String>> {
        self.snapshot().list_keys()
    }

    pub fn get_by_key(&self, key: &str) -> Result<Option<Document>> {
        if key.is_empty() {
            return Ok(None);
        }
        self.snapshot().get(key)
    }

    /// Drop every operation staged since the last commit.
    pub fn rollback(&self) -> Result<()> {
        let mut staging = self.staging.lock();
        if staging.pending > 0 {
            tracing::warn!("Discarding {} uncommitted operations", staging.pending);
            staging.pending = 0;
            staging.writer.rollback()?;
        }
        Ok(())
    }

    /// Discard uncommitted operations and release every retired snapshot.
    pub fn close(&self) -> Result<()> {
        self.rollback()?;
        // Dropping the reaper joins its thread.
        drop(self.reaper.lock().take());
        tracing::info!("Index closed");
        Ok(())
    }

    fn retire(&self, snapshot: Arc<Snapshot>) {
        match self.reaper.lock().as_ref() {
            Some(reaper) => reaper.retire(snapshot),
            None => tracing::debug!(
                generation = snapshot.generation(),
                "Index closed, releasing snapshot immediately"
            ),
        }
    }
}
