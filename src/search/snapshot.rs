use std::cmp::Reverse;
use std::collections::{BTreeSet, VecDeque};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use tantivy::collector::TopDocs;
use tantivy::query::{Query, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, FAST, INDEXED,
    STORED, STRING,
};
use tantivy::{DocAddress, DocId, Searcher, SegmentReader, TantivyDocument, Term};

use crate::analysis::tokenizer::TOKENIZER_NAME;
use crate::error::Result;
use crate::models::Document;
use crate::search::query::SortOrder;

pub const KEY: &str = "key";
pub const CONTENT: &str = "content";
pub const HTML: &str = "html";
pub const CREATED: &str = "created";

/// Field handles of the document schema.
#[derive(Debug, Clone, Copy)]
pub struct Fields {
    pub key: Field,
    pub content: Field,
    pub html: Field,
    pub created: Field,
}

impl Fields {
    pub fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field(KEY, STRING | STORED | FAST);

        let content_indexing = TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER_NAME)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let content_options = TextOptions::default()
            .set_indexing_options(content_indexing)
            .set_stored();
        builder.add_text_field(CONTENT, content_options);

        builder.add_text_field(HTML, STORED);
        builder.add_i64_field(CREATED, INDEXED | STORED | FAST);
        builder.build()
    }

    pub fn from_schema(schema: &Schema) -> Result<Self> {
        Ok(Self {
            key: schema.get_field(KEY)?,
            content: schema.get_field(CONTENT)?,
            html: schema.get_field(HTML)?,
            created: schema.get_field(CREATED)?,
        })
    }

    pub fn to_tantivy(&self, document: &Document) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.key, &document.key);
        doc.add_text(self.content, &document.content);
        doc.add_text(self.html, &document.html);
        doc.add_i64(self.created, document.created_at.timestamp_millis());
        doc
    }

    pub fn from_tantivy(&self, doc: &TantivyDocument) -> Document {
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let created_millis = doc
            .get_first(self.created)
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        Document {
            key: text(self.key),
            content: text(self.content),
            html: text(self.html),
            created_at: Utc
                .timestamp_millis_opt(created_millis)
                .single()
                .unwrap_or_default(),
        }
    }
}

/// An immutable, point-in-time view of the index.
///
/// Everything read through one `Snapshot` reflects the same committed batch,
/// regardless of commits that happen while the snapshot is held.
pub struct Snapshot {
    searcher: Searcher,
    fields: Fields,
    generation: u64,
}

impl Snapshot {
    pub(crate) fn new(searcher: Searcher, fields: Fields, generation: u64) -> Self {
        Self {
            searcher,
            fields,
            generation,
        }
    }

    /// Number of commits published before this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }

    /// All keys visible in this snapshot, in lexicographic order.
    pub fn list_keys(&self) -> Result<BTreeSet<String>> {
        let mut keys = BTreeSet::new();
        let mut buffer = String::new();

        for segment_reader in self.searcher.segment_readers() {
            let Some(column) = segment_reader.fast_fields().str(KEY)? else {
                continue;
            };
            for doc in segment_reader.doc_ids_alive() {
                for ord in column.term_ords(doc) {
                    buffer.clear();
                    column.ord_to_str(ord, &mut buffer)?;
                    keys.insert(buffer.clone());
                }
            }
        }

        Ok(keys)
    }

    pub fn get(&self, key: &str) -> Result<Option<Document>> {
        let query = TermQuery::new(
            Term::from_field_text(self.fields.key, key),
            IndexRecordOption::Basic,
        );
        let top = self.searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.first() {
            Some((_, address)) => Ok(Some(self.document(*address)?)),
            None => Ok(None),
        }
    }

    pub fn document(&self, address: DocAddress) -> Result<Document> {
        let doc: TantivyDocument = self.searcher.doc(address)?;
        Ok(self.fields.from_tantivy(&doc))
    }

    /// Addresses of the first `limit` matches of `query`, in `sort` order.
    pub fn top_addresses(
        &self,
        query: &dyn Query,
        sort: SortOrder,
        limit: usize,
    ) -> Result<Vec<DocAddress>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let addresses = match sort {
            SortOrder::Relevance => self
                .searcher
                .search(query, &TopDocs::with_limit(limit))?
                .into_iter()
                .map(|(_, address)| address)
                .collect(),
            SortOrder::CreatedDesc => {
                let collector = TopDocs::with_limit(limit).custom_score(created_then_key);
                self.searcher
                    .search(query, &collector)?
                    .into_iter()
                    .map(|(_, address)| address)
                    .collect()
            }
        };
        Ok(addresses)
    }
}

/// Sort score for time ordering: newest first, then ascending key. `TopDocs`
/// keeps the largest scores, so the key is wrapped in `Reverse`.
fn created_then_key(
    segment_reader: &SegmentReader,
) -> impl FnMut(DocId) -> (i64, Reverse<String>) {
    let created = segment_reader.fast_fields().i64(CREATED).ok();
    let keys = segment_reader.fast_fields().str(KEY).ok().flatten();

    move |doc: DocId| {
        let created_at = created
            .as_ref()
            .and_then(|column| column.first(doc))
            .unwrap_or(i64::MIN);

        let mut key = String::new();
        if let Some(column) = keys.as_ref() {
            if let Some(ord) = column.term_ords(doc).next() {
                if column.ord_to_str(ord, &mut key).is_err() {
                    key.clear();
                }
            }
        }
        (created_at, Reverse(key))
    }
}

struct Retired {
    snapshot: Arc<Snapshot>,
    release_at: Instant,
}

/// Background thread that keeps superseded snapshots alive for a grace
/// period before dropping them.
pub(crate) struct Reaper {
    sender: Option<Sender<Retired>>,
    handle: Option<JoinHandle<()>>,
    grace: Duration,
}

impl Reaper {
    pub(crate) fn spawn(grace: Duration) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Retired>();

        let handle = std::thread::Builder::new()
            .name("snapshot-reaper".to_string())
            .spawn(move || {
                // Grace is fixed, so deadlines arrive in order.
                let mut queue: VecDeque<Retired> = VecDeque::new();
                loop {
                    let received = match queue.front() {
                        Some(next) => receiver
                            .recv_timeout(next.release_at.saturating_duration_since(Instant::now())),
                        None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };
                    match received {
                        Ok(retired) => queue.push_back(retired),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let now = Instant::now();
                    while queue.front().is_some_and(|r| r.release_at <= now) {
                        if let Some(retired) = queue.pop_front() {
                            tracing::debug!(
                                generation = retired.snapshot.generation(),
                                "Releasing superseded snapshot"
                            );
                        }
                    }
                }
                tracing::debug!("Snapshot reaper stopping, releasing {} snapshots", queue.len());
            })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            grace,
        })
    }

    pub(crate) fn retire(&self, snapshot: Arc<Snapshot>) {
        let retired = Retired {
            snapshot,
            release_at: Instant::now() + self.grace,
        };
        if let Some(sender) = &self.sender {
            if let Err(mpsc::SendError(retired)) = sender.send(retired) {
                tracing::warn!(
                    generation = retired.snapshot.generation(),
                    "Snapshot reaper is gone, releasing snapshot immediately"
                );
            }
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        // Closing the channel stops the thread, which drops whatever it holds.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Snapshot reaper thread panicked");
            }
        }
    }
}
