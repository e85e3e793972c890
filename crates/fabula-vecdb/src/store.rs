//! SQLite-backed vector store.
//!
//! One row per collection in `collections` (metric, established dimension,
//! next sequence number) and one row per entry in `entries`, vectors stored
//! as little-endian `f32` blobs. Entries are append-only; ids are assigned
//! from a per-collection sequence and never reused until [`VectorStore::recreate`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::error::{Result, VecDbError};
use crate::metric::DistanceMetric;

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "aesop_fables";

/// Default upper bound on entries per batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS collections (
    name        TEXT PRIMARY KEY,
    metric      TEXT NOT NULL,
    dimension   INTEGER,
    next_seq    INTEGER NOT NULL DEFAULT 0,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS entries (
    collection     TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
    seq            INTEGER NOT NULL,
    id             TEXT NOT NULL,
    title          TEXT NOT NULL,
    original_title TEXT NOT NULL,
    source_url     TEXT NOT NULL,
    word_count     INTEGER NOT NULL,
    content_length INTEGER NOT NULL,
    document       TEXT NOT NULL,
    dimension      INTEGER NOT NULL,
    vector         BLOB NOT NULL,
    PRIMARY KEY (collection, seq),
    UNIQUE (collection, id)
);
";

const ENTRY_COLUMNS: &str = "seq, id, title, original_title, source_url, word_count, \
                             content_length, document, dimension, vector";

/// Store configuration.
///
/// The metric is fixed when the collection is first created; reopening with
/// a different metric is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Logical collection name.
    pub collection: String,
    pub description: String,
    pub metric: DistanceMetric,
    /// Largest batch [`VectorStore::upsert_batch`] accepts.
    pub max_batch_size: usize,
    /// Prefix of assigned ids (`fable_0000`).
    pub id_prefix: String,
    /// Zero-padding width of the numeric id part.
    pub id_width: usize,
    /// Added to the sequence number when formatting ids.
    pub id_offset: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            description: "Deduplicated Aesop fables".to_string(),
            metric: DistanceMetric::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            id_prefix: "fable_".to_string(),
            id_width: 4,
            id_offset: 0,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    #[must_use]
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }

    #[must_use]
    pub fn with_id_format(mut self, prefix: impl Into<String>, width: usize, offset: u64) -> Self {
        self.id_prefix = prefix.into();
        self.id_width = width;
        self.id_offset = offset;
        self
    }

    /// Checks the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `VecDbError::InvalidConfig` for an empty collection name or a
    /// zero batch size.
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(VecDbError::InvalidConfig("collection name is empty".into()));
        }
        if self.max_batch_size == 0 {
            return Err(VecDbError::InvalidConfig("max_batch_size must be positive".into()));
        }
        Ok(())
    }

    /// Formats the id for sequence number `seq`.
    #[must_use]
    pub fn format_id(&self, seq: u64) -> String {
        format!(
            "{}{:0width$}",
            self.id_prefix,
            seq + self.id_offset,
            width = self.id_width
        )
    }
}

/// Per-entry metadata persisted next to the vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub title: String,
    pub original_title: String,
    pub source_url: String,
    pub word_count: usize,
    /// Character count of the stored document.
    pub content_length: usize,
}

/// An entry submitted for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub document: String,
    pub metadata: EntryMetadata,
    /// Precomputed vector; computed with the store's embedder when `None`.
    pub vector: Option<Vec<f32>>,
}

impl NewEntry {
    #[must_use]
    pub fn new(document: impl Into<String>, metadata: EntryMetadata) -> Self {
        Self {
            document: document.into(),
            metadata,
            vector: None,
        }
    }

    #[must_use]
    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }
}

/// A persisted entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub id: String,
    /// Insertion sequence number within the collection.
    pub seq: u64,
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    pub document: String,
    pub vector: Vec<f32>,
}

/// Handle to one collection of a SQLite vector database.
pub struct VectorStore {
    conn: Connection,
    config: StoreConfig,
    embedder: Arc<dyn Embedder>,
    dimension: Option<usize>,
    next_seq: u64,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("collection", &self.config.collection)
            .field("metric", &self.config.metric)
            .field("embedder", &self.embedder.name())
            .field("dimension", &self.dimension)
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

impl VectorStore {
    /// Opens or creates the store at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails on I/O or SQLite errors, and with `InvalidConfig` if the
    /// collection exists with a different metric. An embedder of another
    /// dimension is accepted here so the collection can still be recreated;
    /// writes and queries reject its vectors until then.
    pub fn open(
        path: impl AsRef<Path>,
        config: StoreConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!(path = %path.display(), "opening vector store");
        Self::init(Connection::open(path)?, config, embedder)
    }

    /// Opens a transient in-memory store.
    ///
    /// # Errors
    ///
    /// See [`VectorStore::open`].
    pub fn open_in_memory(config: StoreConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, config, embedder)
    }

    fn init(conn: Connection, config: StoreConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        config.validate()?;
        conn.pragma_update(None, "foreign_keys", 1)?;
        conn.execute_batch(SCHEMA_SQL)?;

        let created = conn.execute(
            "INSERT OR IGNORE INTO collections (name, metric, description) VALUES (?1, ?2, ?3)",
            params![config.collection, config.metric.as_str(), config.description],
        )?;
        if created > 0 {
            info!(collection = %config.collection, metric = %config.metric, "created collection");
        }

        let (metric, dimension, next_seq): (String, Option<i64>, i64) = conn.query_row(
            "SELECT metric, dimension, next_seq FROM collections WHERE name = ?1",
            params![config.collection],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let persisted: DistanceMetric = metric.parse()?;
        if persisted != config.metric {
            return Err(VecDbError::InvalidConfig(format!(
                "collection {:?} uses metric {persisted}, requested {}",
                config.collection, config.metric
            )));
        }

        let dimension = dimension.map(|d| i64_to_usize(d, "dimension")).transpose()?;

        Ok(Self {
            conn,
            config,
            embedder,
            dimension,
            next_seq: i64_to_u64(next_seq, "next_seq")?,
        })
    }

    /// Appends one batch, returning the assigned ids in input order.
    ///
    /// Missing vectors are computed with the embedder. Every vector is
    /// validated before anything is written, and the batch is committed in
    /// a single transaction.
    ///
    /// # Errors
    ///
    /// - `BatchSizeExceeded` if the batch is larger than `max_batch_size`
    /// - `DimensionMismatch` if a vector disagrees with the collection dimension
    /// - `Embedding` if the embedder fails or returns unusable vectors
    pub fn upsert_batch(&mut self, entries: Vec<NewEntry>) -> Result<Vec<String>> {
        let max = self.config.max_batch_size;
        if entries.len() > max {
            return Err(VecDbError::BatchSizeExceeded {
                size: entries.len(),
                max,
            });
        }
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.embed_missing(entries)?;
        let dimension = self.validate_vectors(&entries)?;

        let mut ids = Vec::with_capacity(entries.len());
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO entries (collection, seq, id, title, original_title, source_url, \
                 word_count, content_length, document, dimension, vector) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for (offset, (entry, vector)) in entries.iter().enumerate() {
                let seq = self.next_seq + offset as u64;
                let id = self.config.format_id(seq);
                stmt.execute(params![
                    self.config.collection,
                    u64_to_i64(seq, "seq")?,
                    id,
                    entry.metadata.title,
                    entry.metadata.original_title,
                    entry.metadata.source_url,
                    usize_to_i64(entry.metadata.word_count, "word_count")?,
                    usize_to_i64(entry.metadata.content_length, "content_length")?,
                    entry.document,
                    usize_to_i64(dimension, "dimension")?,
                    encode_f32_blob(vector),
                ])?;
                ids.push(id);
            }
        }
        let next_seq = self.next_seq + entries.len() as u64;
        tx.execute(
            "UPDATE collections SET next_seq = ?1, dimension = ?2 WHERE name = ?3",
            params![
                u64_to_i64(next_seq, "next_seq")?,
                usize_to_i64(dimension, "dimension")?,
                self.config.collection
            ],
        )?;
        tx.commit()?;

        self.next_seq = next_seq;
        self.dimension = Some(dimension);
        debug!(count = ids.len(), next_seq, "batch committed");
        Ok(ids)
    }

    /// Splits `entries` into batches of at most `max_batch_size` and upserts
    /// them in order. Batches committed before a failure stay committed.
    ///
    /// # Errors
    ///
    /// The first batch error, as from [`VectorStore::upsert_batch`].
    pub fn upsert_chunked(&mut self, entries: Vec<NewEntry>) -> Result<Vec<String>> {
        let max = self.config.max_batch_size;
        let total = entries.len().div_ceil(max);
        let mut ids = Vec::with_capacity(entries.len());
        let mut rest = entries.into_iter();
        for batch_no in 1..=total {
            let batch: Vec<NewEntry> = rest.by_ref().take(max).collect();
            info!(
                collection = %self.config.collection,
                size = batch.len(),
                "adding batch {batch_no}/{total}"
            );
            ids.extend(self.upsert_batch(batch)?);
        }
        Ok(ids)
    }

    fn embed_missing(&self, entries: Vec<NewEntry>) -> Result<Vec<(NewEntry, Vec<f32>)>> {
        let pending: Vec<&str> = entries
            .iter()
            .filter(|e| e.vector.is_none())
            .map(|e| e.document.as_str())
            .collect();
        let computed = if pending.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&pending)?
        };
        if computed.len() != pending.len() {
            return Err(VecDbError::Embedding(format!(
                "embedder {} returned {} vectors for {} documents",
                self.embedder.name(),
                computed.len(),
                pending.len()
            )));
        }
        let mut computed = computed.into_iter();

        entries
            .into_iter()
            .map(|mut entry| {
                let vector = match entry.vector.take() {
                    Some(v) => v,
                    None => computed.next().ok_or_else(|| {
                        VecDbError::Embedding("embedder returned too few vectors".into())
                    })?,
                };
                Ok((entry, vector))
            })
            .collect()
    }

    /// Returns the dimension every vector in the batch must share.
    fn validate_vectors(&self, entries: &[(NewEntry, Vec<f32>)]) -> Result<usize> {
        let expected = match (self.dimension, entries.first()) {
            (Some(d), _) => d,
            (None, Some((_, v))) => v.len(),
            (None, None) => return Ok(0),
        };
        if expected == 0 {
            return Err(VecDbError::Embedding("empty embedding vector".into()));
        }
        for (entry, vector) in entries {
            if vector.len() != expected {
                return Err(VecDbError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(VecDbError::Embedding(format!(
                    "non-finite vector for {:?}",
                    entry.metadata.source_url
                )));
            }
        }
        Ok(expected)
    }

    /// All entries in insertion order.
    ///
    /// # Errors
    ///
    /// Fails on SQLite errors or undecodable rows.
    pub fn get_all(&self) -> Result<Vec<IndexedEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE collection = ?1 ORDER BY seq"
        ))?;
        let rows = stmt.query_map(params![self.config.collection], EntryRow::from_row)?;
        rows.map(|row| row?.into_entry()).collect()
    }

    /// Looks up one entry by id.
    ///
    /// # Errors
    ///
    /// Fails on SQLite errors or an undecodable row.
    pub fn get(&self, id: &str) -> Result<Option<IndexedEntry>> {
        self.conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE collection = ?1 AND id = ?2"),
                params![self.config.collection, id],
                EntryRow::from_row,
            )
            .optional()?
            .map(EntryRow::into_entry)
            .transpose()
    }

    /// Number of entries in the collection.
    ///
    /// # Errors
    ///
    /// Fails on SQLite errors.
    pub fn count(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE collection = ?1",
            params![self.config.collection],
            |row| row.get(0),
        )?;
        i64_to_usize(n, "count")
    }

    /// Deletes every entry, resets the id sequence and forgets the dimension.
    ///
    /// # Errors
    ///
    /// Fails on SQLite errors; the collection is unchanged in that case.
    pub fn recreate(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM entries WHERE collection = ?1",
            params![self.config.collection],
        )?;
        tx.execute(
            "UPDATE collections SET next_seq = 0, dimension = NULL, metric = ?1, description = ?2 \
             WHERE name = ?3",
            params![
                self.config.metric.as_str(),
                self.config.description,
                self.config.collection
            ],
        )?;
        tx.commit()?;

        self.next_seq = 0;
        self.dimension = None;
        info!(collection = %self.config.collection, removed, "recreated collection");
        Ok(())
    }

    /// Established vector dimension, `None` until the first insert.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Closes the database handle.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the connection could not be closed cleanly.
    pub fn close(self) -> Result<()> {
        let collection = self.config.collection;
        self.conn.close().map_err(|(_, err)| VecDbError::from(err))?;
        debug!(%collection, "vector store closed");
        Ok(())
    }
}

/// Default database location, `<data dir>/fabula/fabula.sqlite3`.
#[must_use]
pub fn default_store_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("fabula").join("fabula.sqlite3"))
}

struct EntryRow {
    seq: i64,
    id: String,
    title: String,
    original_title: String,
    source_url: String,
    word_count: i64,
    content_length: i64,
    document: String,
    dimension: i64,
    vector: Vec<u8>,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            id: row.get(1)?,
            title: row.get(2)?,
            original_title: row.get(3)?,
            source_url: row.get(4)?,
            word_count: row.get(5)?,
            content_length: row.get(6)?,
            document: row.get(7)?,
            dimension: row.get(8)?,
            vector: row.get(9)?,
        })
    }

    fn into_entry(self) -> Result<IndexedEntry> {
        let dimension = i64_to_usize(self.dimension, "dimension")?;
        Ok(IndexedEntry {
            vector: decode_f32_blob(&self.vector, dimension)?,
            id: self.id,
            seq: i64_to_u64(self.seq, "seq")?,
            metadata: EntryMetadata {
                title: self.title,
                original_title: self.original_title,
                source_url: self.source_url,
                word_count: i64_to_usize(self.word_count, "word_count")?,
                content_length: i64_to_usize(self.content_length, "content_length")?,
            },
            document: self.document,
        })
    }
}

fn encode_f32_blob(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_f32_blob(blob: &[u8], dimension: usize) -> Result<Vec<f32>> {
    let expected_len = dimension * std::mem::size_of::<f32>();
    if blob.len() != expected_len {
        return Err(VecDbError::InvalidDbValue(format!(
            "vector blob is {} bytes, expected {expected_len}",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn usize_to_i64(value: usize, field: &'static str) -> Result<i64> {
    i64::try_from(value).map_err(|_| VecDbError::InvalidDbValue(format!("{field} overflows i64")))
}

fn u64_to_i64(value: u64, field: &'static str) -> Result<i64> {
    i64::try_from(value).map_err(|_| VecDbError::InvalidDbValue(format!("{field} overflows i64")))
}

fn i64_to_usize(value: i64, field: &'static str) -> Result<usize> {
    usize::try_from(value).map_err(|_| VecDbError::InvalidDbValue(format!("negative {field}")))
}

fn i64_to_u64(value: i64, field: &'static str) -> Result<u64> {
    u64::try_from(value).map_err(|_| VecDbError::InvalidDbValue(format!("negative {field}")))
}
