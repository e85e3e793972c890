//! # Fabula
//!
//! Deduplicate a crawled fable corpus, embed the survivors and search them.
//!
//! - [`fabula_core`]: title normalization, duplicate grouping, version scoring
//! - [`fabula_vecdb`]: SQLite vector store, embedders, similarity queries
//! - [`IngestPipeline`]: ties the two together for a single indexing pass
//!
//! ```no_run
//! use std::sync::Arc;
//! use fabula::{load_corpus, DedupConfig, HashEmbedder, IngestPipeline, StoreConfig, VectorStore};
//!
//! let store = VectorStore::open(
//!     "fabula.sqlite3",
//!     StoreConfig::default(),
//!     Arc::new(HashEmbedder::new(256)?),
//! )?;
//! let mut pipeline = IngestPipeline::new(DedupConfig::default(), store)?;
//! let report = pipeline.run_corpus(load_corpus("aesop_fables.json")?)?;
//! println!("indexed {} fables", report.ids.len());
//! pipeline.finish()?;
//! # Ok::<(), fabula::PipelineError>(())
//! ```

pub mod pipeline;

pub use fabula_core;
pub use fabula_vecdb;

pub use fabula_core::{
    load_corpus, write_records, CanonicalRecord, Corpus, CorpusStats, DedupConfig, DedupReport,
    Deduplicator, FabulaError, RawRecord, RawRecordDraft, RemovedEntry, ScoringPolicy,
    SkippedRecord,
};
pub use fabula_vecdb::{
    default_store_path, DistanceMetric, Embedder, EntryMetadata, HashEmbedder, HttpEmbedder,
    HttpEmbedderConfig, IndexedEntry, Match, NewEntry, QueryEngine, StoreConfig, VecDbError,
    VectorStore, DEFAULT_COLLECTION,
};
pub use pipeline::{IngestPipeline, PipelineError, PipelineReport, Result};
