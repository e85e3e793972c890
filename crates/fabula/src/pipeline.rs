//! Single-pass ingest: validate → dedup → clean → embed and store.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use fabula_core::{
    char_len, ContentCleaner, Corpus, CorpusStats, DedupConfig, Deduplicator, FabulaError,
    RawRecord, RawRecordDraft, RemovedEntry, SkippedRecord,
};
use fabula_vecdb::{EntryMetadata, NewEntry, QueryEngine, VecDbError, VectorStore};

/// Errors surfaced by the ingest pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] FabulaError),

    #[error(transparent)]
    Store(#[from] VecDbError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Outcome of one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub stats: CorpusStats,
    /// Outscored duplicates, in group order.
    pub removed: Vec<RemovedEntry>,
    /// Malformed or unreadable input records.
    pub skipped: Vec<SkippedRecord>,
    /// Ids assigned to the stored fables, in storage order.
    pub ids: Vec<String>,
}

/// Owns the dedup pass, the content cleaner and the store handle.
///
/// Never clears the store; rebuilding a collection is the caller's call via
/// [`VectorStore::recreate`] before running.
#[derive(Debug)]
pub struct IngestPipeline {
    dedup: Deduplicator,
    cleaner: ContentCleaner,
    store: VectorStore,
}

impl IngestPipeline {
    /// # Errors
    ///
    /// Fails if the scoring policy is invalid or a pattern does not compile.
    pub fn new(config: DedupConfig, store: VectorStore) -> Result<Self> {
        Ok(Self {
            dedup: Deduplicator::new(config)?,
            cleaner: ContentCleaner::new()?,
            store,
        })
    }

    /// Deduplicates `drafts` and stores the survivors.
    ///
    /// # Errors
    ///
    /// Store errors abort the run; batches committed before the failure stay.
    pub fn run(&mut self, drafts: Vec<RawRecordDraft>) -> Result<PipelineReport> {
        self.run_corpus(Corpus::from(drafts))
    }

    /// Like [`IngestPipeline::run`], carrying the corpus's unreadable entries
    /// into the report.
    ///
    /// # Errors
    ///
    /// See [`IngestPipeline::run`].
    pub fn run_corpus(&mut self, corpus: Corpus) -> Result<PipelineReport> {
        let report = self.dedup.run_corpus(corpus);
        log_stats(&report.stats);

        let entries: Vec<NewEntry> = report
            .canonical
            .iter()
            .map(|c| self.to_entry(&c.record))
            .collect();
        let ids = self.store.upsert_chunked(entries)?;
        info!(stored = ids.len(), total = self.store.count()?, "indexing complete");

        Ok(PipelineReport {
            stats: report.stats,
            removed: report.removed,
            skipped: report.skipped,
            ids,
        })
    }

    /// Stores every valid record of `corpus` without deduplicating.
    ///
    /// # Errors
    ///
    /// See [`IngestPipeline::run`].
    pub fn index_corpus(&mut self, corpus: Corpus) -> Result<PipelineReport> {
        let total = corpus.len();
        let (records, mut invalid) = Deduplicator::validate_drafts(corpus.drafts);
        let mut skipped = corpus.unreadable;
        skipped.append(&mut invalid);

        let mut stats = CorpusStats::summarize(total, records.iter().map(|r| r.word_count), 0);
        stats.skipped = skipped.len();
        log_stats(&stats);

        let entries: Vec<NewEntry> = records.iter().map(|r| self.to_entry(r)).collect();
        let ids = self.store.upsert_chunked(entries)?;
        info!(stored = ids.len(), total = self.store.count()?, "indexing complete");

        Ok(PipelineReport {
            stats,
            removed: Vec::new(),
            skipped,
            ids,
        })
    }

    fn to_entry(&self, record: &RawRecord) -> NewEntry {
        let document = self.cleaner.clean(&record.content);
        NewEntry::new(
            document.clone(),
            EntryMetadata {
                title: record.title.clone(),
                original_title: record.original_title.clone(),
                source_url: record.source_url.clone(),
                word_count: record.word_count,
                content_length: char_len(&document),
            },
        )
    }

    /// Snapshot of the store for similarity queries.
    ///
    /// # Errors
    ///
    /// Fails if the entries cannot be read.
    pub fn query_engine(&self) -> Result<QueryEngine> {
        Ok(QueryEngine::from_store(&self.store)?)
    }

    #[must_use]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[must_use]
    pub fn deduplicator(&self) -> &Deduplicator {
        &self.dedup
    }

    /// Closes the store.
    ///
    /// # Errors
    ///
    /// Returns the store's close error.
    pub fn finish(self) -> Result<()> {
        Ok(self.store.close()?)
    }
}

fn log_stats(stats: &CorpusStats) {
    info!(
        total = stats.total_records,
        skipped = stats.skipped,
        unique = stats.unique,
        removed = stats.duplicates_removed,
        min_words = ?stats.min_words,
        max_words = ?stats.max_words,
        mean_words = ?stats.mean_words,
        "corpus statistics"
    );
}
