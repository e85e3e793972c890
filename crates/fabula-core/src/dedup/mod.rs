//! # Deduplication pass
//!
//! Validates crawler drafts, groups them by normalized title and keeps the
//! best-scoring version of each story. Every dropped record, malformed or
//! outscored, leaves an entry in the report.

pub mod group;

use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::corpus::Corpus;
use crate::error::Result;
use crate::normalize::TitleNormalizer;
use crate::scoring::{ScoringPolicy, VersionScorer, DEFAULT_REMOVED_URL_MARKER};
use crate::types::{CanonicalRecord, RawRecord, RawRecordDraft, RemovedEntry};

pub use group::{DuplicateGroup, DuplicateGrouper, GroupedRecords};

/// Header line of the removed-stories audit file.
pub const REMOVED_LIST_HEADER: &str = "Removed Story URL Suffixes (Duplicates):";

/// Configuration for the deduplication pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Policy used to rank duplicate versions.
    pub policy: ScoringPolicy,
    /// Marker stripped from source URLs when building audit keys.
    pub removed_url_marker: String,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            policy: ScoringPolicy::default(),
            removed_url_marker: DEFAULT_REMOVED_URL_MARKER.to_string(),
        }
    }
}

impl DedupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scoring policy.
    pub fn with_policy(mut self, policy: ScoringPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the audit URL marker.
    pub fn with_removed_url_marker(mut self, marker: impl Into<String>) -> Self {
        self.removed_url_marker = marker.into();
        self
    }
}

/// A crawler record that never made it into grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub source_url: String,
    pub reason: String,
}

/// Summary numbers of a deduplication pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Records read, including skipped ones.
    pub total_records: usize,
    pub skipped: usize,
    pub unique: usize,
    pub duplicates_removed: usize,
    pub min_words: Option<usize>,
    pub max_words: Option<usize>,
    pub mean_words: Option<f64>,
}

/// Result of a deduplication pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupReport {
    /// Survivors in first-seen key order.
    pub canonical: Vec<CanonicalRecord>,
    /// Outscored duplicates in group order.
    pub removed: Vec<RemovedEntry>,
    /// Malformed or unreadable input records.
    pub skipped: Vec<SkippedRecord>,
    pub stats: CorpusStats,
}

impl DedupReport {
    /// Surviving raw records, in output order.
    pub fn records(&self) -> impl Iterator<Item = &RawRecord> {
        self.canonical.iter().map(|c| &c.record)
    }

    /// Writes the removed-stories audit list: a header, a blank line, then
    /// one URL key per line.
    pub fn write_removed_list<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "{REMOVED_LIST_HEADER}")?;
        writeln!(writer)?;
        for entry in &self.removed {
            writeln!(writer, "{}", entry.url_key)?;
        }
        writer.flush()
    }
}

/// Runs normalize → group → select over a bounded corpus.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    grouper: DuplicateGrouper,
    scorer: VersionScorer,
}

impl Deduplicator {
    /// Builds the pass from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `FabulaError::InvalidPolicy` for an invalid scoring policy and
    /// `FabulaError::Regex` if the normalizer patterns fail to compile.
    pub fn new(config: DedupConfig) -> Result<Self> {
        let scorer =
            VersionScorer::new(config.policy)?.with_removed_url_marker(config.removed_url_marker);
        Ok(Self {
            grouper: DuplicateGrouper::new(TitleNormalizer::new()?),
            scorer,
        })
    }

    #[must_use]
    pub fn scorer(&self) -> &VersionScorer {
        &self.scorer
    }

    #[must_use]
    pub fn grouper(&self) -> &DuplicateGrouper {
        &self.grouper
    }

    /// Validates drafts, skipping and logging malformed ones.
    pub fn validate_drafts<I>(drafts: I) -> (Vec<RawRecord>, Vec<SkippedRecord>)
    where
        I: IntoIterator<Item = RawRecordDraft>,
    {
        let mut records = Vec::new();
        let mut skipped = Vec::new();
        for draft in drafts {
            let source_url = draft.source_url().to_string();
            match draft.validate() {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(source_url = %source_url, error = %err, "skipping malformed record");
                    skipped.push(SkippedRecord {
                        source_url,
                        reason: err.to_string(),
                    });
                }
            }
        }
        (records, skipped)
    }

    /// Deduplicates a loaded corpus, carrying its unreadable entries into the report.
    #[must_use]
    pub fn run_corpus(&self, corpus: Corpus) -> DedupReport {
        let mut report = self.run(corpus.drafts);
        if !corpus.unreadable.is_empty() {
            report.stats.total_records += corpus.unreadable.len();
            report.stats.skipped += corpus.unreadable.len();
            let mut skipped = corpus.unreadable;
            skipped.append(&mut report.skipped);
            report.skipped = skipped;
        }
        report
    }

    /// Validates and deduplicates crawler drafts.
    #[must_use]
    pub fn run(&self, drafts: Vec<RawRecordDraft>) -> DedupReport {
        let total = drafts.len();
        let (records, skipped) = Self::validate_drafts(drafts);
        let mut report = self.deduplicate(records);
        report.stats.total_records = total;
        report.stats.skipped = skipped.len();
        report.skipped = skipped;
        report
    }

    /// Deduplicates already-validated records.
    #[must_use]
    pub fn deduplicate(&self, records: Vec<RawRecord>) -> DedupReport {
        let total = records.len();
        let grouped = self.grouper.group(records);

        let mut canonical = Vec::with_capacity(grouped.len());
        let mut removed = Vec::new();
        for group in grouped {
            if !group.is_singleton() {
                info!(
                    key = %group.key(),
                    versions = group.len(),
                    "found duplicate versions"
                );
                for (i, r) in group.records().iter().enumerate() {
                    info!("  {}. {} ({} words)", i + 1, r.title, r.word_count);
                }
            }

            let selection = self.scorer.select(&group);
            if !group.is_singleton() {
                let kept = &selection.canonical.record;
                info!("  -> keeping: {} ({} words)", kept.title, kept.word_count);
            }
            canonical.push(selection.canonical);
            removed.extend(selection.removed);
        }

        let stats = CorpusStats::summarize(
            total,
            canonical.iter().map(|c| c.record.word_count),
            removed.len(),
        );
        info!(
            original = total,
            unique = stats.unique,
            removed = stats.duplicates_removed,
            "deduplication complete"
        );

        DedupReport {
            canonical,
            removed,
            skipped: Vec::new(),
            stats,
        }
    }
}

impl CorpusStats {
    /// Summarizes a pass over `total` valid records that kept records with
    /// the given word counts and removed `removed` duplicates.
    #[must_use]
    pub fn summarize<I>(total: usize, kept_word_counts: I, removed: usize) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let counts: Vec<usize> = kept_word_counts.into_iter().collect();
        let mean_words = if counts.is_empty() {
            None
        } else {
            Some(counts.iter().sum::<usize>() as f64 / counts.len() as f64)
        };
        Self {
            total_records: total,
            skipped: 0,
            unique: counts.len(),
            duplicates_removed: removed,
            min_words: counts.iter().copied().min(),
            max_words: counts.iter().copied().max(),
            mean_words,
        }
    }
}
