//! # Fabula Core
//!
//! The deduplication half of the Fabula pipeline. Normalizes scraped fable
//! titles, groups probable duplicates and keeps the best-scoring version of
//! each story, with an audit trail for everything it drops.
//!
//! ## Quick Start
//!
//! ```rust
//! use fabula_core::{DedupConfig, Deduplicator, RawRecord};
//!
//! let dedup = Deduplicator::new(DedupConfig::default()).unwrap();
//! let report = dedup.deduplicate(vec![
//!     RawRecord::new("The Fox and the Grapes", "https://example.org/a1", "A fox saw grapes."),
//!     RawRecord::new("Fox and the Grapes Fable", "https://example.org/a2", "A hungry fox."),
//! ]);
//!
//! assert_eq!(report.canonical.len(), 1);
//! assert_eq!(report.removed.len(), 1);
//! ```
pub mod clean;
pub mod corpus;
pub mod dedup;
pub mod error;
pub mod normalize;
pub mod scoring;
pub mod types;

// Re-export primary API
pub use clean::{char_len, ContentCleaner};
pub use corpus::{load_corpus, parse_corpus, write_records, Corpus};
pub use dedup::{
    CorpusStats, DedupConfig, DedupReport, Deduplicator, DuplicateGroup, DuplicateGrouper,
    GroupedRecords, SkippedRecord,
};
pub use error::{FabulaError, Result};
pub use normalize::{normalize_title, TitleNormalizer};
pub use scoring::{CandidateFeatures, ScoringPolicy, Selection, VersionScorer};
pub use types::{CanonicalRecord, NormalizedKey, RawRecord, RawRecordDraft, RemovedEntry};
