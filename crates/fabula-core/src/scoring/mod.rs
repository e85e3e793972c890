pub mod features;
pub mod policy;
pub mod select;

pub use features::CandidateFeatures;
pub use policy::{ContentAdjustments, ContentMarkers, ScoringPolicy, WordCountBands};
pub use select::{url_key, Selection, VersionScorer, DEFAULT_REMOVED_URL_MARKER};
