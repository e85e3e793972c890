use serde::{Deserialize, Serialize};

/// Immutable inputs to [`ScoringPolicy::score`](super::ScoringPolicy::score).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateFeatures {
    pub word_count: usize,
    pub has_site_marker: bool,
    pub has_footer_marker: bool,
    pub has_copyright_marker: bool,
    pub has_moral_marker: bool,
}
