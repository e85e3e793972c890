//! # Version Scorer
//!
//! Picks the canonical survivor of a duplicate group and records an audit
//! entry for every candidate it beats.

use tracing::debug;

use crate::dedup::DuplicateGroup;
use crate::error::Result;
use crate::types::{CanonicalRecord, RawRecord, RemovedEntry};

use super::policy::ScoringPolicy;

/// Query-string marker preceding the story suffix in crawled URLs.
pub const DEFAULT_REMOVED_URL_MARKER: &str = "?srch&";

/// Outcome of selecting a canonical record from one group.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub canonical: CanonicalRecord,
    /// Losing candidates, in group order.
    pub removed: Vec<RemovedEntry>,
}

/// Ranks duplicate candidates with a [`ScoringPolicy`].
#[derive(Debug, Clone)]
pub struct VersionScorer {
    policy: ScoringPolicy,
    removed_url_marker: String,
}

impl VersionScorer {
    /// Creates a scorer after validating `policy`.
    ///
    /// # Errors
    ///
    /// Returns `FabulaError::InvalidPolicy` if the policy fails validation.
    pub fn new(policy: ScoringPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            removed_url_marker: DEFAULT_REMOVED_URL_MARKER.to_string(),
        })
    }

    /// Overrides the URL marker used to build audit keys.
    #[must_use]
    pub fn with_removed_url_marker(mut self, marker: impl Into<String>) -> Self {
        self.removed_url_marker = marker.into();
        self
    }

    #[must_use]
    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Total score of a single candidate.
    #[must_use]
    pub fn score(&self, record: &RawRecord) -> f64 {
        let features = self.policy.features(record.word_count, &record.content);
        self.policy.score(&features)
    }

    /// Selects the canonical record of `group`.
    ///
    /// Singletons are returned as-is without scoring. Otherwise the highest
    /// score wins and ties go to the earliest candidate in group order.
    #[must_use]
    pub fn select(&self, group: &DuplicateGroup) -> Selection {
        let records = group.records();
        if group.is_singleton() {
            return Selection {
                canonical: CanonicalRecord {
                    key: group.key().clone(),
                    record: records[0].clone(),
                    score: None,
                    group_size: 1,
                },
                removed: Vec::new(),
            };
        }

        let scores: Vec<f64> = records.iter().map(|r| self.score(r)).collect();
        let mut best = 0;
        for (i, &score) in scores.iter().enumerate().skip(1) {
            if score > scores[best] {
                best = i;
            }
        }

        debug!(
            key = %group.key(),
            candidates = records.len(),
            winner = %records[best].title,
            score = scores[best],
            "selected canonical version"
        );

        let removed = records
            .iter()
            .zip(&scores)
            .enumerate()
            .filter(|(i, _)| *i != best)
            .map(|(_, (record, &score))| RemovedEntry {
                url_key: url_key(&record.source_url, &self.removed_url_marker),
                title: record.title.clone(),
                word_count: record.word_count,
                key: group.key().clone(),
                score,
            })
            .collect();

        Selection {
            canonical: CanonicalRecord {
                key: group.key().clone(),
                record: records[best].clone(),
                score: Some(scores[best]),
                group_size: records.len(),
            },
            removed,
        }
    }
}

/// Reduces a source URL to its audit key: the text after the last `marker`,
/// or the URL verbatim when the marker is absent.
#[must_use]
pub fn url_key(url: &str, marker: &str) -> String {
    if marker.is_empty() || !url.contains(marker) {
        return url.to_string();
    }
    url.rsplit(marker).next().unwrap_or(url).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DuplicateGrouper;
    use crate::normalize::TitleNormalizer;

    fn scorer() -> VersionScorer {
        VersionScorer::new(ScoringPolicy::default()).unwrap()
    }

    fn record(title: &str, url: &str, word_count: usize, content: &str) -> RawRecord {
        RawRecord {
            title: title.into(),
            original_title: title.into(),
            source_url: url.into(),
            content: content.into(),
            word_count,
        }
    }

    fn single_group(records: Vec<RawRecord>) -> DuplicateGroup {
        let grouper = DuplicateGrouper::new(TitleNormalizer::new().unwrap());
        let mut groups: Vec<_> = grouper.group(records).into_iter().collect();
        assert_eq!(groups.len(), 1, "test records must share a key");
        groups.remove(0)
    }

    #[test]
    fn singleton_returned_unchanged_without_score() {
        // Out-of-band and full of penalty markers; irrelevant for a singleton.
        let only = record("The Miser", "u", 3, "AesopFables.com Process took: Copyright");
        let selection = scorer().select(&single_group(vec![only.clone()]));
        assert_eq!(selection.canonical.record, only);
        assert_eq!(selection.canonical.score, None);
        assert_eq!(selection.canonical.group_size, 1);
        assert!(selection.removed.is_empty());
    }

    #[test]
    fn picks_ideal_word_count() {
        let group = single_group(vec![
            record("The Fox and the Grapes", "https://x/cgi/a.cgi?srch&fab/a1", 40, "short"),
            record("Fox and the Grapes", "https://x/cgi/a.cgi?srch&fab/a2", 250, "ideal"),
            record("The Fox and the Grapes Fable", "https://x/cgi/a.cgi?srch&fab/a3", 1500, "long"),
        ]);
        let s = scorer();
        let scores: Vec<f64> = group.records().iter().map(|r| s.score(r)).collect();
        assert_eq!(scores, [0.5, 1.0, 0.5]);

        let selection = s.select(&group);
        assert_eq!(selection.canonical.record.word_count, 250);
        assert_eq!(selection.canonical.score, Some(1.0));
        assert_eq!(selection.canonical.group_size, 3);

        let keys: Vec<_> = selection.removed.iter().map(|r| r.url_key.as_str()).collect();
        assert_eq!(keys, ["fab/a1", "fab/a3"]);
    }

    #[test]
    fn ties_go_to_first_candidate() {
        let group = single_group(vec![
            record("The Crow", "first", 200, "a crow"),
            record("Crow", "second", 300, "a crow"),
            record("A Crow", "third", 400, "a crow"),
        ]);
        let selection = scorer().select(&group);
        assert_eq!(selection.canonical.record.source_url, "first");
        assert_eq!(selection.removed.len(), 2);
    }

    #[test]
    fn offsetting_markers_tie_with_plain_copy() {
        // site and copyright penalties cancel the moral bonus exactly
        let group = single_group(vec![
            record(
                "The Ant",
                "first",
                250,
                "AesopFables.com\nThe ant worked. Moral: plan ahead. Copyright",
            ),
            record("Ant", "second", 250, "The ant worked."),
        ]);
        let s = scorer();
        let scores: Vec<f64> = group.records().iter().map(|r| s.score(r)).collect();
        assert_eq!(scores, [1.0, 1.0]);

        let selection = s.select(&group);
        assert_eq!(selection.canonical.record.source_url, "first");
        assert_eq!(selection.removed[0].url_key, "second");
    }

    #[test]
    fn footer_marker_loses_to_clean_copy() {
        let group = single_group(vec![
            record("The Wolf", "dirty", 250, "The wolf ran. Process took: 0.2s"),
            record("Wolf", "clean", 250, "The wolf ran."),
        ]);
        let selection = scorer().select(&group);
        assert_eq!(selection.canonical.record.source_url, "clean");
        assert_eq!(selection.removed[0].url_key, "dirty");
        assert!((selection.removed[0].score - 0.8).abs() < 1e-5);
    }

    #[test]
    fn identical_copies_are_still_audited() {
        let copy = record("The Hare", "same", 120, "a hare");
        let selection = scorer().select(&single_group(vec![copy.clone(), copy]));
        assert_eq!(selection.removed.len(), 1);
        assert_eq!(selection.removed[0].url_key, "same");
    }

    #[test]
    fn url_key_strips_query_prefix() {
        assert_eq!(
            url_key("https://aesopfables.com/cgi/aesop1.cgi?srch&fab/hca/a126", "?srch&"),
            "fab/hca/a126"
        );
        assert_eq!(url_key("https://example.org/lion", "?srch&"), "https://example.org/lion");
        assert_eq!(url_key("a?srch&b?srch&c", "?srch&"), "c");
        assert_eq!(url_key("verbatim", ""), "verbatim");
    }

    #[test]
    fn custom_marker_respected() {
        let s = scorer().with_removed_url_marker("#id=");
        let group = single_group(vec![
            record("Ant", "p#id=1", 200, "x"),
            record("The Ant", "p#id=2", 10, "x"),
        ]);
        assert_eq!(s.select(&group).removed[0].url_key, "2");
    }

    #[test]
    fn invalid_policy_rejected() {
        let mut policy = ScoringPolicy::default();
        policy.word_bands.short_min = 400;
        assert!(VersionScorer::new(policy).is_err());
    }
}
