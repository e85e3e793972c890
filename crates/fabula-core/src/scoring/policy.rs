use serde::{Deserialize, Serialize};

use crate::error::{FabulaError, Result};

use super::features::CandidateFeatures;

/// Default word-count band limits.
pub const IDEAL_MIN_WORDS: usize = 100;
pub const IDEAL_MAX_WORDS: usize = 500;
pub const LONG_MAX_WORDS: usize = 1000;
pub const SHORT_MIN_WORDS: usize = 50;

/// Default word-count band scores.
pub const SCORE_IDEAL: f64 = 1.0;
pub const SCORE_LONG: f64 = 0.9;
pub const SCORE_SHORT: f64 = 0.8;
pub const SCORE_OUT_OF_BAND: f64 = 0.5;

/// Default content adjustments.
pub const PENALTY_SITE_MARKER: f64 = 0.1;
pub const PENALTY_FOOTER_MARKER: f64 = 0.2;
pub const PENALTY_COPYRIGHT_MARKER: f64 = 0.1;
pub const BONUS_MORAL_MARKER: f64 = 0.2;

/// Word-count bands and the score each band earns.
///
/// Bands, checked in order:
/// - `[ideal_min, ideal_max]` → `ideal`
/// - `(ideal_max, long_max]` → `long`
/// - `[short_min, ideal_min)` → `short`
/// - anything else → `out_of_band`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCountBands {
    pub ideal_min: usize,
    pub ideal_max: usize,
    pub long_max: usize,
    pub short_min: usize,
    pub ideal: f64,
    pub long: f64,
    pub short: f64,
    pub out_of_band: f64,
}

impl Default for WordCountBands {
    fn default() -> Self {
        Self {
            ideal_min: IDEAL_MIN_WORDS,
            ideal_max: IDEAL_MAX_WORDS,
            long_max: LONG_MAX_WORDS,
            short_min: SHORT_MIN_WORDS,
            ideal: SCORE_IDEAL,
            long: SCORE_LONG,
            short: SCORE_SHORT,
            out_of_band: SCORE_OUT_OF_BAND,
        }
    }
}

impl WordCountBands {
    /// Score for a given word count.
    #[must_use]
    pub fn score(&self, word_count: usize) -> f64 {
        if (self.ideal_min..=self.ideal_max).contains(&word_count) {
            self.ideal
        } else if word_count > self.ideal_max && word_count <= self.long_max {
            self.long
        } else if (self.short_min..self.ideal_min).contains(&word_count) {
            self.short
        } else {
            self.out_of_band
        }
    }
}

/// Substring markers that reveal scraping leftovers or a stated moral.
///
/// Penalty markers match case-sensitively; moral markers match
/// case-insensitively and should be given in lowercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMarkers {
    pub site: Vec<String>,
    pub footer: Vec<String>,
    pub copyright: Vec<String>,
    pub moral: Vec<String>,
}

impl Default for ContentMarkers {
    fn default() -> Self {
        Self {
            site: vec!["AesopFables.com".into()],
            footer: vec!["Process took:".into()],
            copyright: vec!["Copyright".into()],
            moral: vec!["moral:".into(), "lesson:".into(), "application:".into()],
        }
    }
}

/// Content-score adjustments applied when a marker family is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAdjustments {
    pub base: f64,
    pub site_penalty: f64,
    pub footer_penalty: f64,
    pub copyright_penalty: f64,
    pub moral_bonus: f64,
}

impl Default for ContentAdjustments {
    fn default() -> Self {
        Self {
            base: 1.0,
            site_penalty: PENALTY_SITE_MARKER,
            footer_penalty: PENALTY_FOOTER_MARKER,
            copyright_penalty: PENALTY_COPYRIGHT_MARKER,
            moral_bonus: BONUS_MORAL_MARKER,
        }
    }
}

/// Policy used to rank duplicate versions of the same fable.
///
/// `total = word_score × content_score`. The defaults keep the historical
/// asymmetry where 501..=1000 words (0.9) beats 50..100 words (0.8).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    #[serde(default)]
    pub word_bands: WordCountBands,
    #[serde(default)]
    pub markers: ContentMarkers,
    #[serde(default)]
    pub adjustments: ContentAdjustments,
}

impl ScoringPolicy {
    /// Checks band ordering and that every score and adjustment is finite
    /// and non-negative.
    ///
    /// # Errors
    ///
    /// Returns `FabulaError::InvalidPolicy` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let b = &self.word_bands;
        if !(b.short_min <= b.ideal_min && b.ideal_min <= b.ideal_max && b.ideal_max <= b.long_max)
        {
            return Err(FabulaError::InvalidPolicy(format!(
                "word bands must satisfy short_min <= ideal_min <= ideal_max <= long_max, got {} / {} / {} / {}",
                b.short_min, b.ideal_min, b.ideal_max, b.long_max
            )));
        }

        let a = &self.adjustments;
        let values = [
            ("ideal", b.ideal),
            ("long", b.long),
            ("short", b.short),
            ("out_of_band", b.out_of_band),
            ("base", a.base),
            ("site_penalty", a.site_penalty),
            ("footer_penalty", a.footer_penalty),
            ("copyright_penalty", a.copyright_penalty),
            ("moral_bonus", a.moral_bonus),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(FabulaError::InvalidPolicy(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        if self.markers.moral.iter().any(|m| m.to_lowercase() != *m) {
            return Err(FabulaError::InvalidPolicy(
                "moral markers must be lowercase".into(),
            ));
        }
        Ok(())
    }

    /// Extracts the scoring features of a candidate's content.
    #[must_use]
    pub fn features(&self, word_count: usize, content: &str) -> CandidateFeatures {
        let lowered = content.to_lowercase();

        CandidateFeatures {
            word_count,
            has_site_marker: contains_any(content, &self.markers.site),
            has_footer_marker: contains_any(content, &self.markers.footer),
            has_copyright_marker: contains_any(content, &self.markers.copyright),
            has_moral_marker: contains_any(&lowered, &self.markers.moral),
        }
    }

    /// Content score from marker flags alone.
    #[must_use]
    pub fn content_score(&self, features: &CandidateFeatures) -> f64 {
        let a = &self.adjustments;
        let mut score = a.base;
        if features.has_site_marker {
            score -= a.site_penalty;
        }
        if features.has_footer_marker {
            score -= a.footer_penalty;
        }
        if features.has_copyright_marker {
            score -= a.copyright_penalty;
        }
        if features.has_moral_marker {
            score += a.moral_bonus;
        }
        score
    }

    /// Total score: word-count band score times content score.
    #[must_use]
    pub fn score(&self, features: &CandidateFeatures) -> f64 {
        self.word_bands.score(features.word_count) * self.content_score(features)
    }
}

fn contains_any(content: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| content.contains(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(word_count: usize) -> CandidateFeatures {
        CandidateFeatures {
            word_count,
            ..CandidateFeatures::default()
        }
    }

    #[test]
    fn default_policy_is_valid() {
        assert!(ScoringPolicy::default().validate().is_ok());
    }

    #[test]
    fn misordered_bands_detected() {
        let mut policy = ScoringPolicy::default();
        policy.word_bands.ideal_max = 2000;
        assert!(matches!(policy.validate(), Err(FabulaError::InvalidPolicy(_))));
    }

    #[test]
    fn negative_adjustment_detected() {
        let mut policy = ScoringPolicy::default();
        policy.adjustments.footer_penalty = -0.2;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn uppercase_moral_marker_detected() {
        let mut policy = ScoringPolicy::default();
        policy.markers.moral.push("Moral:".into());
        assert!(policy.validate().is_err());
    }

    #[test]
    fn word_band_boundaries() {
        let bands = WordCountBands::default();
        for (count, expected) in [
            (0, 0.5),
            (49, 0.5),
            (50, 0.8),
            (99, 0.8),
            (100, 1.0),
            (250, 1.0),
            (500, 1.0),
            (501, 0.9),
            (1000, 0.9),
            (1001, 0.5),
        ] {
            assert_eq!(bands.score(count), expected, "word_count={count}");
        }
    }

    #[test]
    fn long_band_outranks_short_band() {
        let policy = ScoringPolicy::default();
        assert!(policy.score(&plain(750)) > policy.score(&plain(75)));
    }

    #[test]
    fn footer_marker_lowers_score() {
        let policy = ScoringPolicy::default();
        let clean = policy.features(250, "A fox saw some grapes.");
        let footer = policy.features(250, "A fox saw some grapes. Process took: 0.01s");
        assert!(footer.has_footer_marker);
        assert!(policy.score(&clean) > policy.score(&footer));
    }

    #[test]
    fn all_adjustments_combine() {
        let policy = ScoringPolicy::default();
        let content = "AesopFables.com\nA tale.\nMORAL: be kind\nProcess took: 1s Copyright";
        let f = policy.features(300, content);
        assert!(f.has_site_marker && f.has_footer_marker && f.has_copyright_marker);
        assert!(f.has_moral_marker);

        // 1.0 - 0.1 - 0.2 - 0.1 + 0.2
        let expected = 0.8;
        assert!((policy.score(&f) - expected).abs() < 1e-5, "score={}", policy.score(&f));
    }

    #[test]
    fn penalty_markers_are_case_sensitive() {
        let policy = ScoringPolicy::default();
        let f = policy.features(300, "aesopfables.com copyright process took:");
        assert!(!f.has_site_marker);
        assert!(!f.has_footer_marker);
        assert!(!f.has_copyright_marker);
    }

    #[test]
    fn moral_bonus_is_case_insensitive() {
        let policy = ScoringPolicy::default();
        let f = policy.features(300, "The end.\nApplication: look before you leap.");
        assert!(f.has_moral_marker);
        assert!((policy.score(&f) - 1.2).abs() < 1e-5);
    }

    #[test]
    fn policy_deserializes_partially() {
        let json = r#"{"word_bands":{"ideal_min":80,"ideal_max":400,"long_max":900,"short_min":40,"ideal":1.0,"long":0.7,"short":0.9,"out_of_band":0.1}}"#;
        let policy: ScoringPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.word_bands.ideal_min, 80);
        assert_eq!(policy.markers, ContentMarkers::default());
        assert!(policy.validate().is_ok());
        assert_eq!(policy.score(&plain(60)), 0.9);
    }
}
