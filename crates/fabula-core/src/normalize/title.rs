//! # Title Normalizer
//!
//! Reduces a scraped fable title to the key used for duplicate detection.
//! The equivalence is deliberately coarse: titles differing only by case,
//! punctuation, a leading article or a trailing genre word collapse together.

use regex::Regex;

use crate::error::Result;
use crate::types::NormalizedKey;

/// Leading articles stripped from the start of a title.
pub const LEADING_ARTICLES: &[&str] = &["the", "a", "an"];

/// Genre words stripped from the end of a title.
pub const TRAILING_GENRES: &[&str] = &["fable", "story", "tale"];

/// Title normalizer with pre-compiled patterns.
///
/// Normalization is deterministic and locale-independent:
///
/// 1. lowercase
/// 2. strip one leading article followed by whitespace
/// 3. strip one trailing genre word preceded by whitespace
/// 4. drop every character that is not a letter, digit or whitespace
/// 5. collapse whitespace runs and trim
#[derive(Debug, Clone)]
pub struct TitleNormalizer {
    re_article: Regex,
    re_genre: Regex,
}

impl TitleNormalizer {
    /// Constructs a new `TitleNormalizer`.
    ///
    /// # Errors
    ///
    /// Returns `FabulaError::Regex` if a pattern fails to compile
    /// (should never happen with the static word lists defined here).
    pub fn new() -> Result<Self> {
        Ok(Self {
            re_article: Regex::new(&format!(r"^(?:{})\s+", LEADING_ARTICLES.join("|")))?,
            re_genre: Regex::new(&format!(r"\s+(?:{})\n?$", TRAILING_GENRES.join("|")))?,
        })
    }

    /// Normalizes a raw title into its grouping key.
    ///
    /// # Examples
    /// ```
    /// use fabula_core::normalize::TitleNormalizer;
    ///
    /// let normalizer = TitleNormalizer::new().unwrap();
    /// assert_eq!(
    ///     normalizer.normalize("The Fox And The Grapes Fable"),
    ///     normalizer.normalize("fox and the grapes"),
    /// );
    /// ```
    #[must_use]
    pub fn normalize(&self, title: &str) -> NormalizedKey {
        let lowered = title.to_lowercase();
        let work = self.re_article.replace(&lowered, "");
        let work = self.re_genre.replace(&work, "");

        let kept: String = work
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();

        NormalizedKey::new(kept.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

/// Convenience function to normalize a single title.
///
/// Compiles the patterns on every call; hold a [`TitleNormalizer`] for bulk work.
pub fn normalize_title(title: &str) -> Result<NormalizedKey> {
    Ok(TitleNormalizer::new()?.normalize(title))
}
