//! # Content Cleaner
//!
//! Strips site chrome left behind by the crawler before a fable is embedded.

use regex::Regex;

use crate::error::Result;

/// Removes the site header line, timing/copyright footers and redundant
/// blank lines from scraped fable text.
#[derive(Debug, Clone)]
pub struct ContentCleaner {
    re_header: Regex,
    re_footers: Vec<Regex>,
    re_blank_lines: Regex,
}

impl ContentCleaner {
    /// Constructs a new `ContentCleaner` with pre-compiled patterns.
    ///
    /// # Errors
    ///
    /// Returns `FabulaError::Regex` if any pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            re_header: Regex::new(r"^AesopFables\.com.*?\n")?,
            re_footers: vec![
                Regex::new(r"(?s)Process took:.*?Copyright.*$")?,
                Regex::new(r"(?s)RETURN\s*Process took.*$")?,
                Regex::new(r"(?s)THE END\s*RETURN.*$")?,
            ],
            re_blank_lines: Regex::new(r"\n\s*\n")?,
        })
    }

    /// Returns the cleaned text.
    #[must_use]
    pub fn clean(&self, content: &str) -> String {
        let mut work = self.re_header.replace(content, "").into_owned();
        for footer in &self.re_footers {
            work = footer.replace(&work, "").into_owned();
        }
        self.re_blank_lines
            .replace_all(&work, "\n\n")
            .trim()
            .to_string()
    }
}

/// Length of a text in characters, as stored in `content_length`.
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
