//! Corpus files produced by the crawler and by the dedup pass.
//!
//! A corpus is a JSON array of record objects. Paths ending in `.gz` are
//! read through a gzip decoder.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::dedup::SkippedRecord;
use crate::error::Result;
use crate::types::RawRecordDraft;

/// Drafts read from a corpus file, plus entries that were not record objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    pub drafts: Vec<RawRecordDraft>,
    pub unreadable: Vec<SkippedRecord>,
}

impl Corpus {
    #[must_use]
    pub fn len(&self) -> usize {
        self.drafts.len() + self.unreadable.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<RawRecordDraft>> for Corpus {
    fn from(drafts: Vec<RawRecordDraft>) -> Self {
        Self {
            drafts,
            unreadable: Vec::new(),
        }
    }
}

/// Loads a corpus file.
///
/// # Errors
///
/// Returns `FabulaError::Io` if the file cannot be read and
/// `FabulaError::Json` if it is not a JSON array.
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Corpus> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading corpus");
    let file = BufReader::new(File::open(path)?);

    let corpus = if path.extension().is_some_and(|ext| ext == "gz") {
        parse_corpus(GzDecoder::new(file))?
    } else {
        parse_corpus(file)?
    };
    info!(records = corpus.len(), "loaded corpus");
    Ok(corpus)
}

/// Parses a JSON array of records. Elements that are not record-shaped
/// (e.g. a string `word_count`) are collected as unreadable instead of
/// failing the whole file.
///
/// # Errors
///
/// Returns `FabulaError::Json` if the input is not a JSON array.
pub fn parse_corpus<R: Read>(reader: R) -> Result<Corpus> {
    let values: Vec<Value> = serde_json::from_reader(reader)?;
    let mut corpus = Corpus::default();
    for value in values {
        let source_url = value
            .get("url")
            .or_else(|| value.get("source_url"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        match serde_json::from_value::<RawRecordDraft>(value) {
            Ok(draft) => corpus.drafts.push(draft),
            Err(err) => {
                warn!(source_url = %source_url, error = %err, "unreadable corpus entry");
                corpus.unreadable.push(SkippedRecord {
                    source_url,
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(corpus)
}

/// Writes records as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns `FabulaError::Io` or `FabulaError::Json` on write failure.
pub fn write_records<P, T>(path: P, records: &[T]) -> Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}
