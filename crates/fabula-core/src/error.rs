use thiserror::Error;

/// Errors that can occur during Fabula core operations.
#[derive(Debug, Error)]
pub enum FabulaError {
    /// A raw record is missing a field the pipeline cannot do without.
    #[error("malformed record from {source_url:?}: missing {field}")]
    MalformedRecord {
        /// Source URL of the offending record (may be empty).
        source_url: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A duplicate group was built with no members. Internal logic error.
    #[error("duplicate group for key {key:?} has no records")]
    EmptyGroupInvariantViolation {
        /// The normalized key that mapped to zero records.
        key: String,
    },

    /// The scoring policy is internally inconsistent.
    #[error("invalid scoring policy: {0}")]
    InvalidPolicy(String),

    /// A regex pattern failed to compile (should not happen with static patterns).
    #[error("regex compilation error: {0}")]
    Regex(#[from] regex::Error),

    /// Reading or writing a corpus file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A corpus file is not valid JSON of the expected shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Fabula core operations.
pub type Result<T> = std::result::Result<T, FabulaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = FabulaError::MalformedRecord {
            source_url: "https://aesopfables.com/cgi/aesop1.cgi?srch&fab/a1".into(),
            field: "content",
        };
        let msg = err.to_string();
        assert!(msg.contains("missing content"));
        assert!(msg.contains("srch&fab/a1"));

        let err = FabulaError::EmptyGroupInvariantViolation {
            key: "fox and the grapes".into(),
        };
        assert!(err.to_string().contains("fox and the grapes"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FabulaError>();
    }
}
