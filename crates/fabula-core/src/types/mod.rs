pub mod key;
pub mod record;

pub use key::NormalizedKey;
pub use record::{word_count, CanonicalRecord, RawRecord, RawRecordDraft, RemovedEntry};
