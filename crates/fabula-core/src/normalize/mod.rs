pub mod title;

pub use title::{normalize_title, TitleNormalizer};
