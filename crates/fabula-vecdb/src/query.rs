//! Exact nearest-neighbour search over a store snapshot.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::embedding::Embedder;
use crate::error::{Result, VecDbError};
use crate::metric::DistanceMetric;
use crate::store::{IndexedEntry, VectorStore};

/// What to search for.
#[derive(Debug, Clone, Copy)]
pub enum QueryInput<'a> {
    /// Free text, embedded with the store's embedder.
    Text(&'a str),
    /// A precomputed query vector.
    Vector(&'a [f32]),
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub entry: IndexedEntry,
    /// Distance under the collection metric; smaller is closer.
    pub distance: f32,
}

/// Immutable, shareable view of a collection for similarity queries.
///
/// Built once from a [`VectorStore`]; later writes to the store are not
/// visible. `QueryEngine` is `Send + Sync` and can be shared behind an `Arc`.
#[derive(Clone)]
pub struct QueryEngine {
    entries: Arc<[IndexedEntry]>,
    metric: DistanceMetric,
    dimension: Option<usize>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("entries", &self.entries.len())
            .field("metric", &self.metric)
            .field("dimension", &self.dimension)
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl QueryEngine {
    /// Snapshots every entry of `store`.
    ///
    /// # Errors
    ///
    /// Fails if the entries cannot be read.
    pub fn from_store(store: &VectorStore) -> Result<Self> {
        let entries = store.get_all()?;
        debug!(entries = entries.len(), metric = %store.metric(), "query snapshot built");
        Ok(Self {
            entries: entries.into(),
            metric: store.metric(),
            dimension: store.dimension(),
            embedder: Arc::clone(store.embedder()),
        })
    }

    /// The `k` closest entries, ordered by ascending distance.
    ///
    /// Ties keep insertion order. `k = 0` and an empty snapshot yield an
    /// empty result.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if the query vector disagrees with the collection
    /// dimension; `Embedding` if a text query cannot be embedded.
    pub fn query(&self, input: QueryInput<'_>, k: usize) -> Result<Vec<Match>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        match input {
            QueryInput::Text(text) => {
                let vector = self.embedder.embed(text)?;
                self.rank(&vector, k)
            }
            QueryInput::Vector(vector) => self.rank(vector, k),
        }
    }

    /// Shorthand for `query(QueryInput::Text(text), k)`.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::query`].
    pub fn query_text(&self, text: &str, k: usize) -> Result<Vec<Match>> {
        self.query(QueryInput::Text(text), k)
    }

    /// Shorthand for `query(QueryInput::Vector(vector), k)`.
    ///
    /// # Errors
    ///
    /// See [`QueryEngine::query`].
    pub fn query_vector(&self, vector: &[f32], k: usize) -> Result<Vec<Match>> {
        self.query(QueryInput::Vector(vector), k)
    }

    fn rank(&self, query: &[f32], k: usize) -> Result<Vec<Match>> {
        if let Some(expected) = self.dimension {
            if query.len() != expected {
                return Err(VecDbError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, self.metric.distance(query, &e.vector)))
            .collect();
        // stable: equal distances stay in insertion order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| Match {
                entry: self.entries[i].clone(),
                distance,
            })
            .collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::store::{EntryMetadata, NewEntry, StoreConfig};

    fn entry(title: &str, vector: Vec<f32>) -> NewEntry {
        NewEntry::new(
            title,
            EntryMetadata {
                title: title.to_string(),
                original_title: title.to_string(),
                source_url: String::new(),
                word_count: 1,
                content_length: title.len(),
            },
        )
        .with_vector(vector)
    }

    fn store(metric: DistanceMetric) -> VectorStore {
        let config = StoreConfig::default().with_metric(metric);
        VectorStore::open_in_memory(config, Arc::new(HashEmbedder::new(2).unwrap())).unwrap()
    }

    fn ten_point_engine() -> QueryEngine {
        let mut s = store(DistanceMetric::Euclidean);
        let entries = (0..10)
            .map(|i| entry(&format!("p{i}"), vec![i as f32, 0.0]))
            .collect();
        s.upsert_batch(entries).unwrap();
        QueryEngine::from_store(&s).unwrap()
    }

    #[test]
    fn returns_k_nearest_in_distance_order() {
        let engine = ten_point_engine();
        let hits = engine.query_vector(&[4.2, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        let titles: Vec<_> = hits.iter().map(|m| m.entry.metadata.title.as_str()).collect();
        assert_eq!(titles, ["p4", "p5", "p3"]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn k_larger_than_store_returns_everything() {
        let engine = ten_point_engine();
        assert_eq!(engine.query_vector(&[0.0, 0.0], 50).unwrap().len(), 10);
    }

    #[test]
    fn k_zero_is_empty() {
        let engine = ten_point_engine();
        assert!(engine.query_vector(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn empty_store_is_empty_result() {
        let s = store(DistanceMetric::Cosine);
        let engine = QueryEngine::from_store(&s).unwrap();
        assert!(engine.is_empty());
        assert!(engine.query_text("fox", 3).unwrap().is_empty());
        assert!(engine.query_vector(&[1.0, 2.0, 3.0], 3).unwrap().is_empty());
    }

    #[test]
    fn wrong_query_dimension_fails() {
        let engine = ten_point_engine();
        let err = engine.query_vector(&[1.0, 2.0, 3.0], 3).unwrap_err();
        assert!(matches!(
            err,
            VecDbError::DimensionMismatch { expected: 2, actual: 3 }
        ));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut s = store(DistanceMetric::Cosine);
        s.upsert_batch(vec![
            entry("first", vec![1.0, 0.0]),
            entry("second", vec![2.0, 0.0]),
            entry("third", vec![0.0, 1.0]),
        ])
        .unwrap();
        let engine = QueryEngine::from_store(&s).unwrap();
        let hits = engine.query_vector(&[3.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].entry.metadata.title, "first");
        assert_eq!(hits[1].entry.metadata.title, "second");
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn text_query_uses_store_embedder() {
        let config = StoreConfig::default();
        let embedder = Arc::new(HashEmbedder::new(128).unwrap());
        let mut s = VectorStore::open_in_memory(config, embedder).unwrap();
        let docs = ["the fox and the grapes", "the tortoise and the hare", "the lion"];
        let entries = docs
            .iter()
            .map(|d| {
                NewEntry::new(
                    *d,
                    EntryMetadata {
                        title: (*d).to_string(),
                        original_title: (*d).to_string(),
                        source_url: String::new(),
                        word_count: 0,
                        content_length: d.len(),
                    },
                )
            })
            .collect();
        s.upsert_batch(entries).unwrap();
        let engine = QueryEngine::from_store(&s).unwrap();
        let hits = engine.query_text("fox grapes", 1).unwrap();
        assert_eq!(hits[0].entry.document, "the fox and the grapes");
    }

    #[test]
    fn snapshot_ignores_later_writes() {
        let mut s = store(DistanceMetric::Euclidean);
        s.upsert_batch(vec![entry("a", vec![0.0, 0.0])]).unwrap();
        let engine = QueryEngine::from_store(&s).unwrap();
        s.upsert_batch(vec![entry("b", vec![1.0, 1.0])]).unwrap();
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn concurrent_readers_share_snapshot() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QueryEngine>();

        let engine = Arc::new(ten_point_engine());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let hits = engine.query_vector(&[t as f32, 0.0], 1).unwrap();
                    hits[0].entry.metadata.title.clone()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, ["p0", "p1", "p2", "p3"]);
    }
}
