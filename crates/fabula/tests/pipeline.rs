use std::sync::Arc;

use fabula::{
    DedupConfig, Deduplicator, HashEmbedder, IngestPipeline, RawRecord, RawRecordDraft,
    StoreConfig, VectorStore,
};

const BASE: &str = "https://aesopfables.com/cgi/aesop1.cgi?srch&fab/";

fn words(seed: &str, n: usize) -> String {
    (0..n).map(|i| format!("{seed}{}", i % 7)).collect::<Vec<_>>().join(" ")
}

fn fable(title: &str, suffix: &str, content: String) -> RawRecordDraft {
    RawRecord::new(title, format!("{BASE}{suffix}"), content).into()
}

fn corpus() -> Vec<RawRecordDraft> {
    vec![
        fable("The Fox and the Grapes", "fox1", words("fox", 40)),
        fable("The Lion and the Mouse", "lion", words("lion", 180)),
        fable("Fox and the Grapes Fable", "fox2", words("grape", 250)),
        fable("The Tortoise and the Hare", "hare", words("hare", 300)),
        fable("FOX AND THE GRAPES", "fox3", words("vine", 1500)),
    ]
}

fn memory_pipeline(dims: usize) -> IngestPipeline {
    let store = VectorStore::open_in_memory(
        StoreConfig::default(),
        Arc::new(HashEmbedder::new(dims).unwrap()),
    )
    .unwrap();
    IngestPipeline::new(DedupConfig::default(), store).unwrap()
}

#[test]
fn end_to_end_keeps_best_version() {
    let mut pipeline = memory_pipeline(64);
    let report = pipeline.run(corpus()).unwrap();

    assert_eq!(report.stats.total_records, 5);
    assert_eq!(report.stats.unique, 3);
    assert_eq!(report.stats.duplicates_removed, 2);
    assert_eq!(report.ids, ["fable_0000", "fable_0001", "fable_0002"]);

    let removed: Vec<_> = report.removed.iter().map(|r| r.url_key.as_str()).collect();
    assert_eq!(removed, ["fab/fox1", "fab/fox3"]);

    let stored = pipeline.store().get_all().unwrap();
    let titles: Vec<_> = stored.iter().map(|e| e.metadata.title.as_str()).collect();
    assert_eq!(
        titles,
        ["Fox and the Grapes Fable", "The Lion and the Mouse", "The Tortoise and the Hare"]
    );
}

#[test]
fn ids_round_trip_to_submitted_metadata() {
    let mut pipeline = memory_pipeline(32);
    let drafts = vec![
        fable("The Crow and the Pitcher", "crow", words("crow", 120)),
        fable("The Ant and the Grasshopper", "ant", words("ant", 220)),
    ];
    let expected: Vec<RawRecord> = drafts.iter().cloned().map(|d| d.validate().unwrap()).collect();
    let report = pipeline.run(drafts).unwrap();

    for (id, record) in report.ids.iter().zip(&expected) {
        let entry = pipeline.store().get(id).unwrap().unwrap();
        assert_eq!(entry.metadata.title, record.title);
        assert_eq!(entry.metadata.original_title, record.original_title);
        assert_eq!(entry.metadata.source_url, record.source_url);
        assert_eq!(entry.metadata.word_count, record.word_count);
        assert_eq!(entry.document, record.content);
    }
}

#[test]
fn dedup_is_idempotent() {
    let dedup = Deduplicator::new(DedupConfig::default()).unwrap();
    let first = dedup.run(corpus());
    let second = dedup.run(corpus());
    assert_eq!(first.canonical, second.canonical);
    assert_eq!(first.removed, second.removed);

    let mut a = Vec::new();
    let mut b = Vec::new();
    first.write_removed_list(&mut a).unwrap();
    second.write_removed_list(&mut b).unwrap();
    assert_eq!(a, b);
}

#[test]
fn query_boundary() {
    let mut pipeline = memory_pipeline(512);
    assert!(pipeline.query_engine().unwrap().query_text("fox", 3).unwrap().is_empty());

    let drafts = (0..10)
        .map(|i| fable(&format!("Fable Number {i}"), &format!("n{i}"), words(&format!("w{i}x"), 50)))
        .collect();
    let report = pipeline.run(drafts).unwrap();
    assert_eq!(report.ids.len(), 10);

    let engine = pipeline.query_engine().unwrap();
    let hits = engine.query_text("w3x0 w3x1 w3x2", 3).unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!(hits[0].entry.metadata.title, "Fable Number 3");
    assert!(engine.query_text("anything", 0).unwrap().is_empty());
}

#[test]
fn rerun_appends_and_recreate_resets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fabula.sqlite3");
    let open = || {
        VectorStore::open(
            &path,
            StoreConfig::default(),
            Arc::new(HashEmbedder::new(16).unwrap()),
        )
        .unwrap()
    };

    let mut pipeline = IngestPipeline::new(DedupConfig::default(), open()).unwrap();
    pipeline.run(corpus()).unwrap();
    pipeline.finish().unwrap();

    let mut store = open();
    assert_eq!(store.count().unwrap(), 3);
    store.recreate().unwrap();
    assert_eq!(store.count().unwrap(), 0);

    let mut pipeline = IngestPipeline::new(DedupConfig::default(), store).unwrap();
    let report = pipeline.run(corpus()).unwrap();
    assert_eq!(report.ids[0], "fable_0000");
}
