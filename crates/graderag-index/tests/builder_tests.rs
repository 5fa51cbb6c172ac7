mod common;

use std::fs;
use std::sync::atomic::Ordering;

use graderag_core::Error;
use graderag_index::{BuildOutcome, CategoryIndexStore, IndexBuilder, IndexCatalog, CATALOG_FILE};
use tempfile::TempDir;

use common::*;

#[test]
fn ensure_index_builds_once() {
    let tmp = TempDir::new().unwrap();
    let (root, dbs) = (tmp.path().join("corpus"), tmp.path().join("dbs"));
    write_corpus(
        &root,
        "grade7",
        &[
            ("a.txt", "Plants need light. They also need water."),
            ("b.txt", "Rivers flow to the sea."),
        ],
    );

    let backend = JsonBackend::default();
    let store = CategoryIndexStore::new(&dbs, backend.clone());
    let embedder = CountingEmbedder::default();
    let builder = IndexBuilder::new(&store, &embedder, &embedding_settings());
    let cat = category(&root, "grade7", &dbs);

    let first = builder.ensure_index(&cat).unwrap();
    assert_eq!(first, BuildOutcome::Built { documents: 2, chunks: 2 });
    assert!(dbs.join("grade7_vector_db").join(CATALOG_FILE).is_file());
    let embedded = embedder.texts.load(Ordering::SeqCst);

    let second = builder.ensure_index(&cat).unwrap();
    assert_eq!(second, BuildOutcome::Skipped);
    assert_eq!(embedder.texts.load(Ordering::SeqCst), embedded, "no re-embedding");
    assert_eq!(backend.persists.load(Ordering::SeqCst), 1, "persisted exactly once");
}

#[test]
fn catalog_records_the_build() {
    let tmp = TempDir::new().unwrap();
    let (root, dbs) = (tmp.path().join("corpus"), tmp.path().join("dbs"));
    write_corpus(&root, "grade8", &[("notes.md", "Cells divide. Cells grow.")]);

    let store = CategoryIndexStore::new(&dbs, JsonBackend::default());
    let embedder = CountingEmbedder::default();
    IndexBuilder::new(&store, &embedder, &embedding_settings())
        .ensure_index(&category(&root, "grade8", &dbs))
        .unwrap();

    let catalog = IndexCatalog::read(&index_dir(&dbs, "grade8")).unwrap();
    assert_eq!(catalog.grade, "grade8");
    assert_eq!(catalog.embedder_id, "counting-hash");
    assert_eq!(catalog.dim, DIM);
    assert_eq!((catalog.chunk_size, catalog.chunk_overlap), (256, 16));
    assert_eq!(catalog.chunk_count, 1);
    assert_eq!(catalog.documents.len(), 1);
    assert_eq!(catalog.documents[0].doc_id, "notes.md");
    assert_eq!(catalog.documents[0].chunks, 1);
    assert_eq!(catalog.documents[0].content_hash.len(), 64);
    assert!(chrono::DateTime::parse_from_rfc3339(&catalog.built_at).is_ok());
}

#[test]
fn failed_embedding_leaves_no_marker_and_retry_rebuilds() {
    let tmp = TempDir::new().unwrap();
    let (root, dbs) = (tmp.path().join("corpus"), tmp.path().join("dbs"));
    write_corpus(&root, "grade7", &[("a.txt", "Some text to embed.")]);

    let store = CategoryIndexStore::new(&dbs, JsonBackend::default());
    let embedder = CountingEmbedder::default();
    let builder = IndexBuilder::new(&store, &embedder, &embedding_settings());
    let cat = category(&root, "grade7", &dbs);

    embedder.fail.store(true, Ordering::SeqCst);
    let err = builder.ensure_index(&cat).unwrap_err();
    assert!(matches!(err, Error::Embedding(_)), "got {err:?}");
    assert!(!store.is_complete("grade7"));
    assert!(!index_dir(&dbs, "grade7").exists(), "nothing published");
    assert!(matches!(store.load_index("grade7"), Err(Error::IndexNotFound(_))));

    embedder.fail.store(false, Ordering::SeqCst);
    assert!(matches!(builder.ensure_index(&cat).unwrap(), BuildOutcome::Built { .. }));
    assert!(store.is_complete("grade7"));
}

#[test]
fn directory_without_marker_is_rebuilt() {
    let tmp = TempDir::new().unwrap();
    let (root, dbs) = (tmp.path().join("corpus"), tmp.path().join("dbs"));
    write_corpus(&root, "grade7", &[("a.txt", "Fresh content.")]);
    let stale = index_dir(&dbs, "grade7");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("leftover.bin"), b"partial").unwrap();

    let store = CategoryIndexStore::new(&dbs, JsonBackend::default());
    let embedder = CountingEmbedder::default();
    let outcome = IndexBuilder::new(&store, &embedder, &embedding_settings())
        .ensure_index(&category(&root, "grade7", &dbs))
        .unwrap();

    assert!(matches!(outcome, BuildOutcome::Built { .. }));
    assert!(!stale.join("leftover.bin").exists());
    assert!(stale.join(CATALOG_FILE).is_file());
    assert_eq!(entries(&dbs), vec!["grade7_vector_db"], "old directory and staging are gone");
}

#[test]
fn index_published_during_build_is_kept() {
    let tmp = TempDir::new().unwrap();
    let (root, dbs) = (tmp.path().join("corpus"), tmp.path().join("dbs"));
    write_corpus(&root, "grade7", &[("a.txt", "Both builds read this.")]);

    let backend = RacingBackend { inner: JsonBackend::default(), rival: index_dir(&dbs, "grade7") };
    let store = CategoryIndexStore::new(&dbs, backend);
    let embedder = CountingEmbedder::default();
    let outcome = IndexBuilder::new(&store, &embedder, &embedding_settings())
        .ensure_index(&category(&root, "grade7", &dbs))
        .unwrap();

    assert_eq!(outcome, BuildOutcome::Skipped);
    assert!(store.is_complete("grade7"));
    let loaded = store.load_index("grade7").unwrap();
    assert_eq!(loaded.catalog.embedder_id, RIVAL_EMBEDDER, "the first published build wins");
    assert_eq!(loaded.handle.rows.len(), 1);
    assert_eq!(entries(&dbs), vec!["grade7_vector_db"], "our staging directory is discarded");
}

#[test]
fn category_pointing_elsewhere_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let (root, dbs) = (tmp.path().join("corpus"), tmp.path().join("dbs"));
    write_corpus(&root, "grade7", &[("a.txt", "Text.")]);

    let store = CategoryIndexStore::new(&dbs, JsonBackend::default());
    let embedder = CountingEmbedder::default();
    let mut cat = category(&root, "grade7", &dbs);
    cat.index_dir = tmp.path().join("elsewhere");

    let err = IndexBuilder::new(&store, &embedder, &embedding_settings())
        .ensure_index(&cat)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "got {err:?}");
    assert_eq!(embedder.texts.load(Ordering::SeqCst), 0);
    assert!(!dbs.exists());
}

#[test]
fn chunks_shrink_to_the_embedder_window() {
    let tmp = TempDir::new().unwrap();
    let (root, dbs) = (tmp.path().join("corpus"), tmp.path().join("dbs"));
    let text = (0..12).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
    write_corpus(&root, "grade7", &[("a.txt", text.as_str())]);

    let store = CategoryIndexStore::new(&dbs, JsonBackend::default());
    let embedder = CountingEmbedder::with_max_len(8);
    let outcome = IndexBuilder::new(&store, &embedder, &embedding_settings())
        .ensure_index(&category(&root, "grade7", &dbs))
        .unwrap();

    // 8 tokens -> 6 words per chunk, overlap capped to 7 tokens -> 5 words
    assert_eq!(outcome, BuildOutcome::Built { documents: 1, chunks: 7 });
    let catalog = store.catalog("grade7").unwrap().unwrap();
    assert_eq!((catalog.chunk_size, catalog.chunk_overlap), (8, 7));
}

#[test]
fn build_all_continues_past_failing_category() {
    let tmp = TempDir::new().unwrap();
    let (root, dbs) = (tmp.path().join("corpus"), tmp.path().join("dbs"));
    write_corpus(&root, "grade7", &[("a.txt", "Seven.")]);
    write_corpus(&root, "grade9", &[("a.txt", "Nine.")]);

    let store = CategoryIndexStore::new(&dbs, JsonBackend::default());
    let embedder = CountingEmbedder::default();
    let builder = IndexBuilder::new(&store, &embedder, &embedding_settings());
    let cats: Vec<_> =
        ["grade7", "grade8", "grade9"].iter().map(|g| category(&root, g, &dbs)).collect();

    let report = builder.build_all(&cats);
    assert!(!report.is_success());
    assert_eq!(report.built(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "grade8");
    assert!(matches!(report.failures[0].1, Error::SourceNotFound { .. }));
    assert!(store.is_complete("grade7") && store.is_complete("grade9"));

    let again = builder.build_all(&cats[..1]);
    assert_eq!(again.skipped(), 1);
    assert!(again.is_success());
}

#[test]
fn empty_category_gets_an_empty_index() {
    let tmp = TempDir::new().unwrap();
    let (root, dbs) = (tmp.path().join("corpus"), tmp.path().join("dbs"));
    write_corpus(&root, "grade7", &[]);

    let store = CategoryIndexStore::new(&dbs, JsonBackend::default());
    let embedder = CountingEmbedder::default();
    let outcome = IndexBuilder::new(&store, &embedder, &embedding_settings())
        .ensure_index(&category(&root, "grade7", &dbs))
        .unwrap();

    assert_eq!(outcome, BuildOutcome::Built { documents: 0, chunks: 0 });
    let loaded = store.load_index("grade7").unwrap();
    assert_eq!(loaded.catalog.chunk_count, 0);
    assert!(loaded.handle.rows.is_empty());
}

#[test]
fn smoke_query_runs_without_affecting_outcome() {
    let tmp = TempDir::new().unwrap();
    let (root, dbs) = (tmp.path().join("corpus"), tmp.path().join("dbs"));
    write_corpus(&root, "grade7", &[("a.txt", "Photosynthesis makes sugar.")]);

    let store = CategoryIndexStore::new(&dbs, JsonBackend::default());
    let embedder = CountingEmbedder::default();
    let outcome = IndexBuilder::new(&store, &embedder, &embedding_settings())
        .with_smoke_query(Some("What is photosynthesis?".into()))
        .ensure_index(&category(&root, "grade7", &dbs))
        .unwrap();

    assert_eq!(outcome, BuildOutcome::Built { documents: 1, chunks: 1 });
    // one chunk plus the smoke query
    assert_eq!(embedder.texts.load(Ordering::SeqCst), 2);
}

#[test]
fn unknown_category_is_index_not_found() {
    let tmp = TempDir::new().unwrap();
    let store = CategoryIndexStore::new(tmp.path(), JsonBackend::default());
    match store.load_index("unknown_category") {
        Err(Error::IndexNotFound(name)) => assert_eq!(name, "unknown_category"),
        Err(other) => panic!("expected IndexNotFound, got {other:?}"),
        Ok(_) => panic!("expected IndexNotFound"),
    }
}

#[test]
fn corrupt_marker_is_reported() {
    let tmp = TempDir::new().unwrap();
    let dir = index_dir(tmp.path(), "grade7");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(CATALOG_FILE), "{ not json").unwrap();

    let store = CategoryIndexStore::new(tmp.path(), JsonBackend::default());
    assert!(matches!(store.load_index("grade7"), Err(Error::CorruptCatalog { .. })));
}

fn entries(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
