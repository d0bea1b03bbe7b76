use std::sync::Arc;

use reflow_reader::{
    FileBackend, KvBackend, Location, MemoryBackend, PersistenceRecord, PositionStore,
    RecordSource, Settings, StoreError, Theme, UnavailableBackend,
};

const KEY: &str = "reader:book:position";

fn at(chapter: usize, page: usize) -> PersistenceRecord {
    PersistenceRecord::new(Location::Page { chapter, page }, Settings::default())
}

fn backends() -> (Arc<MemoryBackend>, Arc<MemoryBackend>, PositionStore) {
    let remote = Arc::new(MemoryBackend::new("remote"));
    let local = Arc::new(MemoryBackend::new("local"));
    let store = PositionStore::new(remote.clone(), local.clone());
    (remote, local, store)
}

#[tokio::test]
async fn test_primary_value_wins_over_secondary() {
    let (remote, local, store) = backends();
    remote.insert(KEY, &at(4, 1).encode().expect("encode"));
    local.insert(KEY, &at(1, 9).encode().expect("encode"));

    let (record, source) = store.load_with_source(KEY).await.expect("record");
    assert_eq!(record, at(4, 1));
    assert_eq!(source, RecordSource::Remote);
}

#[tokio::test]
async fn test_offline_primary_falls_back_to_saved_secondary() {
    let (remote, _local, store) = backends();
    remote.set_online(false);

    let outcome = store.save(KEY, &at(2, 3)).await;
    assert!(outcome.local_saved);
    let remote_write = outcome.remote.expect("remote configured");
    assert!(!remote_write.finished().await);

    let (record, source) = store.load_with_source(KEY).await.expect("record");
    assert_eq!(record, at(2, 3));
    assert_eq!(source, RecordSource::Local);
}

#[tokio::test]
async fn test_empty_primary_falls_back_to_secondary() {
    let (_remote, local, store) = backends();
    local.insert(KEY, &at(0, 7).encode().expect("encode"));
    assert_eq!(store.load(KEY).await, Some(at(0, 7)));
}

#[tokio::test]
async fn test_nothing_stored_is_absent() {
    let (_remote, _local, store) = backends();
    assert_eq!(store.load(KEY).await, None);
}

#[tokio::test]
async fn test_save_reaches_both_backends() {
    let (remote, local, store) = backends();
    let record = PersistenceRecord::new(
        Location::Page {
            chapter: 1,
            page: 2,
        },
        Settings::default().with_theme(Theme::Dark),
    );
    let outcome = store.save(KEY, &record).await;
    assert!(outcome.local_saved);
    assert!(outcome.remote.expect("remote").finished().await);

    for backend in [&remote, &local] {
        let raw = backend.peek(KEY).expect("stored");
        assert_eq!(PersistenceRecord::decode(&raw).expect("decode"), record);
    }
}

#[tokio::test]
async fn test_no_backends_means_no_persistence_but_no_errors() {
    let store = PositionStore::new(Arc::new(UnavailableBackend), Arc::new(UnavailableBackend));
    let outcome = store.save(KEY, &at(3, 3)).await;
    assert!(!outcome.local_saved);
    assert_eq!(store.load(KEY).await, None);
}

#[tokio::test]
async fn test_legacy_values_decode() {
    let (_remote, local, store) = backends();
    local.insert(KEY, "3");
    assert_eq!(
        store.load(KEY).await,
        Some(PersistenceRecord::location_only(Location::Page {
            chapter: 2,
            page: 0
        }))
    );

    local.insert(KEY, "epubcfi(/6/4!/4/2:0)");
    let record = store.load(KEY).await.expect("record");
    assert_eq!(record.location.token(), Some("epubcfi(/6/4!/4/2:0)"));
    assert_eq!(record.settings, None);
}

#[tokio::test]
async fn test_file_backend_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("positions.json");

    {
        let store = PositionStore::local_only(Arc::new(FileBackend::new(&path)));
        let outcome = store.save(KEY, &at(5, 6)).await;
        assert!(outcome.local_saved);
        assert!(outcome.remote.is_none());
        let other = store.save("reader:other:position", &at(0, 1)).await;
        assert!(other.local_saved);
    }

    let store = PositionStore::local_only(Arc::new(FileBackend::new(&path)));
    assert_eq!(store.load(KEY).await, Some(at(5, 6)));
    assert_eq!(store.load("reader:other:position").await, Some(at(0, 1)));
}

#[tokio::test]
async fn test_file_backend_serializes_concurrent_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = FileBackend::new(dir.path().join("positions.json"));

    let (first, second) = tokio::join!(
        backend.set("reader:a:position", "1"),
        backend.set("reader:b:position", "2"),
    );
    first.expect("first set");
    second.expect("second set");

    assert_eq!(backend.get("reader:a:position").await, Ok(Some("1".to_string())));
    assert_eq!(backend.get("reader:b:position").await, Ok(Some("2".to_string())));
}

#[tokio::test]
async fn test_file_backend_missing_file_is_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = FileBackend::new(dir.path().join("absent.json"));
    assert_eq!(backend.get(KEY).await, Ok(None));
}

#[tokio::test]
async fn test_file_backend_rejects_corrupt_file_on_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("positions.json");
    std::fs::write(&path, "not json").expect("write");

    let backend = FileBackend::new(&path);
    assert!(matches!(backend.get(KEY).await, Err(StoreError::Corrupt(_))));

    // A write replaces the unreadable file.
    backend.set(KEY, "1").await.expect("set");
    assert_eq!(backend.get(KEY).await, Ok(Some("1".to_string())));
}
