//! Integration tests for the async event store.

use futures_util::StreamExt;
use palisade_db::{create_pool, run_migrations, DbRuntimeSettings};
use palisade_store::{EventStore, FilterError, QueryLimits, ReplaceOutcome, StoreError};
use palisade_types::{Event, Filter, Tag};
use tempfile::NamedTempFile;

fn test_store() -> (EventStore, NamedTempFile) {
    let file = NamedTempFile::new().expect("should create temp file");
    let path = file.path().to_str().expect("utf-8 path").to_string();
    let pool = create_pool(&path, DbRuntimeSettings::default()).expect("should create pool");
    {
        let conn = pool.get().expect("should get connection");
        run_migrations(&conn).expect("migrations should succeed");
    }
    (EventStore::new(pool, QueryLimits::default()), file)
}

fn event(id: &str, pubkey: &str, created_at: i64, kind: u32) -> Event {
    Event {
        id: id.to_string(),
        pubkey: pubkey.to_string(),
        created_at,
        kind,
        tags: Vec::new(),
        content: String::new(),
        sig: "sig".to_string(),
    }
}

#[tokio::test]
async fn saved_events_stream_back_newest_first() {
    let (store, _file) = test_store();
    for (id, t) in [("a", 1), ("b", 3), ("c", 2)] {
        store.save(&event(id, "alice", t, 1)).await.unwrap();
    }

    let events = store
        .query(&Filter::default().author("alice"))
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
}

#[tokio::test]
async fn omitted_and_oversized_limits_use_default() {
    let (store, _file) = test_store();
    for i in 0..120 {
        store.save(&event(&format!("e{i:03}"), "alice", i, 1)).await.unwrap();
    }

    let default = store.query(&Filter::default()).unwrap().collect_all().await.unwrap();
    assert_eq!(default.len(), 100);

    let oversized = store
        .query(&Filter::default().limit(10_000))
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(oversized.len(), 100);

    let small = store
        .query(&Filter::default().limit(7))
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(small.len(), 7);
    assert_eq!(small[0].id, "e119");
}

#[tokio::test]
async fn duplicate_save_surfaces_as_duplicate() {
    let (store, _file) = test_store();
    let ev = event("a", "alice", 1, 1);
    store.save(&ev).await.unwrap();
    let err = store.save(&ev).await.unwrap_err();
    assert!(err.is_duplicate());
    assert_eq!(store.count(&Filter::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn too_many_authors_is_rejected_before_streaming() {
    let (store, _file) = test_store();
    let filter = Filter {
        authors: (0..501).map(|i| format!("{i:064x}")).collect(),
        ..Filter::default()
    };
    let err = store.query(&filter).unwrap_err();
    assert!(matches!(err, StoreError::Filter(FilterError::TooManyAuthors)));
}

#[tokio::test]
async fn concurrent_replaces_leave_exactly_one_live_event() {
    let (store, _file) = test_store();
    let mut tasks = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let mut ev = event(&format!("r{i:02}"), "alice", 100 + i, 30063);
            ev.tags = vec![Tag::new(["d", "app"])];
            store.replace(&ev).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let live = store
        .query(&Filter::default().author("alice").kind(30063).tag("d", "app"))
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, "r15");
}

#[tokio::test]
async fn replace_reports_superseded_for_older_event() {
    let (store, _file) = test_store();
    assert_eq!(
        store.replace(&event("new", "alice", 5, 0)).await.unwrap(),
        ReplaceOutcome::Stored
    );
    assert_eq!(
        store.replace(&event("old", "alice", 4, 0)).await.unwrap(),
        ReplaceOutcome::Superseded
    );
}

#[tokio::test]
async fn dropped_stream_stops_early() {
    let (store, _file) = test_store();
    for i in 0..60 {
        store.save(&event(&format!("e{i:02}"), "alice", i, 1)).await.unwrap();
    }

    let mut stream = store.query(&Filter::default().limit(60)).unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.id, "e59");
    stream.cancel();

    let mut remaining = 0;
    while stream.next_event().await.is_some() {
        remaining += 1;
    }
    assert!(remaining < 59, "cancel should stop the worker, got {remaining}");

    // The pooled connection is released and the store remains usable.
    assert_eq!(store.count(&Filter::default()).await.unwrap(), 60);
}

#[tokio::test]
async fn access_lists_round_trip_through_store() {
    let (store, _file) = test_store();
    store.set_whitelist_tier("alice", 2).await.unwrap();
    assert_eq!(store.whitelist_tier("alice").await.unwrap(), 2);
    assert_eq!(store.whitelist_tier("bob").await.unwrap(), 0);

    assert!(store.add_to_blacklist("mallory").await.unwrap());
    assert!(store.is_blacklisted("mallory").await.unwrap());
    store.save_log("blacklisted mallory").await.unwrap();
}
