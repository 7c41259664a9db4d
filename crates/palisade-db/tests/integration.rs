use palisade_db::{create_pool, run_migrations, DbRuntimeSettings};

#[test]
fn db_initialization_works() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("relay.sqlite");
    let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default())
        .expect("failed to create pool");

    let conn = pool.get().expect("failed to get connection");
    let applied = run_migrations(&conn).expect("failed to run migrations");
    assert!(applied > 0);
    drop(conn);

    // A second pooled connection sees the same schema.
    let other = pool.get().expect("failed to get second connection");
    let mut stmt = other
        .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE 'event_fts_%' ORDER BY name")
        .expect("failed to prepare table query");
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .expect("failed to execute table query")
        .map(|r| r.expect("failed to read table name"))
        .collect();

    assert_eq!(
        tables,
        vec![
            "_palisade_migrations",
            "blacklist",
            "event_fts",
            "event_tags",
            "events",
            "logs",
            "whitelist",
        ]
    );
}

#[test]
fn deleting_an_event_cascades_to_tag_tokens() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("relay.sqlite");
    let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default())
        .expect("failed to create pool");
    let conn = pool.get().expect("failed to get connection");
    run_migrations(&conn).expect("failed to run migrations");

    conn.execute(
        "INSERT INTO events (row_id, id, pubkey, created_at, kind, tags, content, sig)
         VALUES (1, 'aa', 'pk', 1, 1, '[]', '', '')",
        [],
    )
    .expect("insert event");
    conn.execute(
        "INSERT INTO event_tags (event_row, value) VALUES (1, 't:nostr')",
        [],
    )
    .expect("insert tag");

    conn.execute("DELETE FROM events WHERE id = 'aa'", [])
        .expect("delete event");

    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM event_tags", [], |row| row.get(0))
        .expect("count tags");
    assert_eq!(remaining, 0);
}
