use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use repofeat::{
    build_dataset, log_app_start, log_store_selected, DatasetRequest, LoggingConfig,
    SqliteRepoStore,
};
use rusqlite::Connection;
use tracing::dispatcher::with_default;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

#[derive(Clone, Default)]
struct SharedWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
    fn output_string(&self) -> String {
        let bytes = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        String::from_utf8_lossy(&bytes).to_string()
    }
}

struct SharedWriterGuard {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        out.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs(max_level: Level, f: impl FnOnce()) -> String {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_max_level(max_level)
        .with_writer(writer.clone())
        .finish();
    let dispatch = tracing::Dispatch::new(subscriber);

    with_default(&dispatch, f);
    writer.output_string()
}

fn seeded_store() -> SqliteRepoStore {
    let conn = Connection::open_in_memory().expect("in-memory sqlite");
    conn.execute_batch(
        "
        CREATE TABLE repos (
            id INTEGER PRIMARY KEY,
            stargazers_count INTEGER,
            forks_count INTEGER,
            watchers_count INTEGER,
            subscribers_count INTEGER
        );
        CREATE TABLE commits (
            repo_id INTEGER NOT NULL,
            author_name TEXT,
            author_email TEXT,
            committer_name TEXT,
            committer_email TEXT,
            author_date INTEGER,
            committer_date INTEGER,
            additions INTEGER,
            deletions INTEGER,
            test_additions INTEGER,
            test_deletions INTEGER
        );
        INSERT INTO repos VALUES (1, 10, 1, 10, 1), (2, 20, 2, 20, 2);
        INSERT INTO commits VALUES
            (1, 'alice', 'alice@x', 'ci', 'ci@x', 1000, 1000, 5, 1, 0, 0),
            (2, 'bob', 'bob@x', 'ci', 'ci@x', 2000, 2000, 7, 3, 1, 1);
        ",
    )
    .expect("seed sqlite");
    SqliteRepoStore::from_connection(conn).expect("store")
}

#[test]
fn dataset_build_emits_lifecycle_events() {
    let store = seeded_store();
    let request = DatasetRequest::from_json(r#"{"maxCommits": 2}"#).expect("request");

    let logs = capture_logs(Level::DEBUG, || {
        let out = build_dataset(&store, &request).expect("build succeeds");
        assert_eq!(out.pairs.len(), 2);
    });

    assert!(logs.contains("\"event\":\"dataset.build.start\""));
    assert!(logs.contains("\"event\":\"schema.built\""));
    assert!(logs.contains("\"event\":\"stats.cache.refresh\""));
    assert!(logs.contains("\"event\":\"dataset.selection.resolved\""));
    assert!(logs.contains("\"event\":\"features.repo.extracted\""));
    assert!(logs.contains("\"event\":\"dataset.build.finish\""));
}

#[test]
fn second_build_reports_cache_hit() {
    let store = seeded_store();
    let request = DatasetRequest::default();
    build_dataset(&store, &request).expect("first build");

    let logs = capture_logs(Level::INFO, || {
        build_dataset(&store, &request).expect("second build");
    });

    assert!(logs.contains("\"event\":\"stats.cache.hit\""));
    assert!(!logs.contains("\"event\":\"stats.cache.refresh\""));
}

#[test]
fn config_errors_are_logged() {
    let store = seeded_store();
    let request = DatasetRequest {
        which_dataset: Some("holdout".to_string()),
        ..DatasetRequest::default()
    };

    let logs = capture_logs(Level::INFO, || {
        build_dataset(&store, &request).expect_err("invalid split must fail");
    });

    assert!(logs.contains("\"event\":\"dataset.build.error\""));
    assert!(logs.contains("\"stage\":\"plan\""));
    assert!(!logs.contains("\"event\":\"dataset.build.start\""));
}

#[test]
fn cli_lifecycle_helpers_emit_baseline_events() {
    let logs = capture_logs(Level::INFO, || {
        let cfg = LoggingConfig::default();
        log_app_start(&cfg);
        log_store_selected(Path::new("data/repos.sqlite"), "json");
    });

    assert!(logs.contains("\"event\":\"app.start\""));
    assert!(logs.contains("\"event\":\"store.selected\""));
}
