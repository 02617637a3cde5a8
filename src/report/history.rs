use std::fs;
use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use super::sink::ReportSink;
use super::summary::RunSummary;
use crate::error::ReportError;
use crate::schema::Violation;
use crate::testing::verdict::{Verdict, VerdictRecord};

/// One recorded run, newest first when listed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub id: i64,
    pub suite: String,
    pub started_at: i64,
    /// `None` while the run is still in progress (or crashed before finalizing).
    pub finished_at: Option<i64>,
    pub total: i64,
    pub passed: i64,
    pub failed: i64,
    pub errored: i64,
    pub skipped: i64,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerdictRow {
    pub position: i64,
    pub scenario: String,
    pub outcome: String,
    pub status: Option<u16>,
    pub elapsed_ms: i64,
    pub failures: Vec<String>,
    pub violations: Vec<Violation>,
}

/// SQLite-backed run history.
pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    pub fn open(path: &Path) -> Result<Self, ReportError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, ReportError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ReportError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
               id INTEGER PRIMARY KEY AUTOINCREMENT,
               suite TEXT NOT NULL,
               started_at INTEGER NOT NULL,
               finished_at INTEGER,
               total INTEGER NOT NULL DEFAULT 0,
               passed INTEGER NOT NULL DEFAULT 0,
               failed INTEGER NOT NULL DEFAULT 0,
               errored INTEGER NOT NULL DEFAULT 0,
               skipped INTEGER NOT NULL DEFAULT 0,
               duration_ms INTEGER NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS verdicts (
               id INTEGER PRIMARY KEY AUTOINCREMENT,
               run_id INTEGER NOT NULL REFERENCES runs(id),
               position INTEGER NOT NULL,
               scenario TEXT NOT NULL,
               outcome TEXT NOT NULL,
               status INTEGER,
               elapsed_ms INTEGER NOT NULL,
               failures_json TEXT NOT NULL,
               violations_json TEXT NOT NULL,
               recorded_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
             );
             CREATE INDEX IF NOT EXISTS idx_verdicts_run ON verdicts(run_id, position);",
        )?;
        Ok(Self { conn })
    }

    pub fn begin_run(&self, suite: &str) -> Result<i64, ReportError> {
        self.conn.execute(
            "INSERT INTO runs (suite, started_at) VALUES (?1, ?2);",
            params![suite, Utc::now().timestamp()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_verdict(
        &self,
        run_id: i64,
        position: i64,
        record: &VerdictRecord,
    ) -> Result<(), ReportError> {
        let status = record.exchange.as_ref().map(|exchange| exchange.status);
        self.conn.execute(
            "INSERT INTO verdicts
               (run_id, position, scenario, outcome, status, elapsed_ms, failures_json, violations_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                run_id,
                position,
                record.scenario,
                record.outcome.as_str(),
                status,
                record.elapsed_ms as i64,
                serde_json::to_string(&record.failures)?,
                serde_json::to_string(&record.violations)?,
            ],
        )?;
        Ok(())
    }

    pub fn finish_run(&self, run_id: i64, summary: &RunSummary) -> Result<(), ReportError> {
        self.conn.execute(
            "UPDATE runs SET
               finished_at = ?2, total = ?3, passed = ?4, failed = ?5,
               errored = ?6, skipped = ?7, duration_ms = ?8
             WHERE id = ?1;",
            params![
                run_id,
                Utc::now().timestamp(),
                summary.total as i64,
                summary.passed as i64,
                summary.failed as i64,
                summary.errored as i64,
                summary.skipped as i64,
                summary.duration_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn run(&self, run_id: i64) -> Result<Option<RunRow>, ReportError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, suite, started_at, finished_at, total, passed, failed, errored,
                        skipped, duration_ms
                 FROM runs WHERE id = ?1;",
                params![run_id],
                run_row,
            )
            .optional()?)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRow>, ReportError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, suite, started_at, finished_at, total, passed, failed, errored,
                    skipped, duration_ms
             FROM runs ORDER BY id DESC LIMIT ?1;",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], run_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn verdicts(&self, run_id: i64) -> Result<Vec<VerdictRow>, ReportError> {
        let mut stmt = self.conn.prepare(
            "SELECT position, scenario, outcome, status, elapsed_ms, failures_json, violations_json
             FROM verdicts WHERE run_id = ?1 ORDER BY position;",
        )?;
        let raw = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<u16>>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(
                |(position, scenario, outcome, status, elapsed_ms, failures, violations)| {
                    Ok(VerdictRow {
                        position,
                        scenario,
                        outcome,
                        status,
                        elapsed_ms,
                        failures: serde_json::from_str(&failures)?,
                        violations: serde_json::from_str(&violations)?,
                    })
                },
            )
            .collect()
    }
}

fn run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        id: row.get(0)?,
        suite: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        total: row.get(4)?,
        passed: row.get(5)?,
        failed: row.get(6)?,
        errored: row.get(7)?,
        skipped: row.get(8)?,
        duration_ms: row.get(9)?,
    })
}

/// Appends each verdict to the history database as it arrives and closes
/// the run row on finalize.
pub struct HistorySink {
    store: HistoryStore,
    run_id: i64,
    position: i64,
}

impl HistorySink {
    pub fn open(path: &Path, suite: &str) -> Result<Self, ReportError> {
        Self::start(HistoryStore::open(path)?, suite)
    }

    pub fn start(store: HistoryStore, suite: &str) -> Result<Self, ReportError> {
        let run_id = store.begin_run(suite)?;
        tracing::debug!(run_id, suite, "history run opened");
        Ok(Self {
            store,
            run_id,
            position: 0,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }
}

impl ReportSink for HistorySink {
    fn record(&mut self, verdict: Verdict) -> Result<(), ReportError> {
        self.store
            .insert_verdict(self.run_id, self.position, &verdict.record())?;
        self.position += 1;
        Ok(())
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReportError> {
        self.store.finish_run(self.run_id, summary)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::error::{HarnessError, TransportError};
    use crate::http::exchange::Exchange;
    use crate::http::request::RequestDescriptor;

    fn passed(name: &str) -> Verdict {
        let exchange = Exchange::new(
            RequestDescriptor::get("/api/users/2"),
            "https://reqres.in/api/users/2".into(),
            200,
            Vec::new(),
            Bytes::from_static(b"{}"),
            Duration::from_millis(35),
        );
        Verdict::completed(name, Vec::new(), Vec::new(), exchange)
    }

    #[test]
    fn records_verdicts_and_closes_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");

        let mut sink = HistorySink::open(&path, "users").unwrap();
        let run_id = sink.run_id();
        sink.record(passed("fetch user")).unwrap();
        sink.record(Verdict::errored(
            "offline",
            HarnessError::Transport(TransportError::Connect("refused".into())),
            Duration::ZERO,
            None,
        ))
        .unwrap();

        let open = sink.store().run(run_id).unwrap().unwrap();
        assert_eq!(open.finished_at, None);

        sink.finalize(&RunSummary {
            total: 2,
            passed: 1,
            errored: 1,
            duration_ms: 40,
            ..RunSummary::default()
        })
        .unwrap();
        drop(sink);

        let store = HistoryStore::open(&path).unwrap();
        let run = store.run(run_id).unwrap().unwrap();
        assert_eq!(run.suite, "users");
        assert_eq!((run.total, run.passed, run.errored), (2, 1, 1));
        assert!(run.finished_at.is_some());

        let verdicts = store.verdicts(run_id).unwrap();
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].scenario, "fetch user");
        assert_eq!(verdicts[0].status, Some(200));
        assert_eq!(verdicts[1].outcome, "errored");
        assert_eq!(verdicts[1].status, None);
        assert!(verdicts[1].failures[0].contains("refused"));
    }

    #[test]
    fn recent_runs_are_newest_first() {
        let store = HistoryStore::in_memory().unwrap();
        let first = store.begin_run("a").unwrap();
        let second = store.begin_run("b").unwrap();

        let runs = store.recent_runs(10).unwrap();
        assert_eq!(runs.iter().map(|run| run.id).collect::<Vec<_>>(), vec![second, first]);
        assert_eq!(store.recent_runs(1).unwrap().len(), 1);
    }
}
