//! Durable thread → job correlation table backed by SQLite.
//!
//! Shares a database file with the rest of the service. The whole table is
//! loaded into memory at startup; lookups never touch disk. Every binding is
//! written through before [`ThreadStore::put`] returns.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

struct State {
    threads: HashMap<String, String>,
    /// Bindings accepted in memory but not yet written to disk.
    unsaved: HashSet<String>,
}

/// Thread id → job id bindings. First writer wins; a binding is never
/// overwritten.
pub struct ThreadStore {
    conn: Mutex<Connection>,
    state: Mutex<State>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ThreadStore {
    /// Open or create the table in the given database and load every
    /// binding. Use `":memory:"` for tests.
    ///
    /// Failure here is fatal for the service: without the table, follow-up
    /// messages would be bound to fresh jobs.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open thread store database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS thread_jobs (
                thread_id  TEXT PRIMARY KEY,
                job_id     TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .context("failed to create thread_jobs table")?;

        let threads = Self::load_all(&conn).context("failed to load thread bindings")?;
        tracing::info!(threads = threads.len(), "thread store loaded");

        Ok(Self {
            conn: Mutex::new(conn),
            state: Mutex::new(State {
                threads,
                unsaved: HashSet::new(),
            }),
        })
    }

    fn load_all(conn: &Connection) -> Result<HashMap<String, String>> {
        let mut stmt = conn.prepare("SELECT thread_id, job_id FROM thread_jobs")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Job bound to a thread, if any.
    pub fn get(&self, thread_id: &str) -> Option<String> {
        lock(&self.state).threads.get(thread_id).cloned()
    }

    /// Bind `thread_id` to `job_id` unless it is already bound, and return
    /// the job the thread is bound to afterwards.
    ///
    /// The check and the insert happen under one lock, so concurrent callers
    /// for the same thread all get the first caller's job id. A failed write
    /// is logged and retried on the next `put` or [`persist`](Self::persist);
    /// the in-memory binding stays authoritative meanwhile.
    pub fn put(&self, thread_id: &str, job_id: &str) -> String {
        let mut state = lock(&self.state);
        if let Some(existing) = state.threads.get(thread_id) {
            return existing.clone();
        }
        state
            .threads
            .insert(thread_id.to_string(), job_id.to_string());
        state.unsaved.insert(thread_id.to_string());

        if let Err(e) = self.flush(&mut state) {
            tracing::warn!(thread_id, job_id, error = %e, "failed to persist thread binding");
        }
        job_id.to_string()
    }

    /// Write every binding not yet on disk.
    pub fn persist(&self) -> Result<()> {
        let mut state = lock(&self.state);
        self.flush(&mut state)
    }

    fn flush(&self, state: &mut State) -> Result<()> {
        if state.unsaved.is_empty() {
            return Ok(());
        }
        let mut conn = lock(&self.conn);
        let tx = conn.transaction()?;
        for thread_id in &state.unsaved {
            if let Some(job_id) = state.threads.get(thread_id) {
                tx.execute(
                    "INSERT OR IGNORE INTO thread_jobs (thread_id, job_id) VALUES (?1, ?2)",
                    [thread_id, job_id],
                )?;
            }
        }
        tx.commit()?;
        state.unsaved.clear();
        Ok(())
    }

    /// Number of bindings not yet written to disk.
    pub fn unsaved(&self) -> usize {
        lock(&self.state).unsaved.len()
    }

    /// All bindings, sorted by thread id.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = lock(&self.state)
            .threads
            .iter()
            .map(|(thread, job)| (thread.clone(), job.clone()))
            .collect();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        lock(&self.state).threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn drop_table(&self) {
        lock(&self.conn)
            .execute_batch("DROP TABLE thread_jobs")
            .unwrap();
    }

    #[cfg(test)]
    fn restore_table(&self) {
        lock(&self.conn)
            .execute_batch(
                "CREATE TABLE thread_jobs (
                    thread_id  TEXT PRIMARY KEY,
                    job_id     TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
            )
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_store() -> ThreadStore {
        ThreadStore::open(":memory:").unwrap()
    }

    #[test]
    fn get_returns_none_for_unknown_thread() {
        let store = mem_store();
        assert!(store.get("T1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn put_then_get() {
        let store = mem_store();
        assert_eq!(store.put("T1", "J1"), "J1");
        assert_eq!(store.get("T1").unwrap(), "J1");
    }

    #[test]
    fn first_writer_wins() {
        let store = mem_store();
        store.put("T1", "J1");
        assert_eq!(store.put("T1", "J2"), "J1");
        assert_eq!(store.get("T1").unwrap(), "J1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn threads_are_independent() {
        let store = mem_store();
        store.put("T1", "J1");
        store.put("T2", "J2");
        assert_eq!(
            store.entries(),
            vec![
                ("T1".to_string(), "J1".to_string()),
                ("T2".to_string(), "J2".to_string())
            ]
        );
    }

    #[test]
    fn failed_write_keeps_binding_and_retries() {
        let store = mem_store();
        store.drop_table();

        assert_eq!(store.put("T1", "J1"), "J1");
        assert_eq!(store.get("T1").unwrap(), "J1");
        assert_eq!(store.unsaved(), 1);
        assert!(store.persist().is_err());

        store.restore_table();
        store.persist().unwrap();
        assert_eq!(store.unsaved(), 0);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threads.db");
        let path_str = path.to_str().unwrap();

        {
            let store = ThreadStore::open(path_str).unwrap();
            store.put("T1", "J1");
        }

        {
            let store = ThreadStore::open(path_str).unwrap();
            assert_eq!(store.get("T1").unwrap(), "J1");
            assert_eq!(store.put("T1", "J9"), "J1");
        }
    }

    #[test]
    fn open_fails_on_unusable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("threads.db");
        assert!(ThreadStore::open(path.to_str().unwrap()).is_err());
    }
}
