//! Persistent SQLite store for per-user tasks and monitor entries.
//!
//! The store exposes the two key-value shapes the bot needs: a sorted set
//! (tasks ordered by timestamp score, keyed `task:<uid>:todo`) and a plain
//! unique set (monitor entries, keyed `monitor:<uid>`).

use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

fn task_key(uid: &str) -> String {
    format!("task:{uid}:todo")
}

fn monitor_key(uid: &str) -> String {
    format!("monitor:{uid}")
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        let conn = Connection::open_in_memory().expect("Failed to create in-memory store");
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema();
        store
    }

    /// Open (or create) the store at the given path.
    pub fn load_or_new(path: &Path) -> Self {
        let conn = Connection::open(path).expect("Failed to open store");
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema();
        info!("Opened store at {:?}", path);
        store
    }

    fn init_schema(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sorted_sets (
                key TEXT NOT NULL,
                member TEXT NOT NULL,
                score REAL NOT NULL,
                PRIMARY KEY (key, member)
            );

            CREATE TABLE IF NOT EXISTS sets (
                key TEXT NOT NULL,
                member TEXT NOT NULL,
                PRIMARY KEY (key, member)
            );

            CREATE INDEX IF NOT EXISTS idx_sorted_sets_key_score ON sorted_sets(key, score);
        "#,
        )
        .expect("Failed to initialize store schema");
    }

    // ==================== SORTED-SET PRIMITIVES ====================

    /// Add a member with a score. An existing member keeps a single row and
    /// takes the new score (last write wins).
    fn zadd(&self, key: &str, score: f64, member: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sorted_sets (key, member, score) VALUES (?1, ?2, ?3)
             ON CONFLICT(key, member) DO UPDATE SET score = excluded.score",
            params![key, member, score],
        )?;
        Ok(())
    }

    /// All members of a sorted set, ascending by score.
    fn zrange_all(&self, key: &str) -> rusqlite::Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT member FROM sorted_sets WHERE key = ?1 ORDER BY score ASC, member ASC",
        )?;
        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        rows.collect()
    }

    /// Remove the member at the given 0-based rank in ascending-score order.
    /// Returns whether a member was removed.
    fn zrem_by_rank(&self, key: &str, rank: usize) -> rusqlite::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM sorted_sets WHERE rowid = (
                 SELECT rowid FROM sorted_sets WHERE key = ?1
                 ORDER BY score ASC, member ASC LIMIT 1 OFFSET ?2
             )",
            params![key, rank as i64],
        )?;
        Ok(removed > 0)
    }

    // ==================== SET PRIMITIVES ====================

    /// Add a member to a set. Adding an existing member is a no-op.
    fn sadd(&self, key: &str, member: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO sets (key, member) VALUES (?1, ?2)",
            params![key, member],
        )?;
        Ok(())
    }

    fn smembers(&self, key: &str) -> rusqlite::Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT member FROM sets WHERE key = ?1 ORDER BY member ASC")?;
        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        rows.collect()
    }

    // ==================== TASKS ====================

    pub fn add_task(&self, uid: &str, text: &str, created_ts: f64) -> rusqlite::Result<()> {
        self.zadd(&task_key(uid), created_ts, text)
    }

    /// All tasks for a user, ascending by creation timestamp.
    pub fn tasks(&self, uid: &str) -> rusqlite::Result<Vec<String>> {
        self.zrange_all(&task_key(uid))
    }

    /// Remove the task at the given 0-based rank.
    pub fn remove_task_at(&self, uid: &str, index: usize) -> rusqlite::Result<bool> {
        self.zrem_by_rank(&task_key(uid), index)
    }

    // ==================== MONITOR ENTRIES ====================

    pub fn add_monitor(&self, uid: &str, entry: &str) -> rusqlite::Result<()> {
        self.sadd(&monitor_key(uid), entry)
    }

    pub fn monitors(&self, uid: &str) -> rusqlite::Result<Vec<String>> {
        self.smembers(&monitor_key(uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_ordered_by_timestamp() {
        let store = Store::new();
        store.add_task("u1", "second", 200.0).unwrap();
        store.add_task("u1", "first", 100.0).unwrap();
        store.add_task("u1", "third", 300.0).unwrap();

        assert_eq!(store.tasks("u1").unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_tasks_are_per_user() {
        let store = Store::new();
        store.add_task("u1", "mine", 100.0).unwrap();
        store.add_task("u2", "yours", 100.0).unwrap();

        assert_eq!(store.tasks("u1").unwrap(), vec!["mine"]);
        assert_eq!(store.tasks("u2").unwrap(), vec!["yours"]);
    }

    #[test]
    fn test_duplicate_task_text_keeps_one_row_with_new_score() {
        let store = Store::new();
        store.add_task("u1", "call mom", 100.0).unwrap();
        store.add_task("u1", "other", 150.0).unwrap();
        store.add_task("u1", "call mom", 200.0).unwrap();

        // Last write wins on the score, so "call mom" now sorts after "other".
        assert_eq!(store.tasks("u1").unwrap(), vec!["other", "call mom"]);
    }

    #[test]
    fn test_remove_task_at_rank() {
        let store = Store::new();
        store.add_task("u1", "a", 100.0).unwrap();
        store.add_task("u1", "b", 200.0).unwrap();
        store.add_task("u1", "c", 300.0).unwrap();

        assert!(store.remove_task_at("u1", 0).unwrap());
        assert_eq!(store.tasks("u1").unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_remove_out_of_range_is_noop() {
        let store = Store::new();
        store.add_task("u1", "a", 100.0).unwrap();

        assert!(!store.remove_task_at("u1", 5).unwrap());
        assert_eq!(store.tasks("u1").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_sequential_removal_sees_reranked_list() {
        let store = Store::new();
        store.add_task("u1", "a", 100.0).unwrap();
        store.add_task("u1", "b", 200.0).unwrap();
        store.add_task("u1", "c", 300.0).unwrap();

        // Removing rank 0 twice takes "a" then "b".
        assert!(store.remove_task_at("u1", 0).unwrap());
        assert!(store.remove_task_at("u1", 0).unwrap());
        assert_eq!(store.tasks("u1").unwrap(), vec!["c"]);
    }

    #[test]
    fn test_monitor_add_is_idempotent() {
        let store = Store::new();
        store.add_monitor("u1", "backend-01").unwrap();
        store.add_monitor("u1", "backend-01").unwrap();

        assert_eq!(store.monitors("u1").unwrap(), vec!["backend-01"]);
    }

    #[test]
    fn test_monitors_empty_for_new_user() {
        let store = Store::new();
        assert!(store.monitors("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let store = Store::load_or_new(&path);
            store.add_task("u1", "survive restart", 100.0).unwrap();
            store.add_monitor("u1", "backend-01").unwrap();
        }

        let store = Store::load_or_new(&path);
        assert_eq!(store.tasks("u1").unwrap(), vec!["survive restart"]);
        assert_eq!(store.monitors("u1").unwrap(), vec!["backend-01"]);
    }
}
