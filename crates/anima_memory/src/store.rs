//! The persistence substrate: one SQLite database behind a cloneable
//! handle.
//!
//! Everything that must outlive a tick goes through here. A store built
//! with [`Store::null`] carries no pool: every write becomes a no-op and
//! every read reports "not found", so the core keeps running as a pure
//! in-memory organism when no database is wanted.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Fixed-width RFC 3339 so string comparison in SQL matches time order.
pub fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_rfc3339() -> String {
    rfc3339(Utc::now())
}

#[derive(Clone)]
pub struct Store {
    pool: Option<Pool<Sqlite>>,
}

impl Store {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .with_context(|| format!("open sqlite at {}", db_path.as_ref().display()))?;
        let store = Self { pool: Some(pool) };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database, one connection so every query sees the
    /// same data. Used by tests and dry-runs.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("open in-memory sqlite")?;
        let store = Self { pool: Some(pool) };
        store.migrate().await?;
        Ok(store)
    }

    /// A store with no backing pool: writes vanish, reads miss.
    pub fn null() -> Self {
        Self { pool: None }
    }

    pub fn is_null(&self) -> bool {
        self.pool.is_none()
    }

    pub(crate) fn pool(&self) -> Option<&Pool<Sqlite>> {
        self.pool.as_ref()
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }

    async fn migrate(&self) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        for stmt in SCHEMA {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .with_context(|| format!("migration failed: {}", &stmt[..stmt.len().min(60)]))?;
        }
        Ok(())
    }
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS facts (
        subject TEXT NOT NULL,
        predicate TEXT NOT NULL,
        object TEXT NOT NULL,
        confidence REAL NOT NULL,
        salience REAL NOT NULL,
        half_life_days REAL NOT NULL,
        source TEXT NOT NULL DEFAULT '',
        updated_at TEXT NOT NULL,
        PRIMARY KEY (subject, predicate)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS concepts (
        term TEXT PRIMARY KEY,
        kind TEXT NOT NULL DEFAULT '',
        summary TEXT NOT NULL DEFAULT '',
        confidence REAL NOT NULL,
        importance REAL NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS concept_sources (
        term TEXT NOT NULL,
        url TEXT NOT NULL,
        domain TEXT NOT NULL DEFAULT '',
        snippet TEXT NOT NULL DEFAULT '',
        fetched_at TEXT NOT NULL,
        PRIMARY KEY (term, url)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS stances (
        topic TEXT PRIMARY KEY,
        position REAL NOT NULL,
        label TEXT NOT NULL DEFAULT '',
        rationale TEXT NOT NULL DEFAULT '',
        confidence REAL NOT NULL,
        half_life_days REAL NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        channel TEXT NOT NULL,
        topic TEXT NOT NULL DEFAULT '',
        text TEXT NOT NULL,
        message_id INTEGER,
        salience REAL NOT NULL DEFAULT 0.5
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_events_topic ON events(topic, id)",
    "CREATE INDEX IF NOT EXISTS idx_events_channel_created ON events(channel, created_at)",
    r#"CREATE TABLE IF NOT EXISTS memory_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        channel TEXT NOT NULL DEFAULT '',
        topic TEXT NOT NULL DEFAULT '',
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        salience REAL NOT NULL DEFAULT 0.5,
        half_life_days REAL NOT NULL DEFAULT 14.0,
        last_accessed_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_memory_items_topic ON memory_items(topic)",
    r#"CREATE TABLE IF NOT EXISTS episodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        topic TEXT NOT NULL,
        start_event_id INTEGER NOT NULL,
        end_event_id INTEGER NOT NULL,
        summary TEXT NOT NULL,
        salience REAL NOT NULL DEFAULT 0.5
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_episodes_topic ON episodes(topic, end_event_id)",
    r#"CREATE TABLE IF NOT EXISTS preferences (
        key TEXT PRIMARY KEY,
        value REAL NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS policy_stats (
        context_key TEXT NOT NULL,
        action TEXT NOT NULL,
        alpha REAL NOT NULL DEFAULT 1.0,
        beta REAL NOT NULL DEFAULT 1.0,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (context_key, action)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS self_changes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        kind TEXT NOT NULL,
        target TEXT NOT NULL,
        delta_json TEXT NOT NULL,
        axiom_goal INTEGER NOT NULL,
        allowed INTEGER NOT NULL,
        axiom_block INTEGER,
        risk TEXT NOT NULL,
        energy_cost REAL NOT NULL,
        note TEXT NOT NULL DEFAULT '',
        rollback_key TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_self_changes_created ON self_changes(created_at)",
    r#"CREATE TABLE IF NOT EXISTS axiom_interpretations (
        axiom_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        confidence REAL NOT NULL,
        source_note TEXT NOT NULL DEFAULT '',
        updated_at TEXT NOT NULL,
        PRIMARY KEY (axiom_id, kind, key)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS evolution_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        window_hours REAL NOT NULL,
        metrics_json TEXT NOT NULL,
        winner_id INTEGER
    )"#,
    r#"CREATE TABLE IF NOT EXISTS evolution_candidates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id INTEGER NOT NULL,
        params_json TEXT NOT NULL,
        predicted_json TEXT NOT NULL,
        fitness REAL NOT NULL,
        won INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS thought_proposals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        title TEXT NOT NULL,
        payload TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'proposed',
        notes TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS code_proposals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        title TEXT NOT NULL,
        payload TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'proposed',
        notes TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS schema_proposals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        title TEXT NOT NULL,
        payload TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'proposed',
        notes TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS epigenome_proposals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        title TEXT NOT NULL,
        payload TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'proposed',
        notes TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS train_trials (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        context_key TEXT NOT NULL,
        action_a TEXT NOT NULL,
        action_b TEXT NOT NULL,
        chosen TEXT NOT NULL DEFAULT '',
        reward REAL NOT NULL DEFAULT 0.0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS lora_samples (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        context_key TEXT NOT NULL,
        chosen TEXT NOT NULL,
        rejected TEXT NOT NULL,
        weight REAL NOT NULL DEFAULT 1.0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS lora_jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'queued',
        note TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS caught_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        note TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS ratings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        value INTEGER NOT NULL,
        note TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        role TEXT NOT NULL,
        channel TEXT NOT NULL DEFAULT 'cli',
        text TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS message_meta (
        message_id INTEGER NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (message_id, key)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS kv_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS token_df (
        token TEXT PRIMARY KEY,
        df INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS intent_nb_class (
        class TEXT PRIMARY KEY,
        count INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS intent_nb_token (
        class TEXT NOT NULL,
        token TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (class, token)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS source_trust (
        domain TEXT PRIMARY KEY,
        trust REAL NOT NULL DEFAULT 0.5,
        good INTEGER NOT NULL DEFAULT 0,
        bad INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS axiom_metrics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        axiom_id INTEGER NOT NULL,
        metric TEXT NOT NULL,
        value REAL NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS reply_context_v2 (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        message_id INTEGER,
        context_json TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS ab_trials (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        context_key TEXT NOT NULL,
        action_a TEXT NOT NULL,
        action_b TEXT NOT NULL,
        style_a TEXT NOT NULL DEFAULT '',
        style_b TEXT NOT NULL DEFAULT '',
        picked TEXT NOT NULL DEFAULT '',
        resolved INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS resources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        disk_free INTEGER NOT NULL,
        ram_free INTEGER NOT NULL,
        cpu_util REAL NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS expand_candidates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        help_dot REAL NOT NULL DEFAULT 0.0,
        cost REAL NOT NULL DEFAULT 0.0,
        evidence REAL NOT NULL DEFAULT 0.0,
        status TEXT NOT NULL DEFAULT 'open'
    )"#,
    r#"CREATE TABLE IF NOT EXISTS candidate_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT NOT NULL,
        candidate_id INTEGER NOT NULL,
        note TEXT NOT NULL DEFAULT ''
    )"#,
];
