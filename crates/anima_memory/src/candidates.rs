//! Expansion candidates: concrete things the organism could grow into if
//! the operator helps (a new sensor, more disk, a data source). The help
//! planner area scores these against current drive pressure.

use anyhow::Result;
use sqlx::Row;

use anima_core::{clamp01, ResourceSnapshot};

use crate::store::{now_rfc3339, Store};

#[derive(Debug, Clone)]
pub struct ExpandCandidate {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Alignment with current needs, [0,1].
    pub help_dot: f64,
    /// Burden on the operator, [0,1].
    pub cost: f64,
    /// Evidence that the candidate would pay off, [0,1].
    pub evidence: f64,
}

impl Store {
    pub async fn add_expand_candidate(
        &self,
        title: &str,
        description: &str,
        help_dot: f64,
        cost: f64,
        evidence: f64,
    ) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let res = sqlx::query(
            "INSERT INTO expand_candidates (created_at, title, description, help_dot, cost, evidence)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(now_rfc3339())
        .bind(title)
        .bind(description)
        .bind(clamp01(help_dot))
        .bind(clamp01(cost))
        .bind(clamp01(evidence))
        .execute(pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn open_expand_candidates(&self, limit: i64) -> Result<Vec<ExpandCandidate>> {
        let Some(pool) = self.pool() else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            "SELECT id, title, description, help_dot, cost, evidence
             FROM expand_candidates WHERE status = 'open' ORDER BY id LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| ExpandCandidate {
                id: r.get("id"),
                title: r.get("title"),
                description: r.get("description"),
                help_dot: r.get("help_dot"),
                cost: r.get("cost"),
                evidence: r.get("evidence"),
            })
            .collect())
    }

    pub async fn add_candidate_history(&self, candidate_id: i64, note: &str) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query("INSERT INTO candidate_history (created_at, candidate_id, note) VALUES (?, ?, ?)")
            .bind(now_rfc3339())
            .bind(candidate_id)
            .bind(note)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Time-series of resource snapshots, for dashboards and post-mortems.
    pub async fn log_resource_snapshot(&self, snap: &ResourceSnapshot) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO resources (created_at, disk_free, ram_free, cpu_util) VALUES (?, ?, ?, ?)",
        )
        .bind(now_rfc3339())
        .bind(snap.disk_free as i64)
        .bind(snap.ram_free as i64)
        .bind(snap.cpu_util)
        .execute(pool)
        .await?;
        Ok(())
    }
}
