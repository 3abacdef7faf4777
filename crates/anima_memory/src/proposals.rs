//! Proposal pipelines: schema / code / thought / epigenome proposals with a
//! monotone status lifecycle. Nothing in these tables executes by itself;
//! the operator applies or rejects through the CLI.

use anyhow::{bail, Result};
use sqlx::Row;

use crate::store::{now_rfc3339, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalKind {
    Thought,
    Code,
    Schema,
    Epigenome,
}

impl ProposalKind {
    fn table(&self) -> &'static str {
        match self {
            ProposalKind::Thought => "thought_proposals",
            ProposalKind::Code => "code_proposals",
            ProposalKind::Schema => "schema_proposals",
            ProposalKind::Epigenome => "epigenome_proposals",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Proposed,
    Materialized,
    Applied,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Proposed => "proposed",
            ProposalStatus::Materialized => "materialized",
            ProposalStatus::Applied => "applied",
            ProposalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "proposed" => Some(Self::Proposed),
            "materialized" => Some(Self::Materialized),
            "applied" => Some(Self::Applied),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Transitions only move forward; `rejected` is reachable from
    /// `proposed` alone.
    fn can_move_to(&self, next: Self) -> bool {
        use ProposalStatus::*;
        matches!(
            (self, next),
            (Proposed, Materialized) | (Proposed, Rejected) | (Materialized, Applied) | (Proposed, Applied)
        )
    }
}

#[derive(Debug, Clone)]
pub struct Proposal {
    pub id: i64,
    pub created_at: String,
    pub title: String,
    pub payload: String,
    pub status: ProposalStatus,
    pub notes: String,
}

impl Store {
    pub async fn add_proposal(
        &self,
        kind: ProposalKind,
        title: &str,
        payload: &str,
    ) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let sql = format!(
            "INSERT INTO {} (created_at, title, payload) VALUES (?, ?, ?)",
            kind.table()
        );
        let res = sqlx::query(&sql)
            .bind(now_rfc3339())
            .bind(title)
            .bind(payload)
            .execute(pool)
            .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn get_proposal(&self, kind: ProposalKind, id: i64) -> Result<Option<Proposal>> {
        let Some(pool) = self.pool() else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT id, created_at, title, payload, status, notes FROM {} WHERE id = ?",
            kind.table()
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
        Ok(row.and_then(|r| {
            let status = ProposalStatus::parse(&r.get::<String, _>("status"))?;
            Some(Proposal {
                id: r.get("id"),
                created_at: r.get("created_at"),
                title: r.get("title"),
                payload: r.get("payload"),
                status,
                notes: r.get("notes"),
            })
        }))
    }

    pub async fn list_proposals(
        &self,
        kind: ProposalKind,
        limit: i64,
    ) -> Result<Vec<Proposal>> {
        let Some(pool) = self.pool() else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT id, created_at, title, payload, status, notes
             FROM {} ORDER BY id DESC LIMIT ?",
            kind.table()
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(pool).await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let status = ProposalStatus::parse(&r.get::<String, _>("status"))?;
                Some(Proposal {
                    id: r.get("id"),
                    created_at: r.get("created_at"),
                    title: r.get("title"),
                    payload: r.get("payload"),
                    status,
                    notes: r.get("notes"),
                })
            })
            .collect())
    }

    /// Move a proposal along the lifecycle. Backward or sideways moves are
    /// refused.
    pub async fn set_proposal_status(
        &self,
        kind: ProposalKind,
        id: i64,
        next: ProposalStatus,
        note: &str,
    ) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        let Some(current) = self.get_proposal(kind, id).await? else {
            bail!("no such proposal: {id}");
        };
        if !current.status.can_move_to(next) {
            bail!(
                "illegal status transition {} -> {}",
                current.status.as_str(),
                next.as_str()
            );
        }
        let sql = format!(
            "UPDATE {} SET status = ?, notes = CASE WHEN ? = '' THEN notes ELSE ? END WHERE id = ?",
            kind.table()
        );
        sqlx::query(&sql)
            .bind(next.as_str())
            .bind(note)
            .bind(note)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Convert a thought proposal into a concrete code or schema
    /// placeholder and mark the source materialized. The payload decides
    /// the target: anything mentioning tables/columns becomes a schema
    /// proposal, the rest a code proposal.
    pub async fn materialize_thought_proposal(&self, id: i64) -> Result<Option<i64>> {
        let Some(thought) = self.get_proposal(ProposalKind::Thought, id).await? else {
            return Ok(None);
        };
        if thought.status != ProposalStatus::Proposed {
            bail!("thought {id} is {} and cannot materialize", thought.status.as_str());
        }
        let lower = thought.payload.to_lowercase();
        let target = if lower.contains("table") || lower.contains("column") || lower.contains("schema")
        {
            ProposalKind::Schema
        } else {
            ProposalKind::Code
        };
        let new_id = self
            .add_proposal(
                target,
                &format!("draft: {}", thought.title),
                &thought.payload,
            )
            .await?;
        self.set_proposal_status(
            ProposalKind::Thought,
            id,
            ProposalStatus::Materialized,
            &format!("materialized as {}#{new_id}", target.table()),
        )
        .await?;
        Ok(Some(new_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle_monotone() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .add_proposal(ProposalKind::Code, "faster recall", "payload")
            .await
            .unwrap();

        store
            .set_proposal_status(ProposalKind::Code, id, ProposalStatus::Applied, "")
            .await
            .unwrap();

        // applied -> rejected must fail
        let err = store
            .set_proposal_status(ProposalKind::Code, id, ProposalStatus::Rejected, "")
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_proposed_to_rejected_ok() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .add_proposal(ProposalKind::Epigenome, "patch", "{}")
            .await
            .unwrap();
        store
            .set_proposal_status(ProposalKind::Epigenome, id, ProposalStatus::Rejected, "no")
            .await
            .unwrap();
        let p = store
            .get_proposal(ProposalKind::Epigenome, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p.status, ProposalStatus::Rejected);
        assert_eq!(p.notes, "no");
    }

    #[tokio::test]
    async fn test_materialize_thought_to_schema() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .add_proposal(
                ProposalKind::Thought,
                "track moods",
                "add a table for hourly mood aggregates",
            )
            .await
            .unwrap();
        let new_id = store.materialize_thought_proposal(id).await.unwrap().unwrap();

        let schema = store
            .get_proposal(ProposalKind::Schema, new_id)
            .await
            .unwrap()
            .unwrap();
        assert!(schema.title.starts_with("draft:"));

        let thought = store
            .get_proposal(ProposalKind::Thought, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(thought.status, ProposalStatus::Materialized);

        // A second materialization of the same thought is refused.
        assert!(store.materialize_thought_proposal(id).await.is_err());
    }

    #[tokio::test]
    async fn test_materialize_thought_to_code() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .add_proposal(ProposalKind::Thought, "tune bus", "reorder area dispatch loop")
            .await
            .unwrap();
        let new_id = store.materialize_thought_proposal(id).await.unwrap().unwrap();
        assert!(store
            .get_proposal(ProposalKind::Code, new_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_list_orders_recent_first() {
        let store = Store::open_in_memory().await.unwrap();
        for i in 0..3 {
            store
                .add_proposal(ProposalKind::Code, &format!("p{i}"), "")
                .await
                .unwrap();
        }
        let all = store.list_proposals(ProposalKind::Code, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].id > all[2].id);
    }
}
