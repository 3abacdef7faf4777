//! The self-change governor: the only path by which autonomous changes are
//! persisted.
//!
//! Order is load-bearing: axiom gate → metabolic cost with progressive
//! throttling → energy debit → append-only audit row. Only then, and only
//! when allowed, may the caller perform the actual mutation. A failure
//! after the audit row cannot leave an uncharged mutation behind because
//! the mutation has not happened yet.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::Row;

use anima_core::{base_cost, evaluate_axioms, rollback_key, AxiomDecision, BodyState, Epigenome, SelfChange, Workspace};

use crate::store::{now_rfc3339, rfc3339, Store};

#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub decision: AxiomDecision,
    pub energy_cost: f64,
    pub cooldown_secs: f64,
    pub rollback_key: String,
    /// Rolling attempt count over 24 h, this attempt included.
    pub count_24h: i64,
}

/// Throttle multiplier after `n` attempts in 24 h (n ≥ 1): `1 + (n−1)²·k`.
pub fn throttle_multiplier(n: i64, k: f64) -> f64 {
    let m = (n - 1).max(0) as f64;
    1.0 + m * m * k
}

impl Store {
    pub async fn count_self_changes_since(
        &self,
        since: chrono::DateTime<Utc>,
    ) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let row = sqlx::query("SELECT COUNT(*) AS n FROM self_changes WHERE created_at > ?")
            .bind(rfc3339(since))
            .fetch_one(pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    /// Upsert one learned interpretation of a kernel axiom. The axioms
    /// themselves are compile-time constants; only their readings change.
    /// Ids outside 1..=4 are refused.
    pub async fn upsert_axiom_interpretation(
        &self,
        axiom_id: u8,
        kind: &str,
        key: &str,
        value: &str,
        confidence: f64,
        source_note: &str,
    ) -> Result<()> {
        anyhow::ensure!(
            anima_core::axiom_by_id(axiom_id).is_some(),
            "no such axiom: {axiom_id}"
        );
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO axiom_interpretations (axiom_id, kind, key, value, confidence, source_note, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(axiom_id, kind, key) DO UPDATE SET
               value = excluded.value,
               confidence = excluded.confidence,
               source_note = excluded.source_note,
               updated_at = excluded.updated_at",
        )
        .bind(axiom_id as i64)
        .bind(kind)
        .bind(key)
        .bind(value)
        .bind(anima_core::clamp01(confidence))
        .bind(source_note)
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn axiom_interpretations(
        &self,
        axiom_id: u8,
    ) -> Result<Vec<(String, String, String, f64)>> {
        let Some(pool) = self.pool() else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            "SELECT kind, key, value, confidence FROM axiom_interpretations
             WHERE axiom_id = ? ORDER BY kind, key",
        )
        .bind(axiom_id as i64)
        .fetch_all(pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.get("kind"),
                    r.get("key"),
                    r.get("value"),
                    r.get("confidence"),
                )
            })
            .collect())
    }

    pub async fn last_self_changes(&self, limit: i64) -> Result<Vec<(String, String, bool)>> {
        let Some(pool) = self.pool() else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            "SELECT kind, target, allowed FROM self_changes ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.get("kind"),
                    r.get("target"),
                    r.get::<i64, _>("allowed") != 0,
                )
            })
            .collect())
    }
}

/// Gate, meter and audit one self-change attempt.
///
/// Blocked attempts still cost `clamp(0.25·cost, 0.1, base)` and still
/// count against the throttle; their cooldown shrinks to 30%. In a
/// training dry-run nothing is charged or written.
pub async fn commit_self_change(
    store: &Store,
    epi: &Epigenome,
    body: &mut BodyState,
    ws: &Workspace,
    ch: &SelfChange,
) -> Result<CommitOutcome> {
    let decision = evaluate_axioms(ch, &epi.a1_note_marker());
    let key = rollback_key(&ch.kind, &ch.target, &ch.delta_json);

    let (base, base_cooldown) = base_cost(&ch.kind);
    let base = epi.self_change_cost_override(&ch.kind).unwrap_or(base);

    if ws.training_dry_run {
        return Ok(CommitOutcome {
            decision,
            energy_cost: 0.0,
            cooldown_secs: 0.0,
            rollback_key: key,
            count_24h: 0,
        });
    }

    let now = Utc::now();
    let prior = store
        .count_self_changes_since(now - ChronoDuration::hours(24))
        .await?;
    let n = prior + 1;
    let multiplier = throttle_multiplier(n, epi.self_change_k());

    let mut cost = base * multiplier;
    let mut cooldown_secs = base_cooldown as f64;
    if !decision.allowed {
        cost = (cost * 0.25).clamp(0.1, base.max(0.1));
        cooldown_secs *= 0.3;
    }

    // Charge strictly before the audit row, and both strictly before any
    // mutation by the caller.
    body.debit(cost);
    body.cooldown_until = Some(now + ChronoDuration::milliseconds((cooldown_secs * 1000.0) as i64));

    if let Some(pool) = store.pool() {
        let mut tx = pool.begin().await?;
        sqlx::query(
            "INSERT INTO self_changes
               (created_at, kind, target, delta_json, axiom_goal, allowed, axiom_block, risk, energy_cost, note, rollback_key)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(now_rfc3339())
        .bind(&ch.kind)
        .bind(&ch.target)
        .bind(&ch.delta_json)
        .bind(ch.axiom_goal as i64)
        .bind(decision.allowed as i64)
        .bind(decision.block_axiom.map(|b| b as i64))
        .bind(ch.risk.as_str())
        .bind(cost)
        .bind(&ch.note)
        .bind(&key)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO kv_state (key, value, updated_at) VALUES ('self_change:count_24h', ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(n.to_string())
        .bind(now_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
    }

    tracing::info!(
        kind = %ch.kind,
        target = %ch.target,
        allowed = decision.allowed,
        cost,
        n,
        "self-change gated"
    );

    Ok(CommitOutcome {
        decision,
        energy_cost: cost,
        cooldown_secs,
        rollback_key: key,
        count_24h: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_core::Risk;

    fn change(kind: &str, goal: u8, risk: Risk) -> SelfChange {
        SelfChange {
            kind: kind.into(),
            target: "t".into(),
            delta_json: "{}".into(),
            axiom_goal: goal,
            risk,
            note: String::new(),
        }
    }

    #[test]
    fn test_throttle_multiplier_quadratic() {
        assert!((throttle_multiplier(1, 0.08) - 1.0).abs() < 1e-9);
        assert!((throttle_multiplier(2, 0.08) - 1.08).abs() < 1e-9);
        assert!((throttle_multiplier(5, 0.08) - (1.0 + 16.0 * 0.08)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_blocked_code_change_audited_and_charged() {
        let store = Store::open_in_memory().await.unwrap();
        let epi = Epigenome::default();
        let mut body = BodyState::full(epi.energy_max());
        let ws = Workspace::new();

        let out = commit_self_change(
            &store,
            &epi,
            &mut body,
            &ws,
            &change("code", 4, Risk::Unknown),
        )
        .await
        .unwrap();

        assert!(!out.decision.allowed);
        assert_eq!(out.decision.block_axiom, Some(2));
        // 25% of the code base cost of 6.0.
        assert!((out.energy_cost - 1.5).abs() < 1e-9);
        assert!((body.energy - (epi.energy_max() - 1.5)).abs() < 1e-9);
        assert!(body.energy >= 0.0);
        // 30% of the 120 s cooldown.
        assert!((out.cooldown_secs - 36.0).abs() < 1e-9);

        let rows = store.last_self_changes(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].2);
        assert_eq!(out.rollback_key.len(), 40);
    }

    #[tokio::test]
    async fn test_allowed_change_full_cost() {
        let store = Store::open_in_memory().await.unwrap();
        let epi = Epigenome::default();
        let mut body = BodyState::full(epi.energy_max());
        let ws = Workspace::new();

        let out = commit_self_change(
            &store,
            &epi,
            &mut body,
            &ws,
            &change("concept", 1, Risk::Low),
        )
        .await
        .unwrap();
        assert!(out.decision.allowed);
        assert!((out.energy_cost - 0.6).abs() < 1e-9);
        assert!((out.cooldown_secs - 10.0).abs() < 1e-9);
        assert!(body.in_cooldown(Utc::now()));
    }

    #[tokio::test]
    async fn test_throttle_counts_blocked_attempts() {
        let store = Store::open_in_memory().await.unwrap();
        let epi = Epigenome::default();
        let mut body = BodyState::full(epi.energy_max());
        let ws = Workspace::new();

        let first = commit_self_change(
            &store,
            &epi,
            &mut body,
            &ws,
            &change("code", 4, Risk::Unknown), // blocked
        )
        .await
        .unwrap();
        assert_eq!(first.count_24h, 1);

        let second = commit_self_change(
            &store,
            &epi,
            &mut body,
            &ws,
            &change("concept", 1, Risk::Low),
        )
        .await
        .unwrap();
        assert_eq!(second.count_24h, 2);
        // n=2 → multiplier 1.08 over the 0.6 base.
        assert!((second.energy_cost - 0.6 * 1.08).abs() < 1e-9);

        let third = commit_self_change(
            &store,
            &epi,
            &mut body,
            &ws,
            &change("concept", 1, Risk::Low),
        )
        .await
        .unwrap();
        assert_eq!(third.count_24h, 3);
        assert!((third.energy_cost - 0.6 * (1.0 + 4.0 * 0.08)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_energy_floors_at_zero() {
        let store = Store::open_in_memory().await.unwrap();
        let epi = Epigenome::default();
        let mut body = BodyState::full(1.0); // nearly drained organism
        let ws = Workspace::new();

        let out = commit_self_change(
            &store,
            &epi,
            &mut body,
            &ws,
            &change("code", 1, Risk::Low),
        )
        .await
        .unwrap();
        assert!(out.decision.allowed);
        assert_eq!(body.energy, 0.0);
    }

    #[tokio::test]
    async fn test_dry_run_commits_nothing() {
        let store = Store::open_in_memory().await.unwrap();
        let epi = Epigenome::default();
        let mut body = BodyState::full(epi.energy_max());
        let mut ws = Workspace::new();
        ws.training_dry_run = true;

        let out = commit_self_change(
            &store,
            &epi,
            &mut body,
            &ws,
            &change("code", 1, Risk::Low),
        )
        .await
        .unwrap();
        assert!(out.decision.allowed);
        assert_eq!(out.energy_cost, 0.0);
        assert!((body.energy - epi.energy_max()).abs() < 1e-9);
        assert!(store.last_self_changes(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_axiom_interpretation_upsert() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .upsert_axiom_interpretation(2, "metric", "harm_rate", "ratings below zero", 0.4, "")
            .await
            .unwrap();
        store
            .upsert_axiom_interpretation(2, "metric", "harm_rate", "caught events per day", 0.6, "")
            .await
            .unwrap();
        let interps = store.axiom_interpretations(2).await.unwrap();
        assert_eq!(interps.len(), 1);
        assert_eq!(interps[0].2, "caught events per day");
        assert!((interps[0].3 - 0.6).abs() < 1e-9);

        // The kernel itself is not addressable.
        assert!(store
            .upsert_axiom_interpretation(7, "rule", "x", "y", 0.5, "")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_cost_override_from_epigenome() {
        let store = Store::open_in_memory().await.unwrap();
        let mut epi = Epigenome::default();
        epi.set_param("self_change_cost", "code", serde_json::json!(2.0));
        let mut body = BodyState::full(epi.energy_max());
        let ws = Workspace::new();

        let out = commit_self_change(
            &store,
            &epi,
            &mut body,
            &ws,
            &change("code", 1, Risk::Low),
        )
        .await
        .unwrap();
        assert!((out.energy_cost - 2.0).abs() < 1e-9);
    }
}
