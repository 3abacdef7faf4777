//! Hippocampus: event logging, episodic consolidation and salience-weighted
//! recall with half-life decay.
//!
//! Consolidation is two-phase: this module detects *that* a topic has
//! accumulated enough raw events and packages them into a request; the
//! summary text itself is produced off-tick by the LLM collaborator and
//! written back with [`Store::save_episode`].

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::Row;

use anima_core::{clamp01, AffectState, Epigenome, Workspace};

use crate::store::{now_rfc3339, Store};

/// Everything the off-tick summarizer needs.
#[derive(Debug, Clone)]
pub struct ConsolidateRequest {
    pub topic: String,
    pub start_event_id: i64,
    pub end_event_id: i64,
    /// Up to 60 recent events joined as `channel: text` lines.
    pub text_block: String,
}

#[derive(Debug, Clone)]
pub struct MemoryDetail {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub score: f64,
}

impl Store {
    pub async fn log_event(
        &self,
        channel: &str,
        topic: &str,
        text: &str,
        message_id: Option<i64>,
        salience: f64,
    ) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let res = sqlx::query(
            "INSERT INTO events (created_at, channel, topic, text, message_id, salience)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(now_rfc3339())
        .bind(channel)
        .bind(topic)
        .bind(text)
        .bind(message_id)
        .bind(clamp01(salience))
        .execute(pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn count_events_in_channel_since(
        &self,
        channel: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let row = sqlx::query("SELECT COUNT(*) AS n FROM events WHERE channel = ? AND created_at > ?")
            .bind(channel)
            .bind(crate::store::rfc3339(since))
            .fetch_one(pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    pub async fn put_memory_item(
        &self,
        channel: &str,
        topic: &str,
        key: &str,
        value: &str,
        salience: f64,
        half_life_days: f64,
    ) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let now = now_rfc3339();
        let res = sqlx::query(
            "INSERT INTO memory_items (created_at, channel, topic, key, value, salience, half_life_days, last_accessed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&now)
        .bind(channel)
        .bind(topic)
        .bind(key)
        .bind(value)
        .bind(clamp01(salience))
        .bind(half_life_days.max(0.1))
        .bind(&now)
        .execute(pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    /// Detect whether `topic` has enough unconsolidated events. Returns the
    /// packaged request when the distance since the last episode reaches the
    /// configured threshold.
    pub async fn needs_consolidation(
        &self,
        epi: &Epigenome,
        topic: &str,
    ) -> Result<Option<ConsolidateRequest>> {
        let Some(pool) = self.pool() else {
            return Ok(None);
        };
        let threshold = epi.memory_params().consolidate_every_events;

        let newest: Option<i64> = sqlx::query("SELECT MAX(id) AS id FROM events WHERE topic = ?")
            .bind(topic)
            .fetch_one(pool)
            .await?
            .get("id");
        let Some(newest) = newest else {
            return Ok(None);
        };

        let last_end: i64 = sqlx::query(
            "SELECT COALESCE(MAX(end_event_id), 0) AS id FROM episodes WHERE topic = ?",
        )
        .bind(topic)
        .fetch_one(pool)
        .await?
        .get("id");

        if newest - last_end < threshold {
            return Ok(None);
        }

        let rows = sqlx::query(
            "SELECT id, channel, text FROM events
             WHERE topic = ? AND id > ? ORDER BY id DESC LIMIT 60",
        )
        .bind(topic)
        .bind(last_end)
        .fetch_all(pool)
        .await?;

        let mut start = newest;
        let mut lines: Vec<String> = Vec::with_capacity(rows.len());
        for r in rows.iter().rev() {
            let id: i64 = r.get("id");
            start = start.min(id);
            let channel: String = r.get("channel");
            let text: String = r.get("text");
            lines.push(format!("{channel}: {text}"));
        }

        Ok(Some(ConsolidateRequest {
            topic: topic.to_string(),
            start_event_id: start,
            end_event_id: newest,
            text_block: lines.join("\n"),
        }))
    }

    pub async fn save_episode(
        &self,
        topic: &str,
        start_event_id: i64,
        end_event_id: i64,
        summary: &str,
        salience: f64,
    ) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let res = sqlx::query(
            "INSERT INTO episodes (created_at, topic, start_event_id, end_event_id, summary, salience)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(now_rfc3339())
        .bind(topic)
        .bind(start_event_id)
        .bind(end_event_id)
        .bind(summary)
        .bind(clamp01(salience))
        .execute(pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    /// Top-k memory details for a topic, ranked by
    /// `clamp01(salience) · 0.5^(ageDays / halfLifeDays)`. Returned rows get
    /// their `last_accessed_at` touched.
    pub async fn recall_details(&self, topic: &str, k: i64) -> Result<Vec<MemoryDetail>> {
        let Some(pool) = self.pool() else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            "SELECT id, created_at, key, value, salience, half_life_days
             FROM memory_items WHERE topic = ?",
        )
        .bind(topic)
        .fetch_all(pool)
        .await?;

        let now = Utc::now();
        let mut scored: Vec<MemoryDetail> = rows
            .into_iter()
            .map(|r| {
                let created: String = r.get("created_at");
                let age_days = created
                    .parse::<DateTime<Utc>>()
                    .map(|t| (now - t).num_seconds().max(0) as f64 / 86_400.0)
                    .unwrap_or(0.0);
                let salience: f64 = r.get("salience");
                let half_life: f64 = r.get("half_life_days");
                MemoryDetail {
                    id: r.get("id"),
                    key: r.get("key"),
                    value: r.get("value"),
                    score: clamp01(salience) * 0.5_f64.powf(age_days / half_life.max(0.1)),
                }
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k.max(0) as usize);

        let touch = now_rfc3339();
        for d in &scored {
            sqlx::query("UPDATE memory_items SET last_accessed_at = ? WHERE id = ?")
                .bind(&touch)
                .bind(d.id)
                .execute(pool)
                .await?;
        }
        Ok(scored)
    }
}

/// Shrink memory parameters when the organism hurts: high latency, sorrow
/// or pain each trigger a −2 step with floors 6 / 8 / 7. At most one tune
/// per two minutes.
pub fn auto_tune_memory(epi: &mut Epigenome, ws: &mut Workspace, aff: &AffectState) -> bool {
    let p = epi.memory_params();
    let hurting = ws.latency_ema_ms > p.pain_ms * 1.2
        || aff.get("sorrow") > 0.25
        || aff.get("pain") > 0.35;
    if !hurting {
        return false;
    }
    let now = Utc::now();
    if let Some(last) = ws.last_autotune_at {
        if (now - last).num_seconds() < 120 {
            return false;
        }
    }
    ws.last_autotune_at = Some(now);

    epi.set_param(
        "memory",
        "context_turns",
        json!((p.context_turns - 2).max(6)),
    );
    epi.set_param(
        "memory",
        "consolidate_every_events",
        json!((p.consolidate_every_events - 2).max(8)),
    );
    epi.set_param(
        "memory",
        "detail_half_life_days",
        json!((p.detail_half_life_days - 2.0).max(7.0)),
    );
    tracing::debug!("memory auto-tuned down under pressure");
    true
}
