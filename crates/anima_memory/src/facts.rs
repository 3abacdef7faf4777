//! The semantic knowledge tables: (subject, predicate, object) facts,
//! concepts with sources, and graded stances.
//!
//! Every probability-like scalar is clamped on write; `stances.position`
//! lives in [−1,1].

use anyhow::Result;
use chrono::Utc;
use sqlx::Row;

use anima_core::clamp01;

use crate::store::{now_rfc3339, Store};

#[derive(Debug, Clone)]
pub struct Fact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f64,
    pub salience: f64,
    pub half_life_days: f64,
    pub source: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct Concept {
    pub term: String,
    pub kind: String,
    pub summary: String,
    pub confidence: f64,
    pub importance: f64,
}

#[derive(Debug, Clone)]
pub struct Stance {
    pub topic: String,
    pub position: f64,
    pub label: String,
    pub rationale: String,
    pub confidence: f64,
    pub half_life_days: f64,
}

impl Store {
    /// Upsert on (subject, predicate): the object and all metadata are
    /// replaced.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_fact(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        confidence: f64,
        salience: f64,
        half_life_days: f64,
        source: &str,
    ) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO facts (subject, predicate, object, confidence, salience, half_life_days, source, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(subject, predicate) DO UPDATE SET
               object = excluded.object,
               confidence = excluded.confidence,
               salience = excluded.salience,
               half_life_days = excluded.half_life_days,
               source = excluded.source,
               updated_at = excluded.updated_at",
        )
        .bind(subject)
        .bind(predicate)
        .bind(object)
        .bind(clamp01(confidence))
        .bind(clamp01(salience))
        .bind(half_life_days.max(0.1))
        .bind(source)
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_fact(&self, subject: &str, predicate: &str) -> Result<Option<Fact>> {
        let Some(pool) = self.pool() else {
            return Ok(None);
        };
        let row = sqlx::query(
            "SELECT subject, predicate, object, confidence, salience, half_life_days, source, updated_at
             FROM facts WHERE subject = ? AND predicate = ?",
        )
        .bind(subject)
        .bind(predicate)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| Fact {
            subject: r.get("subject"),
            predicate: r.get("predicate"),
            object: r.get("object"),
            confidence: r.get("confidence"),
            salience: r.get("salience"),
            half_life_days: r.get("half_life_days"),
            source: r.get("source"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn count_facts(&self) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let row = sqlx::query("SELECT COUNT(*) AS n FROM facts")
            .fetch_one(pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    pub async fn upsert_concept(
        &self,
        term: &str,
        kind: &str,
        summary: &str,
        confidence: f64,
        importance: f64,
    ) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO concepts (term, kind, summary, confidence, importance, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(term) DO UPDATE SET
               kind = excluded.kind,
               summary = excluded.summary,
               confidence = excluded.confidence,
               importance = excluded.importance,
               updated_at = excluded.updated_at",
        )
        .bind(term)
        .bind(kind)
        .bind(summary)
        .bind(clamp01(confidence))
        .bind(clamp01(importance))
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_concept(&self, term: &str) -> Result<Option<Concept>> {
        let Some(pool) = self.pool() else {
            return Ok(None);
        };
        let row = sqlx::query(
            "SELECT term, kind, summary, confidence, importance FROM concepts WHERE term = ?",
        )
        .bind(term)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| Concept {
            term: r.get("term"),
            kind: r.get("kind"),
            summary: r.get("summary"),
            confidence: r.get("confidence"),
            importance: r.get("importance"),
        }))
    }

    /// Confidence of the best-matching concept for a topic, 0.0 when
    /// unknown. Feeds the knowledge-gap drive.
    pub async fn concept_confidence(&self, topic: &str) -> Result<f64> {
        if topic.is_empty() {
            return Ok(0.0);
        }
        Ok(self
            .get_concept(topic)
            .await?
            .map(|c| c.confidence)
            .unwrap_or(0.0))
    }

    pub async fn add_concept_source(
        &self,
        term: &str,
        url: &str,
        domain: &str,
        snippet: &str,
    ) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO concept_sources (term, url, domain, snippet, fetched_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(term, url) DO UPDATE SET
               snippet = excluded.snippet,
               fetched_at = excluded.fetched_at",
        )
        .bind(term)
        .bind(url)
        .bind(domain)
        .bind(snippet)
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_stance(
        &self,
        topic: &str,
        position: f64,
        label: &str,
        rationale: &str,
        confidence: f64,
        half_life_days: f64,
    ) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO stances (topic, position, label, rationale, confidence, half_life_days, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(topic) DO UPDATE SET
               position = excluded.position,
               label = excluded.label,
               rationale = excluded.rationale,
               confidence = excluded.confidence,
               half_life_days = excluded.half_life_days,
               updated_at = excluded.updated_at",
        )
        .bind(topic)
        .bind(position.clamp(-1.0, 1.0))
        .bind(label)
        .bind(rationale)
        .bind(clamp01(confidence))
        .bind(half_life_days.max(0.1))
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get_stance(&self, topic: &str) -> Result<Option<Stance>> {
        let Some(pool) = self.pool() else {
            return Ok(None);
        };
        let row = sqlx::query(
            "SELECT topic, position, label, rationale, confidence, half_life_days
             FROM stances WHERE topic = ?",
        )
        .bind(topic)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| Stance {
            topic: r.get("topic"),
            position: r.get("position"),
            label: r.get("label"),
            rationale: r.get("rationale"),
            confidence: r.get("confidence"),
            half_life_days: r.get("half_life_days"),
        }))
    }

    /// Stance confidence with half-life decay applied at read time.
    pub async fn stance_confidence(&self, topic: &str) -> Result<f64> {
        let Some(stance) = self.get_stance(topic).await? else {
            return Ok(0.0);
        };
        let Some(pool) = self.pool() else {
            return Ok(0.0);
        };
        let row = sqlx::query("SELECT updated_at FROM stances WHERE topic = ?")
            .bind(topic)
            .fetch_one(pool)
            .await?;
        let updated: String = row.get("updated_at");
        let age_days = updated
            .parse::<chrono::DateTime<Utc>>()
            .map(|t| (Utc::now() - t).num_seconds().max(0) as f64 / 86_400.0)
            .unwrap_or(0.0);
        Ok(clamp01(
            stance.confidence * 0.5_f64.powf(age_days / stance.half_life_days),
        ))
    }
}
