//! Source trust: a small online ranking over web domains, and the evidence
//! selection that prefers trusted, informative, diverse results.

use anyhow::Result;
use std::collections::HashSet;

use anima_core::clamp01;
use sqlx::Row;

use crate::store::{now_rfc3339, Store};

/// One search result as handed over by the web collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub fn domain_of(url: &str) -> String {
    let stripped = url
        .trim()
        .strip_prefix("https://")
        .or_else(|| url.trim().strip_prefix("http://"))
        .unwrap_or(url.trim());
    let host = stripped.split('/').next().unwrap_or("");
    host.strip_prefix("www.").unwrap_or(host).to_lowercase()
}

impl Store {
    /// +0.10 on success, −0.05 on failure, clamped to [0,1], with running
    /// good/bad counts.
    pub async fn update_source_trust(&self, domain: &str, success: bool) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        let delta = if success { 0.10 } else { -0.05 };
        let (good, bad) = if success { (1, 0) } else { (0, 1) };
        sqlx::query(
            "INSERT INTO source_trust (domain, trust, good, bad, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(domain) DO UPDATE SET
               trust = MAX(0.0, MIN(1.0, source_trust.trust + ?)),
               good = source_trust.good + ?,
               bad = source_trust.bad + ?,
               updated_at = excluded.updated_at",
        )
        .bind(domain)
        .bind(clamp01(0.5 + delta))
        .bind(good)
        .bind(bad)
        .bind(now_rfc3339())
        .bind(delta)
        .bind(good)
        .bind(bad)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn source_trust(&self, domain: &str) -> Result<f64> {
        let Some(pool) = self.pool() else {
            return Ok(0.5);
        };
        let row = sqlx::query("SELECT trust FROM source_trust WHERE domain = ?")
            .bind(domain)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.get::<f64, _>("trust")).unwrap_or(0.5))
    }

    pub async fn count_source_updates_since(&self, since: chrono::DateTime<chrono::Utc>) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let row = sqlx::query("SELECT COUNT(*) AS n FROM source_trust WHERE updated_at > ?")
            .bind(crate::store::rfc3339(since))
            .fetch_one(pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    /// Order results by domain trust, break ties by snippet+title length,
    /// then prefer unseen domains; top up non-diversely if diversity alone
    /// cannot fill `top_n`.
    pub async fn pick_evidence_results(
        &self,
        results: &[EvidenceResult],
        top_n: usize,
    ) -> Result<Vec<EvidenceResult>> {
        let mut scored: Vec<(f64, usize, &EvidenceResult)> = Vec::with_capacity(results.len());
        for r in results {
            let trust = self.source_trust(&domain_of(&r.url)).await?;
            let meat = r.snippet.chars().count() + r.title.chars().count();
            scored.push((trust, meat, r));
        }
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.cmp(&a.1))
        });

        let mut picked: Vec<EvidenceResult> = Vec::with_capacity(top_n);
        let mut seen: HashSet<String> = HashSet::new();
        for (_, _, r) in &scored {
            if picked.len() >= top_n {
                break;
            }
            if seen.insert(domain_of(&r.url)) {
                picked.push((*r).clone());
            }
        }
        // Diversity exhausted: fill the remainder in rank order.
        if picked.len() < top_n {
            for (_, _, r) in &scored {
                if picked.len() >= top_n {
                    break;
                }
                if !picked.contains(*r) {
                    picked.push((*r).clone());
                }
            }
        }
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str, snippet: &str) -> EvidenceResult {
        EvidenceResult {
            title: "t".into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://www.example.com/a/b"), "example.com");
        assert_eq!(domain_of("http://docs.rs/sqlx"), "docs.rs");
        assert_eq!(domain_of("example.org/page"), "example.org");
    }

    #[tokio::test]
    async fn test_trust_updates() {
        let store = Store::open_in_memory().await.unwrap();
        assert!((store.source_trust("a.com").await.unwrap() - 0.5).abs() < 1e-9);

        store.update_source_trust("a.com", true).await.unwrap();
        let t1 = store.source_trust("a.com").await.unwrap();
        assert!((t1 - 0.6).abs() < 1e-9);

        store.update_source_trust("a.com", false).await.unwrap();
        let t2 = store.source_trust("a.com").await.unwrap();
        assert!((t2 - 0.55).abs() < 1e-9);

        // Saturation at 1.0.
        for _ in 0..10 {
            store.update_source_trust("a.com", true).await.unwrap();
        }
        assert!(store.source_trust("a.com").await.unwrap() <= 1.0);
    }

    #[tokio::test]
    async fn test_pick_prefers_trust_and_diversifies() {
        let store = Store::open_in_memory().await.unwrap();
        for _ in 0..4 {
            store.update_source_trust("good.com", true).await.unwrap();
        }
        store.update_source_trust("bad.com", false).await.unwrap();

        let results = vec![
            result("https://bad.com/1", "short"),
            result("https://good.com/1", "long snippet here"),
            result("https://good.com/2", "another"),
            result("https://neutral.org/1", "mid"),
        ];
        let picked = store.pick_evidence_results(&results, 3).await.unwrap();
        assert_eq!(picked.len(), 3);
        assert_eq!(domain_of(&picked[0].url), "good.com");
        // Second slot is a different domain even though good.com ranks 1-2.
        let domains: Vec<String> = picked.iter().take(3).map(|r| domain_of(&r.url)).collect();
        assert!(domains.contains(&"neutral.org".to_string()));
    }

    #[tokio::test]
    async fn test_pick_tops_up_when_few_domains() {
        let store = Store::open_in_memory().await.unwrap();
        let results = vec![
            result("https://one.com/a", "aaa"),
            result("https://one.com/b", "bbbb"),
        ];
        let picked = store.pick_evidence_results(&results, 2).await.unwrap();
        assert_eq!(picked.len(), 2);
    }
}
