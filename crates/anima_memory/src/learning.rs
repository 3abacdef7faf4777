//! Store surface for the small online learners: Beta posteriors for the
//! policy bandit, preference EMAs, document-frequency counts for the info
//! gate, naive-Bayes counts for the intent classifier, ratings and trial
//! bookkeeping.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::store::{now_rfc3339, rfc3339, Store};

/// Posterior floor: neither side of a Beta may fall below this.
pub const POSTERIOR_FLOOR: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaPosterior {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for BetaPosterior {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AbTrial {
    pub id: i64,
    pub context_key: String,
    pub action_a: String,
    pub action_b: String,
    pub style_a: String,
    pub style_b: String,
    pub resolved: bool,
}

impl Store {
    // ------------------------------------------------------------------
    // Policy posteriors
    // ------------------------------------------------------------------

    pub async fn policy_stats_get(&self, ctx: &str, action: &str) -> Result<BetaPosterior> {
        let Some(pool) = self.pool() else {
            return Ok(BetaPosterior::default());
        };
        let row = sqlx::query(
            "SELECT alpha, beta FROM policy_stats WHERE context_key = ? AND action = ?",
        )
        .bind(ctx)
        .bind(action)
        .fetch_optional(pool)
        .await?;
        Ok(row
            .map(|r| BetaPosterior {
                alpha: r.get::<f64, _>("alpha").max(POSTERIOR_FLOOR),
                beta: r.get::<f64, _>("beta").max(POSTERIOR_FLOOR),
            })
            .unwrap_or_default())
    }

    /// Accumulate `α += r`, `β += 1 − r` in one upsert, serialized per
    /// (context, action) by the database.
    pub async fn policy_stats_update(&self, ctx: &str, action: &str, reward: f64) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        let r = reward.clamp(0.0, 1.0);
        sqlx::query(
            "INSERT INTO policy_stats (context_key, action, alpha, beta, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(context_key, action) DO UPDATE SET
               alpha = MAX(?, policy_stats.alpha + ?),
               beta = MAX(?, policy_stats.beta + ?),
               updated_at = excluded.updated_at",
        )
        .bind(ctx)
        .bind(action)
        .bind((1.0 + r).max(POSTERIOR_FLOOR))
        .bind((2.0 - r).max(POSTERIOR_FLOOR))
        .bind(now_rfc3339())
        .bind(POSTERIOR_FLOOR)
        .bind(r)
        .bind(POSTERIOR_FLOOR)
        .bind(1.0 - r)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Shrink a posterior toward the (1,1) prior at `rate`; keeps losing
    /// arms explorable after heavy training.
    pub async fn policy_stats_soften(&self, ctx: &str, action: &str, rate: f64) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        let rate = rate.clamp(0.0, 1.0);
        sqlx::query(
            "UPDATE policy_stats SET
               alpha = MAX(?, alpha * (1.0 - ?) + ?),
               beta = MAX(?, beta * (1.0 - ?) + ?),
               updated_at = ?
             WHERE context_key = ? AND action = ?",
        )
        .bind(POSTERIOR_FLOOR)
        .bind(rate)
        .bind(rate)
        .bind(POSTERIOR_FLOOR)
        .bind(rate)
        .bind(rate)
        .bind(now_rfc3339())
        .bind(ctx)
        .bind(action)
        .execute(pool)
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Preferences
    // ------------------------------------------------------------------

    pub async fn preference_get(&self, key: &str) -> Result<f64> {
        let Some(pool) = self.pool() else {
            return Ok(0.0);
        };
        let row = sqlx::query("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.get::<f64, _>("value")).unwrap_or(0.0))
    }

    /// EMA update `v ← (1−α)·v + α·reward`, value clamped to [−1,1].
    pub async fn preference_ema(&self, key: &str, reward: f64, alpha: f64) -> Result<f64> {
        let current = self.preference_get(key).await?;
        let alpha = alpha.clamp(0.0, 1.0);
        let next = ((1.0 - alpha) * current + alpha * reward).clamp(-1.0, 1.0);
        let Some(pool) = self.pool() else {
            return Ok(next);
        };
        sqlx::query(
            "INSERT INTO preferences (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(next)
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
        Ok(next)
    }

    // ------------------------------------------------------------------
    // Token document frequencies (info gate)
    // ------------------------------------------------------------------

    pub async fn token_df_bump(&self, tokens: &[String]) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        for token in tokens {
            sqlx::query(
                "INSERT INTO token_df (token, df) VALUES (?, 1)
                 ON CONFLICT(token) DO UPDATE SET df = token_df.df + 1",
            )
            .bind(token)
            .execute(pool)
            .await?;
        }
        Ok(())
    }

    pub async fn token_df_get(&self, token: &str) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let row = sqlx::query("SELECT df FROM token_df WHERE token = ?")
            .bind(token)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("df")).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Naive-Bayes counts (intent classifier)
    // ------------------------------------------------------------------

    pub async fn nb_observe(&self, class: &str, tokens: &[String]) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO intent_nb_class (class, count) VALUES (?, 1)
             ON CONFLICT(class) DO UPDATE SET count = intent_nb_class.count + 1",
        )
        .bind(class)
        .execute(pool)
        .await?;
        for token in tokens {
            sqlx::query(
                "INSERT INTO intent_nb_token (class, token, count) VALUES (?, ?, 1)
                 ON CONFLICT(class, token) DO UPDATE SET count = intent_nb_token.count + 1",
            )
            .bind(class)
            .bind(token)
            .execute(pool)
            .await?;
        }
        Ok(())
    }

    pub async fn nb_classes(&self) -> Result<Vec<(String, i64)>> {
        let Some(pool) = self.pool() else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query("SELECT class, count FROM intent_nb_class ORDER BY class")
            .fetch_all(pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("class"), r.get("count")))
            .collect())
    }

    pub async fn nb_token_count(&self, class: &str, token: &str) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let row = sqlx::query("SELECT count FROM intent_nb_token WHERE class = ? AND token = ?")
            .bind(class)
            .bind(token)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("count")).unwrap_or(0))
    }

    pub async fn nb_class_token_total(&self, class: &str) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let row = sqlx::query(
            "SELECT COALESCE(SUM(count), 0) AS n FROM intent_nb_token WHERE class = ?",
        )
        .bind(class)
        .fetch_one(pool)
        .await?;
        Ok(row.get::<i64, _>("n"))
    }

    pub async fn nb_vocab_size(&self) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let row = sqlx::query("SELECT COUNT(DISTINCT token) AS n FROM intent_nb_token")
            .fetch_one(pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    // ------------------------------------------------------------------
    // Ratings, caught events, messages
    // ------------------------------------------------------------------

    pub async fn add_rating(&self, value: i64, note: &str) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query("INSERT INTO ratings (created_at, value, note) VALUES (?, ?, ?)")
            .bind(now_rfc3339())
            .bind(value.clamp(-1, 1))
            .bind(note)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Most recent ratings, oldest first.
    pub async fn recent_ratings(&self, limit: i64) -> Result<Vec<f64>> {
        let Some(pool) = self.pool() else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query("SELECT value FROM ratings ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(pool)
            .await?;
        Ok(rows
            .into_iter()
            .rev()
            .map(|r| r.get::<i64, _>("value") as f64)
            .collect())
    }

    pub async fn ratings_stats_since(&self, since: DateTime<Utc>) -> Result<(i64, f64, i64)> {
        let Some(pool) = self.pool() else {
            return Ok((0, 0.0, 0));
        };
        let row = sqlx::query(
            "SELECT COUNT(*) AS n, COALESCE(AVG(value), 0.0) AS mean,
                    SUM(CASE WHEN value < 0 THEN 1 ELSE 0 END) AS downs
             FROM ratings WHERE created_at > ?",
        )
        .bind(rfc3339(since))
        .fetch_one(pool)
        .await?;
        Ok((
            row.get::<i64, _>("n"),
            row.get::<f64, _>("mean"),
            row.get::<Option<i64>, _>("downs").unwrap_or(0),
        ))
    }

    pub async fn add_caught_event(&self, note: &str) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query("INSERT INTO caught_events (created_at, note) VALUES (?, ?)")
            .bind(now_rfc3339())
            .bind(note)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn count_caught_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let row = sqlx::query("SELECT COUNT(*) AS n FROM caught_events WHERE created_at > ?")
            .bind(rfc3339(since))
            .fetch_one(pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    pub async fn add_message(&self, role: &str, channel: &str, text: &str) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let res = sqlx::query("INSERT INTO messages (created_at, role, channel, text) VALUES (?, ?, ?, ?)")
            .bind(now_rfc3339())
            .bind(role)
            .bind(channel)
            .bind(text)
            .execute(pool)
            .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn count_messages_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let row = sqlx::query("SELECT COUNT(*) AS n FROM messages WHERE created_at > ?")
            .bind(rfc3339(since))
            .fetch_one(pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    // ------------------------------------------------------------------
    // A/B trials + LoRA samples
    // ------------------------------------------------------------------

    pub async fn open_ab_trial(
        &self,
        ctx: &str,
        action_a: &str,
        action_b: &str,
        style_a: &str,
        style_b: &str,
    ) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let res = sqlx::query(
            "INSERT INTO ab_trials (created_at, context_key, action_a, action_b, style_a, style_b)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(now_rfc3339())
        .bind(ctx)
        .bind(action_a)
        .bind(action_b)
        .bind(style_a)
        .bind(style_b)
        .execute(pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn get_ab_trial(&self, id: i64) -> Result<Option<AbTrial>> {
        let Some(pool) = self.pool() else {
            return Ok(None);
        };
        let row = sqlx::query(
            "SELECT id, context_key, action_a, action_b, style_a, style_b, resolved
             FROM ab_trials WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| AbTrial {
            id: r.get("id"),
            context_key: r.get("context_key"),
            action_a: r.get("action_a"),
            action_b: r.get("action_b"),
            style_a: r.get("style_a"),
            style_b: r.get("style_b"),
            resolved: r.get::<i64, _>("resolved") != 0,
        }))
    }

    pub async fn resolve_ab_trial(&self, id: i64, picked: &str) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query("UPDATE ab_trials SET picked = ?, resolved = 1 WHERE id = ?")
            .bind(picked)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn add_train_trial(
        &self,
        ctx: &str,
        action_a: &str,
        action_b: &str,
        chosen: &str,
        reward: f64,
    ) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO train_trials (created_at, context_key, action_a, action_b, chosen, reward)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(now_rfc3339())
        .bind(ctx)
        .bind(action_a)
        .bind(action_b)
        .bind(chosen)
        .bind(reward)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn add_lora_sample(
        &self,
        ctx: &str,
        chosen: &str,
        rejected: &str,
        weight: f64,
    ) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO lora_samples (created_at, context_key, chosen, rejected, weight)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(now_rfc3339())
        .bind(ctx)
        .bind(chosen)
        .bind(rejected)
        .bind(weight.max(0.0))
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_posterior_init_and_update() {
        let store = Store::open_in_memory().await.unwrap();
        let p = store.policy_stats_get("ctx", "direct_answer").await.unwrap();
        assert_eq!(p, BetaPosterior::default());

        store
            .policy_stats_update("ctx", "direct_answer", 1.0)
            .await
            .unwrap();
        let p = store.policy_stats_get("ctx", "direct_answer").await.unwrap();
        assert!((p.alpha - 2.0).abs() < 1e-9);
        assert!((p.beta - 1.0).abs() < 1e-9);

        store
            .policy_stats_update("ctx", "direct_answer", 0.25)
            .await
            .unwrap();
        let p = store.policy_stats_get("ctx", "direct_answer").await.unwrap();
        assert!((p.alpha - 2.25).abs() < 1e-9);
        assert!((p.beta - 1.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_posterior_floor_enforced() {
        let store = Store::open_in_memory().await.unwrap();
        store.policy_stats_update("c", "a", 1.0).await.unwrap();
        for _ in 0..50 {
            store.policy_stats_soften("c", "a", 0.9).await.unwrap();
        }
        let p = store.policy_stats_get("c", "a").await.unwrap();
        assert!(p.alpha >= POSTERIOR_FLOOR);
        assert!(p.beta >= POSTERIOR_FLOOR);
    }

    #[tokio::test]
    async fn test_preference_ema() {
        let store = Store::open_in_memory().await.unwrap();
        let v = store.preference_ema("style:warm", 1.0, 0.12).await.unwrap();
        assert!((v - 0.12).abs() < 1e-9);
        let v = store.preference_ema("style:warm", -0.7, 0.12).await.unwrap();
        assert!((v - (0.88 * 0.12 - 0.7 * 0.12)).abs() < 1e-9);
        assert!((-1.0..=1.0).contains(&v));
    }

    #[tokio::test]
    async fn test_token_df_counts() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .token_df_bump(&["rust".into(), "memory".into()])
            .await
            .unwrap();
        store.token_df_bump(&["rust".into()]).await.unwrap();
        assert_eq!(store.token_df_get("rust").await.unwrap(), 2);
        assert_eq!(store.token_df_get("memory").await.unwrap(), 1);
        assert_eq!(store.token_df_get("absent").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_nb_counts() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .nb_observe("opinion", &["think".into(), "about".into()])
            .await
            .unwrap();
        store.nb_observe("opinion", &["think".into()]).await.unwrap();
        assert_eq!(store.nb_token_count("opinion", "think").await.unwrap(), 2);
        assert_eq!(store.nb_class_token_total("opinion").await.unwrap(), 3);
        assert_eq!(store.nb_vocab_size().await.unwrap(), 2);
        let classes = store.nb_classes().await.unwrap();
        assert_eq!(classes, vec![("opinion".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_ratings_window() {
        let store = Store::open_in_memory().await.unwrap();
        store.add_rating(1, "").await.unwrap();
        store.add_rating(-1, "").await.unwrap();
        store.add_rating(1, "").await.unwrap();
        let recent = store.recent_ratings(2).await.unwrap();
        assert_eq!(recent, vec![-1.0, 1.0]);
        let (n, mean, downs) = store
            .ratings_stats_since(Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(n, 3);
        assert!(mean > 0.0);
        assert_eq!(downs, 1);
    }

    #[tokio::test]
    async fn test_ab_trial_lifecycle() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .open_ab_trial("ctx", "direct_answer", "ask_clarify", "direct", "warm")
            .await
            .unwrap();
        let trial = store.get_ab_trial(id).await.unwrap().unwrap();
        assert!(!trial.resolved);
        store.resolve_ab_trial(id, "a").await.unwrap();
        assert!(store.get_ab_trial(id).await.unwrap().unwrap().resolved);
    }

    #[tokio::test]
    async fn test_null_store_learning_surface() {
        let store = Store::null();
        assert_eq!(
            store.policy_stats_get("c", "a").await.unwrap(),
            BetaPosterior::default()
        );
        store.policy_stats_update("c", "a", 1.0).await.unwrap();
        assert_eq!(store.preference_get("k").await.unwrap(), 0.0);
        assert!(store.recent_ratings(10).await.unwrap().is_empty());
    }
}
