//! kv_state: small cross-restart scalars (counters, last-run timestamps,
//! tunables) keyed by convention, e.g. `metric:turns`,
//! `evolution:last_run_at`, `train:soft_weight_mutation`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::store::{now_rfc3339, Store};

impl Store {
    pub async fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query(
            "INSERT INTO kv_state (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let Some(pool) = self.pool() else {
            return Ok(None);
        };
        let row = sqlx::query("SELECT value FROM kv_state WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    pub async fn kv_get_f64(&self, key: &str) -> Result<Option<f64>> {
        Ok(self.kv_get(key).await?.and_then(|v| v.parse().ok()))
    }

    pub async fn kv_get_time(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .kv_get(key)
            .await?
            .and_then(|v| v.parse::<DateTime<Utc>>().ok()))
    }

    pub async fn kv_set_time(&self, key: &str, t: DateTime<Utc>) -> Result<()> {
        self.kv_set(key, &crate::store::rfc3339(t)).await
    }

    /// Increment an integer counter, returning the new value (0 on a null
    /// store).
    pub async fn kv_incr(&self, key: &str, by: i64) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        sqlx::query(
            "INSERT INTO kv_state (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
               value = CAST(CAST(kv_state.value AS INTEGER) + ? AS TEXT),
               updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(by.to_string())
        .bind(now_rfc3339())
        .bind(by)
        .execute(pool)
        .await?;
        let v = self.kv_get(key).await?.unwrap_or_default();
        Ok(v.parse().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_kv_roundtrip() {
        let store = Store::open_in_memory().await.unwrap();
        assert_eq!(store.kv_get("missing").await.unwrap(), None);
        store.kv_set("metric:turns", "3").await.unwrap();
        assert_eq!(
            store.kv_get("metric:turns").await.unwrap().as_deref(),
            Some("3")
        );
        store.kv_set("metric:turns", "4").await.unwrap();
        assert_eq!(store.kv_get_f64("metric:turns").await.unwrap(), Some(4.0));
    }

    #[tokio::test]
    async fn test_kv_incr() {
        let store = Store::open_in_memory().await.unwrap();
        assert_eq!(store.kv_incr("c", 1).await.unwrap(), 1);
        assert_eq!(store.kv_incr("c", 2).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_kv_time_roundtrip() {
        let store = Store::open_in_memory().await.unwrap();
        let t = Utc::now();
        store.kv_set_time("evolution:last_run_at", t).await.unwrap();
        let back = store.kv_get_time("evolution:last_run_at").await.unwrap().unwrap();
        assert!((back - t).num_milliseconds().abs() < 10);
    }

    #[tokio::test]
    async fn test_null_store_degrades() {
        let store = Store::null();
        store.kv_set("k", "v").await.unwrap();
        assert_eq!(store.kv_get("k").await.unwrap(), None);
        assert_eq!(store.kv_incr("k", 1).await.unwrap(), 0);
    }
}
