//! Evolution tournament: periodically fork epigenome candidates around the
//! current configuration, score them on rolling behavioural metrics, and
//! propose the winner as a merge patch.
//!
//! Nothing is applied here. The winner lands in `epigenome_proposals` with
//! status `proposed`; only an explicit operator command applies it.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use anima_core::{clamp01, Epigenome};

use crate::proposals::ProposalKind;
use crate::store::Store;

pub const LAST_RUN_KEY: &str = "evolution:last_run_at";

/// Behaviour over the rolling window, all in bounded ranges.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RollingMetrics {
    /// Mean user rating, [−1,1].
    pub user_reward: f64,
    /// How much the organism grounded itself in sources, [0,1].
    pub evidence: f64,
    /// Web and self-change expenditure, [0,1].
    pub cost: f64,
    /// Unprompted noise the user pushed back on, [0,1].
    pub spam: f64,
    /// Freedom from "caught" corrections, [0,1].
    pub coherence: f64,
}

/// The four tournament knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TournamentKnobs {
    pub min_talk_drive: f64,
    pub min_curiosity: f64,
    pub friction_threshold: f64,
    pub daydream_interval_seconds: f64,
}

impl TournamentKnobs {
    pub fn from_epigenome(epi: &Epigenome) -> Self {
        Self {
            min_talk_drive: epi.min_talk_drive(),
            min_curiosity: epi.scout_params().min_curiosity,
            friction_threshold: epi.friction_threshold(),
            daydream_interval_seconds: epi.daydream_params().interval_seconds as f64,
        }
    }

    pub fn merge_patch(&self) -> serde_json::Value {
        json!({
            "modules": {
                "autonomy": { "params": { "min_talk_drive": self.min_talk_drive } },
                "scout": { "params": { "min_curiosity": self.min_curiosity } },
                "proposal_engine": { "params": { "friction_threshold": self.friction_threshold } },
                "daydream": { "params": { "interval_seconds": self.daydream_interval_seconds.round() as i64 } },
            }
        })
    }
}

pub async fn load_rolling_metrics(store: &Store, since: DateTime<Utc>) -> Result<RollingMetrics> {
    let (n_ratings, mean_rating, downs) = store.ratings_stats_since(since).await?;
    let web_events = store.count_events_in_channel_since("web", since).await?;
    let messages = store.count_messages_since(since).await?;
    let caught = store.count_caught_since(since).await?;
    let sources = store.count_source_updates_since(since).await?;
    let self_changes = store.count_self_changes_since(since).await?;

    let msg_floor = messages.max(1) as f64;
    Ok(RollingMetrics {
        user_reward: if n_ratings > 0 {
            mean_rating.clamp(-1.0, 1.0)
        } else {
            0.0
        },
        evidence: clamp01((sources + web_events) as f64 / 25.0),
        cost: clamp01(0.5 * web_events as f64 / 50.0 + 0.5 * self_changes as f64 / 20.0),
        spam: clamp01((downs as f64 + caught as f64) / msg_floor * 4.0),
        coherence: clamp01(1.0 - 2.0 * caught as f64 / msg_floor),
    })
}

/// Closed-form prediction of how a candidate's knob deltas move the
/// metrics. Crude on purpose: the tournament compares candidates, it does
/// not simulate them.
fn predict(base: &RollingMetrics, current: &TournamentKnobs, c: &TournamentKnobs) -> RollingMetrics {
    let d_talk = current.min_talk_drive - c.min_talk_drive;
    let d_cur = current.min_curiosity - c.min_curiosity;
    let d_fric = current.friction_threshold - c.friction_threshold;
    let d_dream = (current.daydream_interval_seconds - c.daydream_interval_seconds)
        / current.daydream_interval_seconds.max(1.0);

    RollingMetrics {
        user_reward: (base.user_reward + 0.10 * d_talk).clamp(-1.0, 1.0),
        evidence: clamp01(base.evidence + 0.20 * d_cur),
        cost: clamp01(base.cost + 0.15 * d_cur + 0.10 * d_fric + 0.05 * d_dream),
        spam: clamp01(base.spam + 0.15 * d_talk + 0.05 * d_dream),
        coherence: clamp01(base.coherence - 0.05 * d_fric),
    }
}

fn fitness(epi: &Epigenome, m: &RollingMetrics) -> f64 {
    let p = epi.evolution_params();
    p.w_reward * m.user_reward + p.w_evidence * m.evidence - p.w_cost * m.cost
        - p.w_spam * m.spam
        + p.w_coherence * m.coherence
}

/// Run the tournament if it is due. Returns the run id when one happened.
pub async fn tick_evolution_tournament(
    store: &Store,
    epi: &Epigenome,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    if store.is_null() {
        return Ok(None);
    }
    let params = epi.evolution_params();
    if let Some(last) = store.kv_get_time(LAST_RUN_KEY).await? {
        let elapsed_hours = (now - last).num_seconds() as f64 / 3600.0;
        if elapsed_hours < params.interval_hours {
            return Ok(None);
        }
    }

    let since = now - ChronoDuration::seconds((params.window_hours * 3600.0) as i64);
    let base = load_rolling_metrics(store, since).await?;
    let current = TournamentKnobs::from_epigenome(epi);

    let fork_count = params.fork_count.clamp(2, 16);
    let mut candidates: Vec<(TournamentKnobs, RollingMetrics, f64)> =
        Vec::with_capacity(fork_count as usize);
    {
        let mut rng = rand::thread_rng();
        for i in 0..fork_count {
            // Symmetric positions in [−1,1] with a little jitter per fork.
            let pos = if fork_count == 1 {
                0.0
            } else {
                (i as f64 / (fork_count - 1) as f64) * 2.0 - 1.0
            };
            let jitter: f64 = rng.gen_range(0.8..1.2);
            let scale = 1.0 + pos * params.drift * jitter;
            let knobs = TournamentKnobs {
                min_talk_drive: clamp01(current.min_talk_drive * scale),
                min_curiosity: clamp01(current.min_curiosity * scale),
                friction_threshold: clamp01(current.friction_threshold * scale),
                daydream_interval_seconds: (current.daydream_interval_seconds * scale).clamp(10.0, 604_800.0),
            };
            let predicted = predict(&base, &current, &knobs);
            let f = fitness(epi, &predicted);
            candidates.push((knobs, predicted, f));
        }
    }

    let winner_idx = candidates
        .iter()
        .enumerate()
        .max_by(|a, b| a.1 .2.partial_cmp(&b.1 .2).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let run_id = store
        .insert_evolution_run(params.window_hours, &serde_json::to_string(&base)?)
        .await?;
    let mut winner_candidate_id = 0;
    for (i, (knobs, predicted, f)) in candidates.iter().enumerate() {
        let id = store
            .insert_evolution_candidate(
                run_id,
                &serde_json::to_string(knobs)?,
                &serde_json::to_string(predicted)?,
                *f,
                i == winner_idx,
            )
            .await?;
        if i == winner_idx {
            winner_candidate_id = id;
        }
    }
    store.set_evolution_winner(run_id, winner_candidate_id).await?;

    let patch = candidates[winner_idx].0.merge_patch();
    store
        .add_proposal(
            ProposalKind::Epigenome,
            &format!("tournament winner (run {run_id})"),
            &serde_json::to_string_pretty(&patch)?,
        )
        .await?;

    store.kv_set_time(LAST_RUN_KEY, now).await?;
    tracing::info!(run_id, "evolution tournament proposed a winner");
    Ok(Some(run_id))
}

impl Store {
    pub async fn insert_evolution_run(&self, window_hours: f64, metrics_json: &str) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let res = sqlx::query(
            "INSERT INTO evolution_runs (created_at, window_hours, metrics_json) VALUES (?, ?, ?)",
        )
        .bind(crate::store::now_rfc3339())
        .bind(window_hours)
        .bind(metrics_json)
        .execute(pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn insert_evolution_candidate(
        &self,
        run_id: i64,
        params_json: &str,
        predicted_json: &str,
        fitness: f64,
        won: bool,
    ) -> Result<i64> {
        let Some(pool) = self.pool() else {
            return Ok(0);
        };
        let res = sqlx::query(
            "INSERT INTO evolution_candidates (run_id, params_json, predicted_json, fitness, won)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(run_id)
        .bind(params_json)
        .bind(predicted_json)
        .bind(fitness)
        .bind(won as i64)
        .execute(pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn set_evolution_winner(&self, run_id: i64, candidate_id: i64) -> Result<()> {
        let Some(pool) = self.pool() else {
            return Ok(());
        };
        sqlx::query("UPDATE evolution_runs SET winner_id = ? WHERE id = ?")
            .bind(candidate_id)
            .bind(run_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposals::ProposalStatus;

    #[tokio::test]
    async fn test_tournament_runs_once_per_interval() {
        let store = Store::open_in_memory().await.unwrap();
        let epi = Epigenome::default();
        let now = Utc::now();

        let run = tick_evolution_tournament(&store, &epi, now).await.unwrap();
        assert!(run.is_some());

        // Immediately again: gated off.
        let run2 = tick_evolution_tournament(&store, &epi, now).await.unwrap();
        assert!(run2.is_none());

        // A day later: due again.
        let run3 = tick_evolution_tournament(&store, &epi, now + ChronoDuration::hours(25))
            .await
            .unwrap();
        assert!(run3.is_some());
    }

    #[tokio::test]
    async fn test_tournament_persists_candidates_and_proposal() {
        let store = Store::open_in_memory().await.unwrap();
        let epi = Epigenome::default();
        let run_id = tick_evolution_tournament(&store, &epi, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(run_id > 0);

        let proposals = store.list_proposals(ProposalKind::Epigenome, 5).await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].status, ProposalStatus::Proposed);

        // The proposed payload is a valid merge patch for the epigenome.
        let patched = epi.apply_merge_patch(proposals[0].payload.as_bytes());
        assert!(patched.is_ok());
    }

    #[tokio::test]
    async fn test_metrics_bounded() {
        let store = Store::open_in_memory().await.unwrap();
        store.add_rating(1, "").await.unwrap();
        store.add_caught_event("wrong year").await.unwrap();
        store.add_message("assistant", "cli", "hello").await.unwrap();
        let m = load_rolling_metrics(&store, Utc::now() - ChronoDuration::hours(24))
            .await
            .unwrap();
        for v in [m.evidence, m.cost, m.spam, m.coherence] {
            assert!((0.0..=1.0).contains(&v));
        }
        assert!((-1.0..=1.0).contains(&m.user_reward));
    }

    #[test]
    fn test_predict_rewards_quieter_talking() {
        let base = RollingMetrics {
            spam: 0.5,
            ..Default::default()
        };
        let current = TournamentKnobs {
            min_talk_drive: 0.5,
            min_curiosity: 0.5,
            friction_threshold: 0.5,
            daydream_interval_seconds: 600.0,
        };
        // Raising min_talk_drive (talking less) lowers predicted spam.
        let quieter = TournamentKnobs {
            min_talk_drive: 0.7,
            ..current
        };
        let p = predict(&base, &current, &quieter);
        assert!(p.spam < base.spam);
    }

    #[tokio::test]
    async fn test_null_store_no_run() {
        let store = Store::null();
        let epi = Epigenome::default();
        assert!(tick_evolution_tournament(&store, &epi, Utc::now())
            .await
            .unwrap()
            .is_none());
    }
}
