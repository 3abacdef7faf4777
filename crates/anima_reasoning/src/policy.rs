//! The policy bandit: per-context Thompson sampling over the fixed action
//! set, with Beta posteriors persisted in the store.
//!
//! Sampling uses Marsaglia–Tsang gamma variates; posteriors start at (1,1)
//! and are floored at 0.1 per side so no arm ever dies completely.

use anyhow::Result;
use rand::Rng;

use anima_core::{IntentMode, PolicyAction};
use anima_memory::{AbTrial, Store};

pub const SOFT_MUTATION_KEY: &str = "train:soft_weight_mutation";
pub const SOFT_MUTATION_DEFAULT: f64 = 0.03;
pub const SOFT_MUTATION_CAP: f64 = 0.15;

/// Context key: `intent|sv|soc`, optionally extended with an evidence
/// band.
pub fn context_key(
    intent: IntentMode,
    survival: f64,
    social_craving: f64,
    evidence_ratio: Option<f64>,
) -> String {
    let sv = if survival >= 0.65 { "sv_hi" } else { "sv_lo" };
    let soc = if social_craving >= 0.5 { "soc_hi" } else { "soc_lo" };
    let mut key = format!("{}|{}|{}", intent.as_str(), sv, soc);
    if let Some(ev) = evidence_ratio {
        let band = if ev < 0.33 {
            "lo"
        } else if ev < 0.66 {
            "med"
        } else {
            "hi"
        };
        key.push_str("|ev=");
        key.push_str(band);
    }
    key
}

/// Reply style derived from the context, not sampled.
pub fn style_for(ctx: &str) -> &'static str {
    if ctx.contains("soc_hi") {
        "warm"
    } else if ctx.contains("sv_hi") {
        "concise"
    } else {
        "direct"
    }
}

/// Standard normal via Box–Muller.
fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Marsaglia–Tsang gamma variate, shape > 0, scale 1.
pub fn sample_gamma<R: Rng + ?Sized>(rng: &mut R, shape: f64) -> f64 {
    let shape = shape.max(1e-3);
    if shape < 1.0 {
        // Boost: Gamma(a) = Gamma(a+1) · U^(1/a).
        let u: f64 = rng.gen_range(f64::EPSILON..1.0);
        return sample_gamma(rng, shape + 1.0) * u.powf(1.0 / shape);
    }
    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x = sample_normal(rng);
        let v = (1.0 + c * x).powi(3);
        if v <= 0.0 {
            continue;
        }
        let u: f64 = rng.gen::<f64>();
        if u < 1.0 - 0.0331 * x.powi(4) {
            return d * v;
        }
        if u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

/// Beta(α, β) sample in the open interval (0,1).
pub fn sample_beta<R: Rng + ?Sized>(rng: &mut R, alpha: f64, beta: f64) -> f64 {
    let a = sample_gamma(rng, alpha.max(0.1));
    let b = sample_gamma(rng, beta.max(0.1));
    (a / (a + b)).clamp(1e-9, 1.0 - 1e-9)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyChoice {
    pub action: PolicyAction,
    pub style: &'static str,
    pub sampled: f64,
}

/// Thompson step: sample each arm's posterior, take the argmax.
pub async fn choose_with_rng<R: Rng + ?Sized>(
    store: &Store,
    ctx: &str,
    rng: &mut R,
) -> Result<PolicyChoice> {
    let mut best = (PolicyAction::DirectAnswer, f64::MIN);
    for action in PolicyAction::ALL {
        let p = store.policy_stats_get(ctx, action.as_str()).await?;
        let sampled = sample_beta(rng, p.alpha, p.beta);
        if sampled > best.1 {
            best = (action, sampled);
        }
    }
    Ok(PolicyChoice {
        action: best.0,
        style: style_for(ctx),
        sampled: best.1,
    })
}

pub async fn choose(store: &Store, ctx: &str) -> Result<PolicyChoice> {
    let mut rng = rand::thread_rng();
    choose_with_rng(store, ctx, &mut rng).await
}

/// `α += r`, `β += 1 − r`.
pub async fn update(store: &Store, ctx: &str, action: PolicyAction, reward: f64) -> Result<()> {
    store
        .policy_stats_update(ctx, action.as_str(), reward)
        .await
}

/// Resolve an A/B training trial.
///
/// The chosen axis earns 1.0 and the other 0.0 — but only where the two
/// arms actually differ. Style and strategy preference EMAs move at
/// α = 0.12 with rewards 1.0 / −0.7, a soft mutation keeps every arm
/// explorable, and one LoRA preference sample is emitted.
pub async fn apply_train_choice(store: &Store, trial: &AbTrial, pick: Option<char>) -> Result<()> {
    let pick = match pick {
        Some('a') | Some('A') => 'a',
        Some('b') | Some('B') => 'b',
        _ => {
            store.resolve_ab_trial(trial.id, "none").await?;
            return Ok(());
        }
    };
    let (chosen_action, other_action, chosen_style, other_style) = if pick == 'a' {
        (&trial.action_a, &trial.action_b, &trial.style_a, &trial.style_b)
    } else {
        (&trial.action_b, &trial.action_a, &trial.style_b, &trial.style_a)
    };

    if chosen_action != other_action {
        if let Some(a) = PolicyAction::parse(chosen_action) {
            update(store, &trial.context_key, a, 1.0).await?;
        }
        if let Some(a) = PolicyAction::parse(other_action) {
            update(store, &trial.context_key, a, 0.0).await?;
        }
        store
            .preference_ema(&format!("strategy:{chosen_action}"), 1.0, 0.12)
            .await?;
        store
            .preference_ema(&format!("strategy:{other_action}"), -0.7, 0.12)
            .await?;
    }
    if chosen_style != other_style {
        store
            .preference_ema(&format!("style:{chosen_style}"), 1.0, 0.12)
            .await?;
        store
            .preference_ema(&format!("style:{other_style}"), -0.7, 0.12)
            .await?;
    }

    let rate = store
        .kv_get_f64(SOFT_MUTATION_KEY)
        .await?
        .unwrap_or(SOFT_MUTATION_DEFAULT)
        .clamp(0.0, SOFT_MUTATION_CAP);
    for action in PolicyAction::ALL {
        store
            .policy_stats_soften(&trial.context_key, action.as_str(), rate)
            .await?;
    }

    store
        .add_lora_sample(&trial.context_key, chosen_action, other_action, 1.0)
        .await?;
    store
        .add_train_trial(
            &trial.context_key,
            &trial.action_a,
            &trial.action_b,
            chosen_action,
            1.0,
        )
        .await?;
    store
        .resolve_ab_trial(trial.id, &pick.to_string())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_context_key_shapes() {
        let k = context_key(IntentMode::ExternalFact, 0.1, 0.8, None);
        assert_eq!(k, "external_fact|sv_lo|soc_hi");
        let k = context_key(IntentMode::General, 0.9, 0.2, Some(0.7));
        assert_eq!(k, "general|sv_hi|soc_lo|ev=hi");
    }

    #[test]
    fn test_style_mapping() {
        assert_eq!(style_for("x|sv_lo|soc_hi"), "warm");
        assert_eq!(style_for("x|sv_hi|soc_lo"), "concise");
        assert_eq!(style_for("x|sv_lo|soc_lo"), "direct");
    }

    #[test]
    fn test_beta_samples_in_open_unit() {
        let mut rng = StdRng::seed_from_u64(7);
        for &(a, b) in &[(0.1, 0.1), (1.0, 1.0), (50.0, 2.0), (0.5, 9.0)] {
            for _ in 0..200 {
                let s = sample_beta(&mut rng, a, b);
                assert!(s > 0.0 && s < 1.0, "beta({a},{b}) produced {s}");
            }
        }
    }

    #[test]
    fn test_gamma_mean_roughly_shape() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 5000;
        let mean: f64 = (0..n).map(|_| sample_gamma(&mut rng, 4.0)).sum::<f64>() / n as f64;
        assert!((mean - 4.0).abs() < 0.2, "gamma(4) mean {mean}");
    }

    #[tokio::test]
    async fn test_update_monotonicity() {
        let store = Store::open_in_memory().await.unwrap();
        let ctx = "general|sv_lo|soc_lo";
        for _ in 0..10 {
            update(&store, ctx, PolicyAction::ResearchThenAnswer, 1.0)
                .await
                .unwrap();
        }

        let trained = store
            .policy_stats_get(ctx, "research_then_answer")
            .await
            .unwrap();
        let untouched = store.policy_stats_get(ctx, "ask_clarify").await.unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let n = 1000;
        let mean = |a: f64, b: f64, rng: &mut StdRng| -> f64 {
            (0..n).map(|_| sample_beta(rng, a, b)).sum::<f64>() / n as f64
        };
        let trained_mean = mean(trained.alpha, trained.beta, &mut rng);
        let untouched_mean = mean(untouched.alpha, untouched.beta, &mut rng);
        assert!(
            trained_mean - untouched_mean >= 0.20,
            "trained {trained_mean} vs untouched {untouched_mean}"
        );
    }

    #[tokio::test]
    async fn test_choose_prefers_rewarded_arm() {
        let store = Store::open_in_memory().await.unwrap();
        let ctx = "task_tech|sv_lo|soc_lo";
        for _ in 0..20 {
            update(&store, ctx, PolicyAction::DirectAnswer, 1.0).await.unwrap();
            update(&store, ctx, PolicyAction::SocialPing, 0.0).await.unwrap();
        }
        let mut rng = StdRng::seed_from_u64(42);
        let mut wins = 0;
        for _ in 0..50 {
            let c = choose_with_rng(&store, ctx, &mut rng).await.unwrap();
            if c.action == PolicyAction::DirectAnswer {
                wins += 1;
            }
        }
        assert!(wins > 35, "direct_answer won only {wins}/50");
    }

    #[tokio::test]
    async fn test_apply_train_choice_updates_axes() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .open_ab_trial(
                "general|sv_lo|soc_lo",
                "research_then_answer",
                "direct_answer",
                "direct",
                "warm",
            )
            .await
            .unwrap();
        let trial = store.get_ab_trial(id).await.unwrap().unwrap();

        apply_train_choice(&store, &trial, Some('a')).await.unwrap();

        let winner = store
            .policy_stats_get("general|sv_lo|soc_lo", "research_then_answer")
            .await
            .unwrap();
        let loser = store
            .policy_stats_get("general|sv_lo|soc_lo", "direct_answer")
            .await
            .unwrap();
        assert!(winner.alpha > loser.alpha);

        let style_pref = store.preference_get("style:direct").await.unwrap();
        assert!(style_pref > 0.0);
        let other_style = store.preference_get("style:warm").await.unwrap();
        assert!(other_style < 0.0);

        assert!(store.get_ab_trial(id).await.unwrap().unwrap().resolved);
    }

    #[tokio::test]
    async fn test_apply_train_choice_none_only_resolves() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .open_ab_trial("c", "direct_answer", "ask_clarify", "direct", "direct")
            .await
            .unwrap();
        let trial = store.get_ab_trial(id).await.unwrap().unwrap();
        apply_train_choice(&store, &trial, None).await.unwrap();
        assert!(store.get_ab_trial(id).await.unwrap().unwrap().resolved);
        let p = store.policy_stats_get("c", "direct_answer").await.unwrap();
        assert_eq!(p.alpha, 1.0);
    }

    #[tokio::test]
    async fn test_same_action_axes_skip_policy_update() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .open_ab_trial("c", "direct_answer", "direct_answer", "warm", "concise")
            .await
            .unwrap();
        let trial = store.get_ab_trial(id).await.unwrap().unwrap();
        apply_train_choice(&store, &trial, Some('b')).await.unwrap();

        // Action axis identical: posterior stays near prior (softening only).
        let p = store.policy_stats_get("c", "direct_answer").await.unwrap();
        assert!((p.alpha - 1.0).abs() < 0.2);
        // Style axis differs: preferences move.
        assert!(store.preference_get("style:concise").await.unwrap() > 0.0);
    }
}
