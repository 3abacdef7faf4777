//! Help planner area: when drive pressure is high, pick the expansion
//! candidate most worth asking the operator about.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use anima_core::Action;

use crate::bus::{Area, TickContext};

const PRESSURE_THRESHOLD: f64 = 0.65;

pub struct HelpPlannerArea {
    last_request: AtomicI64,
}

impl HelpPlannerArea {
    pub fn new() -> Self {
        Self {
            last_request: AtomicI64::new(0),
        }
    }
}

impl Default for HelpPlannerArea {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Area for HelpPlannerArea {
    fn name(&self) -> &'static str {
        "help_planner"
    }

    async fn tick(&self, ctx: &TickContext) -> anyhow::Result<Vec<Action>> {
        if !ctx.ws.autonomy_allowed {
            return Ok(Vec::new());
        }
        let pressure = ctx
            .ws
            .drives_energy_deficit
            .max(ctx.ws.social_craving)
            .max(ctx.drives_v1.curiosity);
        if pressure < PRESSURE_THRESHOLD {
            return Ok(Vec::new());
        }

        let min_interval = ctx.epi.drives_v1().help_min_interval_seconds;
        let now = ctx.now.timestamp();
        if now - self.last_request.load(Ordering::Relaxed) < min_interval {
            return Ok(Vec::new());
        }

        let candidates = ctx.store.open_expand_candidates(16).await?;
        let mut best: Option<(f64, &anima_memory::ExpandCandidate)> = None;
        for c in &candidates {
            let score = pressure * (0.60 * c.help_dot - 0.35 * c.cost + 0.25 * c.evidence);
            if score > 0.0 && best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, c));
            }
        }
        let Some((score, candidate)) = best else {
            return Ok(Vec::new());
        };

        self.last_request.store(now, Ordering::Relaxed);
        ctx.store
            .add_candidate_history(candidate.id, "pitched via help planner")
            .await?;

        Ok(vec![Action::RequestHelp {
            candidate_id: candidate.id,
            message: format!("could use a hand: {}", candidate.title),
            priority: score.clamp(0.0, 1.0) as f32,
        }])
    }
}
