//! Daydream area: free-associate when curious, rested and uninhibited.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use anima_core::Action;

use crate::bus::{Area, TickContext};

pub struct DaydreamArea {
    last_fired: AtomicI64,
}

impl DaydreamArea {
    pub fn new() -> Self {
        Self {
            last_fired: AtomicI64::new(0),
        }
    }
}

impl Default for DaydreamArea {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Area for DaydreamArea {
    fn name(&self) -> &'static str {
        "daydream"
    }

    async fn tick(&self, ctx: &TickContext) -> anyhow::Result<Vec<Action>> {
        let p = ctx.epi.daydream_params();
        if !p.enabled || !ctx.ws.autonomy_allowed {
            return Ok(Vec::new());
        }
        if ctx.drives_v1.curiosity < p.min_curiosity {
            return Ok(Vec::new());
        }
        let inhibition = 0.8 * ctx.affects.get("shame")
            + 0.4 * ctx.affects.get("pain")
            + 0.3 * ctx.affects.get("unwell");
        if inhibition > 0.55 {
            return Ok(Vec::new());
        }
        if ctx.ws.energy_hint < p.min_energy {
            return Ok(Vec::new());
        }
        let now = ctx.now.timestamp();
        if now - self.last_fired.load(Ordering::Relaxed) < p.interval_seconds {
            return Ok(Vec::new());
        }
        self.last_fired.store(now, Ordering::Relaxed);

        tracing::debug!(curiosity = ctx.drives_v1.curiosity, "daydream fires");
        Ok(vec![Action::Daydream {
            priority: (0.3 + 0.5 * ctx.drives_v1.curiosity as f32).min(1.0),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::test_context;
    use anima_core::Epigenome;
    use serde_json::json;

    fn eager_epi() -> Epigenome {
        let mut epi = Epigenome::default();
        epi.set_param("daydream", "interval_seconds", json!(10));
        epi.set_param("daydream", "min_curiosity", json!(0.5));
        epi
    }

    #[tokio::test]
    async fn test_fires_when_curious_and_rested() {
        let area = DaydreamArea::new();
        let mut ctx = test_context(eager_epi());
        ctx.drives_v1.curiosity = 0.8;
        ctx.ws.energy_hint = 0.9;
        let actions = area.tick(&ctx).await.unwrap();
        assert_eq!(actions.len(), 1);

        // Interval gate blocks the immediate repeat.
        assert!(area.tick(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inhibited_by_shame() {
        let area = DaydreamArea::new();
        let mut ctx = test_context(eager_epi());
        ctx.drives_v1.curiosity = 0.9;
        ctx.ws.energy_hint = 0.9;
        ctx.affects.set("shame", 0.8); // 0.8·0.8 = 0.64 > 0.55
        assert!(area.tick(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_without_autonomy() {
        let area = DaydreamArea::new();
        let mut ctx = test_context(eager_epi());
        ctx.drives_v1.curiosity = 0.9;
        ctx.ws.energy_hint = 0.9;
        ctx.ws.apply_survival_gate(0.9);
        assert!(area.tick(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_low_energy_blocks() {
        let area = DaydreamArea::new();
        let mut ctx = test_context(eager_epi());
        ctx.drives_v1.curiosity = 0.9;
        ctx.ws.energy_hint = 0.1;
        assert!(area.tick(&ctx).await.unwrap().is_empty());
    }
}
