//! Social ping area: reach out when the urge to interact has built up and
//! nothing painful is holding it back. At most one ping per two minutes.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use anima_core::Action;

use crate::bus::{Area, TickContext};

const MIN_PING_INTERVAL_SECS: i64 = 120;

pub struct SocialPingArea {
    last_ping: AtomicI64,
}

impl SocialPingArea {
    pub fn new() -> Self {
        Self {
            last_ping: AtomicI64::new(0),
        }
    }
}

impl Default for SocialPingArea {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Area for SocialPingArea {
    fn name(&self) -> &'static str {
        "social_ping"
    }

    async fn tick(&self, ctx: &TickContext) -> anyhow::Result<Vec<Action>> {
        if !ctx.ws.autonomy_allowed {
            return Ok(Vec::new());
        }
        if ctx.ws.urge_interact_hint < 0.70 {
            return Ok(Vec::new());
        }
        let inhibition = 0.9 * ctx.affects.get("shame")
            + 0.5 * ctx.affects.get("pain")
            + 0.3 * ctx.affects.get("unwell");
        if inhibition > 0.60 {
            return Ok(Vec::new());
        }
        let now = ctx.now.timestamp();
        if now - self.last_ping.load(Ordering::Relaxed) < MIN_PING_INTERVAL_SECS {
            return Ok(Vec::new());
        }
        self.last_ping.store(now, Ordering::Relaxed);

        Ok(vec![Action::SocialPing {
            priority: ctx.ws.urge_interact_hint as f32,
        }])
    }
}
