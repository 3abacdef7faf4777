//! The area bus: independent cortical areas inspect a context snapshot and
//! emit prioritized actions; the bus dispatches them in registration
//! order, every tick.
//!
//! No exception escapes an area: a failing area contributes zero actions
//! for that tick and a warning, nothing else.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use anima_core::{Action, AffectState, Drives, DrivesV1, Epigenome, Workspace};
use anima_memory::Store;

/// Value snapshot handed to every area. Copied out of the shared state
/// while the lock was held; areas never reach back into live state.
#[derive(Clone)]
pub struct TickContext {
    pub ws: Workspace,
    pub affects: AffectState,
    pub drives: Drives,
    pub drives_v1: DrivesV1,
    pub epi: Arc<Epigenome>,
    pub store: Store,
    pub now: DateTime<Utc>,
    pub delta: Duration,
}

#[async_trait]
pub trait Area: Send + Sync {
    fn name(&self) -> &'static str;
    async fn tick(&self, ctx: &TickContext) -> anyhow::Result<Vec<Action>>;
}

#[derive(Default)]
pub struct CortexBus {
    areas: Vec<Box<dyn Area>>,
}

impl CortexBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, area: Box<dyn Area>) {
        self.areas.push(area);
    }

    pub fn area_names(&self) -> Vec<&'static str> {
        self.areas.iter().map(|a| a.name()).collect()
    }

    /// Run all areas in registration order and concatenate their actions,
    /// preserving order.
    pub async fn tick(&self, ctx: &TickContext) -> Vec<Action> {
        let mut actions = Vec::new();
        for area in &self.areas {
            match area.tick(ctx).await {
                Ok(mut emitted) => actions.append(&mut emitted),
                Err(e) => {
                    tracing::warn!(area = area.name(), "area failed this tick: {e}");
                }
            }
        }
        actions
    }
}

#[cfg(test)]
pub(crate) fn test_context(epi: Epigenome) -> TickContext {
    TickContext {
        ws: Workspace::new(),
        affects: AffectState::from_defs(&epi),
        drives: Drives::default(),
        drives_v1: DrivesV1::default(),
        epi: Arc::new(epi),
        store: Store::null(),
        now: Utc::now(),
        delta: Duration::from_millis(500),
    }
}
