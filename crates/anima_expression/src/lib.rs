//! Cortical areas and the bus that composes them into one action stream
//! per tick. Areas never emit text; downstream workers realize their
//! intents.

pub mod bus;
pub mod daydream;
pub mod helper;
pub mod social;
pub mod speak;

pub use bus::{Area, CortexBus, TickContext};
pub use daydream::DaydreamArea;
pub use helper::HelpPlannerArea;
pub use social::SocialPingArea;
pub use speak::SpeakArea;

/// Build the bus in the epigenome-configured order; unknown names are
/// ignored, missing names fall back to the default order.
pub fn default_bus(epi: &anima_core::Epigenome) -> CortexBus {
    let mut order = epi.bus_order();
    if order.is_empty() {
        order = vec![
            "daydream".into(),
            "social_ping".into(),
            "speak".into(),
            "help_planner".into(),
        ];
    }
    let mut bus = CortexBus::new();
    for name in order {
        match name.as_str() {
            "daydream" => bus.register(Box::new(DaydreamArea::new())),
            "social_ping" => bus.register(Box::new(SocialPingArea::new())),
            "speak" => bus.register(Box::new(SpeakArea)),
            "help_planner" => bus.register(Box::new(HelpPlannerArea::new())),
            other => tracing::warn!("unknown area in cortex_bus order: {other}"),
        }
    }
    bus
}
