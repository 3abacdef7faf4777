//! The limbic layer: heartbeat, OS sensors and the somatic tick that keeps
//! the scalar groups homeostatic without any language in the loop.

pub mod heartbeat;
pub mod sensors;
pub mod somatic;

pub use heartbeat::{Heartbeat, TickHandler, MIN_INTERVAL};
pub use sensors::{Sampler, StaticSampler, SysinfoSampler};
pub use somatic::{SharedSoma, Soma, TickInputs};
