//! Persistent knowledge substrate and the governed write paths on top of
//! it: facts/concepts/stances, the hippocampus, semantic memory rules,
//! source trust, proposal pipelines, the self-change governor and the
//! evolution tournament.
//!
//! All of it degrades to a null sink when constructed with
//! [`Store::null`] — the organism keeps living, it just stops remembering.

pub mod candidates;
pub mod evolution;
pub mod facts;
pub mod governor;
pub mod hippocampus;
pub mod kv;
pub mod learning;
pub mod proposals;
pub mod semantic;
pub mod store;
pub mod trust;

#[cfg(test)]
mod tests;

pub use candidates::ExpandCandidate;
pub use evolution::{
    load_rolling_metrics, tick_evolution_tournament, RollingMetrics, TournamentKnobs,
};
pub use facts::{Concept, Fact, Stance};
pub use governor::{commit_self_change, throttle_multiplier, CommitOutcome};
pub use hippocampus::{auto_tune_memory, ConsolidateRequest, MemoryDetail};
pub use learning::{AbTrial, BetaPosterior, POSTERIOR_FLOOR};
pub use proposals::{Proposal, ProposalKind, ProposalStatus};
pub use semantic::{semantic_memory_step, SemanticOutcome};
pub use store::{now_rfc3339, rfc3339, Store};
pub use trust::{domain_of, EvidenceResult};
