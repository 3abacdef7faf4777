//! Error kinds shared across the runtime.
//!
//! The taxonomy follows how callers recover, not where the failure came
//! from: `Config`/`Invalid` fail upward to the operator, `Transient` is
//! degraded around, `Blocked` is a normal (audited) outcome of the axiom
//! gate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed epigenome document. The process must not start on this.
    #[error("config: {0}")]
    Config(String),

    /// Malformed merge patch or other operator-supplied input.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Store/LLM/network failure. Callers degrade (cached knowledge,
    /// heuristic fallbacks) instead of propagating.
    #[error("transient: {0}")]
    Transient(String),

    /// Axiom gate denial. Carries the blocking axiom id for the audit row.
    #[error("blocked by axiom {block_axiom}: {reason}")]
    Blocked { block_axiom: u8, reason: String },
}
