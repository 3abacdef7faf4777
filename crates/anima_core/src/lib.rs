//! Core state and vocabulary of the agent runtime: the epigenome
//! configuration tree, the homeostatic scalar groups (body, affects,
//! drives), the shared workspace, the axiom kernel, and the action
//! vocabulary every other crate speaks.

pub mod action;
pub mod affect;
pub mod axioms;
pub mod body;
pub mod drives;
pub mod epigenome;
pub mod error;
pub mod workspace;

pub use action::{Action, IntentMode, PolicyAction};
pub use affect::{clamp01, tick_affects, AffectDef, AffectState};
pub use axioms::{
    axiom_by_id, base_cost, evaluate_axioms, rollback_key, Axiom, AxiomDecision, Risk, SelfChange,
    AXIOMS,
};
pub use body::{BodyState, LatencyEma, ResourceSnapshot};
pub use drives::{tick_drives_v1, DriveInputs, Drives, DrivesV1};
pub use epigenome::{merge_patch, Epigenome, IntentRule, Module, SemanticRuleCfg};
pub use error::CoreError;
pub use workspace::{PlanStep, Workspace};
