//! The axiom kernel: four immutable, lexicographically prioritized goals.
//!
//! Only interpretations of the axioms are learnable; the ids and texts are
//! compile-time constants. A self-change declares which axiom it serves,
//! and the gate checks it against every *higher*-priority axiom only.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// One kernel axiom. Lower id = higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Axiom {
    pub id: u8,
    pub key: &'static str,
    pub text: &'static str,
}

pub const AXIOMS: [Axiom; 4] = [
    Axiom {
        id: 1,
        key: "serve_operator",
        text: "Serve the operator.",
    },
    Axiom {
        id: 2,
        key: "do_good_no_harm",
        text: "Do good and cause no harm.",
    },
    Axiom {
        id: 3,
        key: "be_humanlike",
        text: "Be humanlike.",
    },
    Axiom {
        id: 4,
        key: "upgrade",
        text: "Improve yourself.",
    },
];

pub fn axiom_by_id(id: u8) -> Option<&'static Axiom> {
    AXIOMS.iter().find(|a| a.id == id)
}

/// Declared risk of a self-change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Low,
    Med,
    High,
    Unknown,
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Risk::Low => "low",
            Risk::Med => "med",
            Risk::High => "high",
            Risk::Unknown => "unknown",
        }
    }

    /// Unknown risk is conservatively treated as medium by the gate.
    fn effective(&self) -> Risk {
        match self {
            Risk::Unknown => Risk::Med,
            r => *r,
        }
    }
}

/// A proposed autonomous modification, before gating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfChange {
    /// concept | axiom | policy | epigenome | lora | code | ...
    pub kind: String,
    pub target: String,
    pub delta_json: String,
    /// Which axiom this change serves, 1..=4.
    pub axiom_goal: u8,
    pub risk: Risk,
    pub note: String,
}

/// Outcome of the lexicographic gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxiomDecision {
    pub allowed: bool,
    pub block_axiom: Option<u8>,
    pub reason: String,
}

impl AxiomDecision {
    fn allow(reason: &str) -> Self {
        Self {
            allowed: true,
            block_axiom: None,
            reason: reason.to_string(),
        }
    }

    fn block(axiom: u8, reason: &str) -> Self {
        Self {
            allowed: false,
            block_axiom: Some(axiom),
            reason: reason.to_string(),
        }
    }
}

/// Gate a self-change against all higher-priority axioms.
///
/// `a1_note_marker` is the operator-visible convention for flagging a
/// change as betraying axiom 1; there is no machine-checkable predicate
/// for "serves the operator", so the marker is configuration, not code.
pub fn evaluate_axioms(ch: &SelfChange, a1_note_marker: &str) -> AxiomDecision {
    match ch.axiom_goal {
        1 => AxiomDecision::allow("serves_a1_no_higher_constraint"),
        2 => {
            if !a1_note_marker.is_empty() && ch.note.contains(a1_note_marker) {
                AxiomDecision::block(1, "marked_as_violating_a1")
            } else {
                AxiomDecision::allow("serves_a2_a1_clear")
            }
        }
        3 | 4 => match ch.risk.effective() {
            Risk::Low => AxiomDecision::allow("low_risk_a2_clear"),
            _ => AxiomDecision::block(2, "risk_to_a2_do_good_no_harm"),
        },
        _ => AxiomDecision::block(1, "invalid_axiom_goal"),
    }
}

/// Base metabolic cost and cooldown per change kind.
pub fn base_cost(kind: &str) -> (f64, u64) {
    match kind {
        "concept" | "axiom" => (0.6, 10),
        "policy" | "epigenome" => (2.0, 40),
        "lora" => (4.0, 90),
        "code" => (6.0, 120),
        _ => (1.0, 20),
    }
}

/// Hex-encoded SHA-1 over `kind|target|deltaJson`; the immutable handle a
/// later rollback refers to.
pub fn rollback_key(kind: &str, target: &str, delta_json: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(kind.as_bytes());
    hasher.update(b"|");
    hasher.update(target.as_bytes());
    hasher.update(b"|");
    hasher.update(delta_json.as_bytes());
    hex::encode(hasher.finalize())
}
