//! The research gate: one composed verdict on whether answering needs
//! fresh web evidence.
//!
//! Composition order is fixed: dry-run → heuristic → workspace veto (the
//! survival gate is kernel truth, nothing later overrides it) → hard
//! evidence → LLM sensor gate → external-fact safety net → query
//! normalization. The LLM is consulted last and trusted least: any failure
//! falls back to the heuristic outcome.

use regex::Regex;
use serde::Deserialize;

use anima_core::{clamp01, Epigenome, IntentMode};

use crate::llm::{parse_json_reply, ChatBackend, ChatMessage};

/// Snapshot of everything the gate reads, copied out while the state lock
/// was held.
#[derive(Debug, Clone)]
pub struct ResearchContext {
    pub text: String,
    pub intent: IntentMode,
    pub web_allowed: bool,
    pub survival_mode: bool,
    pub training_dry_run: bool,
    /// Best concept confidence for the active topic, [0,1].
    pub concept_conf: f64,
    pub curiosity: f64,
    /// Learned preference for researching, [0,1].
    pub research_bias: f64,
    pub shame: f64,
    pub fear: f64,
    pub pain: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SenseDecision {
    pub do_research: bool,
    pub score: f64,
    pub query: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct GateReply {
    need_web: bool,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    query: String,
    #[serde(default)]
    reason: String,
}

fn explicit_request(text: &str) -> bool {
    Regex::new(r"(?i)\b(research|look(?: it)? up|search|sources?|evidence)\b")
        .expect("static pattern")
        .is_match(text)
}

fn hard_evidence(text: &str) -> bool {
    let patterns = [
        r"(?i)\b(link|url)\b",
        r"(?i)https?://",
        r"(?i)\bwww\.",
        r"(?i)\b[a-z0-9][a-z0-9-]*\.(com|org|net|io|de|gov|edu)\b",
    ];
    patterns
        .iter()
        .any(|p| Regex::new(p).expect("static pattern").is_match(text))
}

/// Lowercase, strip punctuation, collapse whitespace, cap length.
pub fn normalize_query(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .to_lowercase();
    cleaned
        .split_whitespace()
        .take(12)
        .collect::<Vec<_>>()
        .join(" ")
}

fn heuristic_score(ctx: &ResearchContext) -> f64 {
    let mut base = 0.0;
    if explicit_request(&ctx.text) {
        base += 0.55;
    }
    base += match ctx.intent {
        IntentMode::ResearchCmd => 0.60,
        IntentMode::ExternalFact => 0.35,
        IntentMode::Opinion => 0.15,
        IntentMode::TaskTech => 0.10,
        _ => 0.0,
    };
    base += 0.30 * (1.0 - ctx.concept_conf);
    base += 0.25 * ctx.curiosity;
    base += 0.20 * ctx.research_bias;
    base -= 0.25 * ctx.shame + 0.20 * ctx.fear + 0.15 * ctx.pain;
    clamp01(base)
}

/// Compose the verdict. `backend` is the optional LLM sensor gate; pass
/// `None` when no model is reachable.
pub async fn research_gate(
    epi: &Epigenome,
    ctx: &ResearchContext,
    backend: Option<&dyn ChatBackend>,
) -> SenseDecision {
    if ctx.training_dry_run {
        return SenseDecision {
            do_research: false,
            score: 0.0,
            query: String::new(),
            reason: "dry_run".into(),
        };
    }

    let base = heuristic_score(ctx);
    let threshold = (0.70 - 0.20 * ctx.research_bias).max(0.45);
    let mut decision = SenseDecision {
        do_research: base >= threshold,
        score: base,
        query: String::new(),
        reason: "heuristic".into(),
    };

    // Kernel veto: the survival gate turned the web off, nothing below may
    // turn it back on.
    if !ctx.web_allowed {
        return SenseDecision {
            do_research: false,
            score: base,
            query: String::new(),
            reason: "web_blocked".into(),
        };
    }

    if hard_evidence(&ctx.text) {
        decision.do_research = true;
        decision.score = decision.score.max(0.90);
        decision.reason = "hard_evidence".into();
    }

    if !decision.do_research {
        if let Some(backend) = backend {
            let model = epi.model_for("sense_gate", "llama3.2:3b");
            let messages = [
                ChatMessage::system(
                    "You are a sensor gate for an autonomous agent. Decide whether answering \
                     needs fresh web evidence. Reply ONLY with JSON \
                     {\"need_web\": bool, \"confidence\": 0..1, \"query\": string, \"reason\": string}. \
                     If unsure, set need_web=true.",
                ),
                ChatMessage::user(format!(
                    "USER_TEXT: {}\nINTENT_MODE: {}\nWEB_ALLOWED: {}\nSURVIVAL_MODE: {}",
                    ctx.text, ctx.intent, ctx.web_allowed, ctx.survival_mode
                )),
            ];
            match backend.chat(&model, &messages).await {
                Ok(reply) => match parse_json_reply::<GateReply>(&reply) {
                    Some(gate) if gate.need_web => {
                        decision.do_research = true;
                        decision.score = decision.score.max(clamp01(gate.confidence));
                        decision.query = gate.query;
                        decision.reason = format!("llm_gate:{}", gate.reason);
                    }
                    Some(_) => {
                        decision.reason = "llm_gate:no_web".into();
                    }
                    // Unparseable output counts as need_web=false.
                    None => {
                        decision.reason = "llm_gate_unparsed".into();
                    }
                },
                Err(e) => {
                    tracing::warn!("sensor gate unavailable: {e}");
                    decision.reason = "llm_gate_failed".into();
                }
            }
        }
    }

    // Safety net: external facts never go unanswered by cached guesses.
    if ctx.intent == IntentMode::ExternalFact && !decision.do_research {
        decision.do_research = true;
        decision.score = decision.score.max(0.75);
        decision.reason = "external_fact_safety".into();
    }

    if decision.do_research && decision.query.trim().is_empty() {
        decision.query = normalize_query(&ctx.text);
    }
    decision
}
