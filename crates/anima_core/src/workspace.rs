//! The workspace: a per-process mutable dashboard of the latest decisions,
//! gating flags, plan steps and traces, shared between the tick path and
//! the request path.
//!
//! The survival gate here is kernel truth: it overrides anything an LLM
//! wishes for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{IntentMode, PolicyAction};

/// A single plan step the request worker executes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStep {
    Answer,
    Research,
    Stance,
    Clarify,
    Ping,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workspace {
    // Rolling conversational state.
    pub current_thought: String,
    pub last_topic: String,
    pub active_topic: String,
    pub last_user_text: String,
    pub prev_user_text: String,
    pub latency_ema_ms: f64,

    // Drive/body hints copied out of the last tick.
    pub energy_hint: f64,
    pub drives_energy_deficit: f64,
    pub social_craving: f64,
    pub urge_interact_hint: f64,
    pub resource_hint: String,

    // Gating flags.
    pub survival_mode: bool,
    pub web_allowed: bool,
    pub autonomy_allowed: bool,
    /// 0 = unlimited.
    pub max_context_turns: i64,
    /// 0 = unlimited.
    pub max_detail_items: i64,

    // Plan.
    pub active_goal: String,
    pub plan_steps: Vec<PlanStep>,
    pub plan_index: usize,

    // Policy trace.
    pub last_policy_ctx: String,
    pub last_policy_action: String,
    pub last_policy_style: String,

    // Sense trace.
    pub last_sense_need_web: bool,
    pub last_sense_score: f64,
    pub last_sense_query: String,
    pub last_sense_reason: String,

    // Collaborator availability surface.
    pub llm_available: bool,
    pub ollama_missing: bool,

    /// Inhibits all sensor and LLM side effects during training dry-runs.
    pub training_dry_run: bool,

    pub last_autotune_at: Option<DateTime<Utc>>,
}

impl Workspace {
    pub fn new() -> Self {
        let mut ws = Self::default();
        ws.apply_survival_gate(0.0);
        ws
    }

    /// Kernel gating. Thresholds are fixed, not configuration: survival must
    /// never be tunable away by a self-change.
    pub fn apply_survival_gate(&mut self, survival: f64) {
        if survival >= 0.80 {
            self.survival_mode = true;
            self.web_allowed = false;
            self.autonomy_allowed = false;
            self.max_context_turns = 5;
            self.max_detail_items = 2;
        } else if survival >= 0.65 {
            self.survival_mode = true;
            self.web_allowed = false;
            self.autonomy_allowed = false;
            self.max_context_turns = 8;
            self.max_detail_items = 4;
        } else {
            self.survival_mode = false;
            self.web_allowed = true;
            self.autonomy_allowed = true;
            self.max_context_turns = 0;
            self.max_detail_items = 0;
        }
    }

    /// Initialize the tiny plan FSM from a chosen policy action.
    pub fn plan_from_action(&mut self, topic: &str, action: PolicyAction) {
        self.active_goal = topic.to_string();
        self.plan_index = 0;
        self.plan_steps = match action {
            PolicyAction::DirectAnswer => vec![PlanStep::Answer],
            PolicyAction::ResearchThenAnswer => vec![PlanStep::Research, PlanStep::Answer],
            PolicyAction::StanceThenAnswer => vec![PlanStep::Stance, PlanStep::Answer],
            PolicyAction::AskClarify => vec![PlanStep::Clarify],
            PolicyAction::SocialPing => vec![PlanStep::Ping],
        };
    }

    pub fn current_plan_step(&self) -> Option<PlanStep> {
        self.plan_steps.get(self.plan_index).copied()
    }

    pub fn advance_plan(&mut self) {
        if self.plan_index < self.plan_steps.len() {
            self.plan_index += 1;
        }
    }

    /// Update the active topic from a new utterance. Follow-ups stay on the
    /// current topic: if any content token of the utterance shares a long
    /// prefix with a token of the active topic (inflection tolerance), the
    /// topic is kept. Otherwise the longest content token becomes the topic.
    pub fn update_active_topic(&mut self, text: &str) -> String {
        let tokens = content_tokens(text);
        if tokens.is_empty() {
            return self.active_topic.clone();
        }
        if !self.active_topic.is_empty() {
            let topic_tokens = content_tokens(&self.active_topic);
            let follows = tokens.iter().any(|t| {
                topic_tokens
                    .iter()
                    .any(|a| shared_prefix_len(t, a) >= 5.min(a.chars().count()))
            });
            if follows {
                return self.active_topic.clone();
            }
        }
        let topic = tokens
            .into_iter()
            .max_by_key(|t| t.chars().count())
            .unwrap_or_default();
        self.last_topic = self.active_topic.clone();
        self.active_topic = topic.clone();
        topic
    }

    pub fn note_user_text(&mut self, text: &str) {
        self.prev_user_text = std::mem::take(&mut self.last_user_text);
        self.last_user_text = text.to_string();
    }
}

fn content_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.chars().count() >= 4)
        .map(str::to_lowercase)
        .collect()
}

fn shared_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count()
}
