//! Shared action vocabulary.
//!
//! Cortical areas never emit text; they emit prioritized intents that
//! downstream workers realize. The policy bandit chooses between a fixed
//! set of answer strategies; the intent router classifies what the user
//! wanted. All three vocabularies live here so every crate agrees on them.

use serde::{Deserialize, Serialize};

/// An intent emitted by a cortical area during a bus tick.
///
/// `priority` is in [0,1]; the bus preserves area registration order, the
/// dispatcher may additionally sort by priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Proactively say something about a topic.
    Speak {
        reason: String,
        topic: String,
        priority: f32,
    },
    /// Free-associate offline (no user-visible output by itself).
    Daydream { priority: f32 },
    /// Reach out to the user without a pending question.
    SocialPing { priority: f32 },
    /// Ask the user for help with an expansion candidate.
    RequestHelp {
        candidate_id: i64,
        message: String,
        priority: f32,
    },
}

impl Action {
    pub fn priority(&self) -> f32 {
        match self {
            Action::Speak { priority, .. } => *priority,
            Action::Daydream { priority } => *priority,
            Action::SocialPing { priority } => *priority,
            Action::RequestHelp { priority, .. } => *priority,
        }
    }

    /// Stable kind tag for logging and kv metric counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Speak { .. } => "speak",
            Action::Daydream { .. } => "daydream",
            Action::SocialPing { .. } => "social_ping",
            Action::RequestHelp { .. } => "request_help",
        }
    }
}

/// The fixed action set the policy bandit chooses from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyAction {
    DirectAnswer,
    AskClarify,
    ResearchThenAnswer,
    StanceThenAnswer,
    SocialPing,
}

impl PolicyAction {
    pub const ALL: [PolicyAction; 5] = [
        PolicyAction::DirectAnswer,
        PolicyAction::AskClarify,
        PolicyAction::ResearchThenAnswer,
        PolicyAction::StanceThenAnswer,
        PolicyAction::SocialPing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::DirectAnswer => "direct_answer",
            PolicyAction::AskClarify => "ask_clarify",
            PolicyAction::ResearchThenAnswer => "research_then_answer",
            PolicyAction::StanceThenAnswer => "stance_then_answer",
            PolicyAction::SocialPing => "social_ping",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.as_str() == s)
    }
}

impl std::fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent lattice for user utterances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentMode {
    /// The user is asking about the agent itself.
    MetaSelf,
    /// Personal life of the user (memories, preferences, plans).
    UserLife,
    /// Technical task (code, systems, tools).
    TaskTech,
    /// A fact about the outside world that may need evidence.
    ExternalFact,
    /// A request for the agent's opinion or stance.
    Opinion,
    /// Explicit research command.
    ResearchCmd,
    /// Anything else.
    General,
}

impl IntentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentMode::MetaSelf => "meta_self",
            IntentMode::UserLife => "user_life",
            IntentMode::TaskTech => "task_tech",
            IntentMode::ExternalFact => "external_fact",
            IntentMode::Opinion => "opinion",
            IntentMode::ResearchCmd => "research_cmd",
            IntentMode::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "meta_self" => Some(IntentMode::MetaSelf),
            "user_life" => Some(IntentMode::UserLife),
            "task_tech" => Some(IntentMode::TaskTech),
            "external_fact" => Some(IntentMode::ExternalFact),
            "opinion" => Some(IntentMode::Opinion),
            "research_cmd" => Some(IntentMode::ResearchCmd),
            "general" => Some(IntentMode::General),
            _ => None,
        }
    }
}

impl std::fmt::Display for IntentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
