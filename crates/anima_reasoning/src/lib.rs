//! The decision layer: what did the user want, is it worth engaging, does
//! it need web evidence, and which answer strategy does the bandit back.

pub mod infogate;
pub mod intent;
pub mod intent_nb;
pub mod llm;
pub mod policy;
pub mod providers;
pub mod research;
pub mod websense;

pub use infogate::{observe_utterance, score_utterance, tokenize, InfoScore};
pub use intent::IntentRouter;
pub use intent_nb::{nb_predict, nb_predict_trusted, nb_train, NbPrediction};
pub use llm::{extract_json, parse_json_reply, ChatBackend, ChatMessage, NullBackend};
pub use policy::{
    apply_train_choice, choose, choose_with_rng, context_key, sample_beta, sample_gamma,
    style_for, update, PolicyChoice,
};
pub use providers::ollama::OllamaBackend;
pub use research::{normalize_query, research_gate, ResearchContext, SenseDecision};
pub use websense::{Document, NullWebSense, SearchResult, WebSense};
