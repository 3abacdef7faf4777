//! Intent routing: ordered rules from the epigenome classify an utterance
//! into one mode of the intent lattice. Higher priority wins, ties resolve
//! by input order, no match falls through to `General`.

use anima_core::{Epigenome, IntentMode, IntentRule};
use regex::Regex;

pub struct IntentRouter {
    /// (rule, compiled regexes), sorted by priority descending, stable.
    rules: Vec<(IntentRule, Vec<Regex>)>,
}

impl IntentRouter {
    pub fn from_epigenome(epi: &Epigenome) -> Self {
        Self::new(epi.intent_rules())
    }

    pub fn new(mut rules: Vec<IntentRule>) -> Self {
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
        let rules = rules
            .into_iter()
            .map(|r| {
                let compiled = r
                    .regex
                    .iter()
                    .filter_map(|p| match Regex::new(p) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            tracing::warn!(rule = %r.name, "bad intent regex: {e}");
                            None
                        }
                    })
                    .collect();
                (r, compiled)
            })
            .collect();
        Self { rules }
    }

    pub fn classify(&self, text: &str) -> IntentMode {
        let lower = text.to_lowercase();
        for (rule, regexes) in &self.rules {
            let contains_hit = rule.contains.iter().any(|n| lower.contains(&n.to_lowercase()));
            let regex_hit = regexes.iter().any(|re| re.is_match(text));
            if contains_hit || regex_hit {
                if let Some(mode) = IntentMode::parse(&rule.intent) {
                    tracing::debug!(rule = %rule.name, mode = %mode, "intent matched");
                    return mode;
                }
            }
        }
        IntentMode::General
    }
}
