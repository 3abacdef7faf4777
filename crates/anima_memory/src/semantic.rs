//! Rule-driven semantic memory: regex read/write rules against the
//! (subject, predicate, object) fact store.
//!
//! Rules arrive as epigenome data, never as code — the core stays
//! language-neutral and operators localize by configuration.

use anyhow::Result;
use regex::{Captures, Regex};

use anima_core::{Epigenome, SemanticRuleCfg};

use crate::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticOutcome {
    pub handled: bool,
    pub reply: String,
}

/// Substitute `$1..$9` capture groups into a template.
fn substitute(template: &str, caps: &Captures<'_>) -> String {
    let mut out = template.to_string();
    for i in (1..=9).rev() {
        let placeholder = format!("${i}");
        if out.contains(&placeholder) {
            let rep = caps.get(i).map(|m| m.as_str().trim()).unwrap_or("");
            out = out.replace(&placeholder, rep);
        }
    }
    out
}

fn compile(rule: &SemanticRuleCfg) -> Option<Regex> {
    match Regex::new(&rule.pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(rule = %rule.name, "bad semantic rule pattern: {e}");
            None
        }
    }
}

/// Run the configured rules against one utterance: at most `max_reads`
/// read rules, then at most `max_writes` write rules. Returns the first
/// non-empty reply and whether anything matched at all.
pub async fn semantic_memory_step(
    store: &Store,
    epi: &Epigenome,
    user_text: &str,
) -> Result<SemanticOutcome> {
    let params = epi.semantic_memory();
    let mut handled = false;
    let mut reply = String::new();

    let mut reads = 0;
    for rule in &params.read_rules {
        if reads >= params.max_reads {
            break;
        }
        let Some(re) = compile(rule) else { continue };
        let Some(caps) = re.captures(user_text) else {
            continue;
        };
        reads += 1;
        handled = true;
        let subject = substitute(&rule.subject, &caps);
        let predicate = substitute(&rule.predicate, &caps);
        let answer = match store.get_fact(&subject, &predicate).await? {
            Some(fact) => rule.answer_found.replace("{{object}}", &fact.object),
            None => rule.answer_missing.clone(),
        };
        if reply.is_empty() && !answer.is_empty() {
            reply = answer;
        }
    }

    let mut writes = 0;
    for rule in &params.write_rules {
        if writes >= params.max_writes {
            break;
        }
        let Some(re) = compile(rule) else { continue };
        let Some(caps) = re.captures(user_text) else {
            continue;
        };
        writes += 1;
        handled = true;
        let subject = substitute(&rule.subject, &caps);
        let predicate = substitute(&rule.predicate, &caps);
        let object = substitute(&rule.object, &caps);
        if subject.is_empty() || predicate.is_empty() || object.is_empty() {
            continue;
        }
        store
            .upsert_fact(
                &subject,
                &predicate,
                &object,
                rule.confidence,
                rule.salience,
                rule.half_life_days,
                &rule.source,
            )
            .await?;
        if reply.is_empty() {
            let ack = substitute(&rule.reply, &caps);
            if !ack.is_empty() {
                reply = ack;
            }
        }
    }

    Ok(SemanticOutcome { handled, reply })
}
