//! Online multinomial naive Bayes over intent classes, with counts living
//! in the store so learning survives restarts.

use anyhow::Result;

use anima_core::Epigenome;
use anima_memory::Store;

/// Tiny function-word list; everything is data-driven beyond this.
const NB_STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "it", "to", "of", "and", "or", "in", "on", "for",
];

fn nb_tokens(text: &str) -> Vec<String> {
    crate::infogate::tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !NB_STOPWORDS.contains(&t.as_str()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct NbPrediction {
    pub class: String,
    pub probability: f64,
}

/// Fold one labelled utterance into the counts.
pub async fn nb_train(store: &Store, text: &str, class: &str) -> Result<()> {
    let tokens = nb_tokens(text);
    if tokens.is_empty() {
        return Ok(());
    }
    store.nb_observe(class, &tokens).await
}

/// Argmax class with its softmax probability, or `None` before any
/// training.
pub async fn nb_predict(store: &Store, epi: &Epigenome, text: &str) -> Result<Option<NbPrediction>> {
    let alpha = epi.intent_nb_params().alpha;
    let classes = store.nb_classes().await?;
    if classes.is_empty() {
        return Ok(None);
    }
    let tokens = nb_tokens(text);
    if tokens.is_empty() {
        return Ok(None);
    }

    let total_docs: i64 = classes.iter().map(|(_, n)| n).sum();
    let vocab = store.nb_vocab_size().await?.max(1) as f64;

    let mut scores: Vec<(String, f64)> = Vec::with_capacity(classes.len());
    for (class, doc_count) in &classes {
        let mut log_p = ((*doc_count as f64 + alpha) / (total_docs as f64 + alpha * classes.len() as f64)).ln();
        let class_total = store.nb_class_token_total(class).await? as f64;
        for token in &tokens {
            let count = store.nb_token_count(class, token).await? as f64;
            log_p += ((count + alpha) / (class_total + alpha * vocab)).ln();
        }
        scores.push((class.clone(), log_p));
    }

    // Softmax over log scores, stabilized by the max.
    let max_log = scores
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::NEG_INFINITY, f64::max);
    let denom: f64 = scores.iter().map(|(_, s)| (s - max_log).exp()).sum();
    let (best, best_log) = scores
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .expect("non-empty class list");

    Ok(Some(NbPrediction {
        class: best,
        probability: (best_log - max_log).exp() / denom,
    }))
}

/// Prediction gated by the trust threshold (default 0.72): below it the
/// rule router stays authoritative.
pub async fn nb_predict_trusted(
    store: &Store,
    epi: &Epigenome,
    text: &str,
) -> Result<Option<NbPrediction>> {
    let threshold = epi.intent_nb_params().threshold;
    Ok(nb_predict(store, epi, text)
        .await?
        .filter(|p| p.probability >= threshold))
}
