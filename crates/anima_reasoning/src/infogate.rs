//! The informativeness gate: a learned IDF filter that rejects low-content
//! utterances before they cost a policy decision or an LLM call.
//!
//! `observe_utterance` is the only write path and counts each token once
//! per utterance; `score_utterance` never mutates counts.

use anyhow::Result;

use anima_core::{clamp01, Epigenome};
use anima_memory::Store;

pub const DOCS_KEY: &str = "token_df:docs";

/// Letters, digits and underscore; everything else separates.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn unique(tokens: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokens
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfoScore {
    pub score: f64,
    pub low_info: bool,
    pub max_idf: f64,
}

/// Fold one utterance into the document-frequency table. Duplicate tokens
/// within the utterance count once; the document counter advances by one.
pub async fn observe_utterance(store: &Store, text: &str) -> Result<()> {
    let tokens = unique(&tokenize(text));
    if tokens.is_empty() {
        return Ok(());
    }
    store.token_df_bump(&tokens).await?;
    store.kv_incr(DOCS_KEY, 1).await?;
    Ok(())
}

/// Score an utterance without mutating any counts.
pub async fn score_utterance(store: &Store, epi: &Epigenome, text: &str) -> Result<InfoScore> {
    let p = epi.info_gate_params();
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Ok(InfoScore {
            score: 0.0,
            low_info: true,
            max_idf: 0.0,
        });
    }

    let docs = store.kv_get_f64(DOCS_KEY).await?.unwrap_or(0.0).max(0.0);
    let warmed_up = docs >= p.warmup_min_docs as f64;

    let mut content = 0usize;
    let mut max_idf: f64 = 0.0;
    let mut df_cache: std::collections::HashMap<&str, f64> = std::collections::HashMap::new();
    for token in &tokens {
        let df = match df_cache.get(token.as_str()) {
            Some(v) => *v,
            None => {
                let v = store.token_df_get(token).await? as f64;
                df_cache.insert(token.as_str(), v);
                v
            }
        };
        let suppressed = warmed_up
            && df >= p.stopword_min_df as f64
            && docs > 0.0
            && df / docs >= p.stopword_ratio;
        if !suppressed {
            content += 1;
        }
        max_idf = max_idf.max(((docs + 1.0) / (df + 1.0)).ln());
    }

    let content_ratio = content as f64 / tokens.len() as f64;
    let length_factor = clamp01(((tokens.len() + 1) as f64).log10());
    let boost = 0.20 * clamp01((max_idf - p.idf_threshold) / 3.0);
    let score = content_ratio * length_factor + boost;

    Ok(InfoScore {
        score,
        low_info: score < p.min_info,
        max_idf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_shapes() {
        assert_eq!(tokenize("Hello, World_2!"), vec!["hello", "world_2"]);
        assert_eq!(tokenize("...---..."), Vec::<String>::new());
        assert_eq!(tokenize("Räder drehen"), vec!["räder", "drehen"]);
    }

    #[tokio::test]
    async fn test_observe_counts_duplicates_once() {
        let store = Store::open_in_memory().await.unwrap();
        observe_utterance(&store, "rust rust rust memory").await.unwrap();
        assert_eq!(store.token_df_get("rust").await.unwrap(), 1);
        assert_eq!(store.token_df_get("memory").await.unwrap(), 1);
        assert_eq!(store.kv_get_f64(DOCS_KEY).await.unwrap(), Some(1.0));

        observe_utterance(&store, "rust again").await.unwrap();
        assert_eq!(store.token_df_get("rust").await.unwrap(), 2);
        assert_eq!(store.kv_get_f64(DOCS_KEY).await.unwrap(), Some(2.0));
    }

    #[tokio::test]
    async fn test_score_does_not_mutate() {
        let store = Store::open_in_memory().await.unwrap();
        let epi = Epigenome::default();
        observe_utterance(&store, "baseline document").await.unwrap();

        score_utterance(&store, &epi, "some probe text").await.unwrap();
        score_utterance(&store, &epi, "some probe text").await.unwrap();
        assert_eq!(store.token_df_get("probe").await.unwrap(), 0);
        assert_eq!(store.kv_get_f64(DOCS_KEY).await.unwrap(), Some(1.0));
    }

    #[tokio::test]
    async fn test_empty_utterance_low_info() {
        let store = Store::open_in_memory().await.unwrap();
        let epi = Epigenome::default();
        let s = score_utterance(&store, &epi, "!!!").await.unwrap();
        assert!(s.low_info);
        assert_eq!(s.score, 0.0);
    }

    #[tokio::test]
    async fn test_short_grunt_vs_real_question() {
        let store = Store::open_in_memory().await.unwrap();
        let epi = Epigenome::default();
        let grunt = score_utterance(&store, &epi, "ok").await.unwrap();
        let question = score_utterance(
            &store,
            &epi,
            "how does the borrow checker handle overlapping mutable slices",
        )
        .await
        .unwrap();
        assert!(question.score > grunt.score);
        assert!(grunt.low_info);
        assert!(!question.low_info);
    }

    #[tokio::test]
    async fn test_stopwords_suppressed_after_warmup() {
        let store = Store::open_in_memory().await.unwrap();
        let mut epi = Epigenome::default();
        epi.set_param("info_gate", "warmup_min_docs", serde_json::json!(5));
        epi.set_param("info_gate", "stopword_min_df", serde_json::json!(3));
        epi.set_param("info_gate", "stopword_ratio", serde_json::json!(0.5));

        // "the" appears in every document, "quasar" in one.
        for i in 0..6 {
            observe_utterance(&store, &format!("the filler number {i}")).await.unwrap();
        }
        observe_utterance(&store, "the quasar flared").await.unwrap();

        let all_stop = score_utterance(&store, &epi, "the the the").await.unwrap();
        let rare = score_utterance(&store, &epi, "the quasar flared again brightly").await.unwrap();
        assert!(all_stop.score < rare.score);
        assert!(all_stop.low_info);
    }
}
