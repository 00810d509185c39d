//! Glossary terms (§3, §4.B): domain vocabulary owned by an agent, queryable
//! by semantic similarity to a free-text query.
//!
//! The teacher crate scored similarity over dense sentence embeddings from a
//! `rust-bert` model (`embedding.rs`). That model stack is out of scope here
//! (no embedding provider is specified by this runtime — it's an external
//! collaborator per §1), so relevance scoring is generalized to work over
//! whatever vector representation a caller supplies, with a bag-of-words
//! cosine similarity as the default, dependency-free scorer. A real
//! embedding-backed [`TermRelevanceScorer`] can be swapped in without
//! touching [`GlossaryStore`]'s contract.

use crate::types::{AgentId, TermId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub set: AgentId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    pub creation_time: DateTime<Utc>,
}

impl Term {
    pub fn new(set: AgentId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: TermId::new(),
            set,
            name: name.into(),
            description: description.into(),
            synonyms: Vec::new(),
            creation_time: Utc::now(),
        }
    }

    pub fn with_synonyms(mut self, synonyms: Vec<String>) -> Self {
        self.synonyms = synonyms;
        self
    }

    /// The text a relevance scorer compares a query against: name,
    /// synonyms and description concatenated.
    fn comparison_text(&self) -> String {
        let mut text = self.name.clone();
        for synonym in &self.synonyms {
            text.push(' ');
            text.push_str(synonym);
        }
        text.push(' ');
        text.push_str(&self.description);
        text
    }
}

/// Scores a query against a term. Implementations may call out to an
/// embedding provider; the default is dependency-free lexical overlap.
pub trait TermRelevanceScorer: Send + Sync {
    fn score(&self, query_text: &str, term: &Term) -> f32;
}

fn bag_of_words(text: &str) -> HashMap<String, f32> {
    let mut bag = HashMap::new();
    for token in text.to_lowercase().split_whitespace() {
        let token: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
        if token.is_empty() {
            continue;
        }
        *bag.entry(token).or_insert(0.0) += 1.0;
    }
    bag
}

/// Cosine similarity over sparse bag-of-words vectors, generalizing the
/// dense-vector `cosine_similarity` the teacher used for sentence
/// embeddings to whatever representation is available without a model.
pub fn cosine_similarity(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
    let dot_product: f32 = a.iter().map(|(k, v)| v * b.get(k).copied().unwrap_or(0.0)).sum();
    let norm_a: f32 = a.values().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.values().map(|v| v * v).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Default, dependency-free [`TermRelevanceScorer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalOverlapScorer;

impl TermRelevanceScorer for LexicalOverlapScorer {
    fn score(&self, query_text: &str, term: &Term) -> f32 {
        let query_bag = bag_of_words(query_text);
        let term_bag = bag_of_words(&term.comparison_text());
        cosine_similarity(&query_bag, &term_bag)
    }
}

/// Ranks `terms` by relevance to `query_text`, tolerating arbitrarily long
/// query text by chunking it and keeping the best-scoring chunk per term
/// (§4.B).
pub fn rank_by_relevance<'a>(
    scorer: &dyn TermRelevanceScorer,
    query_text: &str,
    terms: &'a [Term],
    top_k: usize,
) -> Vec<&'a Term> {
    const CHUNK_WORDS: usize = 256;

    let words: Vec<&str> = query_text.split_whitespace().collect();
    let chunks: Vec<String> = if words.is_empty() {
        vec![String::new()]
    } else {
        words
            .chunks(CHUNK_WORDS)
            .map(|chunk| chunk.join(" "))
            .collect()
    };

    let mut scored: Vec<(f32, &Term)> = terms
        .iter()
        .map(|term| {
            let best = chunks
                .iter()
                .map(|chunk| scorer.score(chunk, term))
                .fold(f32::MIN, f32::max);
            (best, term)
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(top_k).map(|(_, term)| term).collect()
}
