//! Deterministic stand-ins for the neural backends. They need no weights and
//! are selected with `APP_USE_FAKE_EMBEDDINGS=1` / `APP_USE_FAKE_NLI=1`.

use anyhow::Result;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use casedb_core::traits::{Classifier, Embedder};
use casedb_core::types::NliProbs;

/// Feature-hashing embedder: each whitespace token lands in one bucket.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("hash:d{dim}") }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

const NEGATIONS: &[&str] = &["not", "no", "never", "without", "cannot", "lacks", "lack", "denied", "rejected", "dismissed"];

/// Lexical-overlap NLI: high overlap with matching polarity reads as
/// entailment, high overlap with flipped polarity as contradiction.
#[derive(Default)]
pub struct HeuristicNli;

impl HeuristicNli {
    pub fn new() -> Self {
        Self
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl Classifier for HeuristicNli {
    fn model_id(&self) -> &str { "heuristic-nli" }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(text.split_whitespace().count())
    }

    fn classify(&self, premise: &str, hypothesis: &str) -> Result<NliProbs> {
        let premise_words = words(premise);
        let premise_set: HashSet<&str> = premise_words.iter().map(String::as_str).collect();
        let hyp_words = words(hypothesis);
        let content: Vec<&str> = hyp_words
            .iter()
            .map(String::as_str)
            .filter(|w| w.len() > 3 && !NEGATIONS.contains(w))
            .collect();
        let overlap = if content.is_empty() {
            0.0
        } else {
            content.iter().filter(|w| premise_set.contains(*w)).count() as f32 / content.len() as f32
        };
        let negated = |ws: &[String]| ws.iter().any(|w| NEGATIONS.contains(&w.as_str()));
        let flipped = negated(&premise_words) != negated(&hyp_words);
        let signal = 4.0 * overlap;
        let logits = if flipped { [signal, 1.0, 0.0] } else { [0.0, 1.0, signal] };
        Ok(NliProbs::from_logits(logits))
    }
}
