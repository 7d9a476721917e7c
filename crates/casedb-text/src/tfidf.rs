use std::collections::HashMap;

use tantivy::tokenizer::{TextAnalyzer, TokenStream};

use casedb_core::config::TfIdfSettings;

use crate::tantivy_utils::english_analyzer;

/// Cosine similarity over L2-normalized TF-IDF vectors.
///
/// Vocabulary is fixed at build time: unigrams (and optionally adjacent-word
/// bigrams) that occur in at least `min_df` documents and in no more than
/// `max_df` of them. Idf is smoothed: `ln((1 + n) / (1 + df)) + 1`.
pub struct TfIdfIndex {
    analyzer: TextAnalyzer,
    bigrams: bool,
    vocab: HashMap<String, usize>,
    idf: Vec<f32>,
    /// Sparse, normalized document vectors sorted by term id.
    rows: Vec<Vec<(usize, f32)>>,
}

impl TfIdfIndex {
    pub fn build(texts: &[String], settings: &TfIdfSettings) -> Self {
        let mut analyzer = english_analyzer();
        let docs: Vec<Vec<String>> = texts.iter().map(|t| terms(&mut analyzer, t, settings.bigrams)).collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            let mut seen: Vec<&str> = doc.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let n = docs.len();
        let max_count = settings.max_df * n as f32;
        let mut kept: Vec<(&str, usize)> = df
            .into_iter()
            .filter(|(_, count)| *count >= settings.min_df && (*count as f32) <= max_count)
            .collect();
        // Sorted vocabulary keeps term ids stable across builds.
        kept.sort_unstable();
        let mut vocab = HashMap::with_capacity(kept.len());
        let mut idf = Vec::with_capacity(kept.len());
        for (id, (term, count)) in kept.into_iter().enumerate() {
            vocab.insert(term.to_string(), id);
            idf.push(((1.0 + n as f32) / (1.0 + count as f32)).ln() + 1.0);
        }

        let mut index = Self { analyzer, bigrams: settings.bigrams, vocab, idf, rows: Vec::new() };
        let rows = docs.iter().map(|doc| index.vectorize(doc)).collect();
        index.rows = rows;
        index
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn vocab_len(&self) -> usize {
        self.vocab.len()
    }

    /// Rows with positive similarity to `query`, best first, ties by row.
    pub fn search(&self, query: &str, k: usize) -> Vec<(usize, f32)> {
        let mut analyzer = self.analyzer.clone();
        let q = self.vectorize(&terms(&mut analyzer, query, self.bigrams));
        if q.is_empty() || k == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(usize, f32)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(row, vec)| (row, sparse_dot(&q, vec)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }

    fn vectorize(&self, doc: &[String]) -> Vec<(usize, f32)> {
        let mut tf: HashMap<usize, f32> = HashMap::new();
        for term in doc {
            if let Some(&id) = self.vocab.get(term) {
                *tf.entry(id).or_insert(0.0) += 1.0;
            }
        }
        let mut vec: Vec<(usize, f32)> = tf.into_iter().map(|(id, count)| (id, count * self.idf[id])).collect();
        vec.sort_unstable_by_key(|(id, _)| *id);
        let norm = vec.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut vec {
                *w /= norm;
            }
        }
        vec
    }
}

fn terms(analyzer: &mut TextAnalyzer, text: &str, bigrams: bool) -> Vec<String> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut words = Vec::new();
    let mut stream = analyzer.token_stream(&normalized);
    while stream.advance() {
        words.push(stream.token().text.clone());
    }
    if bigrams {
        let pairs: Vec<String> = words.windows(2).map(|w| format!("{} {}", w[0], w[1])).collect();
        words.extend(pairs);
    }
    words
}

fn sparse_dot(a: &[(usize, f32)], b: &[(usize, f32)]) -> f32 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}
