use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use casedb_core::config::StanceSettings;
use casedb_core::traits::Classifier;
use casedb_core::types::NliProbs;
use casedb_core::{AbortSignal, Error, Result};

use crate::label::{LabelPolicy, StanceLabel};
use crate::window::{normalize_whitespace, pack_windows, split_sentences, truncate_chars};

/// Document-level stance: the strongest entailment and contradiction found in
/// any window, with the window text that produced each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanceScore {
    pub entailment: f32,
    pub contradiction: f32,
    /// `max(0, 1 - max(entailment, contradiction))`
    pub neutral: f32,
    pub support_snippet: String,
    pub oppose_snippet: String,
    pub windows: usize,
}

pub struct StanceClassifier {
    backend: Arc<dyn Classifier>,
    settings: StanceSettings,
}

impl StanceClassifier {
    pub fn new(backend: Arc<dyn Classifier>, settings: StanceSettings) -> Self {
        Self { backend, settings }
    }

    pub fn policy(&self) -> LabelPolicy {
        LabelPolicy::from(&self.settings)
    }

    pub fn settings(&self) -> &StanceSettings {
        &self.settings
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    /// Sentence-aligned windows of `premise` within the token budget.
    pub fn windows(&self, premise: &str) -> Result<Vec<String>> {
        let text = normalize_whitespace(premise);
        if text.is_empty() {
            return Err(Error::MalformedInput("empty premise".into()));
        }
        let sentences = split_sentences(&text);
        pack_windows(&sentences, self.settings.max_tokens, |s| self.backend.count_tokens(s)).map_err(Error::model)
    }

    pub fn score(&self, premise: &str, hypothesis: &str, abort: &AbortSignal) -> Result<StanceScore> {
        let windows = self.windows(premise)?;
        let probs: Vec<NliProbs> = windows
            .par_iter()
            .map(|w| {
                abort.check()?;
                self.backend.classify(w, hypothesis).map_err(Error::model)
            })
            .collect::<Result<_>>()?;

        // First window reaching each maximum wins.
        let (mut entailment, mut e_idx) = (f32::NEG_INFINITY, 0);
        let (mut contradiction, mut c_idx) = (f32::NEG_INFINITY, 0);
        for (i, p) in probs.iter().enumerate() {
            if p.entailment > entailment {
                entailment = p.entailment;
                e_idx = i;
            }
            if p.contradiction > contradiction {
                contradiction = p.contradiction;
                c_idx = i;
            }
        }
        let neutral = (1.0 - entailment.max(contradiction)).max(0.0);
        debug!(windows = windows.len(), entailment, contradiction, "premise scored");

        let snippet_chars = self.settings.snippet_chars;
        Ok(StanceScore {
            entailment,
            contradiction,
            neutral,
            support_snippet: truncate_chars(&windows[e_idx], snippet_chars),
            oppose_snippet: truncate_chars(&windows[c_idx], snippet_chars),
            windows: windows.len(),
        })
    }

    pub fn label(&self, score: &StanceScore) -> StanceLabel {
        self.policy().label(score.entailment, score.contradiction)
    }
}
