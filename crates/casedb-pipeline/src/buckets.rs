use serde::Serialize;

use casedb_core::types::SearchHit;
use casedb_core::ErrorReport;
use casedb_stance::{StanceLabel, StanceScore};

/// One retrieved chunk with its stance verdict.
///
/// A classification failure is reported as `label = neutral`, no score, and
/// the error that caused it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StanceHit {
    #[serde(flatten)]
    pub hit: SearchHit,
    pub label: StanceLabel,
    pub score: Option<StanceScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl StanceHit {
    pub fn entailment(&self) -> f32 {
        self.score.as_ref().map_or(0.0, |s| s.entailment)
    }

    pub fn contradiction(&self) -> f32 {
        self.score.as_ref().map_or(0.0, |s| s.contradiction)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StanceBuckets {
    pub support: Vec<StanceHit>,
    pub oppose: Vec<StanceHit>,
    pub neutral: Vec<StanceHit>,
    /// Hits whose classification failed; they are counted here and listed
    /// under `neutral`.
    pub errors: usize,
    pub retrieved: usize,
}

impl StanceBuckets {
    /// Partition hits (in retrieval order), rank each side by its own
    /// probability and keep at most `topn` per bucket.
    pub fn partition(hits: Vec<StanceHit>, topn: usize) -> Self {
        let mut buckets = StanceBuckets { retrieved: hits.len(), ..Default::default() };
        for hit in hits {
            if hit.error.is_some() {
                buckets.errors += 1;
            }
            match hit.label {
                StanceLabel::Support => buckets.support.push(hit),
                StanceLabel::Oppose => buckets.oppose.push(hit),
                StanceLabel::Neutral => buckets.neutral.push(hit),
            }
        }
        // Stable sorts: retrieval order breaks ties.
        buckets.support.sort_by(|a, b| b.entailment().total_cmp(&a.entailment()));
        buckets.oppose.sort_by(|a, b| b.contradiction().total_cmp(&a.contradiction()));
        buckets.support.truncate(topn);
        buckets.oppose.truncate(topn);
        buckets.neutral.truncate(topn);
        buckets
    }
}
