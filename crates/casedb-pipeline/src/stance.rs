use rayon::prelude::*;
use tracing::{info, warn};

use casedb_core::types::SearchHit;
use casedb_core::{AbortSignal, Error, Result};
use casedb_stance::{StanceClassifier, StanceLabel};

use crate::buckets::{StanceBuckets, StanceHit};
use crate::retriever::Retriever;

/// Retrieve candidates for an issue and sort them by stance.
///
/// Read-only: nothing here writes to an index.
pub struct StancePipeline {
    retriever: Box<dyn Retriever>,
    classifier: StanceClassifier,
}

impl StancePipeline {
    pub fn new(retriever: Box<dyn Retriever>, classifier: StanceClassifier) -> Self {
        Self { retriever, classifier }
    }

    pub fn run(&self, issue_query: &str, stance: &str, abort: &AbortSignal) -> Result<StanceBuckets> {
        abort.check()?;
        let settings = self.classifier.settings();
        let hits = self.retriever.retrieve(issue_query, settings.topk_retrieval)?;

        let judged: Vec<StanceHit> = hits
            .into_par_iter()
            .map(|hit| {
                abort.check()?;
                self.judge(hit, stance, abort)
            })
            .collect::<Result<_>>()?;

        let buckets = StanceBuckets::partition(judged, settings.topn_return);
        info!(
            retrieved = buckets.retrieved,
            support = buckets.support.len(),
            oppose = buckets.oppose.len(),
            neutral = buckets.neutral.len(),
            errors = buckets.errors,
            "stance run finished"
        );
        Ok(buckets)
    }

    fn judge(&self, hit: SearchHit, stance: &str, abort: &AbortSignal) -> Result<StanceHit> {
        match self.classifier.score(&hit.content, stance, abort) {
            Ok(score) => {
                let label = self.classifier.label(&score);
                Ok(StanceHit { hit, label, score: Some(score), error: None })
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                warn!(chunk = %hit.chunk_id, error = %e, "classification failed");
                Ok(StanceHit { hit, label: StanceLabel::Neutral, score: None, error: Some(e.report()) })
            }
        }
    }
}
