use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use casedb_core::config::StanceSettings;
use casedb_core::traits::Classifier;
use casedb_core::types::NliProbs;
use casedb_core::{AbortSignal, ErrorKind};
use casedb_stance::{StanceClassifier, StanceLabel};

/// Whitespace token counter whose verdict depends on marker words in the window.
#[derive(Default)]
struct ScriptedNli {
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl Classifier for ScriptedNli {
    fn model_id(&self) -> &str { "scripted" }

    fn count_tokens(&self, text: &str) -> anyhow::Result<usize> {
        Ok(text.split_whitespace().count())
    }

    fn classify(&self, premise: &str, _hypothesis: &str) -> anyhow::Result<NliProbs> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(premise.to_string());
        let p = |contradiction, neutral, entailment| NliProbs { contradiction, neutral, entailment };
        Ok(if premise.contains("BROKEN") {
            anyhow::bail!("backend timeout")
        } else if premise.contains("STRONG") {
            p(0.05, 0.05, 0.9)
        } else if premise.contains("AGREE") {
            p(0.1, 0.2, 0.7)
        } else if premise.contains("DENY") {
            p(0.8, 0.15, 0.05)
        } else {
            p(0.1, 0.8, 0.1)
        })
    }
}

fn settings(max_tokens: usize) -> StanceSettings {
    StanceSettings { max_tokens, snippet_chars: 500, ..StanceSettings::default() }
}

fn classifier(max_tokens: usize) -> (Arc<ScriptedNli>, StanceClassifier) {
    let nli = Arc::new(ScriptedNli::default());
    (nli.clone(), StanceClassifier::new(nli, settings(max_tokens)))
}

#[test]
fn short_premise_is_one_window_equal_to_itself() {
    let (nli, stance) = classifier(450);
    let premise = "The tribunal  finds   the claim AGREE with the record.\nNo further issues arise.";
    let score = stance.score(premise, "the claim holds", &AbortSignal::new()).unwrap();
    assert_eq!(score.windows, 1);
    assert_eq!(nli.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        nli.seen.lock().unwrap()[0],
        "The tribunal finds the claim AGREE with the record. No further issues arise."
    );
    assert_eq!(score.entailment, 0.7);
    assert_eq!(score.contradiction, 0.1);
}

#[test]
fn windows_flush_before_exceeding_the_budget() {
    let (_, stance) = classifier(6);
    let windows = stance.windows("One two three. Four five six. Seven eight. Nine ten eleven twelve thirteen fourteen fifteen.").unwrap();
    assert_eq!(
        windows,
        [
            "One two three. Four five six.",
            "Seven eight.",
            "Nine ten eleven twelve thirteen fourteen fifteen.",
        ],
        "an oversized sentence still forms its own window"
    );
}

#[test]
fn aggregation_takes_maxima_and_keeps_first_snippet() {
    let (_, stance) = classifier(3);
    let premise = "Opening words here. The claimant DENY it. Then STRONG proof. Later STRONG again.";
    let score = stance.score(premise, "h", &AbortSignal::new()).unwrap();
    assert_eq!(score.windows, 4);
    assert_eq!(score.entailment, 0.9);
    assert_eq!(score.contradiction, 0.8);
    assert!((score.neutral - 0.1).abs() < 1e-6);
    assert_eq!(score.support_snippet, "Then STRONG proof.");
    assert_eq!(score.oppose_snippet, "The claimant DENY it.");
    assert_eq!(stance.label(&score), StanceLabel::Support);
}

#[test]
fn neutral_is_derived_and_never_negative() {
    let (_, stance) = classifier(450);
    let score = stance.score("Nothing of note.", "h", &AbortSignal::new()).unwrap();
    assert!((score.neutral - 0.9).abs() < 1e-6);
    assert_eq!(stance.label(&score), StanceLabel::Neutral);
    assert!(score.neutral >= 0.0);
}

#[test]
fn snippets_are_truncated() {
    let nli = Arc::new(ScriptedNli::default());
    let stance = StanceClassifier::new(nli, StanceSettings { snippet_chars: 12, ..StanceSettings::default() });
    let score = stance.score("Évidence STRONG in favour of the claimant.", "h", &AbortSignal::new()).unwrap();
    assert_eq!(score.support_snippet, "Évidence STR");
    assert_eq!(score.support_snippet.chars().count(), 12);
}

#[test]
fn empty_premise_is_malformed() {
    let (nli, stance) = classifier(450);
    for premise in ["", "   \n\t "] {
        let err = stance.score(premise, "h", &AbortSignal::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }
    assert_eq!(nli.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn backend_failure_is_model_unavailable() {
    let (_, stance) = classifier(450);
    let err = stance.score("This window is BROKEN.", "h", &AbortSignal::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
}

#[test]
fn abort_stops_classification() {
    let (nli, stance) = classifier(2);
    let abort = AbortSignal::new();
    abort.abort();
    let err = stance.score("One two. Three four. Five six.", "h", &abort).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(nli.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn score_serializes_with_snake_case_fields() {
    let (_, stance) = classifier(450);
    let score = stance.score("They AGREE.", "h", &AbortSignal::new()).unwrap();
    let json = serde_json::to_value(&score).unwrap();
    assert_eq!(json["windows"], 1);
    assert_eq!(json["support_snippet"], "They AGREE.");
}
