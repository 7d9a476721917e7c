use casedb_core::traits::Classifier;
use casedb_models::{HeuristicNli, LabelOrder};

#[test]
fn heuristic_nli_reads_overlap_and_polarity() {
    let nli = HeuristicNli::new();
    let hypothesis = "The tribunal has jurisdiction over environmental counterclaims.";

    let support = nli
        .classify("The tribunal held it has jurisdiction over the environmental counterclaims.", hypothesis)
        .unwrap();
    assert!(support.entailment > 0.6, "{support:?}");

    let oppose = nli
        .classify("The tribunal has no jurisdiction over environmental counterclaims.", hypothesis)
        .unwrap();
    assert!(oppose.contradiction > 0.6, "{oppose:?}");

    let unrelated = nli.classify("Costs were split evenly.", hypothesis).unwrap();
    assert!(unrelated.entailment < 0.6 && unrelated.contradiction < 0.6);
    let total = unrelated.entailment + unrelated.neutral + unrelated.contradiction;
    assert!((total - 1.0).abs() < 1e-5);
}

#[test]
fn heuristic_nli_counts_whitespace_tokens() {
    assert_eq!(HeuristicNli::new().count_tokens("one two  three").unwrap(), 3);
}

#[test]
fn label_order_follows_id2label() {
    let raw = serde_json::json!({"id2label": {"0": "ENTAILMENT", "1": "neutral", "2": "contradiction"}});
    let order = LabelOrder::from_config(&raw).unwrap();
    assert_eq!(order, LabelOrder { contradiction: 2, neutral: 1, entailment: 0 });
    assert_eq!(LabelOrder::from_config(&serde_json::json!({})).unwrap(), LabelOrder::default());
    assert!(LabelOrder::from_config(&serde_json::json!({"id2label": {"0": "LABEL_0"}})).is_err());
}
