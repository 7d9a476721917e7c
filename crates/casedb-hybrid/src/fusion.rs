//! Reciprocal rank fusion.
//!
//! A row at 1-indexed rank `r` in a list contributes `1 / (rrf_k + r)`; a
//! row's fused score is the sum over every list it appears in. Rows that
//! appear in no list are never produced.

use std::collections::HashMap;

/// Fuse ranked row lists and return the `topn` best `(row, score)` pairs.
///
/// Equal scores are ordered by the row's id in `ids` (byte-wise ascending),
/// so the output depends only on the inputs, not on hash order.
pub fn fuse<S: AsRef<str>>(lists: &[&[usize]], rrf_k: f64, ids: &[S], topn: usize) -> Vec<(usize, f64)> {
    let mut scores: HashMap<usize, f64> = HashMap::new();
    for list in lists {
        for (rank, &row) in list.iter().enumerate() {
            *scores.entry(row).or_insert(0.0) += 1.0 / (rrf_k + (rank + 1) as f64);
        }
    }
    let id_of = |row: usize| ids.get(row).map(|s| s.as_ref().as_bytes()).unwrap_or_default();
    let mut fused: Vec<(usize, f64)> = scores.into_iter().collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| id_of(a.0).cmp(id_of(b.0))).then(a.0.cmp(&b.0)));
    fused.truncate(topn);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDS: [&str; 5] = ["a", "b", "c", "d", "e"];

    #[test]
    fn contributions_follow_the_formula() {
        let fused = fuse(&[&[2, 0], &[0, 4]], 60.0, &IDS, 10);
        let score = |row| fused.iter().find(|(r, _)| *r == row).map(|(_, s)| *s).unwrap();
        assert_eq!(score(0), 1.0 / 62.0 + 1.0 / 61.0);
        assert_eq!(score(2), 1.0 / 61.0);
        assert_eq!(score(4), 1.0 / 62.0);
        assert_eq!(fused.len(), 3, "rows in neither list are absent");
        assert_eq!(fused[0].0, 0);
    }

    #[test]
    fn ties_break_on_id_not_row() {
        let ids = ["zeta", "alpha"];
        let fused = fuse(&[&[0], &[1]], 60.0, &ids, 10);
        assert_eq!(fused[0].1, fused[1].1);
        assert_eq!(fused.iter().map(|(r, _)| *r).collect::<Vec<_>>(), [1, 0]);
    }

    #[test]
    fn topn_is_a_prefix_of_a_larger_topn() {
        let lists: [&[usize]; 2] = [&[3, 1, 4, 0], &[2, 4, 1]];
        let all = fuse(&lists, 10.0, &IDS, 10);
        for n in 0..=all.len() {
            assert_eq!(fuse(&lists, 10.0, &IDS, n), all[..n]);
        }
    }

    #[test]
    fn zero_k_uses_plain_reciprocal_ranks() {
        let fused = fuse(&[&[1, 0]], 0.0, &IDS, 10);
        assert_eq!(fused, [(1, 1.0), (0, 0.5)]);
    }
}
