use casedb_core::traits::VectorBackend;
use casedb_vector::LanceVectorIndex;

fn unit(v: [f32; 3]) -> Vec<f32> {
    let n = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / n).collect()
}

#[test]
fn rows_are_assigned_in_insertion_order() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().join("vectors");
    let mut index = LanceVectorIndex::create(&dir, 3)?;
    assert_eq!(index.len()?, 0);
    assert!(index.search(&[1.0, 0.0, 0.0], 5)?.is_empty());

    index.add(&[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]])?;
    index.add(&[vec![0.0, 0.0, 1.0]])?;
    assert_eq!(index.len()?, 3);

    let hits = index.search(&[0.0, 0.0, 1.0], 3)?;
    assert_eq!(hits[0].0, 2);
    assert!((hits[0].1 - 1.0).abs() < 1e-5);
    assert!(hits[1..].iter().all(|(_, s)| s.abs() < 1e-5), "orthogonal rows score zero: {hits:?}");
    Ok(())
}

#[test]
fn search_orders_by_similarity_and_respects_k() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = LanceVectorIndex::create(tmp.path(), 3)?;
    index.add(&[unit([1.0, 0.0, 0.0]), unit([1.0, 1.0, 0.0]), unit([0.0, 1.0, 0.0]), unit([1.0, 0.1, 0.0])])?;

    let hits = index.search(&[1.0, 0.0, 0.0], 2)?;
    let rows: Vec<usize> = hits.iter().map(|(r, _)| *r).collect();
    assert_eq!(rows, [0, 3]);
    assert!(hits[0].1 >= hits[1].1);
    assert!(index.search(&[1.0, 0.0, 0.0], 0)?.is_empty());

    let all = index.search(&[1.0, 0.0, 0.0], usize::MAX)?;
    assert_eq!(all.len(), 4, "k beyond the row count returns every row");
    assert_eq!(all[..2], hits[..]);
    Ok(())
}

#[test]
fn reopen_restores_dim_and_rows() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    {
        let mut index = LanceVectorIndex::create(tmp.path(), 3)?;
        index.add(&[vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]])?;
    }
    let mut index = LanceVectorIndex::open(tmp.path())?;
    assert_eq!(index.dim(), 3);
    assert_eq!(index.len()?, 2);
    assert!(!index.is_indexed());

    // Appends after reopen continue the row numbering.
    index.add(&[vec![1.0, 0.0, 0.0]])?;
    assert_eq!(index.search(&[1.0, 0.0, 0.0], 1)?[0].0, 2);
    Ok(())
}

#[test]
fn wrong_width_is_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = LanceVectorIndex::create(tmp.path(), 3)?;
    assert!(index.add(&[vec![1.0, 0.0]]).is_err());
    assert_eq!(index.len()?, 0);
    index.add(&[vec![1.0, 0.0, 0.0]])?;
    assert!(index.search(&[1.0, 0.0, 0.0, 0.0], 1).is_err());
    Ok(())
}

#[test]
fn optimize_waits_for_enough_rows() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = LanceVectorIndex::create(tmp.path(), 3)?;
    index.add(&vec![vec![1.0, 0.0, 0.0]; 8])?;
    assert!(!index.optimize(4)?, "below the PQ training floor");
    assert!(!index.is_indexed());
    Ok(())
}

/// Rows spread over the first half of the dimensions, with a faint second half.
fn training_vector(i: usize, dim: usize) -> Vec<f32> {
    let v: Vec<f32> = (0..dim)
        .map(|j| {
            if j < dim / 2 {
                1.0 + ((i * 7 + j * 13) % 29) as f32 / 29.0
            } else {
                ((i * 3 + j * 5) % 11) as f32 / 110.0
            }
        })
        .collect();
    let n = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.into_iter().map(|x| x / n).collect()
}

#[test]
fn trained_index_still_finds_rows_appended_later() -> anyhow::Result<()> {
    let dim = 64;
    let tmp = tempfile::tempdir()?;
    let mut index = LanceVectorIndex::create(tmp.path(), dim)?;
    let vectors: Vec<Vec<f32>> = (0..300).map(|i| training_vector(i, dim)).collect();
    index.add(&vectors)?;

    assert!(index.optimize(256)?);
    assert!(index.is_indexed());
    assert!(!index.optimize(256)?, "an index is trained once");

    let late: Vec<f32> = (0..dim).map(|j| if j < dim / 2 { 0.0 } else { 1.0 }).collect();
    index.add(&[late.clone()])?;
    assert_eq!(index.len()?, 301);
    let hits = index.search(&late, 5)?;
    assert_eq!(hits[0].0, 300);
    assert!((hits[0].1 - 1.0).abs() < 1e-4);

    let reopened = LanceVectorIndex::open(tmp.path())?;
    assert!(reopened.is_indexed());
    assert_eq!(reopened.search(&late, 1)?[0].0, 300);
    Ok(())
}

#[test]
fn open_missing_store_fails() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(LanceVectorIndex::open(&tmp.path().join("nope")).is_err());
}
