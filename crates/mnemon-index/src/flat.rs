//! In-process brute-force cosine index. The reference backend: its ranking
//! on a given (corpus, query) defines the contract every backend must meet.

use std::collections::HashMap;

use mnemon_core::errors::IndexError;
use mnemon_core::models::IndexStats;
use mnemon_core::traits::{QueryOpts, VectorIndex};
use mnemon_core::MnemonResult;

/// L2-normalize a vector. Zero vectors stay zero.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Vectors stored contiguously row-major; queries are dot-product scans
/// (rows are pre-normalized, so dot product equals cosine).
pub struct FlatIndex {
    dims: usize,
    ids: Vec<i64>,
    data: Vec<f32>,
    rows: HashMap<i64, usize>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            ids: Vec::new(),
            data: Vec::new(),
            rows: HashMap::new(),
        }
    }

    fn check_dims(&self, vector: &[f32]) -> MnemonResult<()> {
        if vector.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                got: vector.len(),
            }
            .into());
        }
        Ok(())
    }

    fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.dims..(index + 1) * self.dims]
    }
}

impl VectorIndex for FlatIndex {
    fn init(&mut self) -> MnemonResult<()> {
        Ok(())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn add(&mut self, id: i64, vector: &[f32]) -> MnemonResult<()> {
        self.check_dims(vector)?;
        let normalized = normalize(vector);
        match self.rows.get(&id) {
            Some(&row) => {
                self.data[row * self.dims..(row + 1) * self.dims].copy_from_slice(&normalized);
            }
            None => {
                self.rows.insert(id, self.ids.len());
                self.ids.push(id);
                self.data.extend_from_slice(&normalized);
            }
        }
        Ok(())
    }

    fn remove(&mut self, id: i64) -> MnemonResult<()> {
        let Some(row) = self.rows.remove(&id) else {
            return Ok(());
        };
        let last = self.ids.len() - 1;
        if row != last {
            let moved_id = self.ids[last];
            self.ids.swap(row, last);
            let (head, tail) = self.data.split_at_mut(last * self.dims);
            head[row * self.dims..(row + 1) * self.dims]
                .copy_from_slice(&tail[..self.dims]);
            self.rows.insert(moved_id, row);
        }
        self.ids.pop();
        self.data.truncate(last * self.dims);
        Ok(())
    }

    fn query(&self, vector: &[f32], opts: QueryOpts) -> MnemonResult<Vec<(i64, f32)>> {
        self.check_dims(vector)?;
        let q = normalize(vector);

        let mut scored: Vec<(i64, f32)> = self
            .ids
            .iter()
            .enumerate()
            .map(|(row, &id)| {
                let sim: f32 = self.row(row).iter().zip(q.iter()).map(|(a, b)| a * b).sum();
                (id, sim)
            })
            .filter(|(_, sim)| *sim > opts.threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(opts.k);
        Ok(scored)
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            count: self.ids.len(),
            dimensions: self.dims,
            backend: "flat".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dims: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dims];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn self_query_ranks_first_with_unit_similarity() {
        let mut index = FlatIndex::new(4);
        for i in 0..4 {
            index.add(i as i64, &unit(4, i)).unwrap();
        }
        let hits = index.query(&unit(4, 2), QueryOpts::top_k(2)).unwrap();
        assert_eq!(hits[0].0, 2);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unnormalized_input_is_normalized_on_add() {
        let mut index = FlatIndex::new(3);
        index.add(1, &[10.0, 0.0, 0.0]).unwrap();
        let hits = index.query(&[0.5, 0.0, 0.0], QueryOpts::top_k(1)).unwrap();
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn threshold_filters_and_ties_break_by_id() {
        let mut index = FlatIndex::new(2);
        index.add(9, &[1.0, 0.0]).unwrap();
        index.add(3, &[1.0, 0.0]).unwrap();
        index.add(5, &[0.0, 1.0]).unwrap();

        let hits = index.query(&[1.0, 0.0], QueryOpts { k: 10, threshold: 0.5 }).unwrap();
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![3, 9]);
    }

    #[test]
    fn add_is_upsert() {
        let mut index = FlatIndex::new(2);
        index.add(1, &[1.0, 0.0]).unwrap();
        index.add(1, &[0.0, 1.0]).unwrap();
        assert_eq!(index.stats().count, 1);
        let hits = index.query(&[0.0, 1.0], QueryOpts::top_k(1)).unwrap();
        assert_eq!(hits[0].0, 1);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn remove_keeps_remaining_rows_queryable() {
        let mut index = FlatIndex::new(3);
        index.add(1, &unit(3, 0)).unwrap();
        index.add(2, &unit(3, 1)).unwrap();
        index.add(3, &unit(3, 2)).unwrap();
        index.remove(1).unwrap();
        index.remove(42).unwrap(); // absent id is a no-op

        assert_eq!(index.stats().count, 2);
        let hits = index.query(&unit(3, 2), QueryOpts::top_k(1)).unwrap();
        assert_eq!(hits[0].0, 3);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = FlatIndex::new(4);
        assert!(index.add(1, &[1.0, 0.0]).is_err());
        assert!(index.query(&[1.0], QueryOpts::top_k(1)).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// A stored vector queried against itself scores 1 within 1e-6.
            #[test]
            fn self_similarity_is_one(raw in proptest::collection::vec(-100.0f32..100.0, 8)) {
                prop_assume!(raw.iter().any(|x| x.abs() > 1e-3));
                let mut index = FlatIndex::new(8);
                index.add(1, &raw).unwrap();
                let hits = index.query(&raw, QueryOpts::top_k(1)).unwrap();
                prop_assert_eq!(hits[0].0, 1);
                prop_assert!((hits[0].1 - 1.0).abs() < 1e-6);
            }

            /// Normalization always yields a unit (or zero) vector.
            #[test]
            fn normalize_is_unit_or_zero(raw in proptest::collection::vec(-50.0f32..50.0, 1..32)) {
                let v = normalize(&raw);
                let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                prop_assert!(norm < 1e-6 || (norm - 1.0).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn ten_thousand_vectors_rank_self_first() {
        let dims = 384;
        let mut index = FlatIndex::new(dims);
        // Deterministic pseudo-random corpus (xorshift).
        let mut state = 0x9e3779b97f4a7c15u64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        let mut probe = Vec::new();
        for id in 0..10_000i64 {
            let v: Vec<f32> = (0..dims)
                .map(|_| ((next() % 2000) as f32 / 1000.0) - 1.0)
                .collect();
            if id == 4321 {
                probe = v.clone();
            }
            index.add(id, &v).unwrap();
        }
        let hits = index.query(&probe, QueryOpts::top_k(5)).unwrap();
        assert_eq!(hits[0].0, 4321);
        assert!(hits[0].1 >= 0.9999);
    }
}
