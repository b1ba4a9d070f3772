//! Weighted-sum fusion: `score = α · lex_norm + (1 − α) · vec_norm`.
//!
//! Lexical scores are normalized by the top score of the result set; vector
//! similarities are already in [0, 1]. An id present in only one list gets
//! 0 for the missing component. Ties break by the higher individual
//! component, then by id ascending.

use std::collections::HashMap;

/// A candidate after fusion, with per-source provenance.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub id: i64,
    pub score: f32,
    /// Raw BM25 score (positive), when the id was in the lexical list.
    pub lexical_raw: Option<f64>,
    /// BM25 normalized by the list's top score.
    pub lexical_norm: Option<f32>,
    /// Cosine similarity, when the id was in the vector list.
    pub vector_sim: Option<f32>,
}

impl FusedCandidate {
    fn max_component(&self) -> f32 {
        self.lexical_norm
            .unwrap_or(0.0)
            .max(self.vector_sim.unwrap_or(0.0))
    }
}

/// Fuse a lexical and a vector ranking. Either list may be empty.
pub fn fuse(lexical: &[(i64, f64)], vector: &[(i64, f32)], alpha: f32) -> Vec<FusedCandidate> {
    let top = lexical.first().map(|(_, s)| *s).unwrap_or(0.0);

    let mut by_id: HashMap<i64, FusedCandidate> = HashMap::new();
    for (id, raw) in lexical {
        let norm = if top > 0.0 { (raw / top) as f32 } else { 0.0 };
        by_id.insert(
            *id,
            FusedCandidate {
                id: *id,
                score: 0.0,
                lexical_raw: Some(*raw),
                lexical_norm: Some(norm),
                vector_sim: None,
            },
        );
    }
    for (id, sim) in vector {
        by_id
            .entry(*id)
            .or_insert_with(|| FusedCandidate {
                id: *id,
                score: 0.0,
                lexical_raw: None,
                lexical_norm: None,
                vector_sim: None,
            })
            .vector_sim = Some(sim.clamp(0.0, 1.0));
    }

    let mut candidates: Vec<FusedCandidate> = by_id
        .into_values()
        .map(|mut c| {
            c.score = alpha * c.lexical_norm.unwrap_or(0.0)
                + (1.0 - alpha) * c.vector_sim.unwrap_or(0.0);
            c
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.max_component()
                    .partial_cmp(&a.max_component())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then(a.id.cmp(&b.id))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_top_normalizes_to_one() {
        let fused = fuse(&[(1, 8.0), (2, 4.0)], &[], 0.5);
        assert_eq!(fused[0].id, 1);
        assert!((fused[0].lexical_norm.unwrap() - 1.0).abs() < 1e-6);
        assert!((fused[1].lexical_norm.unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn missing_component_counts_as_zero() {
        let fused = fuse(&[(1, 10.0)], &[(2, 1.0)], 0.5);
        let a = fused.iter().find(|c| c.id == 1).unwrap();
        let b = fused.iter().find(|c| c.id == 2).unwrap();
        assert!((a.score - 0.5).abs() < 1e-6);
        assert!((b.score - 0.5).abs() < 1e-6);
        assert!(a.vector_sim.is_none());
        assert!(b.lexical_norm.is_none());
    }

    #[test]
    fn both_components_sum() {
        let fused = fuse(&[(7, 10.0)], &[(7, 0.8)], 0.5);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn exact_ties_break_by_id_ascending() {
        let fused = fuse(&[(9, 5.0), (3, 5.0)], &[], 0.5);
        assert_eq!(fused[0].id, 3);
        assert_eq!(fused[1].id, 9);
    }

    #[test]
    fn equal_score_prefers_higher_single_component() {
        // id 1: lex 1.0, vec 0.0 → score 0.5, max component 1.0
        // id 2: lex 0.5, vec 0.5 → score 0.5, max component 0.5
        let fused = fuse(&[(1, 10.0), (2, 5.0)], &[(2, 0.5)], 0.5);
        assert!((fused[0].score - fused[1].score).abs() < 1e-6);
        assert_eq!(fused[0].id, 1);
    }

    #[test]
    fn alpha_weights_components() {
        let fused = fuse(&[(1, 10.0)], &[(2, 1.0)], 0.25);
        let lex_only = fused.iter().find(|c| c.id == 1).unwrap();
        let vec_only = fused.iter().find(|c| c.id == 2).unwrap();
        assert!((lex_only.score - 0.25).abs() < 1e-6);
        assert!((vec_only.score - 0.75).abs() < 1e-6);
    }
}
