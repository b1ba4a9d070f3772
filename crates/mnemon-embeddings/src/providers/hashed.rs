//! Deterministic feature-hashing embedder, the guaranteed in-process
//! provider.
//!
//! Text is projected into a fixed-dimension signed feature space. Each
//! feature (a word, an identifier fragment, or an adjacent pair) is mapped
//! to a bucket and a sign by the same SHA-256 primitive the engine uses
//! for content identity, weighted with sublinear term frequency, then
//! L2-normalized. Identifier-aware: `parseConfigFile` and
//! `parse_config_file` share fragment features, which is what code search
//! needs from a lexical-ish vector space.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use mnemon_core::traits::EmbeddingProvider;
use mnemon_core::MnemonResult;

use crate::l2_normalize;

/// Adjacent-pair features carry phrase signal at reduced weight so they
/// refine, never dominate, the unigram space.
const PAIR_WEIGHT: f32 = 0.5;

pub struct HashedEmbedder {
    dimensions: usize,
}

impl HashedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Bucket and sign for one feature, both taken from the feature's
    /// digest: bytes 0..8 select the bucket, byte 8 the sign.
    fn slot(&self, feature: &str) -> (usize, f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_be_bytes(word) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vec![0.0; self.dimensions];
        }

        let mut counts: HashMap<String, (u32, f32)> = HashMap::new();
        for token in &tokens {
            counts.entry(token.clone()).or_insert((0, 1.0)).0 += 1;
        }
        for pair in tokens.windows(2) {
            counts
                .entry(format!("{}\u{1f}{}", pair[0], pair[1]))
                .or_insert((0, PAIR_WEIGHT))
                .0 += 1;
        }

        let mut vec = vec![0.0f32; self.dimensions];
        for (feature, (count, base)) in &counts {
            // Sublinear TF: repetition saturates instead of dominating.
            let tf = 1.0 + (*count as f32).ln();
            let (bucket, sign) = self.slot(feature);
            vec[bucket] += sign * base * tf;
        }

        l2_normalize(&mut vec);
        vec
    }
}

/// Lowercased word tokens. Identifiers are additionally broken at
/// underscores and case boundaries, keeping the whole identifier as a
/// feature of its own when fragments were produced.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        if raw.chars().count() < 2 {
            continue;
        }
        let fragments = split_identifier(raw);
        if fragments.len() > 1 {
            tokens.push(raw.to_lowercase());
        }
        for fragment in fragments {
            if fragment.chars().count() >= 2 {
                tokens.push(fragment);
            }
        }
    }
    tokens
}

/// Break one identifier at `_` and lower-to-upper case boundaries.
fn split_identifier(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for piece in raw.split('_') {
        let mut current = String::new();
        let mut prev_lower = false;
        for c in piece.chars() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                parts.push(current.to_lowercase());
                current = String::new();
            }
            prev_lower = c.is_lowercase() || c.is_numeric();
            current.push(c);
        }
        if !current.is_empty() {
            parts.push(current.to_lowercase());
        }
    }
    parts
}

impl EmbeddingProvider for HashedEmbedder {
    fn embed(&self, text: &str) -> MnemonResult<Vec<f32>> {
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashed"
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn symbol_only_input_embeds_to_zero() {
        let p = HashedEmbedder::new(128);
        let v = p.embed("+= { } ( ) ;").unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
        assert_eq!(v.len(), 128);
    }

    #[test]
    fn prose_embeds_to_unit_norm() {
        let p = HashedEmbedder::new(384);
        let v = p.embed("encrypted stores dedupe by content hash").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[test]
    fn camel_and_snake_identifiers_share_fragments() {
        let p = HashedEmbedder::new(256);
        let camel = p.embed("parseConfigFile").unwrap();
        let snake = p.embed("parse_config_file").unwrap();
        let sim = cosine(&camel, &snake);
        assert!(sim > 0.5, "fragment overlap should align vectors, got {sim}");
    }

    #[test]
    fn word_order_changes_the_vector() {
        let p = HashedEmbedder::new(256);
        let forward = p.embed("open store index search").unwrap();
        let reversed = p.embed("search index store open").unwrap();
        assert_ne!(forward, reversed, "pair features must be order-sensitive");
        // Same unigrams still keep them close.
        assert!(cosine(&forward, &reversed) > 0.5);
    }

    #[test]
    fn unrelated_texts_stay_apart() {
        let p = HashedEmbedder::new(256);
        let a = p.embed("vacuum compacts the database pages").unwrap();
        let b = p.embed("signatures verify bundle checksums").unwrap();
        assert!(cosine(&a, &b) < 0.5);
    }

    #[test]
    fn stable_between_calls() {
        let p = HashedEmbedder::new(96);
        assert_eq!(
            p.embed("stable projection").unwrap(),
            p.embed("stable projection").unwrap()
        );
    }

    #[test]
    fn embed_batch_agrees_with_embed() {
        let p = HashedEmbedder::new(64);
        let texts = vec![
            "journal entries append".to_string(),
            "receipts are immutable".to_string(),
        ];
        let batch = p.embed_batch(&texts).unwrap();
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(vector, &p.embed(text).unwrap());
        }
    }

    #[test]
    fn identifier_splitting_handles_edges() {
        assert_eq!(split_identifier("parseConfigFile"), vec!["parse", "config", "file"]);
        assert_eq!(split_identifier("snake_case_name"), vec!["snake", "case", "name"]);
        assert_eq!(split_identifier("HTTPServer"), vec!["httpserver"]);
        assert_eq!(split_identifier("v2"), vec!["v2"]);
        assert_eq!(split_identifier("_leading"), vec!["leading"]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// Any input with at least one word feature embeds to unit norm.
            #[test]
            fn wordy_text_is_unit_norm(text in "[a-z]{2,12}( [a-z]{2,12}){0,16}") {
                let p = HashedEmbedder::new(96);
                let v = p.embed(&text).unwrap();
                let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                prop_assert!((norm - 1.0).abs() < 1e-4);
            }

            /// Determinism holds for arbitrary input.
            #[test]
            fn projection_is_deterministic(text in ".{0,200}") {
                let p = HashedEmbedder::new(64);
                prop_assert_eq!(p.embed(&text).unwrap(), p.embed(&text).unwrap());
            }
        }
    }
}
