//! Distance-metric abstraction over fuzzy-hash fingerprints.
//!
//! `DistanceMetric` is a closed tagged union rather than an open
//! trait-object hierarchy: the metric tag is already persisted as an enum
//! in the binary format, so a `match` on a `Copy` enum is both the
//! simplest and the most persistence-friendly representation.

use std::cmp::Ordering;

use crate::error::{ApoError, Result};

/// A similarity or distance metric over already-computed hash strings.
///
/// `Tlsh` is a spatial (distance) metric: smaller scores are closer, and
/// `score(x, x) == 0`. `Ssdeep` is a similarity metric: larger scores are
/// closer, and `score(x, x)` equals the metric's maximum (100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistanceMetric {
    Tlsh,
    Ssdeep,
}

impl DistanceMetric {
    /// Human-readable name, also used in `MetricMismatch` error messages.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Tlsh => "tlsh",
            DistanceMetric::Ssdeep => "ssdeep",
        }
    }

    /// `true` for spatial (distance) metrics where lower = closer.
    pub fn is_spatial(&self) -> bool {
        match self {
            DistanceMetric::Tlsh => true,
            DistanceMetric::Ssdeep => false,
        }
    }

    /// Size of the alphabet used to generate random hashes of this kind
    /// (used by test fixtures).
    pub fn max_alphabet_len(&self) -> usize {
        match self {
            DistanceMetric::Tlsh => 16,  // hex digits
            DistanceMetric::Ssdeep => 64, // ssdeep's base64-like block alphabet
        }
    }

    /// The closed enum tag persisted in the cfg section of the snapshot
    /// format.
    pub fn tag(&self) -> u8 {
        match self {
            DistanceMetric::Tlsh => 1,
            DistanceMetric::Ssdeep => 2,
        }
    }

    /// Inverse of [`Self::tag`]; `BadFormat` on an unrecognized tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(DistanceMetric::Tlsh),
            2 => Ok(DistanceMetric::Ssdeep),
            _ => Err(ApoError::BadFormat),
        }
    }

    /// Score two hash strings. Symmetric; `score(x, x)` is 0 for spatial
    /// metrics and 100 for similarity metrics.
    pub fn score(&self, a_hash: &str, b_hash: &str) -> f32 {
        match self {
            DistanceMetric::Tlsh => tlsh_diff(a_hash, b_hash),
            DistanceMetric::Ssdeep => ssdeep_similarity(a_hash, b_hash),
        }
    }

    /// Map a raw score onto a key where "smaller key = closer" always
    /// holds, regardless of metric direction. Used uniformly by the
    /// priority queues in `neighbor_queue` and by the
    /// `closer`/`nearest`/`furthest` predicates below — one code path for
    /// both metric families.
    pub fn key(&self, score: f32) -> f32 {
        if self.is_spatial() {
            score
        } else {
            -score
        }
    }

    /// Ordering of two scores relative to a shared query: `Less` means `a`
    /// is closer than `b`.
    pub fn closer(&self, score_a: f32, score_b: f32) -> Ordering {
        self.key(score_a)
            .partial_cmp(&self.key(score_b))
            .unwrap_or(Ordering::Equal)
    }

    /// Index of the nearest score in `scores`, or `None` if empty.
    pub fn nearest_index(&self, scores: &[f32]) -> Option<usize> {
        scores
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| self.closer(**a, **b))
            .map(|(i, _)| i)
    }

    /// Index of the furthest score in `scores`, or `None` if empty.
    pub fn furthest_index(&self, scores: &[f32]) -> Option<usize> {
        scores
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| self.closer(**a, **b))
            .map(|(i, _)| i)
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Strip the `T1`-style version marker and fixed header (checksum + length
/// + Q-ratio byte, 6 hex chars) from a TLSH string, leaving the digest
/// body. Falls back to the whole string for anything that doesn't look
/// like a standard TLSH encoding — the real bucket-histogram decode is a
/// concrete hash algorithm's internals, out of scope here.
fn tlsh_body(hash: &str) -> &str {
    if hash.len() > 8 && hash.as_bytes()[0] == b'T' {
        &hash[8..]
    } else {
        hash
    }
}

/// TLSH diff: a nibble-wise Hamming distance over the digest body, plus a
/// length-difference penalty. 0 for identical strings, symmetric, and
/// grows with dissimilarity, without reimplementing TLSH's real
/// bucket-histogram decode.
fn tlsh_diff(a_hash: &str, b_hash: &str) -> f32 {
    let a = tlsh_body(a_hash).as_bytes();
    let b = tlsh_body(b_hash).as_bytes();
    let common = a.len().min(b.len());
    let mismatches = (0..common).filter(|&i| a[i] != b[i]).count();
    let length_penalty = a.len().abs_diff(b.len());
    (mismatches + length_penalty) as f32
}

/// The first signature block of an ssdeep hash (`blocksize:sig1:sig2`).
fn ssdeep_signature(hash: &str) -> &str {
    hash.split(':').nth(1).unwrap_or(hash)
}

/// ssdeep similarity: a normalized longest-common-subsequence ratio over
/// the primary signature block, scaled to 0..=100 (100 = identical). This
/// mirrors the shape of the real ssdeep edit-distance score without
/// depending on ssdeep's block-hashing internals.
fn ssdeep_similarity(a_hash: &str, b_hash: &str) -> f32 {
    let a = ssdeep_signature(a_hash);
    let b = ssdeep_signature(b_hash);
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    let lcs = longest_common_subsequence_len(a.as_bytes(), b.as_bytes());
    let denom = a.len().max(b.len()).max(1);
    ((lcs as f32 / denom as f32) * 100.0).round()
}

/// Classic O(n*m) LCS length — ssdeep signature blocks are short (<= 64
/// chars), so the quadratic table is negligible.
fn longest_common_subsequence_len(a: &[u8], b: &[u8]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut prev_diag = 0;
        for (j, &cb) in b.iter().enumerate() {
            let tmp = row[j + 1];
            row[j + 1] = if ca == cb {
                prev_diag + 1
            } else {
                row[j + 1].max(row[j])
            };
            prev_diag = tmp;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const T1: &str = "T1BF81A292E336D1F68224D4A4C751A2B3BB353CA9C2103BA69FA4C7908761B50F22E301";
    const T2: &str = "T12B81E2134758C0E3CA097B381202C62AC793B46686CD9E2E8F9190EC89C537B5E7AF4C";

    #[test]
    fn tlsh_is_spatial_and_identical_is_zero() {
        let m = DistanceMetric::Tlsh;
        assert!(m.is_spatial());
        assert_relative_eq!(m.score(T1, T1), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn tlsh_is_symmetric() {
        let m = DistanceMetric::Tlsh;
        assert_relative_eq!(m.score(T1, T2), m.score(T2, T1), epsilon = 1e-5);
    }

    #[test]
    fn tlsh_differs_for_different_hashes() {
        let m = DistanceMetric::Tlsh;
        assert!(m.score(T1, T2) > 0.0);
    }

    #[test]
    fn ssdeep_is_similarity_and_identical_is_max() {
        let m = DistanceMetric::Ssdeep;
        assert!(!m.is_spatial());
        let h = "3072:abcdefghij:klmnopqrst";
        assert_relative_eq!(m.score(h, h), 100.0, epsilon = 1e-5);
    }

    #[test]
    fn ssdeep_is_symmetric() {
        let m = DistanceMetric::Ssdeep;
        let a = "3072:abcdefghij:klmnopqrst";
        let b = "3072:abczzzghij:uvwxyzabcd";
        assert_relative_eq!(m.score(a, b), m.score(b, a), epsilon = 1e-5);
    }

    #[test]
    fn key_sign_flip_matches_direction() {
        assert_eq!(DistanceMetric::Tlsh.key(5.0), 5.0);
        assert_eq!(DistanceMetric::Ssdeep.key(5.0), -5.0);
    }

    #[test]
    fn closer_orders_spatial_ascending() {
        let m = DistanceMetric::Tlsh;
        assert_eq!(m.closer(1.0, 2.0), Ordering::Less);
    }

    #[test]
    fn closer_orders_similarity_descending() {
        let m = DistanceMetric::Ssdeep;
        assert_eq!(m.closer(90.0, 10.0), Ordering::Less);
    }

    #[test]
    fn nearest_and_furthest_index() {
        let m = DistanceMetric::Tlsh;
        let scores = [5.0, 1.0, 3.0];
        assert_eq!(m.nearest_index(&scores), Some(1));
        assert_eq!(m.furthest_index(&scores), Some(0));
    }

    #[test]
    fn tag_roundtrip() {
        assert_eq!(DistanceMetric::from_tag(1).unwrap(), DistanceMetric::Tlsh);
        assert_eq!(DistanceMetric::from_tag(2).unwrap(), DistanceMetric::Ssdeep);
        assert!(DistanceMetric::from_tag(99).is_err());
    }
}
