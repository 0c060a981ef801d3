//! # Similarity Matcher Module
//!
//! Near-duplicate detection by cosine similarity between feature vectors.
//! Search is a full linear scan over the store.
//!
//! Similarity is computed over a [`FeatureProfile`]. Categorical components
//! (city, metro, renovation, ...) compare as one-hot indicators: equal
//! non-zero codes agree, different codes are orthogonal and the sentinel `0`
//! carries no information. Numeric components are divided by a reference
//! scale so that the rent does not drown out every other attribute.
//! [`FeatureProfile::raw`] gives plain cosine over the stored numbers.

use crate::ad_store::StoreRecord;
use crate::vectorizer::{FeatureVector, FEATURE_COUNT};

/// Default match threshold
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.9;

/// How one vector component takes part in the similarity
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureKind {
    /// Enumerated code compared for equality, contributing `weight²` when equal
    Categorical { weight: f64 },
    /// Quantity divided by `scale` before the dot product
    Numeric { scale: f64 },
}

/// Per-component comparison rules, in vector order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureProfile {
    kinds: [FeatureKind; FEATURE_COUNT],
}

const fn cat(weight: f64) -> FeatureKind {
    FeatureKind::Categorical { weight }
}

const fn num(scale: f64) -> FeatureKind {
    FeatureKind::Numeric { scale }
}

impl FeatureProfile {
    /// Plain cosine similarity over the stored numbers
    pub fn raw() -> Self {
        Self {
            kinds: [num(1.0); FEATURE_COUNT],
        }
    }
}

impl Default for FeatureProfile {
    fn default() -> Self {
        Self {
            kinds: [
                cat(2.0),      // city
                cat(2.0),      // metro
                num(20.0),     // address length
                num(1.0),      // rooms
                cat(1.0),      // renovation
                num(1.0),      // kitchen combined
                num(1.0),      // isolated rooms
                cat(1.0),      // bathroom
                cat(1.0),      // balcony
                num(1.0),      // wardrobe
                num(10.0),     // furnishing words
                cat(1.0),      // parking
                num(10.0),     // minutes to metro
                num(10.0),     // infrastructure words
                num(100_000.0), // price per month
                cat(1.0),      // utilities
                cat(1.0),      // deposit
                cat(1.0),      // commission
                num(10.0),     // living conditions words
            ],
        }
    }
}

/// Cosine similarity of two vectors under `profile`.
///
/// Undefined (`None`) when either side has zero magnitude. Identical non-zero
/// vectors score exactly `1.0`.
pub fn cosine_similarity(
    profile: &FeatureProfile,
    a: &FeatureVector,
    b: &FeatureVector,
) -> Option<f64> {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for ((kind, &x), &y) in profile.kinds.iter().zip(a.as_slice()).zip(b.as_slice()) {
        match *kind {
            FeatureKind::Categorical { weight } => {
                let w2 = weight * weight;
                if x != 0.0 {
                    norm_a += w2;
                }
                if y != 0.0 {
                    norm_b += w2;
                }
                if x != 0.0 && x == y {
                    dot += w2;
                }
            }
            FeatureKind::Numeric { scale } => {
                let (sx, sy) = (x / scale, y / scale);
                dot += sx * sy;
                norm_a += sx * sx;
                norm_b += sy * sy;
            }
        }
    }

    if norm_a <= f64::EPSILON || norm_b <= f64::EPSILON {
        return None;
    }
    if a == b {
        return Some(1.0);
    }
    // Only identical vectors reach 1.0, so a threshold of 1.0 means equality
    Some((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0 - f64::EPSILON))
}

/// Threshold search over stored ads
#[derive(Debug, Clone, Default)]
pub struct SimilarityMatcher {
    profile: FeatureProfile,
}

impl SimilarityMatcher {
    pub fn similarity(&self, a: &FeatureVector, b: &FeatureVector) -> Option<f64> {
        cosine_similarity(&self.profile, a, b)
    }

    /// Records whose similarity to `vector` is at least `threshold`, in store order.
    ///
    /// An empty result means the ad is new; it is not an error. Records with
    /// an undefined similarity never match, whatever the threshold.
    pub fn find_similar<'a>(
        &self,
        records: &'a [StoreRecord],
        vector: &FeatureVector,
        threshold: f64,
    ) -> Vec<&'a StoreRecord> {
        records
            .iter()
            .filter(|record| {
                self.similarity(vector, &record.vector)
                    .is_some_and(|similarity| similarity >= threshold)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector_with(entries: &[(usize, f64)]) -> FeatureVector {
        let mut components = [0.0; FEATURE_COUNT];
        for &(i, v) in entries {
            components[i] = v;
        }
        FeatureVector::new(components)
    }

    #[test]
    fn test_zero_vector_similarity_is_undefined() {
        let zero = FeatureVector::zeros();
        let other = vector_with(&[(0, 1.0), (14, 50000.0)]);
        let profile = FeatureProfile::default();
        assert_eq!(cosine_similarity(&profile, &zero, &other), None);
        assert_eq!(cosine_similarity(&profile, &zero, &zero), None);
        assert_eq!(cosine_similarity(&FeatureProfile::raw(), &zero, &zero), None);
    }

    #[test]
    fn test_zero_vectors_never_match_even_at_threshold_zero() {
        let matcher = SimilarityMatcher::default();
        let record = |message_id: i64, vector: FeatureVector| StoreRecord {
            message_id,
            channel_id: -1001234567890,
            url: format!("https://t.me/arenda_msk/{message_id}"),
            vector,
        };
        let records = vec![
            record(1, vector_with(&[(0, 1.0), (14, 50000.0)])),
            record(2, FeatureVector::zeros()),
        ];

        assert!(matcher
            .find_similar(&records, &FeatureVector::zeros(), 0.0)
            .is_empty());
        let found = matcher.find_similar(&records, &vector_with(&[(0, 1.0)]), 0.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message_id, 1);
    }

    #[test]
    fn test_identical_vectors_are_exactly_one() {
        let v = vector_with(&[(0, 1.0), (1, 185.0), (3, 2.0), (14, 61234.0), (16, 0.5)]);
        assert_eq!(cosine_similarity(&FeatureProfile::default(), &v, &v), Some(1.0));
        assert_eq!(cosine_similarity(&FeatureProfile::raw(), &v, &v), Some(1.0));
    }

    #[test]
    fn test_raw_profile_matches_plain_cosine() {
        let a = vector_with(&[(0, 3.0), (1, 4.0)]);
        let b = vector_with(&[(0, 4.0), (1, 3.0)]);
        let sim = cosine_similarity(&FeatureProfile::raw(), &a, &b).unwrap();
        assert!((sim - 24.0 / 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_different_categories_are_orthogonal() {
        // Only the city is known, and it differs
        let moscow = vector_with(&[(0, 1.0)]);
        let petersburg = vector_with(&[(0, 2.0)]);
        let profile = FeatureProfile::default();
        assert_eq!(cosine_similarity(&profile, &moscow, &petersburg), Some(0.0));
        // Raw cosine treats the codes as parallel magnitudes
        assert!(cosine_similarity(&FeatureProfile::raw(), &moscow, &petersburg).unwrap() > 0.999);
    }

    #[test]
    fn test_proportional_vectors_stay_below_one() {
        let a = vector_with(&[(3, 1.0), (14, 40000.0)]);
        let b = vector_with(&[(3, 2.0), (14, 80000.0)]);
        let sim = cosine_similarity(&FeatureProfile::default(), &a, &b).unwrap();
        assert!(sim < 1.0);
        assert!(sim > 0.999);
    }

    #[test]
    fn test_find_similar_on_empty_store() {
        let matcher = SimilarityMatcher::default();
        let v = vector_with(&[(0, 1.0)]);
        assert!(matcher.find_similar(&[], &v, 0.0).is_empty());
    }
}
