// src/store/similarity.rs

use ndarray::ArrayView1;

/// Cosine similarity of two equal-length vectors.
///
/// Callers must check lengths first; a mismatch is a structural error, not
/// a dissimilar pair. Returns 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "cosine similarity of mismatched lengths");
    if a.len() != b.len() {
        return 0.0;
    }
    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.dot(&b) / (norm_a * norm_b)
}
