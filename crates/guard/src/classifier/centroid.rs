//! Embedding centroids and cosine similarity.

use turnstile_core::normalize;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length, empty, or the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Mean unit vector over a class's example embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainCentroid {
    vector: Vec<f32>,
}

impl DomainCentroid {
    /// Average the embeddings and renormalize. `None` for an empty set or
    /// mismatched dimensions.
    pub fn from_embeddings(embeddings: &[Vec<f32>]) -> Option<Self> {
        let dim = embeddings.first()?.len();
        if dim == 0 || embeddings.iter().any(|e| e.len() != dim) {
            return None;
        }

        let mut sum = vec![0.0f64; dim];
        for embedding in embeddings {
            for (acc, x) in sum.iter_mut().zip(embedding) {
                *acc += *x as f64;
            }
        }

        let n = embeddings.len() as f64;
        let mut vector: Vec<f32> = sum.into_iter().map(|s| (s / n) as f32).collect();
        normalize(&mut vector);
        Some(Self { vector })
    }

    pub fn similarity(&self, query: &[f32]) -> f32 {
        cosine_similarity(&self.vector, query)
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// The in-domain and colliding-entity centroids, built together.
#[derive(Debug, Clone)]
pub struct DualCentroid {
    pub in_domain: DomainCentroid,
    pub colliding: DomainCentroid,
}

impl DualCentroid {
    /// `cos(q, in_domain) - cos(q, colliding)`. Positive leans in-domain.
    pub fn relative(&self, query: &[f32]) -> f32 {
        self.in_domain.similarity(query) - self.colliding.similarity(query)
    }

    pub fn swapped(&self) -> Self {
        Self {
            in_domain: self.colliding.clone(),
            colliding: self.in_domain.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_and_mismatched() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn centroid_is_normalized_mean() {
        let c = DomainCentroid::from_embeddings(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((c.vector[0] - expected).abs() < 1e-6);
        assert!((c.vector[1] - expected).abs() < 1e-6);
        assert_eq!(c.dimension(), 2);
    }

    #[test]
    fn empty_or_ragged_examples_have_no_centroid() {
        assert!(DomainCentroid::from_embeddings(&[]).is_none());
        assert!(DomainCentroid::from_embeddings(&[vec![1.0], vec![1.0, 0.0]]).is_none());
    }

    #[test]
    fn relative_score_is_antisymmetric() {
        let dual = DualCentroid {
            in_domain: DomainCentroid::from_embeddings(&[vec![0.9, 0.1, 0.0]]).unwrap(),
            colliding: DomainCentroid::from_embeddings(&[vec![0.1, 0.8, 0.3]]).unwrap(),
        };
        for query in [[0.5, 0.5, 0.0], [1.0, 0.0, 0.0], [0.0, 0.2, 0.9]] {
            let forward = dual.relative(&query);
            let backward = dual.swapped().relative(&query);
            assert!((forward + backward).abs() < 1e-6);
        }
    }

    #[test]
    fn relative_leans_toward_nearer_centroid() {
        let dual = DualCentroid {
            in_domain: DomainCentroid::from_embeddings(&[vec![1.0, 0.0]]).unwrap(),
            colliding: DomainCentroid::from_embeddings(&[vec![0.0, 1.0]]).unwrap(),
        };
        assert!(dual.relative(&[1.0, 0.0]) > 0.9);
        assert!(dual.relative(&[0.0, 1.0]) < -0.9);
    }
}
