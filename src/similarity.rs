use ndarray::ArrayView1;

use crate::error::{EvalError, EvalResult};
use crate::Embedding;

/// Dot product of two embeddings, accumulated in f64.
///
/// Inputs are expected to be unit length already, which makes this the
/// cosine similarity. No renormalisation happens here.
pub fn similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> EvalResult<f64> {
    if a.len() != b.len() {
        return Err(EvalError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| *x as f64 * *y as f64)
        .sum())
}

pub fn similarity_embeddings(a: &Embedding, b: &Embedding) -> EvalResult<f64> {
    similarity(a.vector.view(), b.vector.view())
}

/// Highest similarity of `probe` against every enrolled embedding.
pub fn best_score(gallery: &[Embedding], probe: &Embedding) -> EvalResult<Option<f64>> {
    gallery.iter().try_fold(None, |acc, enrolled| {
        let s = similarity_embeddings(enrolled, probe)?;
        Ok(match acc {
            Some(best) if best >= s => Some(best),
            _ => Some(s),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_unit_vectors() {
        let a = arr1(&[1.0f32, 0.0, 0.0]);
        let b = arr1(&[0.0f32, 1.0, 0.0]);
        assert_eq!(similarity(a.view(), a.view()).unwrap(), 1.0);
        assert_eq!(similarity(a.view(), b.view()).unwrap(), 0.0);
        let neg = arr1(&[-1.0f32, 0.0, 0.0]);
        assert_eq!(similarity(a.view(), neg.view()).unwrap(), -1.0);
    }

    #[test]
    fn test_no_renormalisation() {
        let a = arr1(&[2.0f32, 0.0]);
        let b = arr1(&[3.0f32, 0.0]);
        assert_eq!(similarity(a.view(), b.view()).unwrap(), 6.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = arr1(&[1.0f32, 0.0]);
        let b = arr1(&[1.0f32, 0.0, 0.0]);
        assert_eq!(
            similarity(a.view(), b.view()),
            Err(EvalError::DimensionMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn test_best_score() {
        let probe = Embedding::from_raw(vec![1.0, 0.0]);
        let gallery = vec![
            Embedding::from_raw(vec![0.0, 1.0]),
            Embedding::from_raw(vec![1.0, 1.0]),
            Embedding::from_raw(vec![-1.0, 0.0]),
        ];
        let best = best_score(&gallery, &probe).unwrap().unwrap();
        assert!((best - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert_eq!(best_score(&[], &probe).unwrap(), None);
    }

    #[test]
    fn test_best_score_propagates_mismatch() {
        let probe = Embedding::from_raw(vec![1.0, 0.0]);
        let gallery = vec![Embedding::from_raw(vec![1.0, 0.0, 0.0])];
        assert!(best_score(&gallery, &probe).is_err());
    }
}
