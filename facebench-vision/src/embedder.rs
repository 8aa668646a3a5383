use anyhow::Result;
use image::DynamicImage;
use ndarray::Array1;

/// L2-normalised face embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Array1<f32>,
}

impl Embedding {
    /// Wrap a raw network output, scaling it to unit length.
    ///
    /// An all-zero output stays all-zero, so it scores 0 against anything.
    pub fn from_raw(raw: Vec<f32>) -> Self {
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let normalized = if norm > 0.0 {
            raw.into_iter().map(|x| x / norm).collect()
        } else {
            raw
        };
        Self {
            vector: Array1::from(normalized),
        }
    }

    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    pub fn norm(&self) -> f32 {
        self.vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}

/// Anything that turns a face image into a fixed-length embedding.
///
/// Evaluation code only talks to this trait, so models can be swapped
/// without touching pair sampling, scoring or the threshold sweep.
pub trait Embedder {
    /// Short model name used in logs and reports.
    fn name(&self) -> &str;

    fn embed(&mut self, img: &DynamicImage) -> Result<Embedding>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn embed(&mut self, img: &DynamicImage) -> Result<Embedding> {
        (**self).embed(img)
    }
}
