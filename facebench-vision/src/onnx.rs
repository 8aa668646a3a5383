use anyhow::{Context, Result};
use image::DynamicImage;
use ort::{session::Session, value::Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::embedder::{Embedder, Embedding};
use crate::preprocess::{self, ChannelOrder, PixelScale, Preprocess};

/// Supported recognition networks, by input contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// VGG-Face (224x224 BGR, VGG channel means subtracted)
    Vggface,
    /// OpenCV SFace (112x112 BGR, raw pixels)
    Sface,
    /// InsightFace ArcFace (112x112 RGB, [-1, 1])
    Arcface,
    /// FaceNet InceptionResnetV1 (160x160 RGB, per-image standardised)
    Facenet,
}

impl ModelKind {
    pub fn preprocess(self) -> Preprocess {
        match self {
            ModelKind::Vggface => Preprocess {
                size: 224,
                channels: ChannelOrder::Bgr,
                scale: PixelScale::VggMean,
            },
            ModelKind::Sface => Preprocess {
                size: 112,
                channels: ChannelOrder::Bgr,
                scale: PixelScale::Raw,
            },
            ModelKind::Arcface => Preprocess {
                size: 112,
                channels: ChannelOrder::Rgb,
                scale: PixelScale::Symmetric,
            },
            ModelKind::Facenet => Preprocess {
                size: 160,
                channels: ChannelOrder::Rgb,
                scale: PixelScale::Standardize,
            },
        }
    }

    /// Cosine similarity at or above which two faces count as the same person.
    pub fn default_threshold(self) -> f32 {
        match self {
            // cosine distance 0.68
            ModelKind::Vggface => 0.32,
            ModelKind::Sface => 0.363,
            ModelKind::Arcface => 0.32,
            ModelKind::Facenet => 0.60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Vggface => "vggface",
            ModelKind::Sface => "sface",
            ModelKind::Arcface => "arcface",
            ModelKind::Facenet => "facenet",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognition network run through ONNX Runtime on already-cropped faces.
pub struct OnnxEmbedder {
    kind: ModelKind,
    session: Session,
}

impl OnnxEmbedder {
    pub fn open(kind: ModelKind, model_path: &Path) -> Result<Self> {
        let session = crate::model::session_from_file(model_path)
            .with_context(|| format!("opening {} model", kind))?;
        log::info!("Loaded {} model from {}", kind, model_path.display());
        Ok(Self { kind, session })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }
}

impl Embedder for OnnxEmbedder {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn embed(&mut self, img: &DynamicImage) -> Result<Embedding> {
        let input = preprocess::to_tensor(img, &self.kind.preprocess())?;
        let input_tensor = Value::from_array(input)?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        // Expecting shape [1, dim]
        let dim = if shape.len() == 2 {
            shape[1] as usize
        } else {
            data.len()
        };
        if dim == 0 || dim > data.len() {
            anyhow::bail!(
                "{} model returned an unusable output of shape {:?}",
                self.kind,
                shape
            );
        }

        Ok(Embedding::from_raw(data[..dim].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_sizes() {
        assert_eq!(ModelKind::Vggface.preprocess().size, 224);
        assert_eq!(ModelKind::Sface.preprocess().size, 112);
        assert_eq!(ModelKind::Arcface.preprocess().size, 112);
        assert_eq!(ModelKind::Facenet.preprocess().size, 160);
    }

    #[test]
    fn test_vggface_tensor() -> Result<()> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            50,
            60,
            image::Rgb([129, 104, 93]),
        ));
        let t = preprocess::to_tensor(&img, &ModelKind::Vggface.preprocess())?;
        assert_eq!(t.shape(), &[1, 3, 224, 224]);
        // a face close to the training means sits near zero in every channel
        assert!(t.iter().all(|v| v.abs() < 1.0));
        Ok(())
    }

    #[test]
    fn test_missing_model_file() {
        let result = OnnxEmbedder::open(ModelKind::Sface, Path::new("does/not/exist.onnx"));
        assert!(result.is_err());
    }

    #[test]
    fn test_display_matches_cli_name() {
        for kind in [
            ModelKind::Vggface,
            ModelKind::Sface,
            ModelKind::Arcface,
            ModelKind::Facenet,
        ] {
            assert_eq!(kind.to_string(), kind.as_str());
            assert!(kind.default_threshold() > 0.0 && kind.default_threshold() < 1.0);
        }
    }
}
