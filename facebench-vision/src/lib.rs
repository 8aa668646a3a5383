pub mod embedder;
pub mod model;
pub mod onnx;
pub mod preprocess;

// Re-export commonly used types
pub use embedder::{Embedder, Embedding};
pub use onnx::{ModelKind, OnnxEmbedder};
pub use preprocess::{ChannelOrder, PixelScale, Preprocess};
