pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod pairs;
pub mod report;
pub mod similarity;
pub mod sweep;

// Re-export embedding types for convenience
pub use facebench_vision::{Embedder, Embedding, ModelKind, OnnxEmbedder};

pub use error::{EvalError, EvalResult};
pub use pairs::{sample_pairs, Pair, Relation};
pub use sweep::{evaluate, SweepResult};
