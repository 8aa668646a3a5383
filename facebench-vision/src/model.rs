use anyhow::{Context, Result};
use ort::session::{
    builder::{GraphOptimizationLevel, SessionBuilder},
    Session,
};
use std::path::Path;

/// Session builder with every execution provider enabled at compile time.
/// Providers missing from the linked ONNX Runtime fall back to CPU.
pub fn session_builder() -> Result<SessionBuilder> {
    #[allow(unused_mut)]
    let mut builder =
        Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "openvino")]
    try_register(&mut builder, ort::ep::OpenVINO::default(), "openvino")?;
    #[cfg(feature = "cuda")]
    try_register(&mut builder, ort::ep::CUDA::default(), "cuda")?;

    Ok(builder)
}

#[cfg(any(feature = "openvino", feature = "cuda"))]
fn try_register<P: ort::ep::ExecutionProvider>(
    builder: &mut SessionBuilder,
    provider: P,
    feature: &str,
) -> Result<()> {
    if provider.is_available()? {
        provider.register(builder)?;
        log::debug!("registered {} execution provider", feature);
    } else {
        log::warn!(
            "{} feature is enabled but onnx runtime was built without it, using cpu",
            feature
        );
    }
    Ok(())
}

/// Load an ONNX model from disk into a ready-to-run session.
pub fn session_from_file(path: &Path) -> Result<Session> {
    if !path.is_file() {
        anyhow::bail!("model file {} not found", path.display());
    }
    session_builder()?
        .commit_from_file(path)
        .with_context(|| format!("load model {}", path.display()))
}
