use anyhow::{bail, Context, Result};
use facebench_vision::ModelKind;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dataset::DEFAULT_EXTENSIONS;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEBENCH_CONFIG_PATH").unwrap_or("facebench.toml"))
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub n_same: usize,
    pub n_diff: usize,
    pub seed: u64,
    pub n_thresholds: usize,
    pub output_dir: PathBuf,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub lfw: Option<LfwConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub root: PathBuf,
    pub extensions: Vec<String>,
}

/// Fixed pairs protocol; takes precedence over sampling when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LfwConfig {
    pub pairs_file: PathBuf,
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub path: PathBuf,
    /// Verification threshold; the model's default when absent.
    pub threshold: Option<f32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n_same: 200,
            n_diff: 200,
            seed: 42,
            n_thresholds: 2000,
            output_dir: PathBuf::from("reports"),
            dataset: DatasetConfig::default(),
            model: ModelConfig::default(),
            lfw: None,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("datasets/att_faces"),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Sface,
            path: PathBuf::from("models/face_recognition_sface_2021dec.onnx"),
            threshold: None,
        }
    }
}

impl ModelConfig {
    pub fn threshold(&self) -> f32 {
        self.threshold
            .unwrap_or_else(|| self.kind.default_threshold())
    }
}

impl Config {
    /// Reject settings no run could use.
    pub fn validate(&self) -> Result<()> {
        if self.n_thresholds < 2 {
            bail!("n_thresholds must be at least 2, got {}", self.n_thresholds);
        }
        if self.lfw.is_none() && self.n_same + self.n_diff == 0 {
            bail!("n_same and n_diff are both 0, nothing to sample");
        }
        if let Some(t) = self.model.threshold {
            if !(-1.0..=1.0).contains(&t) {
                bail!("model.threshold {} is not a cosine similarity", t);
            }
        }
        Ok(())
    }
}

/// The given path, or the compiled-in default.
pub fn resolve_path(path: Option<&Path>) -> &Path {
    path.unwrap_or(&CONFIG_PATH)
}

/// Read and validate the config; a missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = resolve_path(path);
    let cfg: Config = match std::fs::read_to_string(path) {
        Ok(raw) => {
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("no config at {}, using defaults", path.display());
            Config::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading config at {}", path.display()))
        }
    };
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = resolve_path(path);
    let data = toml::to_string_pretty(cfg).context("serializing config")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, data).with_context(|| format!("writing config {}", path.display()))
}

/// Write the default config unless a file already exists. Returns whether
/// one was created.
pub fn init_config(path: Option<&Path>) -> Result<bool> {
    let path = resolve_path(path);
    if path.exists() {
        return Ok(false);
    }
    save_config(&Config::default(), Some(path))?;
    Ok(true)
}
