use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facebench::config::{self, Config, LfwConfig};
use facebench::{evaluation, report, ModelKind, OnnxEmbedder, Relation};
use log::info;

#[derive(Parser)]
#[command(name = "facebench")]
#[command(
    version,
    about = "Face verification benchmark - FAR/FRR, EER and ROC for face embedding models"
)]
struct Cli {
    /// Config file (defaults to ./facebench.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample pairs, embed them and sweep the decision threshold
    Eval {
        #[command(flatten)]
        pairs: PairArgs,
        #[command(flatten)]
        model: ModelArgs,
        /// Number of thresholds on the FAR/FRR grid
        #[arg(long)]
        thresholds: Option<usize>,
        /// Directory for report.json and the CSV tables
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the pairs an evaluation would use, without embedding anything
    Pairs {
        #[command(flatten)]
        pairs: PairArgs,
    },
    /// Re-run the sweep on a score,label CSV
    Sweep {
        /// CSV with `score` and `label` (1 = same, 0 = different) columns
        scores: PathBuf,
        #[arg(long)]
        thresholds: Option<usize>,
        /// Also write far_frr.csv and roc.csv here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Check whether two face images show the same person
    Verify {
        image_a: PathBuf,
        image_b: PathBuf,
        #[command(flatten)]
        model: ModelArgs,
        /// Similarity needed to accept (defaults to the model's threshold)
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// Open config file in editor
    Config,
}

#[derive(Args)]
struct PairArgs {
    /// Dataset root with one sub-directory per identity
    #[arg(short, long, conflicts_with = "lfw_pairs")]
    dataset: Option<PathBuf>,
    /// LFW pairs.txt to use instead of sampling
    #[arg(long, requires = "lfw_root")]
    lfw_pairs: Option<PathBuf>,
    /// Directory holding the LFW identity folders
    #[arg(long, requires = "lfw_pairs")]
    lfw_root: Option<PathBuf>,
    #[arg(long)]
    n_same: Option<usize>,
    #[arg(long)]
    n_diff: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct ModelArgs {
    /// Embedding model architecture
    #[arg(short, long, value_enum)]
    model: Option<ModelKind>,
    /// ONNX file for the model
    #[arg(long)]
    model_path: Option<PathBuf>,
}

impl PairArgs {
    fn apply(self, cfg: &mut Config) {
        if let Some(root) = self.dataset {
            cfg.dataset.root = root;
            cfg.lfw = None;
        }
        if let (Some(pairs_file), Some(root)) = (self.lfw_pairs, self.lfw_root) {
            cfg.lfw = Some(LfwConfig { pairs_file, root });
        }
        if let Some(n) = self.n_same {
            cfg.n_same = n;
        }
        if let Some(n) = self.n_diff {
            cfg.n_diff = n;
        }
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
    }
}

impl ModelArgs {
    fn apply(self, cfg: &mut Config) {
        if let Some(kind) = self.model {
            cfg.model.kind = kind;
        }
        if let Some(path) = self.model_path {
            cfg.model.path = path;
        }
    }
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    // `config` must still open a file that fails to load
    let loaded = config::load_config(config_path);

    match cli.command {
        Commands::Eval {
            pairs,
            model,
            thresholds,
            out,
        } => {
            let mut cfg = loaded?;
            pairs.apply(&mut cfg);
            model.apply(&mut cfg);
            if let Some(n) = thresholds {
                cfg.n_thresholds = n;
            }
            if let Some(dir) = out {
                cfg.output_dir = dir;
            }
            eval(&cfg)
        }
        Commands::Pairs { pairs } => {
            let mut cfg = loaded?;
            pairs.apply(&mut cfg);
            print_pairs(&cfg)
        }
        Commands::Sweep {
            scores,
            thresholds,
            out,
        } => {
            let cfg = loaded?;
            sweep(
                &scores,
                thresholds.unwrap_or(cfg.n_thresholds),
                out.as_deref(),
            )
        }
        Commands::Verify {
            image_a,
            image_b,
            model,
            threshold,
        } => {
            let mut cfg = loaded?;
            model.apply(&mut cfg);
            if threshold.is_some() {
                cfg.model.threshold = threshold;
            }
            verify(&cfg, &image_a, &image_b)
        }
        Commands::Config => open_config(config_path),
    }
}

fn eval(cfg: &Config) -> Result<()> {
    info!("Evaluating model: {}", cfg.model.kind);

    let mut embedder = OnnxEmbedder::open(cfg.model.kind, &cfg.model.path)
        .context("Failed to initialize embedding model")?;

    let result = evaluation::run(cfg, &mut embedder)?;

    println!("{}", report::summary_line(&result.model, &result.sweep));

    let dir = cfg.output_dir.join(&result.model);
    let written = report::write_report(&dir, &result).context("Failed to write report")?;
    for path in written {
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_pairs(cfg: &Config) -> Result<()> {
    let pairs = evaluation::build_pairs(cfg)?;
    for pair in &pairs {
        let relation = match pair.relation {
            Relation::Same => "same",
            Relation::Different => "different",
        };
        println!("{}\t{}\t{}", relation, pair.a.display(), pair.b.display());
    }
    Ok(())
}

fn sweep(scores: &Path, n_thresholds: usize, out: Option<&Path>) -> Result<()> {
    let scored = report::read_scores(scores)?;
    info!("Read {} scored pairs from {}", scored.len(), scores.display());

    let result = evaluation::sweep_scored(&scored, n_thresholds)?;
    let name = scores
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scores".to_string());
    println!("{}", report::summary_line(&name, &result));

    if let Some(dir) = out {
        for path in report::write_curves(dir, &result)? {
            info!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn verify(cfg: &Config, image_a: &Path, image_b: &Path) -> Result<()> {
    let a = evaluation::load_image(image_a)?;
    let b = evaluation::load_image(image_b)?;

    let mut embedder = OnnxEmbedder::open(cfg.model.kind, &cfg.model.path)
        .context("Failed to initialize embedding model")?;

    let threshold = cfg.model.threshold() as f64;
    let verdict = evaluation::verify(&mut embedder, &a, &b, threshold)?;

    info!(
        "Similarity: {:.4} (threshold: {:.4})",
        verdict.score, verdict.threshold
    );
    if verdict.verified {
        println!("✓ Same person ({}, score {:.4})", cfg.model.kind, verdict.score);
    } else {
        println!(
            "✗ Different people ({}, score {:.4})",
            cfg.model.kind, verdict.score
        );
    }
    Ok(())
}

fn open_config(path: Option<&Path>) -> Result<()> {
    let config_path = config::resolve_path(path);
    if config::init_config(Some(config_path))? {
        info!("Created default config: {}", config_path.display());
    }

    let editor = env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string());
    let status = std::process::Command::new(&editor)
        .arg(config_path)
        .status()
        .with_context(|| format!("Failed to start {}", editor))?;
    if !status.success() {
        anyhow::bail!("{} exited with {}", editor, status);
    }

    // catch edits that no longer parse before the next run does
    config::load_config(Some(config_path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_lfw_flags_require_each_other() {
        let root_only = Cli::try_parse_from(["facebench", "pairs", "--lfw-root", "lfw"]);
        assert!(root_only.is_err());
        let pairs_only = Cli::try_parse_from(["facebench", "pairs", "--lfw-pairs", "pairs.txt"]);
        assert!(pairs_only.is_err());

        let cli = Cli::try_parse_from([
            "facebench",
            "pairs",
            "--lfw-pairs",
            "pairs.txt",
            "--lfw-root",
            "lfw",
        ])
        .unwrap();
        let Commands::Pairs { pairs } = cli.command else {
            panic!("expected the pairs subcommand");
        };
        let mut cfg = Config::default();
        pairs.apply(&mut cfg);
        let lfw = cfg.lfw.unwrap();
        assert_eq!(lfw.pairs_file, PathBuf::from("pairs.txt"));
        assert_eq!(lfw.root, PathBuf::from("lfw"));
    }

    #[test]
    fn test_model_flag_accepts_vggface() {
        let cli = Cli::try_parse_from(["facebench", "verify", "a.png", "b.png", "-m", "vggface"])
            .unwrap();
        let Commands::Verify { model, .. } = cli.command else {
            panic!("expected the verify subcommand");
        };
        let mut cfg = Config::default();
        model.apply(&mut cfg);
        assert_eq!(cfg.model.kind, ModelKind::Vggface);
        assert_eq!(cfg.model.threshold(), ModelKind::Vggface.default_threshold());
    }
}
