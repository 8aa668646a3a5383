//! Glue between datasets, an embedding model and the threshold sweep.

use anyhow::{Context, Result};
use image::DynamicImage;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::dataset::{load_lfw_pairs, Dataset};
use crate::error::EvalResult;
use crate::pairs::{count_relations, sample_pairs, Pair, Relation};
use crate::similarity::similarity_embeddings;
use crate::sweep::{self, SweepResult};
use crate::{Embedder, Embedding};

const PROGRESS_EVERY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredPair {
    pub score: f64,
    pub relation: Relation,
}

/// Outcome of one benchmark run.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub model: String,
    pub scored: Vec<ScoredPair>,
    pub sweep: SweepResult,
}

/// One-shot comparison of two faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub score: f64,
    pub threshold: f64,
    pub verified: bool,
}

pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("opening image {}", path.display()))
}

/// Pairs for a run: the fixed LFW protocol when configured, otherwise pairs
/// sampled from the identity directories.
pub fn build_pairs(cfg: &Config) -> Result<Vec<Pair<String, PathBuf>>> {
    let pairs = match &cfg.lfw {
        Some(lfw) => load_lfw_pairs(&lfw.root, &lfw.pairs_file)?,
        None => {
            let dataset = Dataset::load(&cfg.dataset.root, &cfg.dataset.extensions)?;
            sample_pairs(dataset.images_by_label(), cfg.n_same, cfg.n_diff, cfg.seed)?
        }
    };
    let (same, diff) = count_relations(&pairs);
    info!(
        "Generated {} pairs ({} same, {} different)",
        pairs.len(),
        same,
        diff
    );
    Ok(pairs)
}

/// Embed every distinct image once and score each pair.
///
/// Embeddings are looked up by image key, so the result does not depend on
/// the order in which images were embedded.
pub fn score_pairs<K, T, E, L>(
    pairs: &[Pair<K, T>],
    embedder: &mut E,
    mut load: L,
) -> Result<Vec<ScoredPair>>
where
    T: Eq + Hash + Clone + Debug,
    E: Embedder + ?Sized,
    L: FnMut(&T) -> Result<DynamicImage>,
{
    let mut cache: HashMap<T, Embedding> = HashMap::new();
    for (i, pair) in pairs.iter().enumerate() {
        for key in [&pair.a, &pair.b] {
            if cache.contains_key(key) {
                continue;
            }
            let img = load(key)?;
            let embedding = embedder
                .embed(&img)
                .with_context(|| format!("embedding {:?} with {}", key, embedder.name()))?;
            cache.insert(key.clone(), embedding);
        }
        if (i + 1) % PROGRESS_EVERY == 0 || i + 1 == pairs.len() {
            info!("Embedded {}/{} pairs", i + 1, pairs.len());
        }
    }
    debug!("{} distinct images embedded", cache.len());

    pairs
        .iter()
        .map(|pair| {
            let a = lookup(&cache, &pair.a)?;
            let b = lookup(&cache, &pair.b)?;
            let score = similarity_embeddings(a, b)
                .with_context(|| format!("scoring {:?} against {:?}", pair.a, pair.b))?;
            Ok(ScoredPair {
                score,
                relation: pair.relation,
            })
        })
        .collect()
}

fn lookup<'a, T: Eq + Hash + Debug>(
    cache: &'a HashMap<T, Embedding>,
    key: &T,
) -> Result<&'a Embedding> {
    cache
        .get(key)
        .ok_or_else(|| anyhow::anyhow!("no embedding for {:?}", key))
}

/// Run the threshold sweep over already scored pairs.
pub fn sweep_scored(scored: &[ScoredPair], n_thresholds: usize) -> EvalResult<SweepResult> {
    let scores: Vec<f64> = scored.iter().map(|s| s.score).collect();
    let labels: Vec<Relation> = scored.iter().map(|s| s.relation).collect();
    sweep::evaluate(&scores, &labels, n_thresholds)
}

/// Full benchmark: pairs, embeddings, scores, sweep.
pub fn run<E: Embedder + ?Sized>(cfg: &Config, embedder: &mut E) -> Result<Evaluation> {
    let pairs = build_pairs(cfg)?;
    let scored = score_pairs(&pairs, embedder, |path: &PathBuf| load_image(path))?;
    let sweep = sweep_scored(&scored, cfg.n_thresholds)?;
    Ok(Evaluation {
        model: embedder.name().to_string(),
        scored,
        sweep,
    })
}

/// Compare two faces; they match when the similarity reaches `threshold`.
pub fn verify<E: Embedder + ?Sized>(
    embedder: &mut E,
    a: &DynamicImage,
    b: &DynamicImage,
    threshold: f64,
) -> Result<Verdict> {
    let ea = embedder.embed(a).context("embedding first image")?;
    let eb = embedder.embed(b).context("embedding second image")?;
    let score = similarity_embeddings(&ea, &eb)?;
    Ok(Verdict {
        score,
        threshold,
        verified: score >= threshold,
    })
}
