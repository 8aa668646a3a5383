//! Console summary and on-disk report of an evaluation run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::EvalError;
use crate::evaluation::{Evaluation, ScoredPair};
use crate::pairs::Relation;
use crate::sweep::SweepResult;

pub const REPORT_FILE: &str = "report.json";
pub const FAR_FRR_FILE: &str = "far_frr.csv";
pub const ROC_FILE: &str = "roc.csv";
pub const SCORES_FILE: &str = "scores.csv";

#[derive(Serialize)]
struct Report<'a> {
    model: &'a str,
    pairs: usize,
    sweep: &'a SweepResult,
}

#[derive(Serialize)]
struct RateRow {
    threshold: f64,
    far: f64,
    frr: f64,
}

#[derive(Serialize)]
struct RocRow {
    threshold: f64,
    fpr: f64,
    tpr: f64,
}

/// One line of `scores.csv`; `label` is 1 for same identity, 0 otherwise.
#[derive(Debug, Serialize, Deserialize)]
struct ScoreRow {
    score: f64,
    label: u8,
}

pub fn summary_line(model: &str, sweep: &SweepResult) -> String {
    format!(
        "[{}] AUC={:.4} | EER={:.4} @ thr={:.4}",
        model, sweep.roc.auc, sweep.eer, sweep.eer_threshold
    )
}

/// Write `report.json`, `far_frr.csv`, `roc.csv` and `scores.csv` under
/// `dir`, returning the paths written.
pub fn write_report(dir: &Path, eval: &Evaluation) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating report directory {}", dir.display()))?;

    let report_path = dir.join(REPORT_FILE);
    let file = std::fs::File::create(&report_path)
        .with_context(|| format!("creating {}", report_path.display()))?;
    serde_json::to_writer_pretty(
        file,
        &Report {
            model: &eval.model,
            pairs: eval.scored.len(),
            sweep: &eval.sweep,
        },
    )?;

    let mut written = vec![report_path];
    written.extend(write_curves(dir, &eval.sweep)?);

    let scores_path = dir.join(SCORES_FILE);
    write_scores(&scores_path, &eval.scored)?;
    written.push(scores_path);

    Ok(written)
}

/// Write the FAR/FRR and ROC tables only.
pub fn write_curves(dir: &Path, sweep: &SweepResult) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating report directory {}", dir.display()))?;

    let rates_path = dir.join(FAR_FRR_FILE);
    let mut wtr = csv::Writer::from_path(&rates_path)
        .with_context(|| format!("creating {}", rates_path.display()))?;
    for ((threshold, far), frr) in sweep.thresholds.iter().zip(&sweep.far).zip(&sweep.frr) {
        wtr.serialize(RateRow {
            threshold: *threshold,
            far: *far,
            frr: *frr,
        })?;
    }
    wtr.flush()?;

    let roc_path = dir.join(ROC_FILE);
    let mut wtr = csv::Writer::from_path(&roc_path)
        .with_context(|| format!("creating {}", roc_path.display()))?;
    let roc = &sweep.roc;
    for ((threshold, fpr), tpr) in roc.thresholds.iter().zip(&roc.fpr).zip(&roc.tpr) {
        wtr.serialize(RocRow {
            threshold: *threshold,
            fpr: *fpr,
            tpr: *tpr,
        })?;
    }
    wtr.flush()?;

    Ok(vec![rates_path, roc_path])
}

pub fn write_scores(path: &Path, scored: &[ScoredPair]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for s in scored {
        wtr.serialize(ScoreRow {
            score: s.score,
            label: s.relation.as_flag(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a `score,label` CSV written by [`write_scores`] or any other tool.
pub fn read_scores(path: &Path) -> Result<Vec<ScoredPair>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening scores file {}", path.display()))?;
    let mut scored = Vec::new();
    for (i, row) in rdr.deserialize::<ScoreRow>().enumerate() {
        let row = row.with_context(|| format!("{}: row {}", path.display(), i + 1))?;
        let relation = Relation::from_flag(row.label)
            .with_context(|| format!("{}: row {}", path.display(), i + 1))?;
        scored.push(ScoredPair {
            score: row.score,
            relation,
        });
    }
    if scored.is_empty() {
        return Err(EvalError::invalid(format!("{} holds no scores", path.display())).into());
    }
    Ok(scored)
}
