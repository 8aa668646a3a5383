//! FAR/FRR threshold sweep, equal error rate and ROC.
//!
//! Two threshold sets are used on purpose: the EER is located on a linear
//! grid of `n_thresholds` points (its precision scales with the grid), while
//! the ROC curve steps through every distinct score for an exact curve.

use ndarray::Array1;
use serde::Serialize;

use crate::error::{EvalError, EvalResult};
use crate::pairs::Relation;

/// Margin added on both ends of the grid so the extremes accept everything
/// and reject everything. Widened for large scores.
pub const THRESHOLD_MARGIN: f64 = 1e-6;

/// Confusion counts where "positive" means predicted same identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl Confusion {
    /// False accepts over all different-identity pairs, 0 when there are none.
    pub fn far(&self) -> f64 {
        ratio(self.fp, self.fp + self.tn)
    }

    /// False rejects over all same-identity pairs, 0 when there are none.
    pub fn frr(&self) -> f64 {
        ratio(self.fn_, self.fn_ + self.tp)
    }

    pub fn tpr(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorRates {
    pub threshold: f64,
    pub far: f64,
    pub frr: f64,
    pub counts: Confusion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    /// Descending; the first entry is `max_score + 1` for the (0, 0) start.
    pub thresholds: Array1<f64>,
    pub fpr: Array1<f64>,
    pub tpr: Array1<f64>,
    pub auc: f64,
}

/// Everything a renderer needs from one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResult {
    pub thresholds: Array1<f64>,
    pub far: Array1<f64>,
    pub frr: Array1<f64>,
    pub eer: f64,
    pub eer_threshold: f64,
    pub eer_index: usize,
    pub eer_counts: Confusion,
    pub n_same: usize,
    pub n_diff: usize,
    pub roc: RocCurve,
}

impl SweepResult {
    /// FAR, FRR and counts at the EER grid point.
    pub fn eer_rates(&self) -> ErrorRates {
        ErrorRates {
            threshold: self.eer_threshold,
            far: self.far[self.eer_index],
            frr: self.frr[self.eer_index],
            counts: self.eer_counts,
        }
    }
}

/// Scores split by ground truth and sorted ascending, for counting how many
/// of each sit at or above a threshold.
struct SortedScores {
    same: Vec<f64>,
    diff: Vec<f64>,
}

impl SortedScores {
    fn new(scores: &[f64], labels: &[Relation]) -> Self {
        let mut same = Vec::new();
        let mut diff = Vec::new();
        for (&score, &label) in scores.iter().zip(labels) {
            match label {
                Relation::Same => same.push(score),
                Relation::Different => diff.push(score),
            }
        }
        same.sort_by(f64::total_cmp);
        diff.sort_by(f64::total_cmp);
        Self { same, diff }
    }

    fn counts_at(&self, threshold: f64) -> Confusion {
        let same_rejected = self.same.partition_point(|s| *s < threshold);
        let diff_rejected = self.diff.partition_point(|s| *s < threshold);
        Confusion {
            tp: self.same.len() - same_rejected,
            fn_: same_rejected,
            fp: self.diff.len() - diff_rejected,
            tn: diff_rejected,
        }
    }
}

/// FAR and FRR when accepting every pair with `score >= threshold`.
pub fn error_rates(scores: &[f64], labels: &[Relation], threshold: f64) -> EvalResult<ErrorRates> {
    validate_scores(scores, labels)?;
    let counts = SortedScores::new(scores, labels).counts_at(threshold);
    Ok(ErrorRates {
        threshold,
        far: counts.far(),
        frr: counts.frr(),
        counts,
    })
}

/// Sweep `n_thresholds` evenly spaced thresholds over the score range and
/// summarise FAR, FRR, EER and ROC.
pub fn evaluate(
    scores: &[f64],
    labels: &[Relation],
    n_thresholds: usize,
) -> EvalResult<SweepResult> {
    validate_scores(scores, labels)?;
    if n_thresholds < 2 {
        return Err(EvalError::invalid(format!(
            "need at least 2 thresholds, got {}",
            n_thresholds
        )));
    }

    let (min, max) = min_max(scores);
    let margin = grid_margin(min, max);
    let (lo, hi) = (min - margin, max + margin);
    let mut thresholds = Array1::linspace(lo, hi, n_thresholds);
    // linspace may round the last step back onto `max`
    if let Some(last) = thresholds.last_mut() {
        *last = hi;
    }

    let sorted = SortedScores::new(scores, labels);
    let counts: Vec<Confusion> = thresholds.iter().map(|t| sorted.counts_at(*t)).collect();
    let far: Array1<f64> = counts.iter().map(Confusion::far).collect();
    let frr: Array1<f64> = counts.iter().map(Confusion::frr).collect();

    let mut eer_index = 0;
    let mut best_gap = f64::INFINITY;
    for (i, (a, r)) in far.iter().zip(frr.iter()).enumerate() {
        let gap = (a - r).abs();
        // strict: ties keep the lowest threshold
        if gap < best_gap {
            best_gap = gap;
            eer_index = i;
        }
    }

    let roc = roc_curve(scores, &sorted);

    Ok(SweepResult {
        eer: (far[eer_index] + frr[eer_index]) / 2.0,
        eer_threshold: thresholds[eer_index],
        eer_index,
        eer_counts: counts[eer_index],
        n_same: sorted.same.len(),
        n_diff: sorted.diff.len(),
        thresholds,
        far,
        frr,
        roc,
    })
}

fn roc_curve(scores: &[f64], sorted: &SortedScores) -> RocCurve {
    let (_, max) = min_max(scores);
    let mut distinct: Vec<f64> = scores.to_vec();
    distinct.sort_by(|a, b| b.total_cmp(a));
    distinct.dedup();

    let n_points = distinct.len() + 1;
    let mut thresholds = Vec::with_capacity(n_points);
    let mut fpr = Vec::with_capacity(n_points);
    let mut tpr = Vec::with_capacity(n_points);

    thresholds.push(max + 1.0);
    fpr.push(0.0);
    tpr.push(0.0);

    for t in distinct {
        let counts = sorted.counts_at(t);
        thresholds.push(t);
        fpr.push(counts.far());
        tpr.push(counts.tpr());
    }
    let auc = trapezoid(&fpr, &tpr);
    RocCurve {
        thresholds: Array1::from(thresholds),
        fpr: Array1::from(fpr),
        tpr: Array1::from(tpr),
        auc,
    }
}

/// Area under a piecewise linear curve.
fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[1] + ys[0]) / 2.0)
        .sum()
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

/// A fixed margin vanishes in rounding once scores are large, so it grows
/// with the magnitude of the range to stay a few ulps clear of it.
fn grid_margin(min: f64, max: f64) -> f64 {
    THRESHOLD_MARGIN.max(f64::EPSILON * 4.0 * min.abs().max(max.abs()))
}

fn min_max(scores: &[f64]) -> (f64, f64) {
    scores
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(*s), hi.max(*s))
        })
}

fn validate_scores(scores: &[f64], labels: &[Relation]) -> EvalResult<()> {
    if scores.is_empty() {
        return Err(EvalError::invalid("no scores to evaluate"));
    }
    if scores.len() != labels.len() {
        return Err(EvalError::invalid(format!(
            "scores length {} != labels length {}",
            scores.len(),
            labels.len()
        )));
    }
    if let Some(pos) = scores.iter().position(|s| !s.is_finite()) {
        return Err(EvalError::invalid(format!(
            "score at index {} is not finite",
            pos
        )));
    }
    Ok(())
}
