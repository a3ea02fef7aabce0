//! Bucket classification scoring: accuracy, macro-F1, MAE and the confusion matrix.

use log::{debug, warn};

use crate::{
    bucket::{Bucket, Bucketizer},
    records::{as_f64, index_by_key, inner_join, JoinKey, Record},
};

/// Precision, recall and F1 of one class against the rest.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// 3×3 counts, rows = true label, columns = predicted label, in [`Bucket::LABELS`] order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: [[usize; 3]; 3],
}

impl ConfusionMatrix {
    /// Records one pair. Pairs involving the invalid sentinel are ignored.
    pub fn record(&mut self, truth: Bucket, predicted: Bucket) -> bool {
        match (truth.index(), predicted.index()) {
            (Some(t), Some(p)) => {
                self.counts[t][p] += 1;
                true
            }
            _ => false,
        }
    }

    pub fn count(&self, truth: Bucket, predicted: Bucket) -> usize {
        match (truth.index(), predicted.index()) {
            (Some(t), Some(p)) => self.counts[t][p],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..3).map(|i| self.counts[i][i]).sum()
    }

    pub fn accuracy(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.correct() as f64 / total as f64)
    }

    pub fn class_scores(&self, class: Bucket) -> ClassScores {
        let Some(c) = class.index() else {
            return ClassScores::default();
        };
        let tp = self.counts[c][c];
        let predicted: usize = (0..3).map(|t| self.counts[t][c]).sum();
        let actual: usize = self.counts[c].iter().sum();

        let precision = ratio_or_zero(tp, predicted);
        let recall = ratio_or_zero(tp, actual);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ClassScores {
            precision,
            recall,
            f1,
        }
    }

    /// Unweighted mean of the per-class F1 over all three labels.
    /// Classes that never occur contribute 0.
    pub fn macro_f1(&self) -> Option<f64> {
        if self.total() == 0 {
            return None;
        }
        let sum: f64 = Bucket::LABELS
            .iter()
            .map(|&b| self.class_scores(b).f1)
            .sum();
        Some(sum / Bucket::LABELS.len() as f64)
    }

    /// Plain-text rendering with labelled rows and columns.
    pub fn render(&self) -> String {
        let mut out = format!("{:<12}", "true\\pred");
        for b in Bucket::LABELS {
            out.push_str(&format!(" {:>6}", b.as_str()));
        }
        out.push('\n');
        for t in Bucket::LABELS {
            out.push_str(&format!("{:<12}", t.as_str()));
            for p in Bucket::LABELS {
                out.push_str(&format!(" {:>6}", self.count(t, p)));
            }
            out.push('\n');
        }
        out
    }
}

fn ratio_or_zero(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassificationReport {
    /// Rows present on both sides with usable labels.
    pub joined: usize,
    /// Predictions without a key or without a ground-truth row.
    pub unmatched: usize,
    /// Joined rows dropped for a missing/unparseable label or invalid truth.
    pub skipped: usize,
    pub confusion: ConfusionMatrix,
    pub accuracy: Option<f64>,
    pub macro_f1: Option<f64>,
    /// Mean absolute popularity error over rows that carry a predicted score.
    pub mae: Option<f64>,
}

/// Joins predictions to ground truth and scores the predicted buckets.
#[derive(Clone, Debug)]
pub struct ClassificationScorer {
    pub bucketizer: Bucketizer,
    pub key: JoinKey,
    pub label_field: String,
    pub popularity_field: String,
}

impl Default for ClassificationScorer {
    fn default() -> Self {
        Self {
            bucketizer: Bucketizer::default(),
            key: JoinKey::TrackId,
            label_field: "bucket".to_string(),
            popularity_field: "popularity".to_string(),
        }
    }
}

impl ClassificationScorer {
    pub fn new(bucketizer: Bucketizer, key: JoinKey) -> Self {
        Self {
            bucketizer,
            key,
            ..Self::default()
        }
    }

    pub fn score(&self, truth: &[Record], predictions: &[Record]) -> ClassificationReport {
        let index = index_by_key(truth, self.key);
        let (pairs, unmatched) = inner_join(predictions, &index, self.key);

        let mut confusion = ConfusionMatrix::default();
        let mut skipped = 0;
        let mut abs_err_sum = 0.0;
        let mut abs_err_n = 0usize;

        for (pred, truth_row) in pairs {
            let Some(true_pop) = truth_row.get(&self.popularity_field).and_then(as_f64) else {
                skipped += 1;
                continue;
            };
            let true_bucket = self.bucketizer.bucket(true_pop);
            if !true_bucket.is_valid() {
                warn!("ground-truth popularity {true_pop} is out of range, row skipped");
                skipped += 1;
                continue;
            }

            let label = pred
                .get(&self.label_field)
                .and_then(|v| v.as_str())
                .map(str::parse::<Bucket>);
            let predicted = match label {
                Some(Ok(b)) => b,
                Some(Err(e)) => {
                    debug!("{e}, row skipped");
                    skipped += 1;
                    continue;
                }
                None => {
                    skipped += 1;
                    continue;
                }
            };

            confusion.record(true_bucket, predicted);

            if let Some(pred_pop) = pred.get(&self.popularity_field).and_then(as_f64) {
                abs_err_sum += (true_pop - pred_pop).abs();
                abs_err_n += 1;
            }
        }

        ClassificationReport {
            joined: confusion.total(),
            unmatched,
            skipped,
            accuracy: confusion.accuracy(),
            macro_f1: confusion.macro_f1(),
            mae: (abs_err_n > 0).then(|| abs_err_sum / abs_err_n as f64),
            confusion,
        }
    }
}
