//! Per-model popularity evaluation: bucket metrics plus hallucination rate.

use log::info;
use std::collections::HashMap;

use crate::{
    classification::{ClassificationReport, ClassificationScorer},
    config::PopularityConfig,
    hallucination::{HallucinationScorer, SuffixStripper},
    records::{index_by_key, inner_join, JoinKey, Record},
};

/// Metrics of one model on the popularity task.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelMetrics {
    pub model: String,
    pub report: ClassificationReport,
    pub hallucination_rate: Option<f64>,
    pub evidence_checked: usize,
}

pub struct PopularityEvaluator<'a> {
    truth: &'a [Record],
    key: JoinKey,
    /// Feature rows for every key that also has a ground-truth row.
    evidence_rows: HashMap<String, &'a Record>,
    classifier: ClassificationScorer,
    hallucination: HallucinationScorer<SuffixStripper>,
}

impl<'a> PopularityEvaluator<'a> {
    /// `features` defaults to the truth rows when the full song rows are unavailable.
    pub fn new(cfg: &PopularityConfig, truth: &'a [Record], features: Option<&'a [Record]>) -> Self {
        let key = cfg.join_key;
        let truth_index = index_by_key(truth, key);
        let feature_index = index_by_key(features.unwrap_or(truth), key);
        let evidence_rows = feature_index
            .into_iter()
            .filter(|(k, _)| truth_index.contains_key(k))
            .collect();

        Self {
            truth,
            key,
            evidence_rows,
            classifier: ClassificationScorer::new(cfg.buckets, key),
            hallucination: HallucinationScorer::new(
                SuffixStripper::new(&cfg.evidence_suffixes),
                cfg.tolerance,
            ),
        }
    }

    pub fn evaluate(&self, model: &str, predictions: &[Record]) -> ModelMetrics {
        let report = self.classifier.score(self.truth, predictions);
        let (pairs, _) = inner_join(predictions, &self.evidence_rows, self.key);
        let tally = self.hallucination.score(pairs);
        info!(
            "{model}: joined {} / unmatched {} / skipped {}, {} evidence values checked",
            report.joined, report.unmatched, report.skipped, tally.checked
        );
        ModelMetrics {
            model: model.to_string(),
            report,
            hallucination_rate: tally.rate(),
            evidence_checked: tally.checked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rows(v: Value) -> Vec<Record> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn evidence_is_checked_against_feature_rows() {
        let truth = rows(json!([
            {"track_id": "a", "popularity": 80},
            {"track_id": "b", "popularity": 10},
        ]));
        let features = rows(json!([
            {"track_id": "a", "tempo": 120.0, "loudness": -4.0},
            {"track_id": "b", "tempo": 90.0, "loudness": -9.0},
            {"track_id": "z", "tempo": 60.0},
        ]));
        let preds = rows(json!([
            {"track_id": "a", "bucket": "HIGH", "popularity": 75,
             "evidence": {"tempo_bpm": 120.04, "loudness_db": -4.0}},
            {"track_id": "b", "bucket": "MID", "popularity": 40,
             "evidence": {"tempo_bpm": 95.0, "release_year": 2001}},
            {"track_id": "z", "bucket": "LOW", "evidence": {"tempo": 60.0}},
        ]));

        let cfg = PopularityConfig::default();
        let eval = PopularityEvaluator::new(&cfg, &truth, Some(features.as_slice()));
        let m = eval.evaluate("GPT", &preds);

        assert_eq!(m.report.joined, 2);
        assert_eq!(m.report.accuracy, Some(0.5));
        assert_eq!(m.report.mae, Some(17.5));
        // "z" has no ground truth, so its evidence is not counted
        assert_eq!(m.evidence_checked, 4);
        assert_eq!(m.hallucination_rate, Some(0.5));
    }

    #[test]
    fn truth_rows_stand_in_for_missing_features() {
        let truth = rows(json!([{"track_id": "a", "popularity": 50, "energy": 0.4}]));
        let preds = rows(json!([{"track_id": "a", "bucket": "MID", "evidence": {"energy": 0.4}}]));
        let cfg = PopularityConfig::default();
        let m = PopularityEvaluator::new(&cfg, &truth, None).evaluate("Claude", &preds);
        assert_eq!(m.hallucination_rate, Some(0.0));
        assert_eq!(m.report.accuracy, Some(1.0));
    }
}
