//! Cross-checks evidence values cited by a model against the row it claims to cite.

use log::debug;
use serde_json::Value;

use crate::records::{as_f64, Record};

/// Maps a cited feature name to the dataset column it refers to.
pub trait FeatureResolver {
    fn canonical(&self, cited: &str) -> String;
}

impl<F> FeatureResolver for F
where
    F: Fn(&str) -> String,
{
    fn canonical(&self, cited: &str) -> String {
        self(cited)
    }
}

/// Strips unit suffixes such as `_bpm` or `_db`, in the configured order.
#[derive(Clone, Debug)]
pub struct SuffixStripper {
    suffixes: Vec<String>,
}

impl SuffixStripper {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for SuffixStripper {
    fn default() -> Self {
        Self::new(["_bpm", "_db"])
    }
}

impl FeatureResolver for SuffixStripper {
    fn canonical(&self, cited: &str) -> String {
        let mut name = cited.trim();
        for suffix in &self.suffixes {
            if let Some(stripped) = name.strip_suffix(suffix.as_str()) {
                name = stripped;
            }
        }
        name.to_string()
    }
}

/// Counts over every cited feature of every checked row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HallucinationTally {
    pub checked: usize,
    pub hallucinated: usize,
}

impl HallucinationTally {
    /// `None` when nothing was cited at all.
    pub fn rate(&self) -> Option<f64> {
        (self.checked > 0).then(|| self.hallucinated as f64 / self.checked as f64)
    }
}

pub struct HallucinationScorer<R> {
    resolver: R,
    tolerance: f64,
    evidence_field: String,
}

impl HallucinationScorer<SuffixStripper> {
    pub fn with_defaults() -> Self {
        Self::new(SuffixStripper::default(), 0.1)
    }
}

impl<R: FeatureResolver> HallucinationScorer<R> {
    pub fn new(resolver: R, tolerance: f64) -> Self {
        Self {
            resolver,
            tolerance,
            evidence_field: "evidence".to_string(),
        }
    }

    pub fn evidence_field(mut self, field: impl Into<String>) -> Self {
        self.evidence_field = field.into();
        self
    }

    /// Whether one citation fails to match the real row.
    pub fn is_hallucinated(&self, feature: &str, cited: &Value, row: &Record) -> bool {
        let column = self.resolver.canonical(feature);
        let Some(real) = row.get(&column) else {
            debug!("cited feature {feature:?} -> {column:?} not in row");
            return true;
        };
        match (as_f64(cited), as_f64(real)) {
            (Some(c), Some(r)) => (c - r).abs() > self.tolerance,
            _ => {
                debug!("cited {feature:?}={cited} cannot be compared with {real}");
                true
            }
        }
    }

    /// Checks every `(prediction, ground-truth row)` pair.
    pub fn score<'a, I>(&self, pairs: I) -> HallucinationTally
    where
        I: IntoIterator<Item = (&'a Record, &'a Record)>,
    {
        let mut tally = HallucinationTally::default();
        for (pred, row) in pairs {
            let Some(Value::Object(evidence)) = pred.get(&self.evidence_field) else {
                continue;
            };
            for (feature, cited) in evidence {
                tally.checked += 1;
                if self.is_hallucinated(feature, cited, row) {
                    tally.hallucinated += 1;
                }
            }
        }
        tally
    }
}
