//! Popularity buckets.
//!
//! Scores are split with upper-exclusive thresholds: `[0, 34)` is LOW,
//! `[34, 68)` is MID and everything from 68 upwards is HIGH. Negative and
//! non-finite scores map to [`Bucket::Invalid`].

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{EvalError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Low,
    Mid,
    High,
    Invalid,
}

impl Bucket {
    /// The three real labels, in confusion-matrix order.
    pub const LABELS: [Bucket; 3] = [Bucket::Low, Bucket::Mid, Bucket::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Low => "LOW",
            Bucket::Mid => "MID",
            Bucket::High => "HIGH",
            Bucket::Invalid => "N\\A",
        }
    }

    /// Position in [`Bucket::LABELS`]; `None` for the sentinel.
    pub fn index(self) -> Option<usize> {
        match self {
            Bucket::Low => Some(0),
            Bucket::Mid => Some(1),
            Bucket::High => Some(2),
            Bucket::Invalid => None,
        }
    }

    pub fn is_valid(self) -> bool {
        self != Bucket::Invalid
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a model-emitted label. Only the three real labels are accepted.
impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Bucket::Low),
            "MID" | "MEDIUM" => Ok(Bucket::Mid),
            "HIGH" => Ok(Bucket::High),
            other => Err(format!("unknown bucket label {other:?}")),
        }
    }
}

/// Threshold scheme for turning a popularity score into a [`Bucket`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bucketizer {
    /// Lowest score that is MID.
    pub mid_from: f64,
    /// Lowest score that is HIGH.
    pub high_from: f64,
}

impl Default for Bucketizer {
    fn default() -> Self {
        Self {
            mid_from: 34.0,
            high_from: 68.0,
        }
    }
}

impl Bucketizer {
    pub fn new(mid_from: f64, high_from: f64) -> Result<Self> {
        let b = Self { mid_from, high_from };
        b.validate()?;
        Ok(b)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.mid_from.is_finite() && self.high_from.is_finite()) {
            return Err(EvalError::Config("bucket thresholds must be finite".into()));
        }
        if !(0.0 < self.mid_from && self.mid_from <= self.high_from) {
            return Err(EvalError::Config(format!(
                "bucket thresholds must satisfy 0 < mid_from <= high_from (got {} / {})",
                self.mid_from, self.high_from
            )));
        }
        Ok(())
    }

    pub fn bucket(&self, popularity: f64) -> Bucket {
        if !popularity.is_finite() || popularity < 0.0 {
            Bucket::Invalid
        } else if popularity < self.mid_from {
            Bucket::Low
        } else if popularity < self.high_from {
            Bucket::Mid
        } else {
            Bucket::High
        }
    }
}

/// Buckets a score with the default scheme.
pub fn bucket(popularity: f64) -> Bucket {
    Bucketizer::default().bucket(popularity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundaries_are_assigned_once() {
        assert_eq!(bucket(0.0), Bucket::Low);
        assert_eq!(bucket(33.0), Bucket::Low);
        assert_eq!(bucket(33.9), Bucket::Low);
        assert_eq!(bucket(34.0), Bucket::Mid);
        assert_eq!(bucket(67.0), Bucket::Mid);
        assert_eq!(bucket(67.5), Bucket::Mid);
        assert_eq!(bucket(68.0), Bucket::High);
        assert_eq!(bucket(100.0), Bucket::High);
    }

    #[test]
    fn invalid_inputs_map_to_sentinel() {
        assert_eq!(bucket(-1.0), Bucket::Invalid);
        assert_eq!(bucket(-0.001), Bucket::Invalid);
        assert_eq!(bucket(f64::NAN), Bucket::Invalid);
        assert_eq!(bucket(f64::NEG_INFINITY), Bucket::Invalid);
        assert_eq!(Bucket::Invalid.to_string(), "N\\A");
    }

    #[test]
    fn out_of_range_high_is_high() {
        assert_eq!(bucket(140.0), Bucket::High);
    }

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("low".parse::<Bucket>(), Ok(Bucket::Low));
        assert_eq!(" Mid ".parse::<Bucket>(), Ok(Bucket::Mid));
        assert_eq!("HIGH".parse::<Bucket>(), Ok(Bucket::High));
        assert!("N\\A".parse::<Bucket>().is_err());
        assert!("".parse::<Bucket>().is_err());
    }

    #[test]
    fn rejects_inverted_thresholds() {
        assert!(Bucketizer::new(70.0, 30.0).is_err());
        assert!(Bucketizer::new(0.0, 30.0).is_err());
        assert!(Bucketizer::new(f64::NAN, 30.0).is_err());
        assert!(Bucketizer::new(34.0, 68.0).is_ok());
    }

    proptest! {
        #[test]
        fn every_in_range_score_gets_a_real_label(p in 0.0f64..=100.0) {
            let b = bucket(p);
            prop_assert!(b.is_valid());
            prop_assert_eq!(b, bucket(p));
        }

        #[test]
        fn every_negative_score_is_invalid(p in -1.0e9f64..-1.0e-9) {
            prop_assert_eq!(bucket(p), Bucket::Invalid);
        }
    }
}
