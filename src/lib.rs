//! Scoring for the song-popularity and Text-to-SQL model evaluations.
//!
//! The binaries in this crate are thin drivers: they load JSON inputs named
//! by an [`config::EvalConfig`], hand plain records to the scorers here and
//! print the results.

pub mod bucket;
pub mod classification;
pub mod config;
pub mod error;
pub mod hallucination;
pub mod logging;
pub mod popularity;
pub mod records;
pub mod report;
pub mod sql;

pub use bucket::{bucket, Bucket, Bucketizer};
pub use classification::{ClassificationReport, ClassificationScorer, ConfusionMatrix};
pub use error::{EvalError, Result};
pub use hallucination::{FeatureResolver, HallucinationScorer, HallucinationTally, SuffixStripper};
pub use records::{JoinKey, Record};
