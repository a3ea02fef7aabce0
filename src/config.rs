//! Run configuration: input paths, model → file maps and scoring constants.
//!
//! Every field has a default matching the usual working-directory layout, so
//! a config file only needs the values that differ.

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{
    bucket::Bucketizer,
    error::{EvalError, Result},
    records::JoinKey,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub name: String,
    pub path: PathBuf,
}

impl ModelFile {
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: PathBuf::from(path),
        }
    }
}

/// `NAME=PATH`, as given on the command line.
impl FromStr for ModelFile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
                Ok(ModelFile::new(name.trim(), path.trim()))
            }
            _ => Err(format!("expected NAME=PATH, got {s:?}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopularityConfig {
    /// Rows with `track_id`, `track_name` and the true `popularity`.
    pub truth_file: PathBuf,
    /// Full song rows used to verify cited evidence. Falls back to the truth rows.
    pub features_file: Option<PathBuf>,
    pub join_key: JoinKey,
    pub models: Vec<ModelFile>,
    pub buckets: Bucketizer,
    /// Largest absolute difference at which a cited value still counts as read correctly.
    pub tolerance: f64,
    pub evidence_suffixes: Vec<String>,
}

impl Default for PopularityConfig {
    fn default() -> Self {
        Self {
            truth_file: PathBuf::from("final_dataset_withpop.json"),
            features_file: Some(PathBuf::from("final_dataset.json")),
            join_key: JoinKey::TrackId,
            models: vec![
                ModelFile::new("Gemini", "classifications_Gemini.json"),
                ModelFile::new("GPT", "classifications_GPT.json"),
                ModelFile::new("Claude", "classifications_Claude.json"),
            ],
            buckets: Bucketizer::default(),
            tolerance: 0.1,
            evidence_suffixes: vec!["_bpm".to_string(), "_db".to_string()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    pub dataset_file: PathBuf,
    pub gold_file: PathBuf,
    pub table: String,
    pub models: Vec<ModelFile>,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            dataset_file: PathBuf::from("song_dataset.json"),
            gold_file: PathBuf::from("question_list_withanswer.json"),
            table: "song_dataset".to_string(),
            models: vec![
                ModelFile::new("Gemini", "results_Gemini.json"),
                ModelFile::new("GPT", "results_GPT.json"),
                ModelFile::new("Claude", "results_Claude.json"),
            ],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub popularity: PopularityConfig,
    pub sql: SqlConfig,
}

impl EvalConfig {
    /// Defaults when `path` is `None`, otherwise the JSON file layered over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            None => Self::default(),
            Some(p) => {
                if !p.exists() {
                    return Err(EvalError::MissingInput {
                        what: "config file",
                        path: p.to_path_buf(),
                    });
                }
                let raw = fs::read_to_string(p).map_err(|source| EvalError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&raw).map_err(|source| EvalError::Json {
                    path: p.to_path_buf(),
                    source,
                })?
            }
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let pop = &self.popularity;
        pop.buckets.validate()?;
        if !(pop.tolerance.is_finite() && pop.tolerance >= 0.0) {
            return Err(EvalError::Config(format!(
                "tolerance must be a non-negative number (got {})",
                pop.tolerance
            )));
        }
        if self.sql.table.trim().is_empty() {
            return Err(EvalError::Config("sql.table must not be empty".into()));
        }
        for m in pop.models.iter().chain(&self.sql.models) {
            if m.name.trim().is_empty() {
                return Err(EvalError::Config(format!(
                    "model entry for {} has no name",
                    m.path.display()
                )));
            }
        }
        Ok(())
    }
}
