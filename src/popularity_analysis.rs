/*
cargo run --release --bin popularity_analysis -- \
    --truth final_dataset_withpop.json \
    --features final_dataset.json \
    --model Gemini=classifications_Gemini.json \
    --model GPT=classifications_GPT.json \
    --model Claude=classifications_Claude.json \
    --out-csv popularity_metrics.csv
*/

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use songs_eval::{
    config::{EvalConfig, ModelFile},
    logging,
    popularity::PopularityEvaluator,
    records::load_records,
    report, JoinKey,
};

// CLI parameters
#[derive(Parser, Debug)]
#[command(version, about = "Bucket accuracy, macro-F1, MAE and hallucination rate per model")]
struct Args {
    // JSON config layered over the built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,

    // Ground-truth rows with the real popularity
    #[arg(long)]
    truth: Option<PathBuf>,

    // Full song rows used to check cited evidence
    #[arg(long)]
    features: Option<PathBuf>,

    #[arg(long, value_enum)]
    join_key: Option<JoinKey>,

    // NAME=PATH, repeatable; replaces the configured model list
    #[arg(long = "model")]
    models: Vec<ModelFile>,

    #[arg(long)]
    tolerance: Option<f64>,

    // Also write the metrics table as CSV
    #[arg(long)]
    out_csv: Option<PathBuf>,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    // Debug-level file log
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let log_path = logging::init(&args.log_dir, "popularity_analysis", level)?;

    // config + overrides
    let mut cfg = EvalConfig::load(args.config.as_deref())?;
    let pop = &mut cfg.popularity;
    if let Some(p) = args.truth {
        pop.truth_file = p;
    }
    if let Some(p) = args.features {
        pop.features_file = Some(p);
    }
    if let Some(k) = args.join_key {
        pop.join_key = k;
    }
    if let Some(t) = args.tolerance {
        pop.tolerance = t;
    }
    if !args.models.is_empty() {
        pop.models = args.models;
    }
    cfg.validate()?;
    let pop = &cfg.popularity;
    info!("Program started, config: {pop:?}");

    // inputs
    let truth = load_records(&pop.truth_file, "ground truth")
        .with_context(|| "Cannot evaluate without ground truth")?;
    let features = match &pop.features_file {
        Some(path) => match load_records(path, "song features") {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!("{e}; checking evidence against the ground-truth rows instead");
                None
            }
        },
        None => None,
    };
    let evaluator = PopularityEvaluator::new(pop, &truth, features.as_deref());

    // per model
    let mut rows = Vec::new();
    for ModelFile { name, path } in &pop.models {
        let preds = match load_records(path, "model predictions") {
            Ok(p) => p,
            Err(e) => {
                warn!("skipping {name}: {e}");
                continue;
            }
        };
        rows.push(evaluator.evaluate(name, &preds));
    }

    print!("{}", report::metrics_table(&rows));

    if let Some(out) = &args.out_csv {
        report::write_metrics_csv(out, &rows)
            .with_context(|| format!("Cannot write {}", out.display()))?;
        println!("metrics written to {}", out.display());
    }
    info!("done, log at {}", log_path.display());

    Ok(())
}
