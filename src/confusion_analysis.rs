/*
cargo run --release --bin confusion_analysis -- \
    --truth final_dataset_withpop.json \
    --model GPT=classifications_GPT.json
*/

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use songs_eval::{
    config::{EvalConfig, ModelFile},
    logging,
    records::load_records,
    report::fmt_metric,
    Bucket, ClassificationScorer, JoinKey,
};

// CLI parameters
#[derive(Parser, Debug)]
#[command(version, about = "Confusion matrix and per-class scores of the predicted popularity buckets")]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    truth: Option<PathBuf>,

    #[arg(long, value_enum)]
    join_key: Option<JoinKey>,

    // NAME=PATH, repeatable
    #[arg(long = "model")]
    models: Vec<ModelFile>,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

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
    logging::init(&args.log_dir, "confusion_analysis", level)?;

    let mut cfg = EvalConfig::load(args.config.as_deref())?;
    let pop = &mut cfg.popularity;
    if let Some(p) = args.truth {
        pop.truth_file = p;
    }
    if let Some(k) = args.join_key {
        pop.join_key = k;
    }
    if !args.models.is_empty() {
        pop.models = args.models;
    }
    cfg.validate()?;
    let pop = &cfg.popularity;

    let truth = load_records(&pop.truth_file, "ground truth")
        .with_context(|| "Cannot evaluate without ground truth")?;
    let scorer = ClassificationScorer::new(pop.buckets, pop.join_key);

    for ModelFile { name, path } in &pop.models {
        let preds = match load_records(path, "model predictions") {
            Ok(p) => p,
            Err(e) => {
                warn!("skipping {name}: {e}");
                continue;
            }
        };
        let report = scorer.score(&truth, &preds);
        info!(
            "{name}: {} joined, {} unmatched, {} skipped",
            report.joined, report.unmatched, report.skipped
        );

        println!("=== {name} ===");
        println!(
            "accuracy {}  macro-F1 {}  (n = {})",
            fmt_metric(report.accuracy),
            fmt_metric(report.macro_f1),
            report.joined
        );
        println!("{:<6} {:<9} {:<9} {:<9}", "class", "precision", "recall", "f1");
        for class in Bucket::LABELS {
            let s = report.confusion.class_scores(class);
            println!(
                "{:<6} {:<9.4} {:<9.4} {:<9.4}",
                class.as_str(),
                s.precision,
                s.recall,
                s.f1
            );
        }
        println!("{}", report.confusion.render());
    }

    Ok(())
}
