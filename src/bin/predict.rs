//! Classify a feature table with a trained model.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use tamarack_io::{Element, ElementType, ForestReader, read_model_info, read_table, write_labels};
use tamarack_rf::EnsembleClassifier;

#[derive(Parser)]
#[command(name = "predict")]
#[command(about = "Classify a data table with a trained random-forest model")]
#[command(version)]
struct Args {
    /// Number of threads (1 = apply trees on the calling thread)
    #[arg(short = 't', default_value_t = 1)]
    threads: usize,

    /// Enable verbose (debug-level) logging
    #[arg(long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long)]
    quiet: bool,

    /// Trained model file
    model_file: PathBuf,

    /// Feature table to classify (headerless CSV)
    data_file: PathBuf,

    /// Label output file (single CSV column)
    label_file: PathBuf,
}

fn run<F: Element>(args: &Args) -> Result<()> {
    let reader = ForestReader::<F>::open(&args.model_file)?;
    let table = read_table::<F>(&args.data_file)?;

    // The calling thread produces jobs; the rest of the budget is workers.
    let workers = args.threads.saturating_sub(1);
    let mut ensemble = EnsembleClassifier::new(reader, workers)?;

    let started = Instant::now();
    let labels = ensemble.classify(table.values())?;
    info!(
        points = labels.len(),
        workers,
        elapsed = ?started.elapsed(),
        "batch classified"
    );

    write_labels(&args.label_file, &labels)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match (args.verbose, args.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let info = read_model_info(&args.model_file)?;
    info!(
        model = %args.model_file.display(),
        classes = info.class_count,
        features = info.feature_count,
        producer = %info.producer.name,
        "model header read"
    );

    match info.element_type {
        ElementType::F32 => run::<f32>(&args),
        ElementType::F64 => run::<f64>(&args),
    }
}
