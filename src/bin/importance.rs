//! Estimate permutation feature importance of a trained model.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;

use tamarack_io::{Element, ElementType, ForestReader, read_labels, read_model_info, read_table};
use tamarack_rf::{EnsembleClassifier, feature_importances};

#[derive(Parser)]
#[command(name = "importance")]
#[command(about = "Estimate per-feature permutation importance of a trained model")]
#[command(version)]
struct Args {
    /// Number of threads (1 = apply trees on the calling thread)
    #[arg(short = 't', default_value_t = 1)]
    threads: usize,

    /// Number of decoded trees to keep resident across passes
    #[arg(short = 'p', default_value_t = 1)]
    preload: usize,

    /// Number of shuffled repeats per feature
    #[arg(short = 'r', default_value_t = 5)]
    repeats: u32,

    /// Enable verbose (debug-level) logging
    #[arg(long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long)]
    quiet: bool,

    /// Trained model file
    model_file: PathBuf,

    /// Feature table to score against (headerless CSV)
    data_file: PathBuf,

    /// Label table (single CSV column of class indices)
    label_file: PathBuf,
}

fn run<F: Element>(args: &Args) -> Result<()> {
    let reader = ForestReader::<F>::open_with_preload(&args.model_file, args.preload)?;
    let table = read_table::<F>(&args.data_file)?;
    let labels = read_labels(&args.label_file)?;
    if labels.len() != table.rows() {
        bail!(
            "data file has {} rows but label file has {}",
            table.rows(),
            labels.len()
        );
    }

    let workers = args.threads.saturating_sub(1);
    let mut ensemble = EnsembleClassifier::new(reader, workers)?;

    let started = Instant::now();
    let importances = feature_importances(&mut ensemble, table.values(), &labels, args.repeats)?;
    info!(
        features = importances.len(),
        repeats = args.repeats,
        elapsed = ?started.elapsed(),
        "importance estimated"
    );

    for (feature, importance) in importances.iter().enumerate() {
        println!("F{feature}: {importance:.6}");
    }
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
        "model header read"
    );

    match info.element_type {
        ElementType::F32 => run::<f32>(&args),
        ElementType::F64 => run::<f64>(&args),
    }
}
