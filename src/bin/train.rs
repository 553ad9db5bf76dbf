//! Train a random-forest model on a labeled feature table.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;

use tamarack_io::{ForestWriter, ProducerIdentity, read_labels, read_table};
use tamarack_rf::{
    ClassifierSink, ForestError, TrainerConfig, TreeClassifier, render_dot, seed_master,
};

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train a random-forest classifier on a data table and a label table")]
#[command(version)]
struct Args {
    /// Number of training threads
    #[arg(short = 't', default_value_t = 1)]
    threads: usize,

    /// Maximum tree depth (default: unlimited)
    #[arg(short = 'd')]
    max_depth: Option<u32>,

    /// Impurity threshold below which a leaf is final
    #[arg(short = 'p', default_value_t = 0.0)]
    min_purity: f64,

    /// Number of trees
    #[arg(short = 'c', default_value_t = 150)]
    tree_count: u32,

    /// Random seed (default: a random value)
    #[arg(short = 's')]
    seed: Option<u64>,

    /// Features considered per split (0 = floor(sqrt(feature count)))
    #[arg(short = 'f', default_value_t = 0)]
    features_per_split: usize,

    /// Write a Graphviz file per trained tree next to the model
    #[arg(short = 'g')]
    graphviz: bool,

    /// Enable verbose (debug-level) logging
    #[arg(long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long)]
    quiet: bool,

    /// Feature table (headerless CSV, one row per point)
    data_file: PathBuf,

    /// Label table (single CSV column of class indices)
    label_file: PathBuf,

    /// Model output file
    model_file: PathBuf,
}

/// Forwards every trained tree to an inner sink and drops a Graphviz
/// rendering of it next to the model file.
struct DotSink<'a, K> {
    inner: &'a mut K,
    directory: PathBuf,
    next_index: usize,
}

impl<K: ClassifierSink<f64>> ClassifierSink<f64> for DotSink<'_, K> {
    fn append(&mut self, tree: &TreeClassifier<f64>) -> Result<(), ForestError> {
        let path = self.directory.join(format!("tree_{}.dot", self.next_index));
        std::fs::write(&path, render_dot(tree)).map_err(ForestError::stream)?;
        self.next_index += 1;
        self.inner.append(tree)
    }
}

fn producer() -> ProducerIdentity {
    ProducerIdentity {
        name: "tamarack-train".into(),
        major: env!("CARGO_PKG_VERSION_MAJOR").parse().expect("bad major version"),
        minor: env!("CARGO_PKG_VERSION_MINOR").parse().expect("bad minor version"),
        patch: env!("CARGO_PKG_VERSION_PATCH").parse().expect("bad patch version"),
    }
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

    let seed = args.seed.unwrap_or_else(rand::random);
    seed_master(seed);
    info!(
        seed,
        trees = args.tree_count,
        threads = args.threads,
        min_purity = args.min_purity,
        "configuration resolved"
    );

    let ingest_started = Instant::now();
    let table = read_table::<f64>(&args.data_file)?;
    let labels = read_labels(&args.label_file)?;
    if labels.len() != table.rows() {
        bail!(
            "data file has {} rows but label file has {}",
            table.rows(),
            labels.len()
        );
    }
    info!(
        points = table.rows(),
        features = table.cols(),
        elapsed = ?ingest_started.elapsed(),
        "dataset loaded"
    );

    let class_count = labels.iter().map(|&l| u32::from(l) + 1).max().unwrap_or(1);
    let mut writer = ForestWriter::<f64>::create(
        &args.model_file,
        producer(),
        class_count,
        table.cols() as u32,
    )?;

    let config = TrainerConfig::new(args.tree_count)?
        .with_features_per_split(args.features_per_split)
        .with_max_depth(args.max_depth)
        .with_impurity_threshold(args.min_purity)
        .with_threads(args.threads);

    let train_started = Instant::now();
    let summary = if args.graphviz {
        let directory = dot_directory(&args.model_file).to_path_buf();
        let mut sink = DotSink {
            inner: &mut writer,
            directory,
            next_index: 0,
        };
        config.fit(table.values(), &labels, table.cols(), &mut sink)?
    } else {
        config.fit(table.values(), &labels, table.cols(), &mut writer)?
    };
    writer.finish()?;

    info!(
        trees = summary.tree_count,
        classes = summary.class_count,
        nodes = summary.node_count,
        elapsed = ?train_started.elapsed(),
        "training finished"
    );
    Ok(())
}

fn dot_directory(model_file: &Path) -> &Path {
    match model_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
