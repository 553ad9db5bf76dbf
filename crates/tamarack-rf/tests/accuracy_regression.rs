//! Accuracy and determinism regression tests for tamarack-rf.
//!
//! These tests verify end-to-end behavior of training, ensemble inference
//! and importance estimation on small deterministic datasets.

use std::sync::{Mutex, MutexGuard};

use tamarack_rf::{
    EnsembleClassifier, Forest, TrainerConfig, feature_importances, seed_master,
};

/// Serializes tests that reseed the process-wide master seed sequence.
static SEED_LOCK: Mutex<()> = Mutex::new(());

fn seed_lock() -> MutexGuard<'static, ()> {
    SEED_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Helpers: deterministic synthetic datasets
// ---------------------------------------------------------------------------

/// 90 points, 4 features, 3 classes. Feature 0 separates the classes into
/// disjoint bands; features 1..3 are deterministic noise.
fn banded_classification() -> (Vec<f64>, Vec<u8>, u32) {
    let n_samples = 90u32;
    let mut points = Vec::with_capacity(n_samples as usize * 4);
    let mut labels = Vec::with_capacity(n_samples as usize);
    for i in 0..n_samples {
        let class = (i % 3) as u8;
        labels.push(class);
        points.push(f64::from(class) * 10.0 + f64::from(i % 7) * 0.3);
        points.push(f64::from((i * 31) % 17));
        points.push(f64::from((i * 13) % 11));
        points.push(f64::from(i % 2));
    }
    (points, labels, 3)
}

fn train(points: &[f64], labels: &[u8], classes: u32, trees: u32) -> Forest<f64> {
    let mut forest = Forest::new(classes, 4);
    TrainerConfig::new(trees)
        .unwrap()
        .fit(points, labels, 4, &mut forest)
        .unwrap();
    forest
}

// ---------------------------------------------------------------------------
// Training-set accuracy
// ---------------------------------------------------------------------------

/// A fully grown forest over duplicate-free points reproduces its own
/// training labels exactly.
#[test]
fn fully_grown_forest_is_exact_on_training_data() {
    let (points, labels, classes) = banded_classification();
    let forest = train(&points, &labels, classes, 20);
    let mut ensemble = EnsembleClassifier::new(forest, 0).unwrap();
    assert_eq!(ensemble.classify(&points).unwrap(), labels);
}

/// A single feature with a two-block label layout yields the canonical
/// stump: split at the first right-block value, leaves 0 and 1.
#[test]
fn two_block_training_set_yields_the_canonical_stump() {
    let points = vec![0.0, 1.0, 2.0, 3.0];
    let labels = vec![0, 0, 1, 1];
    let mut forest = Forest::new(2, 1);
    TrainerConfig::new(1)
        .unwrap()
        .with_features_per_split(1)
        .fit(&points, &labels, 1, &mut forest)
        .unwrap();

    let tree = &forest.trees()[0];
    assert_eq!(tree.node_count(), 3);
    assert_eq!(tree.split_feature(0), 0);
    assert_eq!(tree.split_value(0), 2.0);
    assert_eq!(tree.leaf_label(tree.left_child(0)), 0);
    assert_eq!(tree.leaf_label(tree.right_child(0)), 1);
}

/// XOR is learnable at depth 2 when both features are considered per split.
#[test]
fn xor_is_learned_with_two_features_per_split() {
    let points = vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0];
    let labels = vec![0, 1, 1, 0];
    let mut forest = Forest::new(2, 2);
    TrainerConfig::new(1)
        .unwrap()
        .with_features_per_split(2)
        .fit(&points, &labels, 2, &mut forest)
        .unwrap();

    let mut ensemble = EnsembleClassifier::new(forest, 0).unwrap();
    assert_eq!(ensemble.classify(&points).unwrap(), labels);
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

/// Two sequential trainings with the same master seed produce identical
/// flat classifiers.
#[test]
fn same_seed_trains_an_identical_ensemble() {
    let _guard = seed_lock();
    let (points, labels, classes) = banded_classification();

    seed_master(2024);
    let first = train(&points, &labels, classes, 8);
    seed_master(2024);
    let second = train(&points, &labels, classes, 8);

    assert_eq!(first.len(), second.len());
    for (a, b) in first.trees().iter().zip(second.trees()) {
        assert_eq!(a, b);
    }
}

/// Inference with no workers and with four workers produces identical
/// labels for the same model and input.
#[test]
fn worker_count_does_not_change_labels() {
    let _guard = seed_lock();
    seed_master(9);
    let (points, labels, classes) = banded_classification();
    let forest = train(&points, &labels, classes, 11);

    let mut inline = EnsembleClassifier::new(forest.clone(), 0).unwrap();
    let expected = inline.classify(&points).unwrap();

    let mut workers = EnsembleClassifier::new(forest, 4).unwrap();
    assert_eq!(workers.classify(&points).unwrap(), expected);
}

// ---------------------------------------------------------------------------
// Feature importance
// ---------------------------------------------------------------------------

/// A model driven by feature 0 alone gives it strictly positive importance
/// that dominates every noise feature.
#[test]
fn importance_separates_signal_from_noise() {
    let _guard = seed_lock();
    seed_master(1701);
    let (points, labels, classes) = banded_classification();
    let forest = train(&points, &labels, classes, 20);
    let mut ensemble = EnsembleClassifier::new(forest, 0).unwrap();

    let importances = feature_importances(&mut ensemble, &points, &labels, 5).unwrap();
    assert_eq!(importances.len(), 4);
    assert!(
        importances[0] > 0.2,
        "signal importance {} too small",
        importances[0]
    );
    for feature in 1..4 {
        assert!(
            importances[0] > importances[feature],
            "noise feature {feature} ({}) outranks the signal ({})",
            importances[feature],
            importances[0]
        );
    }
}
