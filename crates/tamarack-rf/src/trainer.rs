//! Training driver: grows an ensemble of indexed trees.

use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::classifier::TreeClassifier;
use crate::coin::mint_seed;
use crate::error::ForestError;
use crate::frequency::Label;
use crate::stream::ClassifierSink;
use crate::tree::IndexedTree;
use crate::value::Value;

/// Configuration for ensemble training.
///
/// Construct via [`TrainerConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter             | Default                      |
/// |-----------------------|------------------------------|
/// | `features_per_split`  | 0 (auto: `floor(sqrt(M))`)   |
/// | `max_depth`           | `None` (unlimited)           |
/// | `impurity_threshold`  | 0.0 (grow to purity)         |
/// | `threads`             | 1 (sequential)               |
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    tree_count: u32,
    features_per_split: usize,
    max_depth: Option<u32>,
    impurity_threshold: f64,
    threads: usize,
}

impl TrainerConfig {
    /// Create a config with the given ensemble size.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidTreeCount`] when `tree_count` is zero.
    pub fn new(tree_count: u32) -> Result<Self, ForestError> {
        if tree_count == 0 {
            return Err(ForestError::InvalidTreeCount);
        }
        Ok(Self {
            tree_count,
            features_per_split: 0,
            max_depth: None,
            impurity_threshold: 0.0,
            threads: 1,
        })
    }

    /// Set the number of features drawn per split. 0 selects
    /// `floor(sqrt(feature_count))`.
    #[must_use]
    pub fn with_features_per_split(mut self, features_per_split: usize) -> Self {
        self.features_per_split = features_per_split;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<u32>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the impurity threshold below which a leaf is final.
    ///
    /// A fraction in [0, 1]: 0 grows until leaves are pure.
    #[must_use]
    pub fn with_impurity_threshold(mut self, impurity_threshold: f64) -> Self {
        self.impurity_threshold = impurity_threshold;
        self
    }

    /// Set the number of training threads. Values of 0 or 1 train
    /// sequentially.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Return the configured tree count.
    #[must_use]
    pub fn tree_count(&self) -> u32 {
        self.tree_count
    }

    /// Train the ensemble and hand every tree to `sink` in tree order.
    ///
    /// `points` is a row-major matrix of `feature_count` columns; `labels`
    /// holds one class index per row. Each tree reseeds its feature
    /// subsampling coin with a child seed minted from the master seed
    /// sequence before any tree is grown, so a fixed master seed yields an
    /// identical ensemble regardless of the thread count.
    ///
    /// Trees are independent units: training parallelizes across trees,
    /// with every worker holding its own indexed tree over the shared
    /// read-only matrix.
    #[instrument(skip_all, fields(trees = self.tree_count, threads = self.threads))]
    pub fn fit<F: Value, K: ClassifierSink<F>>(
        &self,
        points: &[F],
        labels: &[Label],
        feature_count: usize,
        sink: &mut K,
    ) -> Result<TrainingSummary, ForestError> {
        if feature_count == 0 {
            return Err(ForestError::ZeroFeatures);
        }
        let features_per_split = match self.features_per_split {
            0 => ((feature_count as f64).sqrt().floor() as usize).max(1),
            k => k,
        };

        // The template tree owns the sorted feature index; building it is
        // the expensive part, so it is built once and cloned per tree.
        let template = IndexedTree::new(
            points,
            labels,
            feature_count,
            features_per_split,
            self.max_depth,
            F::from_f64(self.impurity_threshold),
        )?;
        let class_count = template.class_count() as u32;

        info!(
            points = labels.len(),
            features = feature_count,
            classes = class_count,
            features_per_split,
            "training ensemble"
        );

        // Mint all per-tree seeds up front, in tree order.
        let seeds: Vec<u64> = (0..self.tree_count).map(|_| mint_seed()).collect();

        let grow_one = |seed: u64| -> TreeClassifier<F> {
            let mut tree = template.clone();
            tree.seed(seed);
            tree.grow();
            tree.to_classifier()
        };

        let classifiers: Vec<TreeClassifier<F>> = if self.threads <= 1 {
            seeds.into_iter().map(grow_one).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build()
                .expect("failed to build the training thread pool");
            pool.install(|| seeds.into_par_iter().map(grow_one).collect())
        };

        let mut node_count = 0;
        for classifier in &classifiers {
            node_count += classifier.node_count();
            sink.append(classifier)?;
        }
        debug!(node_count, "ensemble handed to sink");

        Ok(TrainingSummary {
            tree_count: self.tree_count,
            class_count,
            feature_count: feature_count as u32,
            features_per_split,
            node_count,
        })
    }
}

/// What a training run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingSummary {
    /// Number of trees trained.
    pub tree_count: u32,
    /// Number of classes distinguished by the ensemble.
    pub class_count: u32,
    /// Number of features per input row.
    pub feature_count: u32,
    /// The resolved features-per-split parameter.
    pub features_per_split: usize,
    /// Total node count over all trees.
    pub node_count: usize,
}

#[cfg(test)]
mod tests {
    use super::TrainerConfig;
    use crate::coin::seed_master;
    use crate::ensemble::EnsembleClassifier;
    use crate::error::ForestError;
    use crate::stream::Forest;

    fn three_cluster_data() -> (Vec<f64>, Vec<u8>, u32) {
        let mut points = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30u32 {
            let class = (i % 3) as u8;
            points.push(f64::from(class) * 10.0 + f64::from(i % 4));
            points.push(f64::from((i * 13) % 5));
            labels.push(class);
        }
        (points, labels, 3)
    }

    #[test]
    fn zero_trees_is_rejected() {
        assert!(matches!(
            TrainerConfig::new(0).unwrap_err(),
            ForestError::InvalidTreeCount
        ));
    }

    #[test]
    fn training_fills_the_sink_in_order() {
        let _guard = crate::testutil::seed_lock();
        let (points, labels, classes) = three_cluster_data();
        let mut forest = Forest::new(classes, 2);
        let summary = TrainerConfig::new(7)
            .unwrap()
            .fit(&points, &labels, 2, &mut forest)
            .unwrap();
        assert_eq!(summary.tree_count, 7);
        assert_eq!(summary.class_count, classes);
        assert_eq!(forest.len(), 7);
    }

    #[test]
    fn trained_ensemble_classifies_training_data() {
        let _guard = crate::testutil::seed_lock();
        let (points, labels, classes) = three_cluster_data();
        let mut forest = Forest::new(classes, 2);
        TrainerConfig::new(9)
            .unwrap()
            .fit(&points, &labels, 2, &mut forest)
            .unwrap();
        let mut ensemble = EnsembleClassifier::new(forest, 0).unwrap();
        assert_eq!(ensemble.classify(&points).unwrap(), labels);
    }

    #[test]
    fn same_master_seed_reproduces_the_ensemble() {
        let _guard = crate::testutil::seed_lock();
        let (points, labels, classes) = three_cluster_data();

        seed_master(31);
        let mut first = Forest::new(classes, 2);
        TrainerConfig::new(5)
            .unwrap()
            .fit(&points, &labels, 2, &mut first)
            .unwrap();

        seed_master(31);
        let mut second = Forest::new(classes, 2);
        TrainerConfig::new(5)
            .unwrap()
            .fit(&points, &labels, 2, &mut second)
            .unwrap();

        for (a, b) in first.trees().iter().zip(second.trees()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn thread_count_does_not_change_the_ensemble() {
        let _guard = crate::testutil::seed_lock();
        let (points, labels, classes) = three_cluster_data();

        seed_master(55);
        let mut sequential = Forest::new(classes, 2);
        TrainerConfig::new(6)
            .unwrap()
            .with_threads(1)
            .fit(&points, &labels, 2, &mut sequential)
            .unwrap();

        seed_master(55);
        let mut parallel = Forest::new(classes, 2);
        TrainerConfig::new(6)
            .unwrap()
            .with_threads(4)
            .fit(&points, &labels, 2, &mut parallel)
            .unwrap();

        for (a, b) in sequential.trees().iter().zip(parallel.trees()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn auto_features_per_split_uses_floor_sqrt() {
        let _guard = crate::testutil::seed_lock();
        let points: Vec<f64> = (0..90).map(|i| f64::from((i * 7) % 17)).collect();
        let labels: Vec<u8> = (0..10).map(|i| (i % 2) as u8).collect();
        let mut forest = Forest::new(2, 9);
        let summary = TrainerConfig::new(1)
            .unwrap()
            .fit(&points, &labels, 9, &mut forest)
            .unwrap();
        assert_eq!(summary.features_per_split, 3);
    }

    #[test]
    fn depth_cap_is_honored() {
        let _guard = crate::testutil::seed_lock();
        let (points, labels, classes) = three_cluster_data();
        let mut forest = Forest::new(classes, 2);
        TrainerConfig::new(3)
            .unwrap()
            .with_max_depth(Some(1))
            .fit(&points, &labels, 2, &mut forest)
            .unwrap();
        for tree in forest.trees() {
            // Depth 1 allows at most one split: three nodes.
            assert!(tree.node_count() <= 3);
        }
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let (points, labels, classes) = three_cluster_data();
        let mut forest = Forest::new(classes, 2);
        let err = TrainerConfig::new(1)
            .unwrap()
            .with_impurity_threshold(1.5)
            .fit(&points, &labels, 2, &mut forest)
            .unwrap_err();
        assert!(matches!(err, ForestError::InvalidImpurityThreshold { .. }));
    }
}
