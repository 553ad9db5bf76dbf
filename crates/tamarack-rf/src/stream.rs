//! Classifier streams and sinks.

use std::sync::Arc;

use crate::classifier::TreeClassifier;
use crate::error::ForestError;
use crate::value::Value;

/// A rewindable source of trained tree classifiers.
///
/// Implementations yield trees one by one until exhausted, and can be
/// rewound to the first tree. The reported class and feature counts hold
/// for every tree in the stream.
pub trait ClassifierStream<F: Value> {
    /// Number of classes every tree in the stream distinguishes.
    fn class_count(&self) -> u32;

    /// Number of features every tree in the stream expects.
    fn feature_count(&self) -> u32;

    /// Rewind the stream to its first tree.
    fn rewind(&mut self) -> Result<(), ForestError>;

    /// Return the next tree, or `None` at the end of the stream.
    fn next_classifier(&mut self) -> Result<Option<Arc<TreeClassifier<F>>>, ForestError>;
}

/// An append-only destination for trained tree classifiers.
pub trait ClassifierSink<F: Value> {
    /// Append one classifier. Order of appends is preserved.
    fn append(&mut self, tree: &TreeClassifier<F>) -> Result<(), ForestError>;
}

/// An in-memory ensemble of trained trees.
///
/// Implements both the sink side (training collects into it) and the stream
/// side (inference reads from it), so ensembles can be trained and applied
/// without touching disk.
#[derive(Debug, Clone)]
pub struct Forest<F: Value> {
    class_count: u32,
    feature_count: u32,
    trees: Vec<Arc<TreeClassifier<F>>>,
    cursor: usize,
}

impl<F: Value> Forest<F> {
    /// Create an empty forest with fixed class and feature counts.
    #[must_use]
    pub fn new(class_count: u32, feature_count: u32) -> Self {
        Self {
            class_count,
            feature_count,
            trees: Vec::new(),
            cursor: 0,
        }
    }

    /// Number of trees collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Returns `true` iff the forest holds no trees.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Borrow the collected trees in training order.
    #[must_use]
    pub fn trees(&self) -> &[Arc<TreeClassifier<F>>] {
        &self.trees
    }
}

impl<F: Value> ClassifierSink<F> for Forest<F> {
    fn append(&mut self, tree: &TreeClassifier<F>) -> Result<(), ForestError> {
        debug_assert_eq!(tree.class_count(), self.class_count);
        debug_assert_eq!(tree.feature_count(), self.feature_count);
        self.trees.push(Arc::new(tree.clone()));
        Ok(())
    }
}

impl<F: Value> ClassifierStream<F> for Forest<F> {
    fn class_count(&self) -> u32 {
        self.class_count
    }

    fn feature_count(&self) -> u32 {
        self.feature_count
    }

    fn rewind(&mut self) -> Result<(), ForestError> {
        self.cursor = 0;
        Ok(())
    }

    fn next_classifier(&mut self) -> Result<Option<Arc<TreeClassifier<F>>>, ForestError> {
        let tree = self.trees.get(self.cursor).cloned();
        if tree.is_some() {
            self.cursor += 1;
        }
        Ok(tree)
    }
}
