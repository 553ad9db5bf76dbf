//! Indexed training-time decision tree.

use std::collections::VecDeque;

use tracing::trace;

use crate::classifier::TreeClassifier;
use crate::coin::WeightedCoin;
use crate::error::ForestError;
use crate::frequency::{Label, LabelCounts};
use crate::index::FeatureIndex;
use crate::split::{SplitCandidate, best_split};
use crate::value::Value;

/// A node of the growing tree.
///
/// Child ids of 0 mark a leaf. `index_offset` is where this node's entries
/// begin in every single-feature index; the indices are partitioned in
/// parallel, so the offset is shared across features.
#[derive(Debug, Clone)]
struct TrainingNode<F: Value> {
    left_child: u32,
    right_child: u32,
    split_feature: u32,
    split_value: F,
    index_offset: usize,
    distance_to_root: u32,
    counts: LabelCounts,
    label: Label,
}

impl<F: Value> TrainingNode<F> {
    fn new(counts: LabelCounts, index_offset: usize, distance_to_root: u32) -> Self {
        let label = counts.most_frequent_label();
        Self {
            left_child: 0,
            right_child: 0,
            split_feature: 0,
            split_value: F::ZERO,
            index_offset,
            distance_to_root,
            counts,
            label,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left_child == 0
    }

    #[inline]
    fn point_count(&self) -> usize {
        self.counts.total()
    }
}

/// A decision tree with an internal sorted search index for fast training.
///
/// Construction builds the sorted per-feature indices, which is the
/// expensive part. When training many trees over the same data, build one
/// tree and clone it per ensemble member, reseeding each clone's coin.
#[derive(Debug, Clone)]
pub struct IndexedTree<'a, F: Value> {
    points: &'a [F],
    feature_count: usize,
    features_to_consider: usize,
    max_depth: u32,
    impurity_threshold: F,
    index: FeatureIndex<F>,
    nodes: Vec<TrainingNode<F>>,
    growable: VecDeque<u32>,
    coin: WeightedCoin,
}

impl<'a, F: Value> IndexedTree<'a, F> {
    /// Create a single-node tree over a row-major matrix and its labels.
    ///
    /// `max_depth` of `None` means unbounded depth. The impurity threshold
    /// is a fraction in [0, 1]: 0 accepts any strict improvement, while any
    /// value at or above `(M - 1)/M` grows nothing.
    pub fn new(
        points: &'a [F],
        labels: &[Label],
        feature_count: usize,
        features_to_consider: usize,
        max_depth: Option<u32>,
        impurity_threshold: F,
    ) -> Result<Self, ForestError> {
        if feature_count == 0 {
            return Err(ForestError::ZeroFeatures);
        }
        if points.len() % feature_count != 0 {
            return Err(ForestError::MalformedBatch {
                values: points.len(),
                feature_count,
            });
        }
        let point_count = points.len() / feature_count;
        if point_count == 0 {
            return Err(ForestError::EmptyDataset);
        }
        if labels.len() != point_count {
            return Err(ForestError::LabelCountMismatch {
                points: point_count,
                labels: labels.len(),
            });
        }
        if features_to_consider == 0 || features_to_consider > feature_count {
            return Err(ForestError::InvalidFeaturesPerSplit {
                features_per_split: features_to_consider,
                feature_count,
            });
        }
        if !(F::ZERO..=F::ONE).contains(&impurity_threshold) {
            return Err(ForestError::InvalidImpurityThreshold {
                threshold: impurity_threshold.to_f64(),
            });
        }

        let index = FeatureIndex::build(points, labels, feature_count)?;
        let counts = LabelCounts::from_labels(labels);
        debug_assert_eq!(counts.total(), point_count);

        let mut tree = Self {
            points,
            feature_count,
            features_to_consider,
            max_depth: max_depth.unwrap_or(u32::MAX),
            impurity_threshold,
            index,
            nodes: vec![TrainingNode::new(counts, 0, 0)],
            growable: VecDeque::new(),
            coin: WeightedCoin::from_seed(0),
        };
        if tree.is_growable_node(0) {
            tree.growable.push_back(0);
        }
        Ok(tree)
    }

    /// Reinitialize the random engine that subsamples features per split.
    pub fn seed(&mut self, seed: u64) {
        self.coin.reseed(seed);
    }

    /// Number of classes distinguished by this tree.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.nodes[0].counts.n_labels()
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` iff any growable leaves remain.
    #[must_use]
    pub fn is_growable(&self) -> bool {
        !self.growable.is_empty()
    }

    /// Grow the tree until no more progress is possible.
    pub fn grow(&mut self) {
        while self.is_growable() {
            self.grow_next_leaf();
        }
    }

    /// Grow the front leaf of the growable queue.
    ///
    /// Leaves without a valid split are finalized with their mode label.
    pub fn grow_next_leaf(&mut self) {
        let leaf = self
            .growable
            .pop_front()
            .expect("grow_next_leaf on a finished tree");
        let node = &self.nodes[leaf as usize];
        let candidate = best_split(
            &self.index,
            node.index_offset,
            node.point_count(),
            &node.counts,
            self.features_to_consider,
            &mut self.coin,
        );
        if candidate.is_valid() {
            self.split_node(leaf, &candidate);
        }
    }

    /// Project the arena into the flat classifier form.
    ///
    /// Node numbering is preserved; the root stays at row 0.
    #[must_use]
    pub fn to_classifier(&self) -> TreeClassifier<F> {
        let node_count = self.nodes.len();
        let mut left_child = Vec::with_capacity(node_count);
        let mut right_child = Vec::with_capacity(node_count);
        let mut split_feature = Vec::with_capacity(node_count);
        let mut split_value = Vec::with_capacity(node_count);
        let mut leaf_label = Vec::with_capacity(node_count);
        for node in &self.nodes {
            left_child.push(node.left_child);
            right_child.push(node.right_child);
            split_feature.push(node.split_feature);
            split_value.push(node.split_value);
            leaf_label.push(node.label);
        }
        TreeClassifier::from_columns(
            self.class_count() as u32,
            self.feature_count as u32,
            left_child,
            right_child,
            split_feature,
            split_value,
            leaf_label,
        )
    }

    /// Apply a split to a leaf: repartition the index, append both children.
    fn split_node(&mut self, node_id: u32, candidate: &SplitCandidate<F>) {
        let node = &self.nodes[node_id as usize];
        debug_assert!(node.is_leaf());

        let offset = node.index_offset;
        let len = node.point_count();
        let depth = node.distance_to_root;
        let left_count = candidate.left_counts().total();

        // Repartition every other feature's slice of the index along the
        // split edge. The split feature's own slice is already separated at
        // the boundary by its sort order.
        let split_feature = candidate.feature() as usize;
        let split_value = candidate.value();
        let points = self.points;
        let feature_count = self.feature_count;
        for feature in 0..feature_count {
            if feature == split_feature {
                continue;
            }
            let moved = self.index.partition(feature, offset, len, |point| {
                points[point as usize * feature_count + split_feature] < split_value
            });
            debug_assert_eq!(moved, left_count);
        }

        let left_id = self.nodes.len() as u32;
        let right_id = left_id + 1;
        self.nodes.push(TrainingNode::new(
            candidate.left_counts().clone(),
            offset,
            depth + 1,
        ));
        self.nodes.push(TrainingNode::new(
            candidate.right_counts().clone(),
            offset + left_count,
            depth + 1,
        ));

        let node = &mut self.nodes[node_id as usize];
        node.split_feature = candidate.feature();
        node.split_value = split_value;
        node.left_child = left_id;
        node.right_child = right_id;

        trace!(
            node = node_id,
            feature = candidate.feature(),
            left = left_id,
            right = right_id,
            "leaf split"
        );

        if self.is_growable_node(left_id) {
            self.growable.push_back(left_id);
        }
        if self.is_growable_node(right_id) {
            self.growable.push_back(right_id);
        }
    }

    /// Returns `true` iff it is still meaningful to grow the given leaf.
    fn is_growable_node(&self, node_id: u32) -> bool {
        let node = &self.nodes[node_id as usize];
        debug_assert!(node.is_leaf());
        node.distance_to_root < self.max_depth
            && node.counts.gini_impurity::<F>() > self.impurity_threshold
    }
}
