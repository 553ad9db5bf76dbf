//! The flat, immutable form of a trained decision tree.

use serde::{Deserialize, Serialize};

use crate::error::ForestError;
use crate::frequency::Label;
use crate::value::Value;
use crate::votes::VoteTable;

/// A trained decision tree in columnar form.
///
/// Five parallel tables of length `node_count`, indexed by node id. Row 0 is
/// the root. A node with a zero left child is a leaf; an interior node
/// references children strictly after itself, so the arrays describe an
/// acyclic tree. Immutable after construction and therefore freely shared
/// across worker threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "F: Value", deserialize = "F: Value"))]
pub struct TreeClassifier<F: Value> {
    class_count: u32,
    feature_count: u32,
    left_child: Vec<u32>,
    right_child: Vec<u32>,
    split_feature: Vec<u32>,
    split_value: Vec<F>,
    leaf_label: Vec<Label>,
}

impl<F: Value> TreeClassifier<F> {
    /// Assemble a classifier from its columnar tables.
    ///
    /// All tables must have the same length. The caller is responsible for
    /// the structural invariants; [`TreeClassifier::validate`] checks them.
    pub fn from_columns(
        class_count: u32,
        feature_count: u32,
        left_child: Vec<u32>,
        right_child: Vec<u32>,
        split_feature: Vec<u32>,
        split_value: Vec<F>,
        leaf_label: Vec<Label>,
    ) -> Self {
        let node_count = left_child.len();
        debug_assert_eq!(node_count, right_child.len());
        debug_assert_eq!(node_count, split_feature.len());
        debug_assert_eq!(node_count, split_value.len());
        debug_assert_eq!(node_count, leaf_label.len());

        Self {
            class_count,
            feature_count,
            left_child,
            right_child,
            split_feature,
            split_value,
            leaf_label,
        }
    }

    /// Number of classes distinguished by this tree.
    #[inline]
    #[must_use]
    pub fn class_count(&self) -> u32 {
        self.class_count
    }

    /// Number of features each input row must carry.
    #[inline]
    #[must_use]
    pub fn feature_count(&self) -> u32 {
        self.feature_count
    }

    /// Number of nodes in the tree.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.left_child.len()
    }

    /// Returns `true` iff the node is a leaf.
    #[inline]
    #[must_use]
    pub fn is_leaf(&self, node: u32) -> bool {
        self.left_child[node as usize] == 0
    }

    /// Left child id of a node (0 for leaves).
    #[inline]
    #[must_use]
    pub fn left_child(&self, node: u32) -> u32 {
        self.left_child[node as usize]
    }

    /// Right child id of a node (0 for leaves).
    #[inline]
    #[must_use]
    pub fn right_child(&self, node: u32) -> u32 {
        self.right_child[node as usize]
    }

    /// Split feature of an interior node.
    #[inline]
    #[must_use]
    pub fn split_feature(&self, node: u32) -> u32 {
        self.split_feature[node as usize]
    }

    /// Split value of an interior node.
    #[inline]
    #[must_use]
    pub fn split_value(&self, node: u32) -> F {
        self.split_value[node as usize]
    }

    /// Mode label of a node.
    #[inline]
    #[must_use]
    pub fn leaf_label(&self, node: u32) -> Label {
        self.leaf_label[node as usize]
    }

    /// Check the structural invariants of the node tables.
    ///
    /// Used when classifiers cross a trust boundary (model files).
    pub fn validate(&self) -> Result<(), ForestError> {
        let node_count = self.node_count();
        if node_count == 0 {
            return Err(ForestError::CorruptClassifier {
                node: 0,
                reason: "tree has no nodes",
            });
        }
        for node in 0..node_count {
            let left = self.left_child[node];
            let right = self.right_child[node];
            if (left == 0) != (right == 0) {
                return Err(ForestError::CorruptClassifier {
                    node: node as u32,
                    reason: "one child link is null",
                });
            }
            if left == 0 {
                if u32::from(self.leaf_label[node]) >= self.class_count {
                    return Err(ForestError::CorruptClassifier {
                        node: node as u32,
                        reason: "leaf label out of range",
                    });
                }
                continue;
            }
            if left as usize <= node || right as usize <= node {
                return Err(ForestError::CorruptClassifier {
                    node: node as u32,
                    reason: "child precedes parent",
                });
            }
            if left as usize >= node_count || right as usize >= node_count {
                return Err(ForestError::CorruptClassifier {
                    node: node as u32,
                    reason: "child link out of bounds",
                });
            }
            if self.split_feature[node] >= self.feature_count {
                return Err(ForestError::CorruptClassifier {
                    node: node as u32,
                    reason: "split feature out of range",
                });
            }
        }
        Ok(())
    }

    /// Cast one vote per point into `votes`.
    ///
    /// The batch is pushed through the tree without per-point traversal:
    /// starting from the full id list at the root, each interior node
    /// partitions its id slice in place with the predicate
    /// `point[split_feature] < split_value`, and every leaf adds one vote per
    /// remaining id to its own label. The vote table must have one row per
    /// point and one column per class.
    pub fn classify_and_vote(&self, points: &[F], votes: &mut VoteTable) -> Result<(), ForestError> {
        let feature_count = self.feature_count as usize;
        if points.len() % feature_count != 0 {
            return Err(ForestError::MalformedBatch {
                values: points.len(),
                feature_count,
            });
        }
        let point_count = points.len() / feature_count;
        if votes.rows() != point_count || votes.cols() != self.class_count as usize {
            return Err(ForestError::VoteTableShape {
                expected_rows: point_count,
                expected_cols: self.class_count as usize,
                rows: votes.rows(),
                cols: votes.cols(),
            });
        }

        let mut ids: Vec<u32> = (0..point_count as u32).collect();
        let mut pending: Vec<(u32, usize, usize)> = vec![(0, 0, point_count)];
        while let Some((node, begin, end)) = pending.pop() {
            if self.is_leaf(node) {
                let label = self.leaf_label[node as usize] as usize;
                for &id in &ids[begin..end] {
                    votes.add_vote(id as usize, label);
                }
                continue;
            }
            let feature = self.split_feature[node as usize] as usize;
            let value = self.split_value[node as usize];
            let below = partition_ids(&mut ids[begin..end], |id| {
                points[id as usize * feature_count + feature] < value
            });
            let mid = begin + below;
            pending.push((self.right_child[node as usize], mid, end));
            pending.push((self.left_child[node as usize], begin, mid));
        }
        Ok(())
    }

    /// Classify a batch of points, returning one label per point.
    ///
    /// Builds a private vote table, lets the tree vote, and takes the row
    /// argmax (lowest class index on ties).
    pub fn classify(&self, points: &[F]) -> Result<Vec<Label>, ForestError> {
        let feature_count = self.feature_count as usize;
        if points.len() % feature_count != 0 {
            return Err(ForestError::MalformedBatch {
                values: points.len(),
                feature_count,
            });
        }
        let point_count = points.len() / feature_count;
        let mut votes = VoteTable::new(point_count, self.class_count as usize);
        self.classify_and_vote(points, &mut votes)?;
        Ok((0..point_count)
            .map(|point| votes.column_of_row_maximum(point) as Label)
            .collect())
    }
}

/// Move ids satisfying the predicate to the front, returning their count.
fn partition_ids(ids: &mut [u32], goes_left: impl Fn(u32) -> bool) -> usize {
    let mut below = 0;
    for i in 0..ids.len() {
        if goes_left(ids[i]) {
            ids.swap(below, i);
            below += 1;
        }
    }
    below
}
