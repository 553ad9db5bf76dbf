//! Per-label occurrence counts with impurity and mode queries.

use crate::value::Value;

/// A class label: an unsigned 8-bit class index.
pub type Label = u8;

/// Counts of class occurrences in a set of labeled points.
///
/// Backing storage covers labels `0..n_labels()`; construction from a label
/// slice grows it to the largest label observed. The running total always
/// equals the sum of the per-label counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCounts {
    counts: Vec<usize>,
    total: usize,
}

impl LabelCounts {
    /// Create an empty table that can count labels `0..n_labels`.
    #[must_use]
    pub fn with_label_bound(n_labels: usize) -> Self {
        Self {
            counts: vec![0; n_labels],
            total: 0,
        }
    }

    /// Create a table from a slice of labels.
    ///
    /// The label bound becomes the largest observed label plus one.
    #[must_use]
    pub fn from_labels(labels: &[Label]) -> Self {
        let mut counts = Vec::new();
        for &label in labels {
            let index = label as usize;
            if index >= counts.len() {
                counts.resize(index + 1, 0);
            }
            counts[index] += 1;
        }
        Self {
            counts,
            total: labels.len(),
        }
    }

    /// Add one occurrence of `label`.
    #[inline]
    pub fn increment(&mut self, label: Label) {
        self.counts[label as usize] += 1;
        self.total += 1;
    }

    /// Remove one occurrence of `label`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds when the count for `label` is already zero.
    #[inline]
    pub fn decrement(&mut self, label: Label) {
        debug_assert!(self.counts[label as usize] > 0, "decrement of a zero count");
        self.counts[label as usize] -= 1;
        self.total -= 1;
    }

    /// Return the stored count for `label`.
    #[inline]
    #[must_use]
    pub fn count(&self, label: Label) -> usize {
        self.counts[label as usize]
    }

    /// Return the total of all counts.
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Return the number of distinct, consecutive labels this table covers.
    #[inline]
    #[must_use]
    pub fn n_labels(&self) -> usize {
        self.counts.len()
    }

    /// Compute the Gini impurity `1 - Σ cᵢ²/T²` of the counted set.
    ///
    /// Evaluated in `F` as `1 - (Σ cᵢ²)/T²` in a single pass over the counts.
    ///
    /// # Panics
    ///
    /// Panics in debug builds when the table is empty (`total == 0`).
    #[must_use]
    pub fn gini_impurity<F: Value>(&self) -> F {
        debug_assert!(self.total > 0, "Gini impurity of an empty table");
        let mut squared_counts = F::ZERO;
        for &count in &self.counts {
            let c = F::from_count(count);
            squared_counts = squared_counts + c * c;
        }
        let total = F::from_count(self.total);
        F::ONE - squared_counts / (total * total)
    }

    /// Return the lowest label with the highest count.
    #[must_use]
    pub fn most_frequent_label(&self) -> Label {
        let mut best = 0;
        let mut best_count = 0;
        for (label, &count) in self.counts.iter().enumerate() {
            if count > best_count {
                best = label;
                best_count = count;
            }
        }
        best as Label
    }
}
