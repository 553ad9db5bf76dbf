//! Per-feature sorted views of the training set.

use crate::error::ForestError;
use crate::frequency::Label;
use crate::value::Value;

/// One feature's sorted view of the point set.
///
/// Three parallel columns (value, point id, label), sorted by value with
/// stable ties. The structure-of-arrays layout keeps the left-to-right split
/// scan on contiguous memory.
#[derive(Debug, Clone)]
struct FeatureColumn<F> {
    values: Vec<F>,
    points: Vec<u32>,
    labels: Vec<Label>,
}

/// A borrowed slice of one feature's index, covering a single node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FeatureSlice<'a, F> {
    pub values: &'a [F],
    pub points: &'a [u32],
    pub labels: &'a [Label],
}

/// Sorted per-feature indices over one training set.
///
/// Every feature has exactly one entry per point; all features share the
/// same point set. Slices of the index are partitioned in place as splits
/// are applied, so a node's entries always occupy one contiguous range at
/// the same offset in every feature's index.
#[derive(Debug, Clone)]
pub(crate) struct FeatureIndex<F: Value> {
    columns: Vec<FeatureColumn<F>>,
    point_count: usize,
}

impl<F: Value> FeatureIndex<F> {
    /// Build the index from a row-major matrix and its label vector.
    ///
    /// Rejects NaN feature values with [`ForestError::NotANumber`].
    pub fn build(
        points: &[F],
        labels: &[Label],
        feature_count: usize,
    ) -> Result<Self, ForestError> {
        let point_count = labels.len();
        debug_assert_eq!(points.len(), point_count * feature_count);
        debug_assert!(u32::try_from(point_count).is_ok());

        let mut columns = Vec::with_capacity(feature_count);
        for feature in 0..feature_count {
            let mut entries: Vec<(F, u32, Label)> = Vec::with_capacity(point_count);
            for point in 0..point_count {
                let value = points[point * feature_count + feature];
                if value.is_nan() {
                    return Err(ForestError::NotANumber { point, feature });
                }
                entries.push((value, point as u32, labels[point]));
            }
            // Stable sort by value; ties keep point order.
            entries.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut column = FeatureColumn {
                values: Vec::with_capacity(point_count),
                points: Vec::with_capacity(point_count),
                labels: Vec::with_capacity(point_count),
            };
            for (value, point, label) in entries {
                column.values.push(value);
                column.points.push(point);
                column.labels.push(label);
            }
            columns.push(column);
        }

        Ok(Self {
            columns,
            point_count,
        })
    }

    /// Number of indexed points.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Number of indexed features.
    #[inline]
    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    /// Borrow the entries of one node within one feature's index.
    #[inline]
    pub fn slice(&self, feature: usize, offset: usize, len: usize) -> FeatureSlice<'_, F> {
        let column = &self.columns[feature];
        FeatureSlice {
            values: &column.values[offset..offset + len],
            points: &column.points[offset..offset + len],
            labels: &column.labels[offset..offset + len],
        }
    }

    /// Stably partition one node's range of one feature's index.
    ///
    /// Entries for which `goes_left(point)` holds move to the front of the
    /// range; relative order is preserved on both sides, so each side stays
    /// sorted by this feature's value. Returns the left-hand entry count.
    pub fn partition(
        &mut self,
        feature: usize,
        offset: usize,
        len: usize,
        goes_left: impl Fn(u32) -> bool,
    ) -> usize {
        let column = &mut self.columns[feature];
        let mut left: Vec<(F, u32, Label)> = Vec::with_capacity(len);
        let mut right: Vec<(F, u32, Label)> = Vec::with_capacity(len);
        for i in offset..offset + len {
            let entry = (column.values[i], column.points[i], column.labels[i]);
            if goes_left(entry.1) {
                left.push(entry);
            } else {
                right.push(entry);
            }
        }
        let left_len = left.len();
        for (i, (value, point, label)) in left.into_iter().chain(right).enumerate() {
            column.values[offset + i] = value;
            column.points[offset + i] = point;
            column.labels[offset + i] = label;
        }
        left_len
    }
}
