/// Errors from training, inference and importance estimation.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when the training or inference batch has zero points.
    #[error("dataset has zero points")]
    EmptyDataset,

    /// Returned when the dataset has zero feature columns.
    #[error("dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a flat value buffer is not divisible by the feature count.
    #[error("{values} values cannot form rows of {feature_count} features")]
    MalformedBatch {
        /// Total number of values supplied.
        values: usize,
        /// The expected number of features per row.
        feature_count: usize,
    },

    /// Returned when the label vector length does not match the point count.
    #[error("{labels} labels supplied for {points} points")]
    LabelCountMismatch {
        /// Number of points in the feature matrix.
        points: usize,
        /// Number of labels supplied.
        labels: usize,
    },

    /// Returned when a feature value is NaN.
    #[error("feature value is not a number at point {point}, feature {feature}")]
    NotANumber {
        /// The zero-based row of the offending value.
        point: usize,
        /// The zero-based feature column of the offending value.
        feature: usize,
    },

    /// Returned when the requested tree count is zero.
    #[error("tree count must be at least 1")]
    InvalidTreeCount,

    /// Returned when the per-split feature count is out of range.
    #[error("features per split resolved to {features_per_split}, but must be in [1, {feature_count}]")]
    InvalidFeaturesPerSplit {
        /// The resolved features-per-split value.
        features_per_split: usize,
        /// The number of features in the dataset.
        feature_count: usize,
    },

    /// Returned when the impurity threshold is outside [0, 1].
    #[error("impurity threshold must be in [0, 1], got {threshold}")]
    InvalidImpurityThreshold {
        /// The invalid threshold provided.
        threshold: f64,
    },

    /// Returned when the importance repeat count is zero.
    #[error("repeat count must be at least 1")]
    InvalidRepeatCount,

    /// Returned when a class weight is negative.
    #[error("class weight for class {class} is negative: {weight}")]
    NegativeClassWeight {
        /// The class index with the invalid weight.
        class: usize,
        /// The invalid weight value.
        weight: f64,
    },

    /// Returned when the weight vector length does not match the class count.
    #[error("{got} class weights supplied for {expected} classes")]
    ClassWeightCount {
        /// The number of classes the model distinguishes.
        expected: usize,
        /// The number of weights supplied.
        got: usize,
    },

    /// Returned when a model distinguishes no classes at all.
    #[error("model distinguishes no classes")]
    NoClasses,

    /// Returned when a model distinguishes more classes than a label can hold.
    #[error("model distinguishes {class_count} classes, the maximum is 256")]
    TooManyClasses {
        /// The class count reported by the model.
        class_count: u32,
    },

    /// Returned when a vote table does not match the batch being classified.
    #[error("vote table is {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    VoteTableShape {
        /// Expected row count (one per point).
        expected_rows: usize,
        /// Expected column count (one per class).
        expected_cols: usize,
        /// Actual row count of the supplied table.
        rows: usize,
        /// Actual column count of the supplied table.
        cols: usize,
    },

    /// Returned when a flat classifier violates a structural invariant.
    #[error("corrupt classifier at node {node}: {reason}")]
    CorruptClassifier {
        /// The arena index of the offending node.
        node: u32,
        /// Which invariant was violated.
        reason: &'static str,
    },

    /// Returned when the classifier stream or sink fails.
    #[error("classifier stream failed: {source}")]
    Stream {
        /// The underlying stream error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ForestError {
    /// Wrap an arbitrary stream or sink failure.
    pub fn stream(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        ForestError::Stream {
            source: Box::new(source),
        }
    }
}
