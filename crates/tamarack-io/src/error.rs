use std::path::PathBuf;

use crate::model::ElementType;

/// Errors from table and model file handling.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when a file cannot be opened for reading.
    #[error("cannot open {path}")]
    FileOpen {
        /// Path to the file that could not be opened.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a file cannot be created for writing.
    #[error("cannot create {path}")]
    FileCreate {
        /// Path to the file that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a file cannot be written.
    #[error("cannot write {path}")]
    WriteFile {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a table file contains a malformed CSV record.
    #[error("malformed table {path}")]
    CsvParse {
        /// Path to the offending table file.
        path: PathBuf,
        /// The underlying CSV error.
        source: csv::Error,
    },

    /// Returned when a table row has a different column count than the first.
    #[error("{path}: row {row} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the offending table file.
        path: PathBuf,
        /// The zero-based row index.
        row: usize,
        /// The column count of the first row.
        expected: usize,
        /// The column count of the offending row.
        got: usize,
    },

    /// Returned when a table cell cannot be parsed as a number.
    #[error("{path}: cell at row {row}, column {column} is not a number")]
    InvalidNumber {
        /// Path to the offending table file.
        path: PathBuf,
        /// The zero-based row index.
        row: usize,
        /// The zero-based column index.
        column: usize,
    },

    /// Returned when a label value does not fit an 8-bit class index.
    #[error("{path}: label {value} at row {row} is out of range (0..=255)")]
    LabelOutOfRange {
        /// Path to the offending label file.
        path: PathBuf,
        /// The zero-based row index.
        row: usize,
        /// The offending value.
        value: i64,
    },

    /// Returned when a label table is not a single column.
    #[error("{path}: label table has {columns} columns, expected 1")]
    LabelColumns {
        /// Path to the offending label file.
        path: PathBuf,
        /// The column count found.
        columns: usize,
    },

    /// Returned when a table has no rows.
    #[error("{path}: table is empty")]
    EmptyTable {
        /// Path to the empty table file.
        path: PathBuf,
    },

    /// Returned when a model file does not start with the format magic.
    #[error("{path} is not a tamarack model file")]
    NotAModel {
        /// Path to the offending file.
        path: PathBuf,
    },

    /// Returned when a model file uses an unknown format version.
    #[error("{path}: model format version {found} is not supported (expected {expected})")]
    UnsupportedModelVersion {
        /// The format version this build reads and writes.
        expected: u32,
        /// The format version found in the file.
        found: u32,
        /// Path to the offending model file.
        path: PathBuf,
    },

    /// Returned when a model stores a different element type than requested.
    #[error("{path}: model stores {found} features, {expected} was requested")]
    ElementTypeMismatch {
        /// The element type the caller asked for.
        expected: ElementType,
        /// The element type recorded in the file.
        found: ElementType,
        /// Path to the model file.
        path: PathBuf,
    },

    /// Returned when a model file ends in the middle of a record.
    #[error("{path}: model file is truncated")]
    TruncatedModel {
        /// Path to the truncated model file.
        path: PathBuf,
    },

    /// Returned when a model record cannot be decoded.
    #[error("cannot decode model record in {path}")]
    Decode {
        /// Path to the offending model file.
        path: PathBuf,
        /// The underlying decoding error.
        source: bincode::Error,
    },

    /// Returned when a model record cannot be encoded.
    #[error("cannot encode model record for {path}")]
    Encode {
        /// Path to the model file being written.
        path: PathBuf,
        /// The underlying encoding error.
        source: bincode::Error,
    },

    /// Returned when a tree does not match the dimensions in the model header.
    #[error(
        "{path}: tree with {got_classes} classes and {got_features} features \
         does not match a model of {classes} classes and {features} features"
    )]
    TreeShapeMismatch {
        /// Path to the model file.
        path: PathBuf,
        /// Class count recorded in the header.
        classes: u32,
        /// Feature count recorded in the header.
        features: u32,
        /// Class count of the offending tree.
        got_classes: u32,
        /// Feature count of the offending tree.
        got_features: u32,
    },

    /// Returned when a decoded tree violates a structural invariant.
    #[error("{path}: corrupt tree record: {source}")]
    CorruptTree {
        /// Path to the model file.
        path: PathBuf,
        /// The structural violation.
        source: tamarack_rf::ForestError,
    },
}
