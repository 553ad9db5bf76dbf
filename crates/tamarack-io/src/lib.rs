//! File formats for the tamarack random forest.
//!
//! Two surfaces: headerless numeric CSV tables (feature matrices and label
//! columns) and the binary ensemble model format (an append-only writer and
//! a rewindable reader of tree classifiers).

mod error;
mod model;
mod table;

pub use error::IoError;
pub use model::{
    Element, ElementType, ForestReader, ForestWriter, ModelInfo, ProducerIdentity,
    read_model_info,
};
pub use table::{Table, read_labels, read_table, write_labels};
