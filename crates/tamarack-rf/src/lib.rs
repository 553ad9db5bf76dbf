//! Random-forest classification core: train, classify, explain.
//!
//! Provides indexed single-tree training over a sorted per-feature index,
//! vote-based ensemble inference across worker threads, and permutation
//! feature importance. File formats and command-line surfaces live in the
//! companion IO crate.

mod classifier;
mod coin;
mod dot;
mod ensemble;
mod error;
mod frequency;
mod importance;
mod index;
mod split;
mod stream;
mod trainer;
mod tree;
mod value;
mod votes;

pub use classifier::TreeClassifier;
pub use coin::{WeightedCoin, mint_seed, seed_master};
pub use dot::render as render_dot;
pub use ensemble::EnsembleClassifier;
pub use error::ForestError;
pub use frequency::{Label, LabelCounts};
pub use importance::feature_importances;
pub use stream::{ClassifierSink, ClassifierStream, Forest};
pub use trainer::{TrainerConfig, TrainingSummary};
pub use tree::IndexedTree;
pub use value::Value;
pub use votes::VoteTable;

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::{Mutex, MutexGuard};

    /// Serializes tests that reseed the process-wide master seed sequence.
    static SEED_LOCK: Mutex<()> = Mutex::new(());

    pub fn seed_lock() -> MutexGuard<'static, ()> {
        SEED_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
