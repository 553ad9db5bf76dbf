//! Permutation-based feature importance.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::coin::mint_seed;
use crate::ensemble::EnsembleClassifier;
use crate::error::ForestError;
use crate::frequency::Label;
use crate::stream::ClassifierStream;
use crate::value::Value;

/// Fraction of points whose predicted label matches the reference label.
fn accuracy(predicted: &[Label], reference: &[Label]) -> f64 {
    debug_assert_eq!(predicted.len(), reference.len());
    if predicted.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(reference)
        .filter(|(p, r)| p == r)
        .count();
    correct as f64 / predicted.len() as f64
}

/// Estimate per-feature importance by column permutation.
///
/// The baseline accuracy of the ensemble on `(points, labels)` is compared
/// against its accuracy on `repeats` copies of the batch in which one
/// feature's column is uniformly permuted (all other columns untouched).
/// The importance of a feature is the baseline accuracy minus the mean
/// permuted accuracy, indexed by feature id.
///
/// Each (feature, repeat) permutation is seeded from the master seed
/// sequence in feature-major order, so results reproduce across runs with
/// the same master seed. Shuffled columns of different features are never
/// mixed into the same batch.
#[instrument(skip_all, fields(values = points.len(), repeats))]
pub fn feature_importances<F: Value, S: ClassifierStream<F>>(
    ensemble: &mut EnsembleClassifier<F, S>,
    points: &[F],
    labels: &[Label],
    repeats: u32,
) -> Result<Vec<f64>, ForestError> {
    if repeats == 0 {
        return Err(ForestError::InvalidRepeatCount);
    }
    let feature_count = ensemble.feature_count() as usize;
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
    if labels.len() != point_count {
        return Err(ForestError::LabelCountMismatch {
            points: point_count,
            labels: labels.len(),
        });
    }

    let baseline = accuracy(&ensemble.classify(points)?, labels);
    debug!(baseline, "baseline accuracy computed");

    let mut importances = Vec::with_capacity(feature_count);
    let mut shuffled = points.to_vec();
    let mut column: Vec<F> = Vec::with_capacity(point_count);
    for feature in 0..feature_count {
        let mut drop_sum = 0.0;
        for _ in 0..repeats {
            let mut rng = ChaCha8Rng::seed_from_u64(mint_seed());

            // Permute this feature's column of the original batch.
            column.clear();
            column.extend((0..point_count).map(|p| points[p * feature_count + feature]));
            column.shuffle(&mut rng);
            shuffled.copy_from_slice(points);
            for (point, &value) in column.iter().enumerate() {
                shuffled[point * feature_count + feature] = value;
            }

            let permuted = accuracy(&ensemble.classify(&shuffled)?, labels);
            drop_sum += baseline - permuted;
        }
        importances.push(drop_sum / f64::from(repeats));
    }

    Ok(importances)
}
