//! Vote-based ensemble inference over a stream of trees.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, instrument};

use crate::classifier::TreeClassifier;
use crate::error::ForestError;
use crate::frequency::Label;
use crate::stream::ClassifierStream;
use crate::value::Value;
use crate::votes::VoteTable;

/// A classifier that lets a stream of trees vote on each point's label.
///
/// With a worker cap of 0 every tree is applied inline on the calling
/// thread. Otherwise the calling thread becomes the producer: it pulls
/// trees from the stream and dispatches one job per tree to a pool of
/// workers over a shared FIFO queue, then sends one empty job per worker to
/// drain the pool. Every worker accumulates votes in a private table that
/// is folded into the caller's table after the join, so no vote cell is
/// ever written concurrently. Vote addition commutes, which makes the final
/// counts independent of which worker received which tree.
pub struct EnsembleClassifier<F: Value, S: ClassifierStream<F>> {
    stream: S,
    worker_count: usize,
    class_weights: Vec<f64>,
    _marker: std::marker::PhantomData<F>,
}

impl<F: Value, S: ClassifierStream<F>> EnsembleClassifier<F, S> {
    /// Create an ensemble over a tree stream.
    ///
    /// `worker_count` is the number of worker threads in addition to the
    /// calling thread; 0 selects inline execution. Class weights default
    /// to 1 for every class.
    pub fn new(stream: S, worker_count: usize) -> Result<Self, ForestError> {
        let class_count = stream.class_count();
        if class_count == 0 {
            return Err(ForestError::NoClasses);
        }
        if class_count > 256 {
            return Err(ForestError::TooManyClasses { class_count });
        }
        Ok(Self {
            stream,
            worker_count,
            class_weights: vec![1.0; class_count as usize],
            _marker: std::marker::PhantomData,
        })
    }

    /// Replace the per-class vote weights.
    ///
    /// Weights are applied multiplicatively to the vote totals before the
    /// final argmax. They must be non-negative, one per class.
    pub fn set_class_weights(&mut self, weights: Vec<f64>) -> Result<(), ForestError> {
        if weights.len() != self.class_weights.len() {
            return Err(ForestError::ClassWeightCount {
                expected: self.class_weights.len(),
                got: weights.len(),
            });
        }
        if let Some((class, &weight)) = weights.iter().enumerate().find(|&(_, &w)| w < 0.0) {
            return Err(ForestError::NegativeClassWeight { class, weight });
        }
        self.class_weights = weights;
        Ok(())
    }

    /// Number of classes the ensemble distinguishes.
    #[must_use]
    pub fn class_count(&self) -> u32 {
        self.stream.class_count()
    }

    /// Number of features each input row must carry.
    #[must_use]
    pub fn feature_count(&self) -> u32 {
        self.stream.feature_count()
    }

    /// Give back the underlying stream.
    pub fn into_stream(self) -> S {
        self.stream
    }

    /// Classify a batch of points, returning one label per point.
    #[instrument(skip_all, fields(values = points.len(), workers = self.worker_count))]
    pub fn classify(&mut self, points: &[F]) -> Result<Vec<Label>, ForestError> {
        let point_count = self.point_count(points)?;
        let mut votes = VoteTable::new(point_count, self.stream.class_count() as usize);
        self.classify_and_vote(points, &mut votes)?;
        Ok((0..point_count)
            .map(|point| votes.column_of_weighted_row_maximum(point, &self.class_weights) as Label)
            .collect())
    }

    /// Let every tree in the stream vote on the batch.
    ///
    /// Returns the number of trees that voted. Input validation happens
    /// before any worker is spawned; a failure inside a worker is fatal to
    /// the batch and surfaces here after the join.
    pub fn classify_and_vote(
        &mut self,
        points: &[F],
        votes: &mut VoteTable,
    ) -> Result<usize, ForestError> {
        let point_count = self.point_count(points)?;
        let class_count = self.stream.class_count() as usize;
        if votes.rows() != point_count || votes.cols() != class_count {
            return Err(ForestError::VoteTableShape {
                expected_rows: point_count,
                expected_cols: class_count,
                rows: votes.rows(),
                cols: votes.cols(),
            });
        }

        self.stream.rewind()?;
        if self.worker_count == 0 {
            self.vote_inline(points, votes)
        } else {
            self.vote_with_workers(points, votes, point_count, class_count)
        }
    }

    /// Apply each tree on the calling thread, in stream order.
    fn vote_inline(&mut self, points: &[F], votes: &mut VoteTable) -> Result<usize, ForestError> {
        let mut voters = 0;
        while let Some(tree) = self.stream.next_classifier()? {
            tree.classify_and_vote(points, votes)?;
            voters += 1;
        }
        debug!(voters, "inline voting finished");
        Ok(voters)
    }

    /// Fan trees out to worker threads over a shared job queue.
    ///
    /// An empty job is the termination signal; the producer sends exactly
    /// one per worker once the stream is exhausted.
    fn vote_with_workers(
        &mut self,
        points: &[F],
        votes: &mut VoteTable,
        point_count: usize,
        class_count: usize,
    ) -> Result<usize, ForestError> {
        type Job<F> = Option<Arc<TreeClassifier<F>>>;

        let (job_sender, job_receiver) = mpsc::channel::<Job<F>>();
        let job_receiver = Mutex::new(job_receiver);

        let (voters, worker_tables) = thread::scope(|scope| {
            let mut workers = Vec::with_capacity(self.worker_count);
            for _ in 0..self.worker_count {
                let job_receiver = &job_receiver;
                workers.push(scope.spawn(move || -> Result<VoteTable, ForestError> {
                    let mut table = VoteTable::new(point_count, class_count);
                    loop {
                        // Hold the queue lock only while receiving.
                        let job = {
                            let receiver =
                                job_receiver.lock().expect("job queue lock poisoned");
                            receiver.recv()
                        };
                        match job {
                            Ok(Some(tree)) => tree.classify_and_vote(points, &mut table)?,
                            // An empty job, or a producer that gave up,
                            // drains this worker.
                            Ok(None) | Err(mpsc::RecvError) => return Ok(table),
                        }
                    }
                }));
            }

            // Produce one job per tree, then one terminator per worker.
            let mut produced: Result<usize, ForestError> = Ok(0);
            loop {
                match self.stream.next_classifier() {
                    Ok(Some(tree)) => {
                        if job_sender.send(Some(tree)).is_err() {
                            break;
                        }
                        produced = produced.map(|n| n + 1);
                    }
                    Ok(None) => break,
                    Err(error) => {
                        produced = Err(error);
                        break;
                    }
                }
            }
            for _ in 0..self.worker_count {
                // Send failures only mean the workers are already gone.
                let _ = job_sender.send(None);
            }

            let mut tables = Vec::with_capacity(self.worker_count);
            for worker in workers {
                let table = worker.join().expect("ensemble worker panicked");
                tables.push(table);
            }
            (produced, tables)
        });

        let voters = voters?;
        for table in worker_tables {
            *votes += &table?;
        }
        debug!(voters, workers = self.worker_count, "worker voting finished");
        Ok(voters)
    }

    /// Validate the batch shape and derive the point count.
    fn point_count(&self, points: &[F]) -> Result<usize, ForestError> {
        let feature_count = self.stream.feature_count() as usize;
        if feature_count == 0 {
            return Err(ForestError::ZeroFeatures);
        }
        if points.len() % feature_count != 0 {
            return Err(ForestError::MalformedBatch {
                values: points.len(),
                feature_count,
            });
        }
        Ok(points.len() / feature_count)
    }
}
