//! Weak learner: candidate generation, split statistics, split selection.
//!
//! The trainer is polymorphic over a [`WeakLearner`] capability contract
//! and a [`Statistics`] type; concrete implementations are value types
//! passed in. The shipped implementation is [`ImageWeakLearner`] over
//! pixel-offset-difference features and [`LabelHistogram`] statistics.

mod features;
mod image;
mod split;
mod statistics;

pub use features::{CandidateParams, CandidateSet, FeatureCandidates, PixelFeature, SplitPoint};
pub use image::ImageWeakLearner;
pub use split::{find_best_split_point, information_gain};
pub use statistics::{HistogramFactory, LabelHistogram, SplitStatistics};

use rand::Rng;

use crate::data::ImageSample;
use crate::parallelism::Parallelism;

// ============================================================================
// Statistics
// ============================================================================

/// Class-label summary of a set of samples.
///
/// `lazy_accumulate` plus `finish_lazy_accumulation` is a batched form of
/// accumulation; its externally observable result must equal calling
/// `accumulate` for every sample. Entropy must use one fixed base across a
/// run.
pub trait Statistics: Clone + Send {
    /// Account for one sample.
    fn accumulate(&mut self, sample: &ImageSample);

    /// Account for one sample, deferring derived bookkeeping until
    /// [`Statistics::finish_lazy_accumulation`].
    fn lazy_accumulate(&mut self, sample: &ImageSample);

    /// Flush deferred bookkeeping from `lazy_accumulate` calls.
    fn finish_lazy_accumulation(&mut self);

    /// Fold another summary of disjoint samples into this one.
    fn merge(&mut self, other: &Self);

    /// Number of accumulated samples.
    fn num_of_samples(&self) -> u64;

    /// Entropy of the label distribution, in nats.
    fn entropy(&self) -> f64;
}

// ============================================================================
// NodeSamples
// ============================================================================

/// The samples routed to one frontier node: a borrowed bag plus a dense
/// list of indices into it.
///
/// This is the explicit samples-by-node view produced by the frontier map;
/// it lives for one training level only.
#[derive(Clone, Copy, Debug)]
pub struct NodeSamples<'a> {
    bag: &'a [ImageSample],
    indices: &'a [u32],
}

impl<'a> NodeSamples<'a> {
    pub fn new(bag: &'a [ImageSample], indices: &'a [u32]) -> Self {
        Self { bag, indices }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate the node's samples in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = &'a ImageSample> + 'a {
        let bag = self.bag;
        let indices = self.indices;
        indices.iter().map(move |&i| &bag[i as usize])
    }
}

// ============================================================================
// WeakLearner
// ============================================================================

/// Capability contract between the level trainer and a weak learner.
pub trait WeakLearner<R: Rng> {
    /// Statistics type accumulated at nodes and split candidates.
    type Statistics: Statistics;

    /// An empty statistics value.
    fn create_statistics(&self) -> Self::Statistics;

    /// Sample feature/threshold candidates for one frontier node.
    fn sample_candidates(&self, samples: NodeSamples<'_>, rng: &mut R) -> CandidateSet;

    /// Accumulate left/right statistics for every candidate over the
    /// node's samples. The `parallelism` hint selects between the serial
    /// pass and candidate-sharded worker threads; both produce identical
    /// statistics.
    fn compute_split_statistics(
        &self,
        samples: NodeSamples<'_>,
        candidates: &CandidateSet,
        parallelism: Parallelism,
    ) -> SplitStatistics<Self::Statistics>;

    /// Pick the information-gain-maximizing candidate.
    ///
    /// Returns `(best_index, best_gain)`; ties go to the first-occurring
    /// index.
    fn find_best_split_point(
        &self,
        parent: &Self::Statistics,
        split_statistics: &SplitStatistics<Self::Statistics>,
    ) -> (usize, f64);
}
