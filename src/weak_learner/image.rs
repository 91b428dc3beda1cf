//! The image weak learner.
//!
//! Composes candidate sampling, split-statistics accumulation, and split
//! selection over pixel-offset-difference features. Accumulation is the
//! single parallel stage of training: candidates are sharded across worker
//! threads by contiguous feature ranges, each worker owning a disjoint
//! slice of the left/right statistics and iterating all samples. No
//! synchronization is needed in the hot loop; `rayon::scope` is the join
//! barrier before scoring.

use rand::Rng;

use super::features::{symmetric_offset_pool, CandidateParams, CandidateSet, FeatureCandidates, PixelFeature};
use super::split;
use super::statistics::{HistogramFactory, LabelHistogram, SplitStatistics};
use super::{NodeSamples, Statistics, WeakLearner};
use crate::parallelism::Parallelism;

// ============================================================================
// ImageWeakLearner
// ============================================================================

/// Weak learner over pixel-offset-difference decision stumps.
pub struct ImageWeakLearner {
    params: CandidateParams,
    factory: HistogramFactory,
}

impl ImageWeakLearner {
    pub fn new(params: CandidateParams, factory: HistogramFactory) -> Self {
        Self { params, factory }
    }

    pub fn params(&self) -> &CandidateParams {
        &self.params
    }

    /// Min/max of `feature` over the node's samples.
    ///
    /// A degenerate range (empty node or all-equal values) collapses to
    /// `[0, 0]`; the fixed threshold range does not re-apply.
    fn adaptive_threshold_range(&self, samples: NodeSamples<'_>, feature: &PixelFeature) -> (f32, f32) {
        let mut min_value = f32::INFINITY;
        let mut max_value = f32::NEG_INFINITY;
        for sample in samples.iter() {
            let value = feature.pixel_difference(sample);
            if value < min_value {
                min_value = value;
            }
            if value > max_value {
                max_value = value;
            }
        }
        if min_value >= max_value {
            (0.0, 0.0)
        } else {
            (min_value, max_value)
        }
    }

    fn sample_thresholds<R: Rng>(
        &self,
        samples: NodeSamples<'_>,
        feature: &PixelFeature,
        rng: &mut R,
    ) -> Vec<f32> {
        if self.params.binary_images {
            // -0.5 and +0.5 instead of 0 and 1 keep the thresholds
            // insensitive to `<` vs `<=` on 0/1 data.
            return vec![-0.5, 0.5];
        }
        let (low, high) = if self.params.adaptive_threshold_range {
            self.adaptive_threshold_range(samples, feature)
        } else {
            (self.params.threshold_range_low, self.params.threshold_range_high)
        };
        (0..self.params.num_of_thresholds)
            .map(|_| if high > low { rng.gen_range(low..high) } else { low })
            .collect()
    }
}

/// Accumulate left/right statistics for a contiguous feature range.
///
/// `left` and `right` cover exactly the flattened candidates of
/// `features`; the caller hands each shard a disjoint slice pair.
fn accumulate_feature_range<S: Statistics>(
    samples: NodeSamples<'_>,
    features: &[FeatureCandidates],
    left: &mut [S],
    right: &mut [S],
) {
    for sample in samples.iter() {
        let mut index = 0;
        for candidate in features {
            let value = candidate.feature.pixel_difference(sample);
            for &threshold in &candidate.thresholds {
                if value < threshold {
                    left[index].lazy_accumulate(sample);
                } else {
                    right[index].lazy_accumulate(sample);
                }
                index += 1;
            }
        }
    }
    for statistics in left.iter_mut() {
        statistics.finish_lazy_accumulation();
    }
    for statistics in right.iter_mut() {
        statistics.finish_lazy_accumulation();
    }
}

impl<R: Rng> WeakLearner<R> for ImageWeakLearner {
    type Statistics = LabelHistogram;

    fn create_statistics(&self) -> LabelHistogram {
        self.factory.create()
    }

    fn sample_candidates(&self, samples: NodeSamples<'_>, rng: &mut R) -> CandidateSet {
        let offsets_x =
            symmetric_offset_pool(self.params.offset_x_range_low, self.params.offset_x_range_high);
        let offsets_y =
            symmetric_offset_pool(self.params.offset_y_range_low, self.params.offset_y_range_high);

        let mut candidates = CandidateSet::new();
        for _ in 0..self.params.num_of_features {
            let offset_x1 = offsets_x[rng.gen_range(0..offsets_x.len())];
            let offset_y1 = offsets_y[rng.gen_range(0..offsets_y.len())];
            let offset_x2 = offsets_x[rng.gen_range(0..offsets_x.len())];
            let offset_y2 = offsets_y[rng.gen_range(0..offsets_y.len())];
            let feature = PixelFeature::new(offset_x1, offset_y1, offset_x2, offset_y2);
            let thresholds = self.sample_thresholds(samples, &feature, rng);
            candidates.push(feature, thresholds);
        }
        candidates
    }

    fn compute_split_statistics(
        &self,
        samples: NodeSamples<'_>,
        candidates: &CandidateSet,
        parallelism: Parallelism,
    ) -> SplitStatistics<LabelHistogram> {
        let mut split_statistics =
            SplitStatistics::new(candidates.total_size(), || self.factory.create());

        if !parallelism.allows_parallel() || candidates.is_empty() {
            let (left, right) = split_statistics.halves_mut();
            accumulate_feature_range(samples, candidates.candidates(), left, right);
            return split_statistics;
        }

        let n_shards = parallelism.n_threads();
        let n_features = candidates.len();

        // Carve both statistics arrays into per-shard disjoint slices that
        // line up with contiguous feature ranges [t*F/T, (t+1)*F/T).
        let mut shards = Vec::with_capacity(n_shards);
        let (mut left_rest, mut right_rest) = split_statistics.halves_mut();
        for shard in 0..n_shards {
            let feature_start = shard * n_features / n_shards;
            let feature_end = (shard + 1) * n_features / n_shards;
            let features = &candidates.candidates()[feature_start..feature_end];
            let flat_len: usize = features.iter().map(|c| c.thresholds.len()).sum();
            let (left, rest) = std::mem::take(&mut left_rest).split_at_mut(flat_len);
            left_rest = rest;
            let (right, rest) = std::mem::take(&mut right_rest).split_at_mut(flat_len);
            right_rest = rest;
            shards.push((features, left, right));
        }

        rayon::scope(|scope| {
            for (features, left, right) in shards {
                scope.spawn(move |_| accumulate_feature_range(samples, features, left, right));
            }
        });

        split_statistics
    }

    fn find_best_split_point(
        &self,
        parent: &LabelHistogram,
        split_statistics: &SplitStatistics<LabelHistogram>,
    ) -> (usize, f64) {
        split::find_best_split_point(parent, split_statistics)
    }
}

// ============================================================================
// Tests
// ============================================================================
