//! Label-histogram statistics and per-candidate split statistics.

use serde::{Deserialize, Serialize};

use super::Statistics;
use crate::data::ImageSample;

// ============================================================================
// LabelHistogram
// ============================================================================

/// Dense class-label histogram with a sample count.
///
/// The histogram length is fixed at construction by the
/// [`HistogramFactory`]; labels must lie in `[0, num_of_labels)` (the
/// background filter upstream guarantees this for well-formed label
/// grids).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelHistogram {
    counts: Vec<u64>,
    num_samples: u64,
}

impl LabelHistogram {
    /// An empty histogram over `num_of_labels` classes.
    pub fn empty(num_of_labels: usize) -> Self {
        Self {
            counts: vec![0; num_of_labels],
            num_samples: 0,
        }
    }

    /// Per-class counts.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Rebuild from serialized parts.
    pub fn from_parts(counts: Vec<u64>, num_samples: u64) -> Self {
        Self { counts, num_samples }
    }

    #[inline]
    fn bump(&mut self, sample: &ImageSample) {
        let label = sample.label();
        assert!(
            label >= 0 && (label as usize) < self.counts.len(),
            "label {} outside histogram range 0..{}",
            label,
            self.counts.len()
        );
        self.counts[label as usize] += 1;
    }
}

impl Statistics for LabelHistogram {
    fn accumulate(&mut self, sample: &ImageSample) {
        self.bump(sample);
        self.num_samples += 1;
    }

    fn lazy_accumulate(&mut self, sample: &ImageSample) {
        self.bump(sample);
    }

    fn finish_lazy_accumulation(&mut self) {
        self.num_samples = self.counts.iter().sum();
    }

    fn merge(&mut self, other: &Self) {
        assert_eq!(self.counts.len(), other.counts.len());
        for (count, other_count) in self.counts.iter_mut().zip(&other.counts) {
            *count += other_count;
        }
        self.num_samples += other.num_samples;
    }

    fn num_of_samples(&self) -> u64 {
        self.num_samples
    }

    fn entropy(&self) -> f64 {
        if self.num_samples == 0 {
            return 0.0;
        }
        let n = self.num_samples as f64;
        let mut entropy = 0.0;
        for &count in &self.counts {
            if count > 0 {
                let p = count as f64 / n;
                entropy -= p * p.ln();
            }
        }
        entropy
    }
}

// ============================================================================
// HistogramFactory
// ============================================================================

/// Creates empty [`LabelHistogram`] values of a fixed class count.
#[derive(Clone, Copy, Debug)]
pub struct HistogramFactory {
    num_of_labels: usize,
}

impl HistogramFactory {
    pub fn new(num_of_labels: usize) -> Self {
        Self { num_of_labels }
    }

    pub fn num_of_labels(&self) -> usize {
        self.num_of_labels
    }

    pub fn create(&self) -> LabelHistogram {
        LabelHistogram::empty(self.num_of_labels)
    }
}

// ============================================================================
// SplitStatistics
// ============================================================================

/// Left/right statistics for every flattened candidate of one node.
///
/// For every candidate `k`,
/// `left(k).num_of_samples() + right(k).num_of_samples()` equals the
/// parent's sample count once accumulation has finished.
#[derive(Clone, Debug)]
pub struct SplitStatistics<S> {
    left: Vec<S>,
    right: Vec<S>,
}

impl<S: Statistics> SplitStatistics<S> {
    /// Pre-size both sides for `total_size` candidates.
    pub fn new(total_size: usize, factory: impl Fn() -> S) -> Self {
        Self {
            left: (0..total_size).map(|_| factory()).collect(),
            right: (0..total_size).map(|_| factory()).collect(),
        }
    }

    pub fn total_size(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn left(&self, index: usize) -> &S {
        &self.left[index]
    }

    #[inline]
    pub fn right(&self, index: usize) -> &S {
        &self.right[index]
    }

    /// Disjoint mutable views of both sides, for sharded accumulation.
    pub fn halves_mut(&mut self) -> (&mut [S], &mut [S]) {
        (self.left.as_mut_slice(), self.right.as_mut_slice())
    }

    /// Fold statistics accumulated over a disjoint sample set into this
    /// one (the reduction step of a distributed run).
    pub fn merge(&mut self, other: &Self) {
        assert_eq!(self.total_size(), other.total_size());
        for (mine, theirs) in self.left.iter_mut().zip(&other.left) {
            mine.merge(theirs);
        }
        for (mine, theirs) in self.right.iter_mut().zip(&other.right) {
            mine.merge(theirs);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Image;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use std::sync::Arc;

    fn sample_with_label(label: i16) -> ImageSample {
        let data = Array2::zeros((1, 1));
        let labels = Array2::from_elem((1, 1), label);
        ImageSample::new(Arc::new(Image::new(data, labels).unwrap()), 0, 0)
    }

    #[test]
    fn test_empty_histogram_entropy_is_zero() {
        let histogram = LabelHistogram::empty(4);
        assert_eq!(histogram.num_of_samples(), 0);
        assert_eq!(histogram.entropy(), 0.0);
    }

    #[test]
    fn test_uniform_two_class_entropy_is_ln_two() {
        let mut histogram = LabelHistogram::empty(2);
        histogram.accumulate(&sample_with_label(0));
        histogram.accumulate(&sample_with_label(1));
        assert_relative_eq!(histogram.entropy(), std::f64::consts::LN_2, epsilon = 1e-12);
    }

    #[test]
    fn test_pure_histogram_entropy_is_zero() {
        let mut histogram = LabelHistogram::empty(3);
        for _ in 0..5 {
            histogram.accumulate(&sample_with_label(2));
        }
        assert_eq!(histogram.entropy(), 0.0);
        assert_eq!(histogram.num_of_samples(), 5);
    }

    #[test]
    fn test_lazy_accumulation_equals_eager() {
        let samples: Vec<_> = [0i16, 1, 1, 2, 0, 1]
            .iter()
            .map(|&l| sample_with_label(l))
            .collect();

        let mut eager = LabelHistogram::empty(3);
        let mut lazy = LabelHistogram::empty(3);
        for sample in &samples {
            eager.accumulate(sample);
            lazy.lazy_accumulate(sample);
        }
        lazy.finish_lazy_accumulation();

        assert_eq!(eager, lazy);
    }

    #[test]
    fn test_merge_adds_counts() {
        let mut first = LabelHistogram::empty(2);
        first.accumulate(&sample_with_label(0));
        let mut second = LabelHistogram::empty(2);
        second.accumulate(&sample_with_label(1));
        second.accumulate(&sample_with_label(1));

        first.merge(&second);
        assert_eq!(first.counts(), &[1, 2]);
        assert_eq!(first.num_of_samples(), 3);
    }

    #[test]
    fn test_split_statistics_merge() {
        let factory = HistogramFactory::new(2);
        let mut a = SplitStatistics::new(2, || factory.create());
        let mut b = SplitStatistics::new(2, || factory.create());

        a.halves_mut().0[0].accumulate(&sample_with_label(0));
        b.halves_mut().0[0].accumulate(&sample_with_label(1));
        b.halves_mut().1[1].accumulate(&sample_with_label(0));

        a.merge(&b);
        assert_eq!(a.left(0).num_of_samples(), 2);
        assert_eq!(a.right(1).num_of_samples(), 1);
        assert_eq!(a.right(0).num_of_samples(), 0);
    }
}
