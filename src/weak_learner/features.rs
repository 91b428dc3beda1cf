//! Pixel-offset-difference features, thresholds, and candidate sets.

use serde::{Deserialize, Serialize};

use crate::data::ImageSample;
use crate::error::{Error, Result};

/// Signed pixel-offset type.
pub type Offset = i16;

// ============================================================================
// PixelFeature
// ============================================================================

/// A two-pixel-offset-difference feature.
///
/// Evaluated at a sample `(x, y)`, it reads
/// `P(x + offset_x1, y + offset_y1) - P(x + offset_x2, y + offset_y2)`;
/// reads outside the image are zero-padded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelFeature {
    pub offset_x1: Offset,
    pub offset_y1: Offset,
    pub offset_x2: Offset,
    pub offset_y2: Offset,
}

impl PixelFeature {
    pub fn new(offset_x1: Offset, offset_y1: Offset, offset_x2: Offset, offset_y2: Offset) -> Self {
        Self {
            offset_x1,
            offset_y1,
            offset_x2,
            offset_y2,
        }
    }

    /// The feature value at `sample`.
    #[inline]
    pub fn pixel_difference(&self, sample: &ImageSample) -> f32 {
        let image = sample.image();
        let x = sample.x() as i64;
        let y = sample.y() as i64;
        let first = image.pixel_or_zero(x + self.offset_x1 as i64, y + self.offset_y1 as i64);
        let second = image.pixel_or_zero(x + self.offset_x2 as i64, y + self.offset_y2 as i64);
        (first as i32 - second as i32) as f32
    }
}

// ============================================================================
// SplitPoint
// ============================================================================

/// A feature/threshold pair materialized at an internal tree node.
///
/// A sample routes left when the feature value is strictly below the
/// threshold; the threshold itself routes right.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitPoint {
    pub offset_x1: Offset,
    pub offset_y1: Offset,
    pub offset_x2: Offset,
    pub offset_y2: Offset,
    pub threshold: f32,
}

impl SplitPoint {
    pub fn new(feature: PixelFeature, threshold: f32) -> Self {
        Self {
            offset_x1: feature.offset_x1,
            offset_y1: feature.offset_y1,
            offset_x2: feature.offset_x2,
            offset_y2: feature.offset_y2,
            threshold,
        }
    }

    #[inline]
    pub fn feature(&self) -> PixelFeature {
        PixelFeature::new(self.offset_x1, self.offset_y1, self.offset_x2, self.offset_y2)
    }

    /// True when `sample` routes to the left child.
    #[inline]
    pub fn goes_left(&self, sample: &ImageSample) -> bool {
        self.feature().pixel_difference(sample) < self.threshold
    }
}

// ============================================================================
// CandidateParams
// ============================================================================

/// Parameters for candidate sampling at a frontier node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CandidateParams {
    /// Features sampled per frontier node.
    pub num_of_features: usize,
    /// Thresholds sampled per feature (ignored for binary images).
    pub num_of_thresholds: usize,
    /// Inclusive magnitude bounds for x offsets.
    pub offset_x_range_low: Offset,
    pub offset_x_range_high: Offset,
    /// Inclusive magnitude bounds for y offsets.
    pub offset_y_range_low: Offset,
    pub offset_y_range_high: Offset,
    /// Fixed threshold sampling range.
    pub threshold_range_low: f32,
    pub threshold_range_high: f32,
    /// Derive the threshold range from the node's feature values instead
    /// of the fixed range.
    pub adaptive_threshold_range: bool,
    /// 0/1 pixel data: emit exactly the two thresholds -0.5 and +0.5.
    pub binary_images: bool,
}

impl Default for CandidateParams {
    fn default() -> Self {
        Self {
            num_of_features: 400,
            num_of_thresholds: 100,
            offset_x_range_low: 0,
            offset_x_range_high: 15,
            offset_y_range_low: 0,
            offset_y_range_high: 15,
            threshold_range_low: -300.0,
            threshold_range_high: 300.0,
            adaptive_threshold_range: true,
            binary_images: true,
        }
    }
}

/// Discrete pool of both signs of every magnitude in `[low, high]`.
///
/// `+0` and `-0` both appear, so zero is drawn twice as often as any other
/// magnitude under a uniform index draw. The doubling is intentional and
/// kept as-is.
pub(crate) fn symmetric_offset_pool(low: Offset, high: Offset) -> Vec<Offset> {
    let span = (high as i32 - low as i32 + 1).max(0) as usize;
    let mut pool = Vec::with_capacity(2 * span);
    for magnitude in low..=high {
        pool.push(-magnitude);
        pool.push(magnitude);
    }
    pool
}

// ============================================================================
// CandidateSet
// ============================================================================

/// One feature together with its sampled thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureCandidates {
    pub feature: PixelFeature,
    pub thresholds: Vec<f32>,
}

/// The ordered candidate list of one frontier node.
///
/// Flattened candidate index `k` enumerates `(feature, threshold)` pairs in
/// order: the sum of prior features' threshold counts plus the threshold
/// position within the feature.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    candidates: Vec<FeatureCandidates>,
    total_size: usize,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a feature and its thresholds.
    pub fn push(&mut self, feature: PixelFeature, thresholds: Vec<f32>) {
        self.total_size += thresholds.len();
        self.candidates.push(FeatureCandidates { feature, thresholds });
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Number of flattened `(feature, threshold)` candidates.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn candidates(&self) -> &[FeatureCandidates] {
        &self.candidates
    }

    /// Materialize the split point at flattened index `index`.
    pub fn split_point(&self, index: usize) -> Result<SplitPoint> {
        let mut remaining = index;
        for candidate in &self.candidates {
            if remaining < candidate.thresholds.len() {
                return Ok(SplitPoint::new(
                    candidate.feature,
                    candidate.thresholds[remaining],
                ));
            }
            remaining -= candidate.thresholds.len();
        }
        Err(Error::SplitPointNotFound {
            index,
            total: self.total_size,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Image;
    use ndarray::array;
    use std::sync::Arc;

    fn sample_at(data: ndarray::Array2<i16>, x: u32, y: u32) -> ImageSample {
        let labels = ndarray::Array2::zeros(data.dim());
        ImageSample::new(Arc::new(Image::new(data, labels).unwrap()), x, y)
    }

    #[test]
    fn test_pixel_difference() {
        let sample = sample_at(array![[1, 2], [3, 9]], 0, 0);
        // P(1,1) - P(0,0) = 9 - 1
        let feature = PixelFeature::new(1, 1, 0, 0);
        assert_eq!(feature.pixel_difference(&sample), 8.0);
    }

    #[test]
    fn test_pixel_difference_zero_pads_outside() {
        let sample = sample_at(array![[7, 2], [3, 4]], 0, 0);
        // First read lands outside the image and contributes 0.
        let feature = PixelFeature::new(-1, 0, 0, 0);
        assert_eq!(feature.pixel_difference(&sample), -7.0);
    }

    #[test]
    fn test_split_point_threshold_routes_right() {
        let sample = sample_at(array![[1, 0], [0, 0]], 0, 0);
        // Feature value is P(0,0) - P(0,0) = 0.
        let feature = PixelFeature::new(0, 0, 0, 0);
        assert!(SplitPoint::new(feature, 1.0).goes_left(&sample));
        // value == threshold: strict inequality routes right
        assert!(!SplitPoint::new(feature, 0.0).goes_left(&sample));
        assert!(!SplitPoint::new(feature, -1.0).goes_left(&sample));
    }

    #[test]
    fn test_symmetric_pool_doubles_zero() {
        let pool = symmetric_offset_pool(0, 2);
        assert_eq!(pool, vec![0, 0, -1, 1, -2, 2]);
    }

    #[test]
    fn test_candidate_set_flattened_index() {
        let mut set = CandidateSet::new();
        set.push(PixelFeature::new(1, 0, 0, 0), vec![0.5, 1.5]);
        set.push(PixelFeature::new(0, 2, 0, 0), vec![-1.0]);

        assert_eq!(set.len(), 2);
        assert_eq!(set.total_size(), 3);

        let sp = set.split_point(1).unwrap();
        assert_eq!(sp.offset_x1, 1);
        assert_eq!(sp.threshold, 1.5);

        let sp = set.split_point(2).unwrap();
        assert_eq!(sp.offset_y1, 2);
        assert_eq!(sp.threshold, -1.0);
    }

    #[test]
    fn test_candidate_set_index_out_of_range() {
        let mut set = CandidateSet::new();
        set.push(PixelFeature::default(), vec![0.0]);
        assert!(matches!(
            set.split_point(1),
            Err(Error::SplitPointNotFound { index: 1, total: 1 })
        ));
    }

    #[test]
    fn test_candidate_set_stable_field_names() {
        let mut set = CandidateSet::new();
        set.push(PixelFeature::new(1, 2, 3, 4), vec![0.25]);
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.contains("\"candidates\""));
        assert!(json.contains("\"total_size\""));
        assert!(json.contains("\"offset_x1\""));
        assert!(json.contains("\"offset_y2\""));
    }
}
