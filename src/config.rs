//! Run configuration.
//!
//! A flat key set mirroring the JSON configuration consumed by the outer
//! program. Every key is optional; missing keys take their defaults. The
//! config is validated once up front and then split into the parameter
//! views the individual components take.

use serde::{Deserialize, Serialize};

use crate::data::Label;
use crate::error::{Error, Result};
use crate::sampling::SampleParams;
use crate::train::TrainParams;
use crate::weak_learner::CandidateParams;

/// Flat training configuration with per-key defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub samples_per_image_fraction: f64,
    pub bagging_fraction: f64,
    pub background_label: Label,

    pub num_of_features: usize,
    pub num_of_thresholds: usize,
    pub feature_offset_x_range_low: i16,
    pub feature_offset_x_range_high: i16,
    pub feature_offset_y_range_low: i16,
    pub feature_offset_y_range_high: i16,
    pub threshold_range_low: f32,
    pub threshold_range_high: f32,
    pub adaptive_threshold_range: bool,
    pub binary_images: bool,

    pub num_of_trees: usize,
    pub tree_depth: usize,
    pub minimum_num_of_samples: usize,
    pub minimum_information_gain: f64,
    pub level_part_size: usize,
    pub num_of_threads: i32,
    pub temporary_json_tree_file_prefix: Option<String>,
    pub temporary_binary_forest_file_prefix: Option<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            samples_per_image_fraction: 0.1,
            bagging_fraction: 1.0,
            background_label: Label::MAX,
            num_of_features: 400,
            num_of_thresholds: 100,
            feature_offset_x_range_low: 0,
            feature_offset_x_range_high: 15,
            feature_offset_y_range_low: 0,
            feature_offset_y_range_high: 15,
            threshold_range_low: -300.0,
            threshold_range_high: 300.0,
            adaptive_threshold_range: true,
            binary_images: true,
            num_of_trees: 3,
            tree_depth: 12,
            minimum_num_of_samples: 100,
            minimum_information_gain: 0.0,
            level_part_size: 0,
            num_of_threads: 1,
            temporary_json_tree_file_prefix: None,
            temporary_binary_forest_file_prefix: None,
        }
    }
}

impl TrainingConfig {
    /// Parse a JSON configuration document; unknown keys are ignored,
    /// missing keys default.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        Ok(config)
    }

    /// Check every key for range validity.
    pub fn validate(&self) -> Result<()> {
        if !self.samples_per_image_fraction.is_finite() || self.samples_per_image_fraction < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "samples_per_image_fraction must be non-negative, got {}",
                self.samples_per_image_fraction
            )));
        }
        if !self.bagging_fraction.is_finite()
            || !(0.0..=1.0).contains(&self.bagging_fraction)
        {
            return Err(Error::InvalidParameter(format!(
                "bagging_fraction must be in [0, 1], got {}",
                self.bagging_fraction
            )));
        }
        if self.num_of_features == 0 {
            return Err(Error::InvalidParameter(
                "num_of_features must be at least 1".into(),
            ));
        }
        if !self.binary_images && self.num_of_thresholds == 0 {
            return Err(Error::InvalidParameter(
                "num_of_thresholds must be at least 1".into(),
            ));
        }
        if self.feature_offset_x_range_low < 0
            || self.feature_offset_y_range_low < 0
            || self.feature_offset_x_range_high < self.feature_offset_x_range_low
            || self.feature_offset_y_range_high < self.feature_offset_y_range_low
        {
            return Err(Error::InvalidParameter(
                "feature offset ranges must satisfy 0 <= low <= high".into(),
            ));
        }
        if !self.binary_images
            && !self.adaptive_threshold_range
            && self.threshold_range_high < self.threshold_range_low
        {
            return Err(Error::InvalidParameter(format!(
                "threshold range [{}, {}] is empty",
                self.threshold_range_low, self.threshold_range_high
            )));
        }
        if self.num_of_trees == 0 {
            return Err(Error::InvalidParameter(
                "num_of_trees must be at least 1".into(),
            ));
        }
        if self.tree_depth == 0 || self.tree_depth > 30 {
            return Err(Error::InvalidParameter(format!(
                "tree_depth must be in [1, 30], got {}",
                self.tree_depth
            )));
        }
        if !self.minimum_information_gain.is_finite() {
            return Err(Error::InvalidParameter(
                "minimum_information_gain must be finite".into(),
            ));
        }
        Ok(())
    }

    pub fn sample_params(&self) -> SampleParams {
        SampleParams {
            samples_per_image_fraction: self.samples_per_image_fraction,
            bagging_fraction: self.bagging_fraction,
            background_label: self.background_label,
        }
    }

    pub fn candidate_params(&self) -> CandidateParams {
        CandidateParams {
            num_of_features: self.num_of_features,
            num_of_thresholds: self.num_of_thresholds,
            offset_x_range_low: self.feature_offset_x_range_low,
            offset_x_range_high: self.feature_offset_x_range_high,
            offset_y_range_low: self.feature_offset_y_range_low,
            offset_y_range_high: self.feature_offset_y_range_high,
            threshold_range_low: self.threshold_range_low,
            threshold_range_high: self.threshold_range_high,
            adaptive_threshold_range: self.adaptive_threshold_range,
            binary_images: self.binary_images,
        }
    }

    pub fn train_params(&self) -> TrainParams {
        TrainParams {
            num_of_trees: self.num_of_trees,
            tree_depth: self.tree_depth,
            minimum_num_of_samples: self.minimum_num_of_samples,
            minimum_information_gain: self.minimum_information_gain,
            level_part_size: self.level_part_size,
            num_of_threads: self.num_of_threads,
            temporary_json_tree_file_prefix: self.temporary_json_tree_file_prefix.clone(),
            temporary_binary_forest_file_prefix: self
                .temporary_binary_forest_file_prefix
                .clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
