//! pixelforest: random forest training for dense per-pixel image
//! classification.
//!
//! Trees grow level-synchronously: the bag is routed through the partial
//! tree once per depth level, and every frontier node picks the
//! information-gain-maximizing decision stump over randomly sampled
//! two-pixel-offset-difference features. Bagging, a generational image
//! cache, candidate-sharded parallel statistics, and JSON/binary
//! checkpoints round out the training core.

pub mod config;
pub mod data;
pub mod error;
pub mod logger;
pub mod parallelism;
pub mod persist;
pub mod sampling;
pub mod train;
pub mod tree;
pub mod weak_learner;

pub use config::TrainingConfig;
pub use error::{Error, Result};
