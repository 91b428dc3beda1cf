//! The forest driver: bag, train, append, checkpoint, repeat.

use std::path::Path;

use rand::Rng;
use serde::Serialize;

use super::{LevelTrainer, TrainParams};
use crate::data::{ImageSample, Label};
use crate::error::Result;
use crate::logger::TrainingLogger;
use crate::persist;
use crate::sampling::SampleCache;
use crate::tree::Tree;
use crate::weak_learner::{LabelHistogram, WeakLearner};

// ============================================================================
// Forest
// ============================================================================

/// An ordered sequence of trained trees plus the parameters that grew
/// them.
#[derive(Clone, Debug)]
pub struct Forest<S> {
    trees: Vec<Tree<S>>,
    params: TrainParams,
}

impl<S> Forest<S> {
    pub fn new(params: TrainParams) -> Self {
        Self {
            trees: Vec::new(),
            params,
        }
    }

    pub fn from_parts(params: TrainParams, trees: Vec<Tree<S>>) -> Self {
        Self { trees, params }
    }

    pub fn push_tree(&mut self, tree: Tree<S>) {
        self.trees.push(tree);
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn tree(&self, index: usize) -> &Tree<S> {
        &self.trees[index]
    }

    pub fn trees(&self) -> &[Tree<S>] {
        &self.trees
    }

    pub fn params(&self) -> &TrainParams {
        &self.params
    }
}

impl Forest<LabelHistogram> {
    /// Classify one sample by majority vote over the leaf histograms of
    /// all trees. Ties go to the lowest label; an empty forest (or one
    /// whose routed leaves saw no samples) yields `None`.
    pub fn classify(&self, sample: &ImageSample) -> Option<Label> {
        let mut totals: Vec<u64> = Vec::new();
        for tree in &self.trees {
            let leaf = tree.route(sample);
            let counts = tree.node(leaf).statistics().counts();
            if totals.len() < counts.len() {
                totals.resize(counts.len(), 0);
            }
            for (total, &count) in totals.iter_mut().zip(counts) {
                *total += count;
            }
        }

        let mut best: Option<(Label, u64)> = None;
        for (label, &count) in totals.iter().enumerate() {
            if count > 0 && best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((label as Label, count));
            }
        }
        best.map(|(label, _)| label)
    }
}

// ============================================================================
// ForestTrainer
// ============================================================================

/// Trains a forest tree by tree, drawing a fresh bag per tree.
pub struct ForestTrainer<W, R> {
    trainer: LevelTrainer<W, R>,
}

impl<W, R> ForestTrainer<W, R>
where
    W: WeakLearner<R>,
    W::Statistics: Serialize,
    R: Rng,
{
    pub fn new(weak_learner: W, params: TrainParams, logger: TrainingLogger) -> Self {
        Self {
            trainer: LevelTrainer::new(weak_learner, params, logger),
        }
    }

    pub fn trainer(&self) -> &LevelTrainer<W, R> {
        &self.trainer
    }

    /// Train `num_of_trees` trees, each over an independent bag drawn
    /// from `cache`.
    ///
    /// Provider and cache errors abort training; checkpoint write
    /// failures are logged and training continues.
    pub fn train_forest(
        &self,
        cache: &mut SampleCache,
        rng: &mut R,
    ) -> Result<Forest<W::Statistics>> {
        let params = self.trainer.params();
        let logger = self.trainer.logger();
        let mut forest = Forest::new(params.clone());

        for tree_index in 0..params.num_of_trees {
            cache.load_bag(rng)?;
            logger.info(format_args!(
                "Training tree {} of {}",
                tree_index + 1,
                params.num_of_trees
            ));
            let tree = self.trainer.train_tree(cache.samples(), rng);
            forest.push_tree(tree);
            self.write_forest_checkpoint(&forest, tree_index);
        }
        Ok(forest)
    }

    /// Train a forest over one pre-drawn bag, reused for every tree.
    pub fn train_forest_from_bag(
        &self,
        bag: &[ImageSample],
        rng: &mut R,
    ) -> Forest<W::Statistics> {
        let params = self.trainer.params();
        let mut forest = Forest::new(params.clone());
        for tree_index in 0..params.num_of_trees {
            let tree = self.trainer.train_tree(bag, rng);
            forest.push_tree(tree);
            self.write_forest_checkpoint(&forest, tree_index);
        }
        forest
    }

    fn write_forest_checkpoint(&self, forest: &Forest<W::Statistics>, tree_index: usize) {
        let params = self.trainer.params();
        let logger = self.trainer.logger();
        let Some(prefix) = &params.temporary_binary_forest_file_prefix else {
            return;
        };
        let path = format!("{}_{}.bin", prefix, tree_index);
        logger.info(format_args!(
            "Checkpoint: writing temporary forest file {}",
            path
        ));
        if let Err(error) = persist::write_forest_binary(Path::new(&path), forest) {
            logger.warn(format_args!(
                "failed to write forest checkpoint {}: {}; continuing",
                path, error
            ));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Image, MemoryImageProvider};
    use crate::logger::Verbosity;
    use crate::sampling::SampleParams;
    use crate::weak_learner::{CandidateParams, HistogramFactory, ImageWeakLearner};
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::sync::Arc;

    fn rng(seed: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(seed)
    }

    fn one_hot_image() -> Arc<Image> {
        let mut data = Array2::zeros((4, 4));
        let mut labels = Array2::zeros((4, 4));
        data[[1, 1]] = 1;
        labels[[1, 1]] = 1;
        Arc::new(Image::new(data, labels).unwrap())
    }

    fn forest_trainer(
        train_params: TrainParams,
    ) -> ForestTrainer<ImageWeakLearner, Xoshiro256PlusPlus> {
        let learner = ImageWeakLearner::new(
            CandidateParams {
                num_of_features: 32,
                offset_x_range_high: 1,
                offset_y_range_high: 1,
                binary_images: true,
                ..Default::default()
            },
            HistogramFactory::new(2),
        );
        ForestTrainer::new(learner, train_params, TrainingLogger::new(Verbosity::Silent))
    }

    fn cache_of_two_images() -> SampleCache {
        let provider = MemoryImageProvider::new(vec![one_hot_image(), one_hot_image()]);
        SampleCache::new(
            Arc::new(provider),
            SampleParams {
                samples_per_image_fraction: 1.0,
                background_label: 255,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_forest_has_one_tree_per_round() {
        let trainer = forest_trainer(TrainParams {
            num_of_trees: 3,
            tree_depth: 1,
            minimum_num_of_samples: 1,
            ..Default::default()
        });
        let mut cache = cache_of_two_images();

        let forest = trainer.train_forest(&mut cache, &mut rng(42)).unwrap();
        assert_eq!(forest.num_trees(), 3);
    }

    #[test]
    fn test_forest_classifies_the_hot_pixel() {
        let trainer = forest_trainer(TrainParams {
            num_of_trees: 2,
            tree_depth: 2,
            minimum_num_of_samples: 1,
            ..Default::default()
        });
        let mut cache = cache_of_two_images();

        let forest = trainer.train_forest(&mut cache, &mut rng(7)).unwrap();

        let image = one_hot_image();
        let hot = ImageSample::new(Arc::clone(&image), 1, 1);
        let cold = ImageSample::new(Arc::clone(&image), 3, 3);
        assert_eq!(forest.classify(&hot), Some(1));
        assert_eq!(forest.classify(&cold), Some(0));
    }

    #[test]
    fn test_empty_forest_classifies_none() {
        let forest: Forest<LabelHistogram> = Forest::new(TrainParams::default());
        let image = one_hot_image();
        let sample = ImageSample::new(image, 0, 0);
        assert_eq!(forest.classify(&sample), None);
    }
}
