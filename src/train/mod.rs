//! Level-synchronous tree training.
//!
//! A tree grows breadth-first, one depth level at a time. Every level pass
//! routes the whole bag through the partially built tree, buckets the
//! samples at the frontier, writes per-node statistics, and (above the
//! deepest level) selects and applies one split per frontier node. The
//! tree is only mutated after scoring of a whole level part has finished,
//! so all nodes of a part see a consistent snapshot.

mod forest;

pub use forest::{Forest, ForestTrainer};

use std::marker::PhantomData;
use std::ops::Range;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::ImageSample;
use crate::logger::TrainingLogger;
use crate::parallelism::Parallelism;
use crate::persist;
use crate::tree::{FrontierMap, Tree};
use crate::weak_learner::{Statistics, WeakLearner};

// ============================================================================
// TrainParams
// ============================================================================

/// Parameters for level-synchronous training.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    /// Trees per forest.
    pub num_of_trees: usize,
    /// Tree depth `D`; a tree allocates `2^(D+1) - 1` nodes.
    pub tree_depth: usize,
    /// A node with fewer samples than this becomes a leaf.
    pub minimum_num_of_samples: usize,
    /// A node whose best split gains less than this becomes a leaf.
    pub minimum_information_gain: f64,
    /// Process a level in chunks of this many frontier nodes to bound
    /// peak memory; `0` processes the whole level at once. The final tree
    /// does not depend on the part size.
    pub level_part_size: usize,
    /// Worker threads for split-statistics accumulation; `<= 0` uses the
    /// host's parallelism hint, `1` runs sequentially.
    pub num_of_threads: i32,
    /// Prefix for per-level JSON tree checkpoints; `None` disables them.
    pub temporary_json_tree_file_prefix: Option<String>,
    /// Prefix for per-tree binary forest checkpoints; `None` disables
    /// them.
    pub temporary_binary_forest_file_prefix: Option<String>,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
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

// ============================================================================
// LevelTrainer
// ============================================================================

/// Grows one tree breadth-first, level by level.
pub struct LevelTrainer<W, R> {
    weak_learner: W,
    params: TrainParams,
    logger: TrainingLogger,
    _engine: PhantomData<fn() -> R>,
}

impl<W, R> LevelTrainer<W, R>
where
    W: WeakLearner<R>,
    W::Statistics: Serialize,
    R: Rng,
{
    pub fn new(weak_learner: W, params: TrainParams, logger: TrainingLogger) -> Self {
        Self {
            weak_learner,
            params,
            logger,
            _engine: PhantomData,
        }
    }

    pub fn params(&self) -> &TrainParams {
        &self.params
    }

    pub fn weak_learner(&self) -> &W {
        &self.weak_learner
    }

    pub fn logger(&self) -> &TrainingLogger {
        &self.logger
    }

    /// Train one tree over `bag`.
    ///
    /// The root starts as a leaf; the level-0 pass is the first that
    /// considers splitting it. The pass over the deepest level writes
    /// leaf statistics without splitting. After each level a JSON tree
    /// checkpoint is written if a prefix is configured; checkpoint
    /// failures are logged and training continues.
    pub fn train_tree(&self, bag: &[ImageSample], rng: &mut R) -> Tree<W::Statistics> {
        let mut tree = Tree::new(self.params.tree_depth, || self.weak_learner.create_statistics());
        self.logger
            .info(format_args!("Training tree, # samples: {}", bag.len()));

        for level in 0..=self.params.tree_depth {
            let (start, end) = tree.level_range(level);
            self.logger.info(format_args!(
                "Training level {}, # nodes: {}, # samples: {}",
                level,
                end - start,
                bag.len()
            ));
            self.train_tree_level(&mut tree, level, bag, rng);
            self.write_tree_checkpoint(&tree, level);
        }
        tree
    }

    fn train_tree_level(&self, tree: &mut Tree<W::Statistics>, level: usize, bag: &[ImageSample], rng: &mut R) {
        let frontier = FrontierMap::build(tree, level, bag);
        let (start, end) = tree.level_range(level);
        let part_size = if self.params.level_part_size > 0 {
            self.params.level_part_size
        } else {
            end - start
        };

        let mut part = 0;
        let mut node_start = start;
        while node_start < end {
            let node_end = (node_start + part_size).min(end);
            self.logger.debug(format_args!(
                "  Part {}, # nodes: {}",
                part,
                node_end - node_start
            ));
            self.train_tree_level_part(tree, level, node_start..node_end, &frontier, bag, rng);
            node_start = node_end;
            part += 1;
        }
    }

    fn train_tree_level_part(
        &self,
        tree: &mut Tree<W::Statistics>,
        level: usize,
        nodes: Range<usize>,
        frontier: &FrontierMap,
        bag: &[ImageSample],
        rng: &mut R,
    ) {
        // Parent statistics of every frontier node in this part.
        for node_index in nodes.clone() {
            let samples = frontier.node_samples(bag, node_index);
            let mut statistics = self.weak_learner.create_statistics();
            for sample in samples.iter() {
                statistics.accumulate(sample);
            }
            tree.node_mut(node_index).set_statistics(statistics);
        }

        if level >= self.params.tree_depth {
            return;
        }

        let parallelism = Parallelism::from_threads(self.params.num_of_threads);

        // Score every node of the part against the unchanged tree, then
        // apply all decisions at once.
        let mut decisions = Vec::with_capacity(nodes.len());
        for node_index in nodes {
            let samples = frontier.node_samples(bag, node_index);
            let candidates = self.weak_learner.sample_candidates(samples, rng);
            if candidates.total_size() == 0 {
                decisions.push((node_index, None));
                continue;
            }
            let split_statistics =
                self.weak_learner
                    .compute_split_statistics(samples, &candidates, parallelism);
            let parent = tree.node(node_index).statistics();
            let (best_index, best_gain) = self
                .weak_learner
                .find_best_split_point(parent, &split_statistics);
            let split_point = candidates
                .split_point(best_index)
                .expect("best split index within candidate set");
            decisions.push((node_index, Some((split_point, best_gain))));
        }

        for (node_index, decision) in decisions {
            // Children begin as leaves of the next frontier; they stay
            // allocated but inert if the parent does not split.
            tree.node_mut(Tree::<W::Statistics>::left_child(node_index)).make_leaf();
            tree.node_mut(Tree::<W::Statistics>::right_child(node_index)).make_leaf();

            let total = tree.node(node_index).statistics().num_of_samples();
            match decision {
                Some((split_point, gain))
                    if gain > 0.0
                        && gain >= self.params.minimum_information_gain
                        && total >= self.params.minimum_num_of_samples as u64 =>
                {
                    tree.node_mut(node_index).make_internal(split_point);
                }
                _ => tree.node_mut(node_index).make_leaf(),
            }
        }
    }

    fn write_tree_checkpoint(&self, tree: &Tree<W::Statistics>, level: usize) {
        let Some(prefix) = &self.params.temporary_json_tree_file_prefix else {
            return;
        };
        let path = format!("{}_{}.json", prefix, level);
        self.logger
            .info(format_args!("Checkpoint: writing temporary tree file {}", path));
        if let Err(error) = persist::write_tree_json(Path::new(&path), tree) {
            self.logger.warn(format_args!(
                "failed to write tree checkpoint {}: {}; continuing",
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
    use crate::data::{Image, ImageSample};
    use crate::logger::{TrainingLogger, Verbosity};
    use crate::weak_learner::{CandidateParams, HistogramFactory, ImageWeakLearner};
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::sync::Arc;

    fn rng(seed: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(seed)
    }

    fn quiet_logger() -> TrainingLogger {
        TrainingLogger::new(Verbosity::Silent)
    }

    /// 4x4 binary image: pixel (1,1) is hot and labeled 1, the rest 0.
    fn one_hot_image() -> Arc<Image> {
        let mut data = Array2::zeros((4, 4));
        let mut labels = Array2::zeros((4, 4));
        data[[1, 1]] = 1;
        labels[[1, 1]] = 1;
        Arc::new(Image::new(data, labels).unwrap())
    }

    fn full_bag(image: &Arc<Image>) -> Vec<ImageSample> {
        let mut bag = Vec::new();
        for x in 0..image.width() as u32 {
            for y in 0..image.height() as u32 {
                bag.push(ImageSample::new(Arc::clone(image), x, y));
            }
        }
        bag
    }

    fn learner(params: CandidateParams) -> ImageWeakLearner {
        ImageWeakLearner::new(params, HistogramFactory::new(2))
    }

    fn trainer(
        candidate_params: CandidateParams,
        train_params: TrainParams,
    ) -> LevelTrainer<ImageWeakLearner, Xoshiro256PlusPlus> {
        LevelTrainer::new(learner(candidate_params), train_params, quiet_logger())
    }

    fn separating_params() -> CandidateParams {
        CandidateParams {
            num_of_features: 32,
            num_of_thresholds: 4,
            offset_x_range_low: 0,
            offset_x_range_high: 1,
            offset_y_range_low: 0,
            offset_y_range_high: 1,
            binary_images: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_depth_one_tree_splits_the_hot_pixel() {
        let image = one_hot_image();
        let bag = full_bag(&image);
        let trainer = trainer(
            separating_params(),
            TrainParams {
                num_of_trees: 1,
                tree_depth: 1,
                minimum_num_of_samples: 1,
                ..Default::default()
            },
        );

        let tree = trainer.train_tree(&bag, &mut rng(42));

        assert!(!tree.node(0).is_leaf(), "root should split");
        assert!(tree.node(1).is_leaf());
        assert!(tree.node(2).is_leaf());
        // The two children separate label 1 from label 0.
        let hot = ImageSample::new(Arc::clone(&image), 1, 1);
        let cold = ImageSample::new(Arc::clone(&image), 0, 0);
        assert_ne!(tree.route(&hot), tree.route(&cold));
    }

    #[test]
    fn test_huge_minimum_gain_keeps_root_a_leaf() {
        let image = one_hot_image();
        let bag = full_bag(&image);
        let trainer = trainer(
            separating_params(),
            TrainParams {
                num_of_trees: 1,
                tree_depth: 1,
                minimum_num_of_samples: 1,
                minimum_information_gain: 1e9,
                ..Default::default()
            },
        );

        let tree = trainer.train_tree(&bag, &mut rng(42));
        assert!(tree.node(0).is_leaf());
    }

    #[test]
    fn test_empty_bag_trains_root_leaf_only() {
        let trainer = trainer(
            separating_params(),
            TrainParams {
                tree_depth: 2,
                ..Default::default()
            },
        );

        let tree = trainer.train_tree(&[], &mut rng(1));
        assert!(tree.node(0).is_leaf());
        assert_eq!(tree.node(0).statistics().num_of_samples(), 0);
    }

    #[test]
    fn test_minimum_samples_above_bag_size_yields_single_leaf() {
        let image = one_hot_image();
        let bag = full_bag(&image);
        let trainer = trainer(
            separating_params(),
            TrainParams {
                tree_depth: 3,
                minimum_num_of_samples: bag.len() + 1,
                ..Default::default()
            },
        );

        let tree = trainer.train_tree(&bag, &mut rng(3));
        for index in 0..tree.num_nodes() {
            assert!(tree.node(index).is_leaf());
        }
    }

    #[test]
    fn test_zero_offsets_make_every_node_a_leaf_at_the_root() {
        let image = one_hot_image();
        let bag = full_bag(&image);
        let trainer = trainer(
            CandidateParams {
                num_of_features: 8,
                num_of_thresholds: 4,
                offset_x_range_low: 0,
                offset_x_range_high: 0,
                offset_y_range_low: 0,
                offset_y_range_high: 0,
                binary_images: false,
                adaptive_threshold_range: true,
                ..Default::default()
            },
            TrainParams {
                tree_depth: 2,
                minimum_num_of_samples: 1,
                ..Default::default()
            },
        );

        let tree = trainer.train_tree(&bag, &mut rng(4));
        // Every feature is P(x,y) - P(x,y) = 0, so no candidate gains.
        assert!(tree.node(0).is_leaf());
        for index in 0..tree.num_nodes() {
            assert!(tree.node(index).is_leaf());
        }
    }

    #[test]
    fn test_level_part_size_does_not_change_the_tree() {
        let image = one_hot_image();
        let bag = full_bag(&image);

        let whole = trainer(
            separating_params(),
            TrainParams {
                tree_depth: 3,
                minimum_num_of_samples: 1,
                level_part_size: 0,
                ..Default::default()
            },
        );
        let chunked = trainer(
            separating_params(),
            TrainParams {
                tree_depth: 3,
                minimum_num_of_samples: 1,
                level_part_size: 1,
                ..Default::default()
            },
        );

        let tree_whole = whole.train_tree(&bag, &mut rng(9));
        let tree_chunked = chunked.train_tree(&bag, &mut rng(9));

        for index in 0..tree_whole.num_nodes() {
            assert_eq!(tree_whole.node(index).is_leaf(), tree_chunked.node(index).is_leaf());
            assert_eq!(
                tree_whole.node(index).split_point(),
                tree_chunked.node(index).split_point()
            );
        }
    }

    #[test]
    fn test_routing_terminates_within_trained_depth() {
        let image = one_hot_image();
        let bag = full_bag(&image);
        let trainer = trainer(
            separating_params(),
            TrainParams {
                tree_depth: 2,
                minimum_num_of_samples: 1,
                ..Default::default()
            },
        );

        let tree = trainer.train_tree(&bag, &mut rng(5));
        for sample in &bag {
            let node = tree.route(sample);
            assert!(node < tree.num_nodes());
            assert!(tree.node(node).is_leaf());
        }
    }
}
