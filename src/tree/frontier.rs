//! The frontier map: samples-by-node storage for one training level.
//!
//! Instead of per-node pointer lists, the map keeps one contiguous array of
//! sample handles (indices into the bag) plus a `[begin, end)` bounds pair
//! per frontier node, filled with a count / prefix-sum / scatter pass. The
//! map lives for exactly one level and is rebuilt from scratch for the
//! next.

use super::Tree;
use crate::data::ImageSample;
use crate::weak_learner::NodeSamples;

/// Per-node sample buckets of one tree level.
#[derive(Debug)]
pub struct FrontierMap {
    level_start: usize,
    bounds: Vec<(u32, u32)>,
    positions: Vec<u32>,
}

impl FrontierMap {
    /// Route the bag through the tree and bucket every sample whose
    /// terminating node lies on `level`.
    ///
    /// Every node of the level gets a bucket, empty or not. Samples whose
    /// routing terminates above the frontier (an ancestor became a leaf in
    /// an earlier level) are dropped for this level.
    pub fn build<S>(tree: &Tree<S>, level: usize, bag: &[ImageSample]) -> Self {
        let (start, end) = tree.level_range(level);
        let num_nodes = end - start;

        const DROPPED: u32 = u32::MAX;
        let mut routed = vec![DROPPED; bag.len()];
        let mut counts = vec![0u32; num_nodes];
        for (position, sample) in bag.iter().enumerate() {
            let node = tree.route(sample);
            if node >= start && node < end {
                let slot = (node - start) as u32;
                routed[position] = slot;
                counts[slot as usize] += 1;
            }
        }

        let mut bounds = Vec::with_capacity(num_nodes);
        let mut offset = 0u32;
        for &count in &counts {
            bounds.push((offset, offset));
            offset += count;
        }

        let mut positions = vec![0u32; offset as usize];
        for (position, &slot) in routed.iter().enumerate() {
            if slot != DROPPED {
                let cursor = &mut bounds[slot as usize].1;
                positions[*cursor as usize] = position as u32;
                *cursor += 1;
            }
        }

        Self {
            level_start: start,
            bounds,
            positions,
        }
    }

    /// First heap index of the level this map covers.
    pub fn level_start(&self) -> usize {
        self.level_start
    }

    /// Number of frontier nodes (bucket count).
    pub fn num_nodes(&self) -> usize {
        self.bounds.len()
    }

    /// Total number of bucketed samples.
    pub fn num_samples(&self) -> usize {
        self.positions.len()
    }

    /// Bag indices bucketed at heap index `node_index`.
    pub fn samples_for(&self, node_index: usize) -> &[u32] {
        let (begin, end) = self.bounds[node_index - self.level_start];
        &self.positions[begin as usize..end as usize]
    }

    /// The samples-by-node view for one frontier node.
    pub fn node_samples<'a>(&'a self, bag: &'a [ImageSample], node_index: usize) -> NodeSamples<'a> {
        NodeSamples::new(bag, self.samples_for(node_index))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Image;
    use crate::weak_learner::{HistogramFactory, LabelHistogram, PixelFeature, SplitPoint};
    use ndarray::Array2;
    use std::sync::Arc;

    fn sample_with_value(value: i16) -> ImageSample {
        let data = Array2::from_elem((1, 1), value);
        let labels = Array2::zeros((1, 1));
        ImageSample::new(Arc::new(Image::new(data, labels).unwrap()), 0, 0)
    }

    fn empty_tree(depth: usize) -> Tree<LabelHistogram> {
        let factory = HistogramFactory::new(2);
        Tree::new(depth, || factory.create())
    }

    /// Feature reading the sample's own pixel (second read out of image).
    fn value_feature() -> PixelFeature {
        PixelFeature::new(0, 0, 1, 0)
    }

    #[test]
    fn test_level_zero_buckets_everything_at_root() {
        let tree = empty_tree(2);
        let bag: Vec<_> = [1, 2, 3].iter().map(|&v| sample_with_value(v)).collect();

        let frontier = FrontierMap::build(&tree, 0, &bag);
        assert_eq!(frontier.num_nodes(), 1);
        assert_eq!(frontier.samples_for(0), &[0, 1, 2]);
    }

    #[test]
    fn test_samples_split_between_children() {
        let mut tree = empty_tree(2);
        tree.node_mut(0)
            .make_internal(SplitPoint::new(value_feature(), 10.0));

        let bag: Vec<_> = [5, 15, 3, 10].iter().map(|&v| sample_with_value(v)).collect();
        let frontier = FrontierMap::build(&tree, 1, &bag);

        assert_eq!(frontier.num_nodes(), 2);
        assert_eq!(frontier.samples_for(1), &[0, 2]); // values 5, 3
        assert_eq!(frontier.samples_for(2), &[1, 3]); // values 15, 10
        assert_eq!(frontier.num_samples(), 4);
    }

    #[test]
    fn test_samples_stopped_above_frontier_are_dropped() {
        let mut tree = empty_tree(2);
        tree.node_mut(0)
            .make_internal(SplitPoint::new(value_feature(), 10.0));
        // Left child stays a leaf; only the right child is split further.
        tree.node_mut(2)
            .make_internal(SplitPoint::new(value_feature(), 20.0));

        let bag: Vec<_> = [5, 15, 25].iter().map(|&v| sample_with_value(v)).collect();
        let frontier = FrontierMap::build(&tree, 2, &bag);

        assert_eq!(frontier.num_nodes(), 4);
        // Value 5 stops at node 1 (above the frontier) and is dropped.
        assert_eq!(frontier.num_samples(), 2);
        assert_eq!(frontier.samples_for(5), &[1]); // 15 < 20
        assert_eq!(frontier.samples_for(6), &[2]); // 25 >= 20
        assert!(frontier.samples_for(3).is_empty());
        assert!(frontier.samples_for(4).is_empty());
    }

    #[test]
    fn test_empty_bag_yields_empty_buckets() {
        let tree = empty_tree(1);
        let frontier = FrontierMap::build(&tree, 1, &[]);
        assert_eq!(frontier.num_nodes(), 2);
        assert_eq!(frontier.num_samples(), 0);
        assert!(frontier.samples_for(1).is_empty());
        assert!(frontier.samples_for(2).is_empty());
    }
}
