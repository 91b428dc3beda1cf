//! Bagging and the per-batch sample cache.
//!
//! The [`SampleCache`] layers bagging on top of an [`ImageProvider`]. A bag
//! is a multiset of image indices drawn with replacement; sorting the draw
//! and splitting it into contiguous batches means consecutive batches share
//! as many images as possible, so batch transitions reload only images that
//! newly enter the working set.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::{Image, ImageProvider, ImageSample, Label};
use crate::error::Result;

// ============================================================================
// SampleParams
// ============================================================================

/// Parameters controlling bagging and per-image pixel sampling.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SampleParams {
    /// Fraction of the image area drawn per image (of the non-background
    /// pixels, capped by their count). `>= 1` keeps every non-background
    /// pixel.
    pub samples_per_image_fraction: f64,
    /// Fraction of images per bag, drawn with replacement.
    pub bagging_fraction: f64,
    /// Lower bound of the background labels; pixels with a label at or
    /// above this value are ignored.
    pub background_label: Label,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            samples_per_image_fraction: 0.1,
            bagging_fraction: 1.0,
            background_label: Label::MAX,
        }
    }
}

// ============================================================================
// SampleCache
// ============================================================================

/// Stages images in and out of memory across bagging batches and draws the
/// pixel samples for the currently loaded batch.
pub struct SampleCache {
    provider: Arc<dyn ImageProvider>,
    params: SampleParams,
    image_map: BTreeMap<usize, Arc<Image>>,
    samples: Vec<ImageSample>,
}

impl SampleCache {
    pub fn new(provider: Arc<dyn ImageProvider>, params: SampleParams) -> Self {
        Self {
            provider,
            params,
            image_map: BTreeMap::new(),
            samples: Vec::new(),
        }
    }

    pub fn num_images(&self) -> usize {
        self.provider.num_images()
    }

    /// Samples of the currently loaded batch.
    pub fn samples(&self) -> &[ImageSample] {
        &self.samples
    }

    pub fn clear_samples(&mut self) {
        self.samples.clear();
    }

    pub fn clear_image_cache(&mut self) {
        self.image_map.clear();
    }

    /// Draw one bag of image indices and split it into `num_batches`
    /// contiguous batches.
    ///
    /// Draws `round(bagging_fraction * N)` indices uniformly with
    /// replacement, sorts them, and partitions the sorted list at
    /// `floor(i * M / num_batches)`. Sorting maximizes image reuse between
    /// consecutive batches.
    pub fn compute_bag_batches<R: Rng>(
        &self,
        num_batches: usize,
        rng: &mut R,
    ) -> Vec<Vec<usize>> {
        let num_images = self.provider.num_images();
        let bag_size = (self.params.bagging_fraction * num_images as f64).round() as usize;

        let mut image_indices = Vec::with_capacity(bag_size);
        for _ in 0..bag_size {
            image_indices.push(rng.gen_range(0..num_images));
        }
        image_indices.sort_unstable();

        let mut batches = Vec::with_capacity(num_batches);
        for i in 0..num_batches {
            let start = i * bag_size / num_batches;
            let end = (i + 1) * bag_size / num_batches;
            batches.push(image_indices[start..end].to_vec());
        }
        batches
    }

    /// Load one batch of image indices and draw its samples.
    ///
    /// The current image map becomes the old generation: indices still
    /// needed are re-inserted from it, everything else is loaded through
    /// the provider, and images left in the old generation are dropped.
    /// An index appearing `k` times in the batch is sampled `k` times
    /// (bagging with replacement).
    pub fn load_batch<R: Rng>(&mut self, batch: &[usize], rng: &mut R) -> Result<()> {
        self.clear_samples();
        let old_image_map = std::mem::take(&mut self.image_map);
        for &image_index in batch {
            if !self.image_map.contains_key(&image_index) {
                let image = match old_image_map.get(&image_index) {
                    Some(image) => Arc::clone(image),
                    None => self.provider.get(image_index)?,
                };
                self.image_map.insert(image_index, image);
            }
            self.load_samples_from_image(image_index, rng);
        }
        Ok(())
    }

    /// Draw a whole bag as a single batch.
    pub fn load_bag<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        let batches = self.compute_bag_batches(1, rng);
        self.load_batch(&batches[0], rng)
    }

    /// Draw this image's samples into the current sample list.
    ///
    /// Non-background pixels are collected in x-major order. With a
    /// fraction below 1, `min(round(f * W * H), non_background)` of them
    /// are taken without replacement using the Fisher-Yates tail pattern;
    /// otherwise all of them are kept.
    fn load_samples_from_image<R: Rng>(&mut self, image_index: usize, rng: &mut R) {
        let image = Arc::clone(&self.image_map[&image_index]);
        let width = image.width();
        let height = image.height();

        let mut non_background = Vec::new();
        for x in 0..width {
            for y in 0..height {
                if image.labels()[[x, y]] < self.params.background_label {
                    non_background.push(ImageSample::new(Arc::clone(&image), x as u32, y as u32));
                }
            }
        }

        if self.params.samples_per_image_fraction < 1.0 {
            let wanted =
                (self.params.samples_per_image_fraction * (width * height) as f64).round() as usize;
            let num_samples = wanted.min(non_background.len());
            let len = non_background.len();
            for i in 0..num_samples {
                let j = rng.gen_range(0..len - i);
                non_background.swap(j, len - 1 - i);
                self.samples.push(non_background[len - 1 - i].clone());
            }
        } else {
            self.samples.extend(non_background);
        }
    }

    #[cfg(test)]
    fn cached_image(&self, index: usize) -> Option<&Arc<Image>> {
        self.image_map.get(&index)
    }
}

// ============================================================================
// Tests
// ============================================================================
