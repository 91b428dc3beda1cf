//! Image providers.
//!
//! A provider exposes `num_images()` and `get(index)`; the latter may do
//! I/O. [`MemoryImageProvider`] serves pre-decoded images,
//! [`FileImageProvider`] decodes `(data path, label path)` pairs on demand
//! through an injected [`ImageDecoder`]. Decoding itself stays outside this
//! crate; the seam is a single-method trait.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;

use super::image::{Image, Pixel};
use crate::error::{Error, Result};

// ============================================================================
// ImageProvider
// ============================================================================

/// Source of labeled images, by index.
pub trait ImageProvider: Send + Sync {
    /// Number of images this provider can serve.
    fn num_images(&self) -> usize;

    /// Fetch an image. May perform I/O.
    ///
    /// Returns [`Error::ImageNotFound`] when `index` is outside
    /// `[0, num_images())`.
    fn get(&self, index: usize) -> Result<Arc<Image>>;
}

// ============================================================================
// MemoryImageProvider
// ============================================================================

/// Provider over images that are already in memory.
#[derive(Debug, Clone)]
pub struct MemoryImageProvider {
    images: Vec<Arc<Image>>,
}

impl MemoryImageProvider {
    pub fn new(images: Vec<Arc<Image>>) -> Self {
        Self { images }
    }
}

impl ImageProvider for MemoryImageProvider {
    fn num_images(&self) -> usize {
        self.images.len()
    }

    fn get(&self, index: usize) -> Result<Arc<Image>> {
        self.images
            .get(index)
            .cloned()
            .ok_or(Error::ImageNotFound {
                index,
                count: self.images.len(),
            })
    }
}

// ============================================================================
// FileImageProvider
// ============================================================================

/// Decodes one image file into a single-channel pixel grid.
///
/// Implementations must reject multi-channel or multi-depth inputs with
/// [`Error::Decode`]; allocation exhaustion during decoding is reported the
/// same way.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<Array2<Pixel>>;
}

/// Provider over `(data path, label path)` pairs, decoding lazily.
///
/// Each `get` decodes both files and validates that data and label grids
/// have identical shape; a mismatch is [`Error::ShapeMismatch`] and aborts
/// the training that requested the image.
pub struct FileImageProvider<D: ImageDecoder> {
    image_list: Vec<(PathBuf, PathBuf)>,
    decoder: D,
}

impl<D: ImageDecoder> FileImageProvider<D> {
    pub fn new(image_list: Vec<(PathBuf, PathBuf)>, decoder: D) -> Self {
        Self { image_list, decoder }
    }
}

impl<D: ImageDecoder> ImageProvider for FileImageProvider<D> {
    fn num_images(&self) -> usize {
        self.image_list.len()
    }

    fn get(&self, index: usize) -> Result<Arc<Image>> {
        let (data_path, label_path) = self.image_list.get(index).ok_or(Error::ImageNotFound {
            index,
            count: self.image_list.len(),
        })?;
        let data = self.decoder.decode(data_path)?;
        let labels = self.decoder.decode(label_path)?;
        Ok(Arc::new(Image::new(data, labels)?))
    }
}

// ============================================================================
// Tests
// ============================================================================
