//! Labeled image storage and per-pixel samples.

use std::sync::Arc;

use ndarray::Array2;

use crate::error::{Error, Result};

/// Signed pixel value type of the data grid.
pub type Pixel = i16;

/// Label value type of the label grid.
pub type Label = i16;

// ============================================================================
// Image
// ============================================================================

/// A single-channel labeled image.
///
/// Holds a data grid and a label grid of identical shape `(width, height)`,
/// both immutable after construction. Grids are indexed `[[x, y]]`.
#[derive(Debug, Clone)]
pub struct Image {
    data: Array2<Pixel>,
    labels: Array2<Label>,
}

impl Image {
    /// Create an image from a data grid and a label grid.
    ///
    /// Returns [`Error::ShapeMismatch`] if the two grids differ in shape.
    pub fn new(data: Array2<Pixel>, labels: Array2<Label>) -> Result<Self> {
        if data.dim() != labels.dim() {
            let (data_width, data_height) = data.dim();
            let (label_width, label_height) = labels.dim();
            return Err(Error::ShapeMismatch {
                data_width,
                data_height,
                label_width,
                label_height,
            });
        }
        Ok(Self { data, labels })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.data.dim().0
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    #[inline]
    pub fn data(&self) -> &Array2<Pixel> {
        &self.data
    }

    #[inline]
    pub fn labels(&self) -> &Array2<Label> {
        &self.labels
    }

    /// Read a pixel, treating coordinates outside the image as 0.
    ///
    /// Zero-padded, not clamped: there is no per-sample error channel for
    /// out-of-image reads.
    #[inline]
    pub fn pixel_or_zero(&self, x: i64, y: i64) -> Pixel {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            0
        } else {
            self.data[[x as usize, y as usize]]
        }
    }
}

// ============================================================================
// ImageSample
// ============================================================================

/// A reference to one pixel of one image.
///
/// The image handle is reference-counted, so a sample keeps its image alive
/// for exactly as long as the sample itself exists; no pixel data is copied.
#[derive(Debug, Clone)]
pub struct ImageSample {
    image: Arc<Image>,
    x: u32,
    y: u32,
}

impl ImageSample {
    /// Create a sample at `(x, y)` of `image`.
    ///
    /// The coordinates must lie inside the image.
    pub fn new(image: Arc<Image>, x: u32, y: u32) -> Self {
        debug_assert!((x as usize) < image.width() && (y as usize) < image.height());
        Self { image, x, y }
    }

    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    #[inline]
    pub fn x(&self) -> u32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> u32 {
        self.y
    }

    /// The label at this sample's pixel.
    #[inline]
    pub fn label(&self) -> Label {
        self.image.labels[[self.x as usize, self.y as usize]]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_image_rejects_shape_mismatch() {
        let data = Array2::<Pixel>::zeros((4, 4));
        let labels = Array2::<Label>::zeros((4, 3));
        let result = Image::new(data, labels);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_image_dimensions() {
        let image = Image::new(Array2::zeros((5, 3)), Array2::zeros((5, 3))).unwrap();
        assert_eq!(image.width(), 5);
        assert_eq!(image.height(), 3);
    }

    #[test]
    fn test_pixel_or_zero_pads_outside() {
        let data = array![[1, 2], [3, 4]];
        let labels = Array2::zeros((2, 2));
        let image = Image::new(data, labels).unwrap();

        assert_eq!(image.pixel_or_zero(0, 0), 1);
        assert_eq!(image.pixel_or_zero(1, 1), 4);
        assert_eq!(image.pixel_or_zero(-1, 0), 0);
        assert_eq!(image.pixel_or_zero(0, -1), 0);
        assert_eq!(image.pixel_or_zero(2, 0), 0);
        assert_eq!(image.pixel_or_zero(0, 2), 0);
    }

    #[test]
    fn test_sample_reads_label() {
        let data = Array2::zeros((2, 2));
        let labels = array![[0, 1], [2, 3]];
        let image = Arc::new(Image::new(data, labels).unwrap());

        let sample = ImageSample::new(Arc::clone(&image), 1, 0);
        assert_eq!(sample.label(), 2);
        assert_eq!(sample.x(), 1);
        assert_eq!(sample.y(), 0);
    }
}
