//! In-memory sample representations.

use ndarray::{Array2, Array3};

/// A sample as read from disk, channel-last.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Image raster `[height, width, bands]`
    pub image: Array3<f32>,
    /// Label raster `[height, width]`
    pub mask: Array2<i64>,
}

/// A sample after the transform pipeline, channel-first.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Image raster `[bands, height, width]`
    pub image: Array3<f32>,
    /// Label raster `[height, width]`
    pub mask: Array2<i64>,
    /// Predicted labels `[height, width]`, only used for plotting
    pub prediction: Option<Array2<i64>>,
    /// Ordered class names, only used for plotting
    pub class_names: Option<Vec<String>>,
}

impl Sample {
    pub fn new(image: Array3<f32>, mask: Array2<i64>) -> Self {
        Self {
            image,
            mask,
            prediction: None,
            class_names: None,
        }
    }

    pub fn with_prediction(mut self, prediction: Array2<i64>) -> Self {
        self.prediction = Some(prediction);
        self
    }

    pub fn with_class_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.class_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn num_bands(&self) -> usize {
        self.image.shape()[0]
    }

    /// `(height, width)` of the image
    pub fn spatial_dims(&self) -> (usize, usize) {
        let shape = self.image.shape();
        (shape[1], shape[2])
    }
}
