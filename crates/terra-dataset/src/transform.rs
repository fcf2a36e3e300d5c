//! Transform pipeline applied to every sample.
//!
//! Transforms operate on channel-last [`RawSample`]s so geometric ops can
//! move image and mask together. [`Compose`] runs its transforms in order and
//! finishes with the channel-first conversion, so an empty pipeline is the
//! default "to tensor" behaviour.

use std::fmt;

use ndarray::Axis;
use rand::Rng;
use terra_core::{Error, Result};

use crate::sample::{RawSample, Sample};

/// One step of the transform pipeline.
pub trait Transform: Send + Sync + fmt::Debug {
    fn apply(&self, sample: RawSample) -> Result<RawSample>;
}

/// Ordered list of transforms followed by channel-first conversion.
#[derive(Debug, Default)]
pub struct Compose {
    transforms: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { transforms }
    }

    /// Append a transform to the end of the pipeline
    pub fn then<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn call(&self, sample: RawSample) -> Result<Sample> {
        let sample = self
            .transforms
            .iter()
            .try_fold(sample, |sample, transform| transform.apply(sample))?;
        Ok(to_tensor(sample))
    }
}

/// Convert `[H, W, C]` to `[C, H, W]` in standard memory order.
pub fn to_tensor(sample: RawSample) -> Sample {
    let image = sample
        .image
        .permuted_axes([2, 0, 1])
        .as_standard_layout()
        .into_owned();
    let mask = sample.mask.as_standard_layout().into_owned();
    Sample::new(image, mask)
}

/// Per-band standardisation: `(x - mean[c]) / std[c]`.
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalize {
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(Error::InvalidArgument(format!(
                "mean has {} entries but std has {}",
                mean.len(),
                std.len()
            )));
        }
        if std.iter().any(|s| *s == 0.0) {
            return Err(Error::InvalidArgument(
                "std entries must be non-zero".to_string(),
            ));
        }
        Ok(Self { mean, std })
    }
}

impl Transform for Normalize {
    fn apply(&self, mut sample: RawSample) -> Result<RawSample> {
        let bands = sample.image.len_of(Axis(2));
        if bands != self.mean.len() {
            return Err(Error::InvalidArgument(format!(
                "Normalize expects {} bands, sample has {}",
                self.mean.len(),
                bands
            )));
        }

        for (band, mut lane) in sample.image.axis_iter_mut(Axis(2)).enumerate() {
            let (mean, std) = (self.mean[band], self.std[band]);
            lane.mapv_inplace(|v| (v - mean) / std);
        }
        Ok(sample)
    }
}

/// Mirror image and mask left-to-right with probability `p`.
#[derive(Debug, Clone, Copy)]
pub struct HorizontalFlip {
    p: f64,
}

impl HorizontalFlip {
    pub fn new(p: f64) -> Result<Self> {
        Ok(Self {
            p: check_probability(p)?,
        })
    }
}

impl Transform for HorizontalFlip {
    fn apply(&self, mut sample: RawSample) -> Result<RawSample> {
        if rand::thread_rng().gen_bool(self.p) {
            sample.image.invert_axis(Axis(1));
            sample.mask.invert_axis(Axis(1));
        }
        Ok(sample)
    }
}

/// Mirror image and mask top-to-bottom with probability `p`.
#[derive(Debug, Clone, Copy)]
pub struct VerticalFlip {
    p: f64,
}

impl VerticalFlip {
    pub fn new(p: f64) -> Result<Self> {
        Ok(Self {
            p: check_probability(p)?,
        })
    }
}

impl Transform for VerticalFlip {
    fn apply(&self, mut sample: RawSample) -> Result<RawSample> {
        if rand::thread_rng().gen_bool(self.p) {
            sample.image.invert_axis(Axis(0));
            sample.mask.invert_axis(Axis(0));
        }
        Ok(sample)
    }
}

fn check_probability(p: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(Error::InvalidArgument(format!(
            "probability must be in [0, 1], got {p}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    fn raw(height: usize, width: usize, bands: usize) -> RawSample {
        RawSample {
            image: Array3::from_shape_fn((height, width, bands), |(y, x, c)| {
                (c * 100 + y * 10 + x) as f32
            }),
            mask: Array2::from_shape_fn((height, width), |(y, x)| (y * width + x) as i64),
        }
    }

    #[test]
    fn test_default_pipeline_moves_channels_first() {
        let sample = Compose::default().call(raw(2, 3, 4)).unwrap();
        assert_eq!(sample.image.shape(), &[4, 2, 3]);
        assert_eq!(sample.image[[3, 1, 2]], 312.0);
        assert_eq!(sample.mask.shape(), &[2, 3]);
        assert!(sample.image.is_standard_layout());
    }

    #[test]
    fn test_normalize_per_band() {
        let normalize = Normalize::new(vec![0.0, 100.0], vec![1.0, 2.0]).unwrap();
        let out = normalize.apply(raw(1, 2, 2)).unwrap();
        assert_eq!(out.image[[0, 1, 0]], 1.0);
        assert_eq!(out.image[[0, 1, 1]], (101.0 - 100.0) / 2.0);
    }

    #[test]
    fn test_normalize_rejects_band_mismatch() {
        let normalize = Normalize::new(vec![0.0; 3], vec![1.0; 3]).unwrap();
        assert!(normalize.apply(raw(1, 1, 2)).is_err());
        assert!(Normalize::new(vec![0.0; 2], vec![1.0; 3]).is_err());
        assert!(Normalize::new(vec![0.0], vec![0.0]).is_err());
    }

    #[test]
    fn test_horizontal_flip_moves_image_and_mask_together() {
        let pipeline = Compose::default().then(HorizontalFlip::new(1.0).unwrap());
        let sample = pipeline.call(raw(2, 3, 1)).unwrap();

        assert_eq!(sample.image[[0, 0, 0]], 2.0);
        assert_eq!(sample.image[[0, 1, 2]], 10.0);
        assert_eq!(sample.mask[[0, 0]], 2);
        assert_eq!(sample.mask[[1, 2]], 3);
    }

    #[test]
    fn test_vertical_flip_moves_image_and_mask_together() {
        let pipeline = Compose::default().then(VerticalFlip::new(1.0).unwrap());
        let sample = pipeline.call(raw(2, 3, 1)).unwrap();

        assert_eq!(sample.image[[0, 0, 1]], 11.0);
        assert_eq!(sample.mask[[0, 1]], 4);
    }

    #[test]
    fn test_flip_with_zero_probability_is_noop() {
        let pipeline = Compose::default()
            .then(HorizontalFlip::new(0.0).unwrap())
            .then(VerticalFlip::new(0.0).unwrap());
        assert_eq!(pipeline.len(), 2);

        let sample = pipeline.call(raw(2, 2, 1)).unwrap();
        assert_eq!(sample.mask[[0, 1]], 1);
    }

    #[test]
    fn test_invalid_probability() {
        assert!(HorizontalFlip::new(1.5).is_err());
        assert!(VerticalFlip::new(-0.1).is_err());
    }
}
