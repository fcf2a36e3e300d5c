//! Burn Dataset integration for Landslide4Sense
//!
//! This module implements Burn's Dataset trait and a Batcher that stacks
//! samples into image and mask tensors.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::landslide4sense::Landslide4Sense;
use crate::sample::Sample;

/// A single Landslide4Sense item ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Landslide4SenseItem {
    /// Image data as flattened CHW float array
    pub image: Vec<f32>,
    /// Mask data as flattened HW label array
    pub mask: Vec<i64>,
    /// `[channels, height, width]`
    pub shape: [usize; 3],
}

impl From<Sample> for Landslide4SenseItem {
    fn from(sample: Sample) -> Self {
        let shape = [
            sample.image.shape()[0],
            sample.image.shape()[1],
            sample.image.shape()[2],
        ];
        Self {
            image: sample.image.as_standard_layout().iter().copied().collect(),
            mask: sample.mask.as_standard_layout().iter().copied().collect(),
            shape,
        }
    }
}

impl Dataset<Landslide4SenseItem> for Landslide4Sense {
    /// `None` only past the end, since Burn's iterator stops at the first `None`.
    /// An unreadable sample panics with its path.
    fn get(&self, index: usize) -> Option<Landslide4SenseItem> {
        let path = self.image_files().get(index)?;
        match self.sample(index) {
            Ok(sample) => Some(sample.into()),
            Err(e) => {
                error!("Failed to read sample {} from {:?}: {}", index, path, e);
                panic!("failed to read sample {index} from {path:?}: {e}");
            }
        }
    }

    fn len(&self) -> usize {
        self.image_files().len()
    }
}

/// A batch of image patches and their label masks
#[derive(Clone, Debug)]
pub struct SegmentationBatch<B: Backend> {
    /// Images with shape [batch_size, channels, height, width]
    pub images: Tensor<B, 4>,
    /// Masks with shape [batch_size, height, width]
    pub masks: Tensor<B, 3, Int>,
}

/// Batcher for Landslide4Sense items; all items must share one shape
#[derive(Clone, Debug)]
pub struct SegmentationBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SegmentationBatcher<B> {
    /// Create a new batcher for the given device
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<Landslide4SenseItem, SegmentationBatch<B>> for SegmentationBatcher<B> {
    fn batch(&self, items: Vec<Landslide4SenseItem>) -> SegmentationBatch<B> {
        let images: Vec<Tensor<B, 3>> = items
            .iter()
            .map(|item| {
                Tensor::<B, 3>::from_floats(
                    TensorData::new(item.image.clone(), item.shape),
                    &self.device,
                )
            })
            .collect();

        let masks: Vec<Tensor<B, 2, Int>> = items
            .iter()
            .map(|item| {
                Tensor::<B, 2, Int>::from_data(
                    TensorData::new(item.mask.clone(), [item.shape[1], item.shape[2]]),
                    &self.device,
                )
            })
            .collect();

        SegmentationBatch {
            images: Tensor::stack(images, 0),
            masks: Tensor::stack(masks, 0),
        }
    }
}
