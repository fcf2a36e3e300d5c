//! Landslide4Sense dataset loading, transforms and visualization.
//!
//! This crate reads paired image/mask HDF5 patches from disk, applies a
//! transform pipeline, exposes the samples through Burn's `Dataset` trait
//! and renders individual samples for inspection.

pub mod burn_dataset;
pub mod landslide4sense;
pub mod plot;
pub mod raster;
pub mod sample;
pub mod split;
pub mod transform;

#[cfg(test)]
pub(crate) mod fixtures;

pub use burn_dataset::{Landslide4SenseItem, SegmentationBatch, SegmentationBatcher};
pub use landslide4sense::Landslide4Sense;
pub use plot::{Figure, LegendEntry, Panel};
pub use sample::{RawSample, Sample};
pub use split::Split;
pub use transform::{Compose, HorizontalFlip, Normalize, Transform, VerticalFlip};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::burn_dataset::*;
    pub use crate::landslide4sense::*;
    pub use crate::plot::*;
    pub use crate::sample::*;
    pub use crate::split::*;
    pub use crate::transform::*;
}
