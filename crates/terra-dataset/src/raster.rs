//! HDF5 raster access.
//!
//! Each Landslide4Sense patch file holds a single named dataset: `img`
//! (`H x W x C`) for images and `mask` (`H x W`) for annotations.

use std::path::Path;

use ndarray::{Array2, Array3, Ix2, Ix3};
use terra_core::{Error, Result};

/// Dataset name inside image files
pub const IMAGE_KEY: &str = "img";

/// Dataset name inside mask files
pub const MASK_KEY: &str = "mask";

/// Read the image raster, converting its element type to `f32`.
pub fn read_image(path: &Path) -> Result<Array3<f32>> {
    let file = hdf5::File::open(path).map_err(|e| with_path(path, e))?;
    let dataset = file.dataset(IMAGE_KEY).map_err(|e| with_path(path, e))?;
    dataset.read::<f32, Ix3>().map_err(|e| with_path(path, e))
}

/// Read the label raster, converting its element type to `i64`.
pub fn read_mask(path: &Path) -> Result<Array2<i64>> {
    let file = hdf5::File::open(path).map_err(|e| with_path(path, e))?;
    let dataset = file.dataset(MASK_KEY).map_err(|e| with_path(path, e))?;
    dataset.read::<i64, Ix2>().map_err(|e| with_path(path, e))
}

fn with_path(path: &Path, err: hdf5::Error) -> Error {
    Error::Hdf5(format!("{}: {}", path.display(), err))
}
