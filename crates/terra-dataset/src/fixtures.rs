//! On-disk fixtures shared by the dataset tests.

use std::fs;
use std::path::Path;

use ndarray::{Array2, Array3};

use crate::raster::{IMAGE_KEY, MASK_KEY};

pub fn write_image(path: &Path, image: &Array3<f32>) {
    let file = hdf5::File::create(path).unwrap();
    file.new_dataset_builder()
        .with_data(image)
        .create(IMAGE_KEY)
        .unwrap();
}

pub fn write_mask(path: &Path, mask: &Array2<u8>) {
    let file = hdf5::File::create(path).unwrap();
    file.new_dataset_builder()
        .with_data(mask)
        .create(MASK_KEY)
        .unwrap();
}

/// 14-band image whose value encodes its band: pixel `(y, x)` of band `c`
/// holds `c * 1000 + y * 10 + x`.
pub fn banded_image(height: usize, width: usize) -> Array3<f32> {
    Array3::from_shape_fn((height, width, 14), |(y, x, c)| {
        (c * 1000 + y * 10 + x) as f32
    })
}

/// Create `<root>/images/<dir>/image_<id>.h5` and the matching mask for each id.
pub fn write_split(root: &Path, split_dir: &str, ids: &[&str], height: usize, width: usize) {
    let images = root.join("images").join(split_dir);
    let masks = root.join("annotations").join(split_dir);
    fs::create_dir_all(&images).unwrap();
    fs::create_dir_all(&masks).unwrap();

    for id in ids {
        write_image(
            &images.join(format!("image_{id}.h5")),
            &banded_image(height, width),
        );
        let mask = Array2::from_shape_fn((height, width), |(y, _)| u8::from(y >= height / 2));
        write_mask(&masks.join(format!("mask_{id}.h5")), &mask);
    }
}
