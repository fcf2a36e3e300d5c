//! Landslide4Sense dataset adapter.
//!
//! Expected layout:
//! ```text
//! root/
//! ├── images/
//! │   ├── train/        image_1.h5, image_2.h5, ...
//! │   ├── validation/
//! │   └── test/
//! └── annotations/
//!     ├── train/        mask_1.h5, mask_2.h5, ...
//!     ├── validation/
//!     └── test/
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::Axis;
use terra_core::{Error, Result, SensorBands};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::plot::{self, Figure};
use crate::raster::{read_image, read_mask};
use crate::sample::{RawSample, Sample};
use crate::split::Split;
use crate::transform::Compose;

const IMAGE_PREFIX: &str = "image_";
const MASK_PREFIX: &str = "mask_";
const FILE_EXTENSION: &str = ".h5";

/// Paired image/mask patches of one split.
pub struct Landslide4Sense {
    root_dir: PathBuf,
    split: Split,
    band_set: SensorBands,
    bands: Vec<String>,
    band_indices: Vec<usize>,
    image_files: Vec<PathBuf>,
    mask_files: Vec<PathBuf>,
    transform: Compose,
}

impl Landslide4Sense {
    /// Open a split using the Landslide4Sense band set.
    ///
    /// `transform` defaults to the plain channel-first conversion.
    pub fn new<P, S>(root_dir: P, split: &str, bands: &[S], transform: Option<Compose>) -> Result<Self>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        Self::with_band_set(
            root_dir,
            split,
            bands,
            SensorBands::landslide4sense(),
            transform,
        )
    }

    /// Open a split with every band of the Landslide4Sense band set.
    pub fn all_bands<P: AsRef<Path>>(root_dir: P, split: &str) -> Result<Self> {
        let band_set = SensorBands::landslide4sense();
        let bands = band_set.bands.clone();
        Self::with_band_set(root_dir, split, &bands, band_set, None)
    }

    /// Open a split against an arbitrary band set.
    ///
    /// Split and band names are validated before the filesystem is touched.
    pub fn with_band_set<P, S>(
        root_dir: P,
        split: &str,
        bands: &[S],
        band_set: SensorBands,
        transform: Option<Compose>,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        let split: Split = split.parse()?;
        band_set.validate()?;
        let band_indices = band_set.resolve(bands)?;
        let bands: Vec<String> = bands.iter().map(|b| b.as_ref().to_string()).collect();

        let root_dir = root_dir.as_ref().to_path_buf();
        let images_dir = root_dir.join("images").join(split.dir_name());
        let annotations_dir = root_dir.join("annotations").join(split.dir_name());

        let image_files = list_files(&images_dir, IMAGE_PREFIX);
        let mask_files = list_files(&annotations_dir, MASK_PREFIX);
        check_pairing(&image_files, &mask_files)?;

        info!(
            "Loaded Landslide4Sense split '{}' from {:?}: {} samples, {} bands",
            split,
            root_dir,
            image_files.len(),
            bands.len()
        );

        Ok(Self {
            root_dir,
            split,
            band_set,
            bands,
            band_indices,
            image_files,
            mask_files,
            transform: transform.unwrap_or_default(),
        })
    }

    /// Number of samples (image files) in the split
    pub fn len(&self) -> usize {
        self.image_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_files.is_empty()
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn split(&self) -> Split {
        self.split
    }

    /// Selected bands, in output channel order
    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    pub fn band_indices(&self) -> &[usize] {
        &self.band_indices
    }

    pub fn band_set(&self) -> &SensorBands {
        &self.band_set
    }

    pub fn image_files(&self) -> &[PathBuf] {
        &self.image_files
    }

    pub fn mask_files(&self) -> &[PathBuf] {
        &self.mask_files
    }

    /// Read, band-select and transform the sample at `index`.
    pub fn sample(&self, index: usize) -> Result<Sample> {
        let (image_file, mask_file) = match (self.image_files.get(index), self.mask_files.get(index)) {
            (Some(image), Some(mask)) => (image, mask),
            _ => {
                return Err(Error::NotFound(format!(
                    "index {} out of range for split '{}' with {} samples",
                    index,
                    self.split,
                    self.len()
                )))
            }
        };

        debug!("Reading sample {} from {:?}", index, image_file);

        let image = read_image(image_file)?;
        let channels = image.len_of(Axis(2));
        if let Some(bad) = self.band_indices.iter().find(|&&i| i >= channels) {
            return Err(Error::Dataset(format!(
                "band index {} out of range for {} channels in {:?}",
                bad, channels, image_file
            )));
        }
        let image = image.select(Axis(2), &self.band_indices);
        let mask = read_mask(mask_file)?;

        self.transform.call(RawSample { image, mask })
    }

    /// Render one sample: image, ground truth, overlay and, if present, the prediction.
    ///
    /// Fails before rendering unless all three RGB bands are among the selected bands.
    pub fn plot(
        &self,
        sample: &Sample,
        suptitle: Option<&str>,
        save_path: Option<&Path>,
    ) -> Result<Figure> {
        let rgb_indices: Vec<usize> = self
            .band_set
            .rgb()
            .iter()
            .filter_map(|band| self.bands.iter().position(|b| b == band))
            .collect();

        let rgb_indices: [usize; 3] = rgb_indices.try_into().map_err(|_| {
            Error::InvalidArgument("Dataset doesn't contain some of the RGB bands".to_string())
        })?;

        let figure = plot::plot_sample(sample, rgb_indices, suptitle)?;
        if let Some(path) = save_path {
            figure.save(path)?;
            info!("Saved figure to {:?}", path);
        }
        Ok(figure)
    }
}

impl fmt::Debug for Landslide4Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Landslide4Sense")
            .field("root_dir", &self.root_dir)
            .field("split", &self.split)
            .field("bands", &self.bands)
            .field("len", &self.len())
            .field("transform", &self.transform)
            .finish()
    }
}

/// Files directly under `dir` named `<prefix>*.h5`, sorted by file name.
fn list_files(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    if !dir.is_dir() {
        warn!("Directory {:?} does not exist, split is empty", dir);
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|name| name.starts_with(prefix) && name.ends_with(FILE_EXTENSION))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files
}

/// Sample id of `<prefix><id>.h5`
fn sample_id<'a>(path: &'a Path, prefix: &str) -> Option<&'a str> {
    path.file_name()?
        .to_str()?
        .strip_prefix(prefix)?
        .strip_suffix(FILE_EXTENSION)
}

fn check_pairing(image_files: &[PathBuf], mask_files: &[PathBuf]) -> Result<()> {
    if image_files.len() != mask_files.len() {
        return Err(Error::Dataset(format!(
            "found {} image files but {} mask files",
            image_files.len(),
            mask_files.len()
        )));
    }

    for (image, mask) in image_files.iter().zip(mask_files) {
        let image_id = sample_id(image, IMAGE_PREFIX);
        let mask_id = sample_id(mask, MASK_PREFIX);
        if image_id.is_none() || image_id != mask_id {
            return Err(Error::Dataset(format!(
                "image {:?} has no matching mask (found {:?})",
                image, mask
            )));
        }
    }

    Ok(())
}
