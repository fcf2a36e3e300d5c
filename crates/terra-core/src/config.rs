//! Sensor band configuration.
//!
//! Band names are configuration data rather than code constants so a band
//! set for another sensor can be loaded from TOML.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Ordered band names of one sensor product, plus the bands used for RGB display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorBands {
    /// Human-readable name of the band set
    pub name: String,
    /// Master list, in the order bands appear on the raw raster's channel axis
    pub bands: Vec<String>,
    /// Red, green and blue band names
    pub rgb: [String; 3],
}

impl SensorBands {
    /// Create a band set, checking that the RGB bands are part of it.
    pub fn new(
        name: impl Into<String>,
        bands: Vec<String>,
        rgb: [String; 3],
    ) -> Result<Self> {
        let set = Self {
            name: name.into(),
            bands,
            rgb,
        };
        set.validate()?;
        Ok(set)
    }

    /// The 14 bands of the Landslide4Sense patches (Sentinel-2 plus slope and DEM).
    pub fn landslide4sense() -> Self {
        let bands = [
            "COASTAL AEROSOL",
            "BLUE",
            "GREEN",
            "RED",
            "RED_EDGE_1",
            "RED_EDGE_2",
            "RED_EDGE_3",
            "NIR_BROAD",
            "WATER_VAPOR",
            "CIRRUS",
            "SWIR_1",
            "SWIR_2",
            "SLOPE",
            "DEM",
        ];
        Self {
            name: "landslide4sense".to_string(),
            bands: bands.iter().map(|b| b.to_string()).collect(),
            rgb: ["RED".to_string(), "GREEN".to_string(), "BLUE".to_string()],
        }
    }

    /// Check internal consistency: non-empty, no duplicates, RGB bands present.
    pub fn validate(&self) -> Result<()> {
        if self.bands.is_empty() {
            return Err(Error::Config(format!(
                "band set '{}' has no bands",
                self.name
            )));
        }

        for (i, band) in self.bands.iter().enumerate() {
            if self.bands[..i].contains(band) {
                return Err(Error::Config(format!(
                    "band set '{}' lists '{}' more than once",
                    self.name, band
                )));
            }
        }

        for band in &self.rgb {
            if !self.bands.contains(band) {
                return Err(Error::Config(format!(
                    "RGB band '{}' is not part of band set '{}'",
                    band, self.name
                )));
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.bands
    }

    pub fn rgb(&self) -> &[String; 3] {
        &self.rgb
    }

    /// Position of a band on the raw channel axis
    pub fn index_of(&self, band: &str) -> Option<usize> {
        self.bands.iter().position(|b| b == band)
    }

    /// Named band selections: `all` or `rgb`.
    pub fn preset(&self, name: &str) -> Option<Vec<String>> {
        match name {
            "all" => Some(self.bands.clone()),
            "rgb" => Some(self.rgb.to_vec()),
            _ => None,
        }
    }

    /// Resolve requested band names to raw channel indices, preserving order.
    ///
    /// Fails with [`Error::InvalidArgument`] on the first unknown name.
    pub fn resolve<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<usize>> {
        requested
            .iter()
            .map(|band| {
                let band = band.as_ref();
                self.index_of(band).ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "'{}' is an invalid band name, please choose from {:?}.",
                        band, self.bands
                    ))
                })
            })
            .collect()
    }
}

impl Default for SensorBands {
    fn default() -> Self {
        Self::landslide4sense()
    }
}
