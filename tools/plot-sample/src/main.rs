//! Render one sample of a Landslide4Sense split.
//!
//! Writes the image, ground truth mask and overlay panels to `--output`
//! (`.svg` by default, or `.png` without text).

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use terra_core::cli::{load_toml_config, setup_cli_logging};
use terra_core::SensorBands;
use terra_dataset::Landslide4Sense;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "plot-sample")]
#[command(about = "Render one Landslide4Sense sample", long_about = None)]
struct Args {
    /// Dataset root containing `images/` and `annotations/`
    #[arg(short, long)]
    root: PathBuf,

    /// Split to read: train, val or test
    #[arg(short, long, default_value = "train")]
    split: String,

    /// Sample index within the split
    #[arg(short, long, default_value = "0")]
    index: usize,

    /// Band names to load, or a single preset (`all`, `rgb`)
    #[arg(short, long, value_delimiter = ',', default_value = "all")]
    bands: Vec<String>,

    /// Band set definition (TOML); defaults to Landslide4Sense
    #[arg(long)]
    config: Option<PathBuf>,

    /// Label names, one per mask value, shown in the legend
    #[arg(long, value_delimiter = ',')]
    class_names: Vec<String>,

    /// Figure title
    #[arg(short, long)]
    title: Option<String>,

    /// Output file; `.svg` keeps titles and legend labels, `.png` holds the panels only
    #[arg(short, long, default_value = "sample.svg")]
    output: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_cli_logging(args.verbose)?;

    let band_set = match &args.config {
        Some(path) => load_toml_config::<SensorBands>(path)
            .with_context(|| format!("Failed to load band set from {:?}", path))?,
        None => SensorBands::landslide4sense(),
    };

    let bands = match args.bands.as_slice() {
        [single] => band_set.preset(single).unwrap_or_else(|| vec![single.clone()]),
        many => many.to_vec(),
    };

    let dataset = Landslide4Sense::with_band_set(&args.root, &args.split, &bands, band_set, None)
        .with_context(|| format!("Failed to open dataset at {:?}", args.root))?;

    if args.index >= dataset.len() {
        bail!(
            "Index {} out of range, split '{}' has {} samples",
            args.index,
            dataset.split(),
            dataset.len()
        );
    }

    let mut sample = dataset
        .sample(args.index)
        .with_context(|| format!("Failed to read sample {}", args.index))?;
    if !args.class_names.is_empty() {
        sample = sample.with_class_names(args.class_names.iter().cloned());
    }

    dataset
        .plot(&sample, args.title.as_deref(), Some(args.output.as_path()))
        .context("Failed to plot sample")?;

    info!("Saved figure to {:?}", args.output);
    Ok(())
}
