//! Sample visualization.
//!
//! A [`Figure`] is a row of raster panels with titles, an optional legend and
//! an optional suptitle. It is written as SVG (panels embedded as PNG) or,
//! for `.png` paths, as a raster composite of the panels.

use std::collections::BTreeSet;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::{Array2, Array3, Axis};
use terra_core::{Error, Result};

use crate::sample::Sample;

/// Resolution used when a figure is saved
pub const SAVE_DPI: u32 = 500;

/// Width of one panel, in inches
const PANEL_WIDTH_IN: f32 = 4.0;
/// Figure height, in inches
const FIGURE_HEIGHT_IN: f32 = 4.5;
/// Opacity of the mask drawn over the image
const OVERLAY_ALPHA: f32 = 0.3;

const TITLE_PT: f32 = 12.0;
const SUPTITLE_PT: f32 = 14.0;
const LEGEND_PT: f32 = 9.0;
const COLOR_TEXT: &str = "#000000";

/// One titled raster of the figure
#[derive(Debug, Clone)]
pub struct Panel {
    pub title: String,
    pub image: RgbImage,
}

/// A class name and its colour
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Rgb<u8>,
}

/// Rendered figure, kept in memory until saved.
#[derive(Debug, Clone)]
pub struct Figure {
    pub width_in: f32,
    pub height_in: f32,
    pub suptitle: Option<String>,
    pub panels: Vec<Panel>,
    pub legend: Vec<LegendEntry>,
}

/// Pixel rectangle inside the figure canvas
#[derive(Debug, Clone, Copy)]
struct Rect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Figure {
    pub fn panel_titles(&self) -> Vec<&str> {
        self.panels.iter().map(|p| p.title.as_str()).collect()
    }

    /// Canvas size in pixels at `dpi`
    pub fn pixel_size(&self, dpi: u32) -> (u32, u32) {
        (
            (self.width_in * dpi as f32).round() as u32,
            (self.height_in * dpi as f32).round() as u32,
        )
    }

    /// Write the figure at [`SAVE_DPI`]. The format follows the extension (`svg` or `png`).
    ///
    /// Only SVG carries the titles, suptitle and legend labels; a PNG holds the
    /// panels and legend swatches alone (see [`Figure::to_raster`]).
    pub fn save(&self, path: &Path) -> Result<()> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("svg") => fs::write(path, self.to_svg(SAVE_DPI)?)?,
            Some("png") => self.to_raster(SAVE_DPI).save_with_format(path, ImageFormat::Png)?,
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "unsupported figure format for {:?}, use .svg or .png",
                    path
                )))
            }
        }
        Ok(())
    }

    /// Render as an SVG document sized in inches with a `dpi`-scaled viewBox.
    pub fn to_svg(&self, dpi: u32) -> Result<String> {
        let (width, height) = self.pixel_size(dpi);
        let pt = dpi as f32 / 72.0;
        let mut svg = String::new();

        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}in" height="{}in">"#,
            width, height, self.width_in, self.height_in
        ));
        svg.push_str(&format!(
            r#"<rect width="{}" height="{}" fill="white"/>"#,
            width, height
        ));

        if let Some(title) = &self.suptitle {
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" text-anchor="middle" font-family="DejaVu Sans, Arial, sans-serif" font-size="{}" fill="{}">{}</text>"#,
                width as f32 / 2.0,
                SUPTITLE_PT * pt * 1.5,
                SUPTITLE_PT * pt,
                COLOR_TEXT,
                escape_xml(title)
            ));
        }

        for (panel, rect) in self.panels.iter().zip(self.panel_rects(dpi)) {
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" text-anchor="middle" font-family="DejaVu Sans, Arial, sans-serif" font-size="{}" fill="{}">{}</text>"#,
                rect.x + rect.width / 2.0,
                rect.y - TITLE_PT * pt * 0.5,
                TITLE_PT * pt,
                COLOR_TEXT,
                escape_xml(&panel.title)
            ));
            svg.push_str(&format!(
                r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" style="image-rendering:pixelated" href="data:image/png;base64,{}"/>"#,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                encode_png(&panel.image)?
            ));
        }

        if let Some(first) = self.panel_rects(dpi).first() {
            let font = LEGEND_PT * pt;
            let mut y = first.y + font;
            for entry in &self.legend {
                let [r, g, b] = entry.color.0;
                svg.push_str(&format!(
                    r##"<rect x="{}" y="{}" width="{}" height="{}" fill="#{:02x}{:02x}{:02x}" stroke="black"/>"##,
                    first.x + first.width + font * 0.5,
                    y - font * 0.8,
                    font * 1.5,
                    font * 0.8,
                    r,
                    g,
                    b
                ));
                svg.push_str(&format!(
                    r#"<text x="{}" y="{}" font-family="DejaVu Sans, Arial, sans-serif" font-size="{}" fill="{}">{}</text>"#,
                    first.x + first.width + font * 2.5,
                    y,
                    font,
                    COLOR_TEXT,
                    escape_xml(&entry.label)
                ));
                y += font * 1.4;
            }
        }

        svg.push_str("</svg>");
        Ok(svg)
    }

    /// Composite of the panels and legend swatches on a white canvas. Text is not drawn.
    pub fn to_raster(&self, dpi: u32) -> RgbImage {
        let (width, height) = self.pixel_size(dpi);
        let mut canvas = RgbImage::from_pixel(width.max(1), height.max(1), Rgb([255, 255, 255]));

        let rects = self.panel_rects(dpi);
        for (panel, rect) in self.panels.iter().zip(&rects) {
            let resized = imageops::resize(
                &panel.image,
                (rect.width.round() as u32).max(1),
                (rect.height.round() as u32).max(1),
                FilterType::Nearest,
            );
            imageops::overlay(&mut canvas, &resized, rect.x as i64, rect.y as i64);
        }

        if let Some(first) = rects.first() {
            let size = (LEGEND_PT * dpi as f32 / 72.0).max(1.0) as u32;
            let x = (first.x + first.width) as u32 + size / 2;
            for (i, entry) in self.legend.iter().enumerate() {
                let y = first.y as u32 + i as u32 * size * 3 / 2;
                let swatch = RgbImage::from_pixel(size, size, entry.color);
                imageops::overlay(&mut canvas, &swatch, x as i64, y as i64);
            }
        }

        canvas
    }

    /// Panel placement: equal-width slots, each raster scaled to fit with its aspect ratio.
    fn panel_rects(&self, dpi: u32) -> Vec<Rect> {
        let (width, height) = self.pixel_size(dpi);
        let (width, height) = (width as f32, height as f32);
        let pt = dpi as f32 / 72.0;

        let top = if self.suptitle.is_some() {
            SUPTITLE_PT * pt * 2.0
        } else {
            0.0
        } + TITLE_PT * pt * 1.5;
        let margin = 0.05 * height;
        let slot_width = width / self.panels.len().max(1) as f32;

        self.panels
            .iter()
            .enumerate()
            .map(|(i, panel)| {
                let avail_w = slot_width - 2.0 * margin;
                let avail_h = height - top - margin;
                let (img_w, img_h) = panel.image.dimensions();
                let scale = (avail_w / img_w.max(1) as f32).min(avail_h / img_h.max(1) as f32);
                let (w, h) = (img_w as f32 * scale, img_h as f32 * scale);
                Rect {
                    x: i as f32 * slot_width + (slot_width - w) / 2.0,
                    y: top,
                    width: w,
                    height: h,
                }
            })
            .collect()
    }
}

/// Build the inspection figure for one sample.
///
/// `rgb_indices` index the sample's channel axis for red, green and blue.
pub fn plot_sample(sample: &Sample, rgb_indices: [usize; 3], suptitle: Option<&str>) -> Result<Figure> {
    let bands = sample.num_bands();
    if let Some(bad) = rgb_indices.iter().find(|&&i| i >= bands) {
        return Err(Error::InvalidArgument(format!(
            "RGB channel {} out of range for a sample with {} bands",
            bad, bands
        )));
    }
    if sample.image.shape()[1..] != *sample.mask.shape() {
        return Err(Error::InvalidArgument(format!(
            "image {:?} and mask {:?} have different spatial size",
            sample.image.shape(),
            sample.mask.shape()
        )));
    }

    let rgb = normalize_rgb(&sample.image.select(Axis(0), &rgb_indices));
    let num_classes = sample.mask.iter().collect::<BTreeSet<_>>().len();
    let norm = ColorNorm::new(0.0, num_classes.saturating_sub(1) as f32);

    let mask_panel = colorize(&sample.mask, norm);
    let overlay = blend(&rgb, &mask_panel, OVERLAY_ALPHA);

    let mut panels = vec![
        Panel {
            title: "Image".to_string(),
            image: rgb,
        },
        Panel {
            title: "Ground Truth Mask".to_string(),
            image: mask_panel,
        },
        Panel {
            title: "GT Mask on Image".to_string(),
            image: overlay,
        },
    ];

    if let Some(prediction) = &sample.prediction {
        panels.push(Panel {
            title: "Predicted Mask".to_string(),
            image: colorize(prediction, norm),
        });
    }

    let legend = match &sample.class_names {
        Some(names) if !names.is_empty() => names
            .iter()
            .take(num_classes)
            .enumerate()
            .map(|(i, name)| LegendEntry {
                label: name.clone(),
                color: jet(norm.apply(i as f32)),
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(Figure {
        width_in: panels.len() as f32 * PANEL_WIDTH_IN,
        height_in: FIGURE_HEIGHT_IN,
        suptitle: suptitle.map(str::to_string),
        panels,
        legend,
    })
}

/// Min-max scale each of the three channels independently into [0, 255].
fn normalize_rgb(rgb: &Array3<f32>) -> RgbImage {
    let (height, width) = (rgb.shape()[1], rgb.shape()[2]);
    let ranges: Vec<(f32, f32)> = rgb
        .axis_iter(Axis(0))
        .map(|channel| {
            let min = channel.iter().copied().fold(f32::INFINITY, f32::min);
            let max = channel.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            (min, max)
        })
        .collect();

    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let mut pixel = [0u8; 3];
        for (c, (min, max)) in ranges.iter().enumerate() {
            let range = max - min;
            let v = if range > 0.0 {
                (rgb[[c, y as usize, x as usize]] - min) / range
            } else {
                0.0
            };
            pixel[c] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        Rgb(pixel)
    })
}

/// Linear map of label values onto [0, 1]
#[derive(Debug, Clone, Copy)]
struct ColorNorm {
    vmin: f32,
    vmax: f32,
}

impl ColorNorm {
    fn new(vmin: f32, vmax: f32) -> Self {
        Self { vmin, vmax }
    }

    fn apply(&self, value: f32) -> f32 {
        if self.vmax <= self.vmin {
            return 0.0;
        }
        ((value - self.vmin) / (self.vmax - self.vmin)).clamp(0.0, 1.0)
    }
}

fn colorize(labels: &Array2<i64>, norm: ColorNorm) -> RgbImage {
    let (height, width) = labels.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        jet(norm.apply(labels[[y as usize, x as usize]] as f32))
    })
}

fn blend(base: &RgbImage, top: &RgbImage, alpha: f32) -> RgbImage {
    RgbImage::from_fn(base.width(), base.height(), |x, y| {
        let (b, t) = (base.get_pixel(x, y), top.get_pixel(x, y));
        let mut pixel = [0u8; 3];
        for c in 0..3 {
            pixel[c] = (b[c] as f32 * (1.0 - alpha) + t[c] as f32 * alpha).round() as u8;
        }
        Rgb(pixel)
    })
}

/// The `jet` colour map: piecewise-linear red, green and blue ramps.
pub fn jet(value: f32) -> Rgb<u8> {
    const RED: [(f32, f32); 5] = [(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)];
    const GREEN: [(f32, f32); 6] = [
        (0.0, 0.0),
        (0.125, 0.0),
        (0.375, 1.0),
        (0.64, 1.0),
        (0.91, 0.0),
        (1.0, 0.0),
    ];
    const BLUE: [(f32, f32); 5] = [(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)];

    let v = value.clamp(0.0, 1.0);
    let channel = |points: &[(f32, f32)]| -> u8 {
        let level = points
            .windows(2)
            .find(|w| v <= w[1].0)
            .map(|w| {
                let (x0, y0) = w[0];
                let (x1, y1) = w[1];
                y0 + (y1 - y0) * (v - x0) / (x1 - x0)
            })
            .unwrap_or(points[points.len() - 1].1);
        (level * 255.0).round() as u8
    };

    Rgb([channel(&RED[..]), channel(&GREEN[..]), channel(&BLUE[..])])
}

fn encode_png(image: &RgbImage) -> Result<String> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(BASE64.encode(bytes))
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
