//! Color math and palette types.
//!
//! Field cells are classified by nearest color in CIE Lab, a perceptually
//! uniform space where squared euclidean distance tracks how different two
//! colors look. Working in plain RGB over-weights luminance differences and
//! misclassifies the darker piece colors on washed-out captures.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// An RGB color with float channels in 0.0–255.0.
pub type Rgb = [f32; 3];

/// A CIE Lab color (L in 0–100, a/b roughly -128–128).
pub type Lab = [f32; 3];

pub const BLACK: Rgb = [0.0, 0.0, 0.0];
pub const WHITE: Rgb = [255.0, 255.0, 255.0];

/// Resolved palette: three piece colors for each of the ten level slots.
pub type PaletteColors = [[Rgb; 3]; 10];

/// Palette learned live from a capture, one slot per `level % 10`.
pub type LearnedPalette = [[Rgb; 3]; 10];

/// Calculates luma using the ITU-R BT.601 formula.
///
/// Returns a value from 0.0 (black) to 255.0 (white).
pub fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Converts an sRGB color (0–255 channels) to CIE Lab under D65.
pub fn rgb_to_lab(rgb: Rgb) -> Lab {
    fn to_linear(c: f32) -> f32 {
        let c = c / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }

    let r = to_linear(rgb[0]);
    let g = to_linear(rgb[1]);
    let b = to_linear(rgb[2]);

    // sRGB to XYZ, scaled by the D65 reference white
    let x = (0.4124564 * r + 0.3575761 * g + 0.1804375 * b) / 0.95047;
    let y = 0.2126729 * r + 0.7151522 * g + 0.0721750 * b;
    let z = (0.0193339 * r + 0.1191920 * g + 0.9503041 * b) / 1.08883;

    fn f(t: f32) -> f32 {
        const EPSILON: f32 = 216.0 / 24389.0;
        const KAPPA: f32 = 24389.0 / 27.0;
        if t > EPSILON {
            t.cbrt()
        } else {
            (KAPPA * t + 16.0) / 116.0
        }
    }

    let fx = f(x);
    let fy = f(y);
    let fz = f(z);

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Squared euclidean distance between two Lab colors.
pub fn lab_distance_sq(a: Lab, b: Lab) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Returns the index of the candidate nearest to `color` in Lab space.
pub fn nearest_color(color: Rgb, candidates: &[Lab]) -> usize {
    let lab = rgb_to_lab(color);
    let mut min_dist = f32::MAX;
    let mut min_idx = 0;

    for (idx, candidate) in candidates.iter().enumerate() {
        let dist = lab_distance_sq(lab, *candidate);
        if dist < min_dist {
            min_dist = dist;
            min_idx = idx;
        }
    }

    min_idx
}

/// Named palettes as stored on disk.
///
/// Each palette has ten slots (one per `level % 10`), each holding either
/// three colors, or two colors with the white piece color left implicit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PaletteSet(HashMap<String, Vec<Vec<Rgb>>>);

impl PaletteSet {
    pub fn new(palettes: HashMap<String, Vec<Vec<Rgb>>>) -> Self {
        Self(palettes)
    }

    /// Resolves a named palette, normalizing two-color slots by prepending
    /// white as color 1.
    pub fn resolve(&self, name: &str) -> Result<PaletteColors> {
        let raw = self
            .0
            .get(name)
            .ok_or_else(|| anyhow!("unknown palette: {}", name))?;

        if raw.len() != 10 {
            return Err(anyhow!(
                "palette {} has {} level slots, expected 10",
                name,
                raw.len()
            ));
        }

        let mut resolved = [[BLACK; 3]; 10];
        for (slot, colors) in raw.iter().enumerate() {
            resolved[slot] = match colors.as_slice() {
                [c2, c3] => [WHITE, *c2, *c3],
                [c1, c2, c3] => [*c1, *c2, *c3],
                _ => {
                    return Err(anyhow!(
                        "palette {} slot {} has {} colors, expected 2 or 3",
                        name,
                        slot,
                        colors.len()
                    ));
                }
            };
        }

        Ok(resolved)
    }
}
