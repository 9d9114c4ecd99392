//! Playfield, color swatch, and pause probe scanning.

use image::RgbaImage;

use crate::frame::{FieldGrid, PauseProbe, FIELD_COLS, FIELD_ROWS};
use crate::ocr::SHINE_LUMA_THRESHOLD;
use crate::palette::{luma, nearest_color, rgb_to_lab, Lab, Rgb};

/// Cell pitch in the normalized field buffer. The last cell of each row is
/// one pixel narrower (the buffer is 79 wide, not 80).
const CELL_PITCH: u32 = 8;

/// Highlight pre-check offsets within a cell. If none is lit the cell is
/// background and no color sampling happens.
const CELL_SHINE_PROBES: [(u32, u32); 3] = [(1, 1), (1, 2), (2, 1)];

/// Color sample offsets within a cell, positioned on the flat-colored body
/// of the block away from the highlight and the border.
const CELL_SAMPLE_PROBES: [(u32, u32); 4] = [(2, 4), (3, 3), (4, 4), (4, 2)];

/// Color swatch sample offsets.
const COLOR_PROBES: [(u32, u32); 3] = [(3, 2), (3, 3), (2, 3)];

/// Pause probe pixels: one on the U, one on the S, two on the E of the
/// "PAUSE" text, all on block margins that are near-black otherwise.
const PAUSE_PROBES: [(u32, u32); 4] = [(2, 0), (10, 0), (17, 0), (18, 0)];

pub const PAUSE_LUMA_THRESHOLD: f32 = 75.0;

fn pixel_rgb(img: &RgbaImage, x: u32, y: u32) -> Rgb {
    let p = img.get_pixel(x, y);
    [p[0] as f32, p[1] as f32, p[2] as f32]
}

/// Combines sampled colors channel-wise by quadratic mean (root of the mean
/// of squares). An arithmetic mean under-weights bright sub-pixels and
/// reads blocks darker than they look.
fn quadratic_mean(samples: &[Rgb]) -> Rgb {
    let mut acc = [0f32; 3];
    for sample in samples {
        for (a, c) in acc.iter_mut().zip(sample.iter()) {
            *a += c * c;
        }
    }
    acc.map(|v| (v / samples.len() as f32).sqrt())
}

/// Classifies every playfield cell against the candidate colors.
///
/// Candidates are 3 colors (background implicit, output is 1-based) or 4
/// with an explicit background entry first (output is the plain index).
pub fn scan_field(img: &RgbaImage, candidates: &[Rgb]) -> FieldGrid {
    let labs: Vec<Lab> = candidates.iter().map(|&c| rgb_to_lab(c)).collect();
    let index_offset = if candidates.len() == 4 { 0 } else { 1 };

    let mut cells = [0u8; 200];

    for row in 0..FIELD_ROWS {
        for col in 0..FIELD_COLS {
            let bx = col as u32 * CELL_PITCH;
            let by = row as u32 * CELL_PITCH;

            let has_shine = CELL_SHINE_PROBES.iter().any(|&(dx, dy)| {
                let [r, g, b] = pixel_rgb(img, bx + dx, by + dy);
                luma(r, g, b) > SHINE_LUMA_THRESHOLD
            });

            if !has_shine {
                // Background for sure
                continue;
            }

            let samples: Vec<Rgb> = CELL_SAMPLE_PROBES
                .iter()
                .map(|&(dx, dy)| pixel_rgb(img, bx + dx, by + dy))
                .collect();
            let cell_color = quadratic_mean(&samples);

            let nearest = nearest_color(cell_color, &labs);
            cells[row * FIELD_COLS + col] = (nearest + index_offset) as u8;
        }
    }

    FieldGrid(cells)
}

/// Reads a color swatch region by quadratic mean over its sample pixels.
pub fn scan_color(img: &RgbaImage) -> Rgb {
    let samples: Vec<Rgb> = COLOR_PROBES
        .iter()
        .map(|&(x, y)| pixel_rgb(img, x, y))
        .collect();
    quadratic_mean(&samples)
}

/// Reads the white piece color as a channel-wise maximum over the interior
/// pixels. Capture cards with heavy color bleed make any single-pixel read
/// inaccurate; the composite maximum is stable.
pub fn scan_composite_white(img: &RgbaImage) -> Rgb {
    let mut composite = [0f32; 3];

    for y in 1..img.height() - 1 {
        for x in 1..img.width() - 1 {
            let rgb = pixel_rgb(img, x, y);
            for (c, v) in composite.iter_mut().zip(rgb.iter()) {
                *c = c.max(*v);
            }
        }
    }

    composite
}

/// Reads the pause probe: mean luma over the probe pixels, and whether the
/// pause text is lit.
pub fn scan_pause(img: &RgbaImage) -> PauseProbe {
    let total: f32 = PAUSE_PROBES
        .iter()
        .map(|&(x, y)| {
            let [r, g, b] = pixel_rgb(img, x, y);
            luma(r, g, b)
        })
        .sum();
    let avg = total / PAUSE_PROBES.len() as f32;

    PauseProbe {
        luma: avg.round(),
        lit: avg > PAUSE_LUMA_THRESHOLD,
    }
}
