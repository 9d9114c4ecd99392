//! Template-matched digit recognition.
//!
//! Each glyph cell is compared against a set of reference templates by
//! accumulated squared luma difference; the closest template wins. Template
//! index 0 is reserved for the "no confident match" glyph. If any cell in a
//! field resolves to it, the whole field is reported illegible for the
//! frame. One garbled digit would otherwise produce a plausible-looking but
//! wrong value, and the stabilizer handles a missing reading for free.

use anyhow::{anyhow, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::backend::layout::{DIGIT_PITCH, DIGIT_SIZE};
use crate::frame::Digits;
use crate::palette::luma;

/// The das trainer renders its counters in red only; the red channel is
/// stretched as if capped at 155 so lit pixels land near full luma.
const RED_SCALE: f32 = 255.0 / 155.0;

/// Glyph class of one pattern position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlyphKind {
    /// 0–9.
    Decimal,
    /// 0–9 plus A–F (score millions digit, level display past 29).
    Hex,
}

impl GlyphKind {
    pub fn from_pattern_char(c: char) -> Option<Self> {
        match c {
            'D' => Some(GlyphKind::Decimal),
            'H' => Some(GlyphKind::Hex),
            _ => None,
        }
    }

    /// Number of leading templates to match against, including the reserved
    /// no-match template at index 0.
    pub fn template_count(self) -> usize {
        match self {
            GlyphKind::Decimal => 11,
            GlyphKind::Hex => 17,
        }
    }
}

/// Parses a pattern spec string (`D` decimal, `H` hex) into glyph classes.
pub fn parse_pattern(pattern: &str) -> Result<Vec<GlyphKind>> {
    pattern
        .chars()
        .map(|c| {
            GlyphKind::from_pattern_char(c)
                .ok_or_else(|| anyhow!("unknown glyph class {:?} in pattern {:?}", c, pattern))
        })
        .collect()
}

/// Reference glyph templates: per-pixel luma of each 14x14 glyph.
///
/// Index 0 is the reserved no-match glyph, 1..=10 are the digits 0–9, and
/// 11..=16 are the letters A–F.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlyphTemplates(Vec<Vec<f32>>);

impl GlyphTemplates {
    pub const GLYPH_PIXELS: usize = (DIGIT_SIZE * DIGIT_SIZE) as usize;
    pub const TEMPLATE_COUNT: usize = 17;

    pub fn new(templates: Vec<Vec<f32>>) -> Result<Self> {
        let templates = Self(templates);
        templates.validate()?;
        Ok(templates)
    }

    /// Validates shape. Deserialization does not run this; construction
    /// paths that accept external template data must.
    pub fn validate(&self) -> Result<()> {
        if self.0.len() != Self::TEMPLATE_COUNT {
            return Err(anyhow!(
                "expected {} glyph templates, got {}",
                Self::TEMPLATE_COUNT,
                self.0.len()
            ));
        }
        for (idx, template) in self.0.iter().enumerate() {
            if template.len() != Self::GLYPH_PIXELS {
                return Err(anyhow!(
                    "glyph template {} has {} pixels, expected {}",
                    idx,
                    template.len(),
                    Self::GLYPH_PIXELS
                ));
            }
        }
        Ok(())
    }

    fn template(&self, idx: usize) -> &[f32] {
        &self.0[idx]
    }
}

/// Recognizes a digit sequence from a normalized digit region.
///
/// Returns `None` if any glyph position matches the reserved no-match
/// template best, never a partial sequence.
pub fn recognize_digits(
    img: &RgbaImage,
    pattern: &[GlyphKind],
    templates: &GlyphTemplates,
    red: bool,
) -> Option<Digits> {
    let mut digits = Vec::with_capacity(pattern.len());

    for (idx, kind) in pattern.iter().enumerate() {
        let best = match_glyph(
            img,
            idx as u32 * DIGIT_PITCH,
            templates,
            kind.template_count(),
            red,
        );
        if best == 0 {
            return None;
        }
        digits.push((best - 1) as u8);
    }

    Some(digits)
}

/// Matches one glyph cell at `x0` against the first `count` templates and
/// returns the index of the closest.
fn match_glyph(img: &RgbaImage, x0: u32, templates: &GlyphTemplates, count: usize, red: bool) -> usize {
    let mut sums = vec![0f64; count];

    for y in 0..DIGIT_SIZE {
        for x in 0..DIGIT_SIZE {
            let p = img.get_pixel(x0 + x, y);
            let sample = if red {
                (p[0] as f32 * RED_SCALE).min(255.0)
            } else {
                luma(p[0] as f32, p[1] as f32, p[2] as f32)
            };

            let pixel_idx = (y * DIGIT_SIZE + x) as usize;
            for (t_idx, sum) in sums.iter_mut().enumerate() {
                let diff = sample - templates.template(t_idx)[pixel_idx];
                *sum += (diff * diff) as f64;
            }
        }
    }

    let mut min_val = f64::MAX;
    let mut min_idx = 0;
    for (idx, &sum) in sums.iter().enumerate() {
        if sum < min_val {
            min_val = sum;
            min_idx = idx;
        }
    }

    min_idx
}
