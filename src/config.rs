//! Capture and decoding configuration.
//!
//! Configuration is replaced as a whole via `GameTracker::set_config`; there
//! is no incremental patching. Loading from disk is the caller's concern;
//! these structs are the boundary.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// A crop rectangle in source-frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
}

/// Which piece-related displays the running ROM exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskProfile {
    /// Preview plus the seven piece counters.
    Classic,
    /// Preview, current piece, and the two DAS counters.
    DasTrainer,
    /// Preview only.
    Minimal,
}

/// A digit display to scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DigitTask {
    pub crop: CropRect,
    /// One char per glyph: `D` for decimal, `H` for the hex-capable glyphs.
    pub pattern: String,
    /// Read the red channel instead of luma (the das trainer renders its
    /// counters in red).
    #[serde(default)]
    pub red: bool,
}

impl DigitTask {
    pub fn new(crop: CropRect, pattern: &str) -> Self {
        Self {
            crop,
            pattern: pattern.to_string(),
            red: false,
        }
    }
}

/// A display scanned by probes or color sampling rather than glyph matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropTask {
    pub crop: CropRect,
}

impl CropTask {
    pub fn new(crop: CropRect) -> Self {
        Self { crop }
    }
}

/// Brightness/contrast adjustment applied to captured regions before
/// recognition, for washed-out capture devices.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureFilters {
    /// Added to every channel (can be negative).
    #[serde(default)]
    pub brightness: i32,
    /// Percentage contrast adjustment; 0.0 leaves the image unchanged.
    #[serde(default)]
    pub contrast: f32,
}

impl Default for CaptureFilters {
    fn default() -> Self {
        Self {
            brightness: 0,
            contrast: 0.0,
        }
    }
}

impl CaptureFilters {
    pub fn is_identity(&self) -> bool {
        self.brightness == 0 && self.contrast == 0.0
    }
}

/// Crop rectangles and patterns for every scanned display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub score: DigitTask,
    pub level: DigitTask,
    pub lines: DigitTask,
    pub preview: CropTask,
    pub field: CropTask,
    /// Das-trainer profile.
    #[serde(default)]
    pub cur_piece: Option<CropTask>,
    #[serde(default)]
    pub instant_das: Option<DigitTask>,
    #[serde(default)]
    pub cur_piece_das: Option<DigitTask>,
    /// Classic profile: the seven piece counters in T, J, Z, O, S, L, I
    /// display order.
    #[serde(default)]
    pub piece_counts: Option<[DigitTask; 7]>,
    /// Color swatch regions, read live when no palette is configured.
    #[serde(default)]
    pub color1: Option<CropTask>,
    #[serde(default)]
    pub color2: Option<CropTask>,
    #[serde(default)]
    pub color3: Option<CropTask>,
}

/// Complete decoding configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    pub profile: TaskProfile,
    /// Named palette to use for field colors; when absent, colors are read
    /// live from the color swatch regions.
    #[serde(default)]
    pub palette: Option<String>,
    pub tasks: TaskConfig,
    #[serde(default)]
    pub filters: CaptureFilters,
}

impl OcrConfig {
    /// Validates internal consistency. Called on every config replace;
    /// a defective config is rejected wholesale rather than half-applied.
    pub fn validate(&self) -> Result<()> {
        validate_pattern("score", &self.tasks.score.pattern, 6..=7)?;
        validate_pattern("level", &self.tasks.level.pattern, 2..=2)?;
        validate_pattern("lines", &self.tasks.lines.pattern, 3..=3)?;

        validate_crop("score", self.tasks.score.crop)?;
        validate_crop("level", self.tasks.level.crop)?;
        validate_crop("lines", self.tasks.lines.crop)?;
        validate_crop("preview", self.tasks.preview.crop)?;
        validate_crop("field", self.tasks.field.crop)?;

        match self.profile {
            TaskProfile::Classic => {
                let counts = self
                    .tasks
                    .piece_counts
                    .as_ref()
                    .ok_or_else(|| anyhow!("classic profile requires piece_counts tasks"))?;
                for (task, piece) in counts.iter().zip(crate::frame::Piece::ALL) {
                    validate_pattern(&format!("piece count {}", piece), &task.pattern, 3..=3)?;
                    validate_crop(&format!("piece count {}", piece), task.crop)?;
                }
            }
            TaskProfile::DasTrainer => {
                let cur_piece = self
                    .tasks
                    .cur_piece
                    .ok_or_else(|| anyhow!("das-trainer profile requires a cur_piece task"))?;
                validate_crop("cur_piece", cur_piece.crop)?;
                for (name, task) in [
                    ("instant_das", &self.tasks.instant_das),
                    ("cur_piece_das", &self.tasks.cur_piece_das),
                ] {
                    let task = task
                        .as_ref()
                        .ok_or_else(|| anyhow!("das-trainer profile requires a {} task", name))?;
                    validate_pattern(name, &task.pattern, 2..=2)?;
                    validate_crop(name, task.crop)?;
                }
            }
            TaskProfile::Minimal => {}
        }

        if self.palette.is_none() {
            // Without a palette, colors 2 and 3 must be readable live.
            // Color 1 is optional: it falls back to a composite-white read.
            for (name, task) in [("color2", &self.tasks.color2), ("color3", &self.tasks.color3)] {
                let task = task
                    .ok_or_else(|| anyhow!("{} task required when no palette is configured", name))?;
                validate_crop(name, task.crop)?;
            }
        }

        Ok(())
    }
}

fn validate_pattern(
    name: &str,
    pattern: &str,
    len: std::ops::RangeInclusive<usize>,
) -> Result<()> {
    if !len.contains(&pattern.len()) {
        return Err(anyhow!(
            "{} pattern {:?} has {} glyphs, expected {:?}",
            name,
            pattern,
            pattern.len(),
            len
        ));
    }
    if let Some(c) = pattern.chars().find(|&c| c != 'D' && c != 'H') {
        return Err(anyhow!("{} pattern {:?} has unknown glyph class {:?}", name, pattern, c));
    }
    Ok(())
}

fn validate_crop(name: &str, crop: CropRect) -> Result<()> {
    if crop.w == 0 || crop.h == 0 {
        return Err(anyhow!(
            "{} crop has zero size ({}x{})",
            name,
            crop.w,
            crop.h
        ));
    }
    Ok(())
}
