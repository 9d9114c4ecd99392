//! Step-1 recognizers: digits, shapes, and probes.
//!
//! This module provides:
//! - Template-matched digit recognition (`digits`)
//! - Highlight-probe shape recognition (`shapes`)
//! - Playfield / color / pause scanning (`field`)
//! - The per-frame orchestrator (`Scanner`) that turns a set of acquired
//!   regions into one raw `FrameScan`

pub mod digits;
pub mod field;
pub mod shapes;

pub use digits::{GlyphKind, GlyphTemplates};

use anyhow::Result;

use crate::backend::{FrameRegions, Region};
use crate::config::{DigitTask, OcrConfig, TaskProfile};
use crate::frame::{Digits, FrameScan, Piece};

/// Luma above which a probed pixel counts as a rendered block highlight.
pub const SHINE_LUMA_THRESHOLD: f32 = 75.0;

/// Parsed scan spec for one digit display.
#[derive(Clone, Debug)]
struct DigitSpec {
    pattern: Vec<GlyphKind>,
    red: bool,
}

impl DigitSpec {
    fn parse(task: &DigitTask) -> Result<Self> {
        Ok(Self {
            pattern: digits::parse_pattern(&task.pattern)?,
            red: task.red,
        })
    }
}

/// Reads one raw `FrameScan` out of a frame's acquired regions.
///
/// Pure per call: all state is the parsed configuration and the reference
/// templates.
pub struct Scanner {
    templates: GlyphTemplates,
    profile: TaskProfile,
    score: DigitSpec,
    level: DigitSpec,
    lines: DigitSpec,
    instant_das: Option<DigitSpec>,
    cur_piece_das: Option<DigitSpec>,
    piece_counts: Option<[DigitSpec; 7]>,
}

impl Scanner {
    pub fn new(templates: GlyphTemplates, config: &OcrConfig) -> Result<Self> {
        templates.validate()?;
        let mut scanner = Self {
            templates,
            profile: config.profile,
            score: DigitSpec {
                pattern: Vec::new(),
                red: false,
            },
            level: DigitSpec {
                pattern: Vec::new(),
                red: false,
            },
            lines: DigitSpec {
                pattern: Vec::new(),
                red: false,
            },
            instant_das: None,
            cur_piece_das: None,
            piece_counts: None,
        };
        scanner.set_config(config)?;
        Ok(scanner)
    }

    /// Replaces the active configuration wholesale.
    pub fn set_config(&mut self, config: &OcrConfig) -> Result<()> {
        let score = DigitSpec::parse(&config.tasks.score)?;
        let level = DigitSpec::parse(&config.tasks.level)?;
        let lines = DigitSpec::parse(&config.tasks.lines)?;

        let instant_das = match &config.tasks.instant_das {
            Some(task) if config.profile == TaskProfile::DasTrainer => {
                Some(DigitSpec::parse(task)?)
            }
            _ => None,
        };
        let cur_piece_das = match &config.tasks.cur_piece_das {
            Some(task) if config.profile == TaskProfile::DasTrainer => {
                Some(DigitSpec::parse(task)?)
            }
            _ => None,
        };
        let piece_counts = match &config.tasks.piece_counts {
            Some(tasks) if config.profile == TaskProfile::Classic => {
                let mut specs = Vec::with_capacity(7);
                for task in tasks {
                    specs.push(DigitSpec::parse(task)?);
                }
                match <[DigitSpec; 7]>::try_from(specs) {
                    Ok(specs) => Some(specs),
                    Err(_) => unreachable!("seven tasks parse to seven specs"),
                }
            }
            _ => None,
        };

        self.profile = config.profile;
        self.score = score;
        self.level = level;
        self.lines = lines;
        self.instant_das = instant_das;
        self.cur_piece_das = cur_piece_das;
        self.piece_counts = piece_counts;
        Ok(())
    }

    /// Scans every enabled display out of one frame's regions.
    ///
    /// Illegible or missing displays read as `None`; nothing here is an
    /// error. The returned scan does not own the regions; the caller
    /// attaches them if the scan is to be buffered for classification.
    pub fn scan_frame(&self, regions: &FrameRegions) -> FrameScan {
        let mut scan = FrameScan {
            score: self.scan_digits(regions.score.as_ref(), &self.score),
            level: self.scan_digits(regions.level.as_ref(), &self.level),
            lines: self.scan_digits(regions.lines.as_ref(), &self.lines),
            preview: regions
                .preview
                .as_ref()
                .and_then(|r| shapes::recognize_preview(&r.normalized)),
            ..FrameScan::default()
        };

        match self.profile {
            TaskProfile::Classic => {
                if let Some(specs) = &self.piece_counts {
                    for (piece, spec) in Piece::ALL.iter().zip(specs.iter()) {
                        scan.counts[*piece] =
                            self.scan_digits(regions.piece_counts[piece.index()].as_ref(), spec);
                    }
                }
            }
            TaskProfile::DasTrainer => {
                scan.cur_piece = regions
                    .cur_piece
                    .as_ref()
                    .and_then(|r| shapes::recognize_active(&r.normalized));
                if let Some(spec) = &self.instant_das {
                    scan.instant_das = self.scan_digits(regions.instant_das.as_ref(), spec);
                }
                if let Some(spec) = &self.cur_piece_das {
                    scan.cur_piece_das = self.scan_digits(regions.cur_piece_das.as_ref(), spec);
                }
            }
            TaskProfile::Minimal => {}
        }

        scan.pause = regions.pause.as_ref().map(|r| field::scan_pause(&r.normalized));

        scan
    }

    fn scan_digits(&self, region: Option<&Region>, spec: &DigitSpec) -> Option<Digits> {
        let region = region?;
        digits::recognize_digits(&region.normalized, &spec.pattern, &self.templates, spec.red)
    }
}
