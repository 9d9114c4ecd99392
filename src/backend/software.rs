//! Software (CPU) acquisition backend.
//!
//! Crops every enabled task region out of a decoded RGBA frame, applies the
//! configured capture filters, and resamples to the normalized sizes the
//! recognizers expect. Field classification runs on the CPU with the pure
//! scanning functions from `ocr::field`.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::warn;

use crate::backend::{layout, AcquisitionBackend, FrameRegions, Region};
use crate::config::{CropRect, DigitTask, OcrConfig, TaskProfile};
use crate::frame::{FieldClassification, Piece};
use crate::ocr::field;
use crate::palette::{PaletteColors, PaletteSet, BLACK, WHITE};

pub struct SoftwareBackend {
    palettes: PaletteSet,
    config: OcrConfig,
    palette: Option<PaletteColors>,
    pause_crop: Option<CropRect>,
}

impl SoftwareBackend {
    pub fn new(config: OcrConfig, palettes: PaletteSet) -> Result<Self> {
        let mut backend = Self {
            palettes,
            config: config.clone(),
            palette: None,
            pause_crop: None,
        };
        backend.set_config(&config)?;
        Ok(backend)
    }

    fn extract(&self, frame: &RgbaImage, crop: CropRect, size: (u32, u32)) -> Result<Region> {
        if crop.x.saturating_add(crop.w) > frame.width()
            || crop.y.saturating_add(crop.h) > frame.height()
        {
            return Err(anyhow!(
                "crop {:?} lies outside the {}x{} frame",
                crop,
                frame.width(),
                frame.height()
            ));
        }

        let mut cropped = imageops::crop_imm(frame, crop.x, crop.y, crop.w, crop.h).to_image();

        let filters = self.config.filters;
        if filters.brightness != 0 {
            cropped = imageops::brighten(&cropped, filters.brightness);
        }
        if filters.contrast != 0.0 {
            cropped = imageops::contrast(&cropped, filters.contrast);
        }

        let normalized = imageops::resize(&cropped, size.0, size.1, FilterType::Triangle);

        Ok(Region { cropped, normalized })
    }

    fn extract_digits(&self, frame: &RgbaImage, task: &DigitTask) -> Result<Region> {
        self.extract(frame, task.crop, layout::digit_task_size(task.pattern.len()))
    }
}

impl AcquisitionBackend for SoftwareBackend {
    type Frame = RgbaImage;

    fn set_config(&mut self, config: &OcrConfig) -> Result<()> {
        config.validate()?;

        let palette = match &config.palette {
            Some(name) => Some(self.palettes.resolve(name)?),
            None => None,
        };

        // The das trainer display is not blanked by the pause overlay, so
        // the probe is only derived for the other profiles
        let pause_crop = if config.profile == TaskProfile::DasTrainer {
            None
        } else {
            let derived = layout::derive_pause_crop(config.tasks.field.crop);
            if derived.is_none() {
                warn!(
                    field_crop = ?config.tasks.field.crop,
                    "derived pause crop has no area, pause scanning disabled"
                );
            }
            derived
        };

        self.config = config.clone();
        self.palette = palette;
        self.pause_crop = pause_crop;
        Ok(())
    }

    async fn acquire_regions(&mut self, frame: &RgbaImage) -> Result<FrameRegions> {
        let tasks = self.config.tasks.clone();

        let mut regions = FrameRegions {
            score: Some(self.extract_digits(frame, &tasks.score)?),
            level: Some(self.extract_digits(frame, &tasks.level)?),
            lines: Some(self.extract_digits(frame, &tasks.lines)?),
            preview: Some(self.extract(frame, tasks.preview.crop, layout::PREVIEW_SIZE)?),
            field: Some(self.extract(frame, tasks.field.crop, layout::FIELD_SIZE)?),
            ..FrameRegions::default()
        };

        match self.config.profile {
            TaskProfile::Classic => {
                if let Some(count_tasks) = &tasks.piece_counts {
                    for (piece, task) in Piece::ALL.iter().zip(count_tasks.iter()) {
                        regions.piece_counts[piece.index()] =
                            Some(self.extract_digits(frame, task)?);
                    }
                }
            }
            TaskProfile::DasTrainer => {
                if let Some(task) = tasks.cur_piece {
                    regions.cur_piece =
                        Some(self.extract(frame, task.crop, layout::CUR_PIECE_SIZE)?);
                }
                if let Some(task) = &tasks.instant_das {
                    regions.instant_das = Some(self.extract_digits(frame, task)?);
                }
                if let Some(task) = &tasks.cur_piece_das {
                    regions.cur_piece_das = Some(self.extract_digits(frame, task)?);
                }
            }
            TaskProfile::Minimal => {}
        }

        // Color swatches are only read live; a configured palette already
        // supplies them
        if self.palette.is_none() {
            for (task, slot) in [
                (&tasks.color1, &mut regions.color1),
                (&tasks.color2, &mut regions.color2),
                (&tasks.color3, &mut regions.color3),
            ] {
                if let Some(task) = task {
                    *slot = Some(self.extract(frame, task.crop, layout::COLOR_SIZE)?);
                }
            }
        }

        if let Some(crop) = self.pause_crop {
            regions.pause = Some(self.extract(frame, crop, layout::PAUSE_SIZE)?);
        }

        Ok(regions)
    }

    async fn classify_field(
        &mut self,
        regions: &FrameRegions,
        level: Option<u32>,
    ) -> Result<Option<FieldClassification>> {
        let Some(level) = level else {
            return Ok(None);
        };
        let Some(field_region) = &regions.field else {
            return Ok(None);
        };

        let units = level % 10;
        let [color1, color2, color3] = match &self.palette {
            Some(palette) => palette[units as usize],
            None => {
                let color2 = regions
                    .color2
                    .as_ref()
                    .map(|r| field::scan_color(&r.normalized))
                    .ok_or_else(|| anyhow!("color2 region missing for live color read"))?;
                let color3 = regions
                    .color3
                    .as_ref()
                    .map(|r| field::scan_color(&r.normalized))
                    .ok_or_else(|| anyhow!("color3 region missing for live color read"))?;
                let color1 = match &regions.color1 {
                    Some(r) => field::scan_composite_white(&r.normalized),
                    None => WHITE,
                };
                [color1, color2, color3]
            }
        };

        let mut candidates = vec![color1, color2, color3];
        // The X6/X7 palettes carry colors dark enough to collide with black
        // on common capture hardware; those levels run without an explicit
        // background candidate
        if units != 6 && units != 7 {
            candidates.insert(0, BLACK);
        }

        let grid = field::scan_field(&field_region.normalized, &candidates);

        Ok(Some(FieldClassification {
            grid,
            color1,
            color2,
            color3,
        }))
    }
}
