//! Frame acquisition backends.
//!
//! This module provides:
//! - The backend interface (`AcquisitionBackend`): region extraction and
//!   field classification, the two points where the core hands work to
//!   whatever is doing the pixel pushing
//! - The software implementation (`SoftwareBackend`)
//! - The normalized region geometry (`layout`)
//!
//! An accelerated (GPU) backend is an external implementor of the same
//! trait; the core only depends on the region/readback contract.

pub mod layout;
pub mod software;

pub use software::SoftwareBackend;

use anyhow::Result;
use image::RgbaImage;

use crate::config::OcrConfig;
use crate::frame::FieldClassification;

/// One acquired task region: the source-resolution crop plus the
/// fixed-size normalized resample the recognizers read.
#[derive(Debug, Clone)]
pub struct Region {
    pub cropped: RgbaImage,
    pub normalized: RgbaImage,
}

/// All task regions extracted from one video frame. Regions for tasks the
/// active profile does not scan are `None`.
#[derive(Debug, Clone, Default)]
pub struct FrameRegions {
    pub score: Option<Region>,
    pub level: Option<Region>,
    pub lines: Option<Region>,
    pub preview: Option<Region>,
    pub cur_piece: Option<Region>,
    pub instant_das: Option<Region>,
    pub cur_piece_das: Option<Region>,
    /// Piece counter regions in [`crate::frame::Piece::ALL`] order.
    pub piece_counts: [Option<Region>; 7],
    pub color1: Option<Region>,
    pub color2: Option<Region>,
    pub color3: Option<Region>,
    pub field: Option<Region>,
    pub pause: Option<Region>,
}

/// Pixel-acquisition backend: turns an opaque video frame into the named
/// task regions, and classifies the playfield once the level is known.
///
/// Both operations may suspend (a GPU backend hands off and reads back);
/// the core never yields anywhere else. Implementations are driven from a
/// single processing call at a time and need no internal locking.
#[allow(async_fn_in_trait)]
pub trait AcquisitionBackend {
    /// Opaque frame handle this backend consumes.
    type Frame;

    /// Replaces the active configuration wholesale.
    fn set_config(&mut self, config: &OcrConfig) -> Result<()>;

    /// Extracts and normalizes every task region the configuration enables.
    async fn acquire_regions(&mut self, frame: &Self::Frame) -> Result<FrameRegions>;

    /// Classifies the playfield against the level's candidate colors.
    ///
    /// Returns `None` when classification cannot run: no derived level yet,
    /// or no field region in this frame.
    async fn classify_field(
        &mut self,
        regions: &FrameRegions,
        level: Option<u32>,
    ) -> Result<Option<FieldClassification>>;

    /// Hands a dispatched frame's region buffers back to the backend. A
    /// pooling backend can reclaim the allocations; the default drops them.
    fn recycle(&mut self, _regions: FrameRegions) {}
}
