//! nestris-vision
//!
//! Decodes a live capture feed of 1989 console Tetris into a temporally
//! stable stream of structured game-state events: score, level, lines,
//! active/preview piece, piece counters or DAS timers, and the 20x10
//! playfield grid.
//!
//! The pipeline per frame:
//!
//! 1. An acquisition backend turns the raw frame into normalized task
//!    regions ([`backend`])
//! 2. The recognizers read digits, shapes, and probes out of those regions
//!    into one raw [`frame::FrameScan`] ([`ocr`])
//! 3. The temporal stabilizer buffers scans and only trusts a changed value
//!    once it has held for several consecutive frames ([`tracker`])
//! 4. The session manager derives absolute counters, the level, and the
//!    learned palette, and the tracker emits one [`frame::DispatchEvent`]
//!
//! Readings are never errors: an illegible display is `None` for the frame
//! and ordinary stabilization carries the previous value until a legible
//! reading recurs.

pub mod backend;
pub mod config;
pub mod correct;
pub mod frame;
pub mod ocr;
pub mod palette;
pub mod store;
pub mod tracker;

pub use backend::{AcquisitionBackend, FrameRegions, Region, SoftwareBackend};
pub use config::{CropRect, OcrConfig, TaskProfile};
pub use frame::{DispatchEvent, FieldClassification, FieldGrid, FrameScan, Piece};
pub use ocr::GlyphTemplates;
pub use palette::PaletteSet;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use tracker::{GameTracker, TrackerEvent};
