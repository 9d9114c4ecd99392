//! The game tracker: capture frames in, stabilized game events out.
//!
//! One `GameTracker` owns the whole decoding pipeline. Per frame it asks
//! the acquisition backend for task regions, scans them into a raw
//! `FrameScan`, runs the scan through the temporal stabilizer, and, once a
//! buffered frame falls out the far end, derives session values, classifies
//! the playfield, and emits events.
//!
//! Processing is single-threaded and cooperative: one call handles exactly
//! one frame end to end, and callers must not submit the next frame before
//! the call completes. All mutable state lives in this one instance, so no
//! locking exists anywhere in the pipeline.

pub mod session;
pub mod stabilizer;

pub use session::SessionManager;
pub use stabilizer::{Stabilizer, BUFFER_CAPACITY};

use std::sync::mpsc::Sender;

use anyhow::Result;

use crate::backend::AcquisitionBackend;
use crate::config::{OcrConfig, TaskProfile};
use crate::frame::{digits_to_value, DispatchEvent, FrameScan, Piece, PieceCounts};
use crate::ocr::{GlyphTemplates, Scanner};
use crate::palette::LearnedPalette;
use crate::store::SessionStore;

/// Events emitted by the tracker. Each fires at most once per processed
/// frame, in the order they are declared here.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// A new game was detected; carries the freshly allocated session id.
    NewGame(u16),
    /// All ten palette slots have been learned.
    PaletteReady(LearnedPalette),
    /// One stabilized frame.
    Frame(Box<DispatchEvent>),
}

/// The top-level decoding pipeline.
pub struct GameTracker<B: AcquisitionBackend, S: SessionStore> {
    backend: B,
    scanner: Scanner,
    stabilizer: Stabilizer,
    session: SessionManager<S>,
    events: Sender<TrackerEvent>,
    profile: TaskProfile,
}

impl<B: AcquisitionBackend, S: SessionStore> GameTracker<B, S> {
    pub fn new(
        config: OcrConfig,
        templates: GlyphTemplates,
        mut backend: B,
        store: S,
        events: Sender<TrackerEvent>,
    ) -> Result<Self> {
        config.validate()?;
        backend.set_config(&config)?;
        let scanner = Scanner::new(templates, &config)?;
        let session = SessionManager::new(store, config.profile)?;

        Ok(Self {
            backend,
            scanner,
            stabilizer: Stabilizer::new(config.profile),
            session,
            events,
            profile: config.profile,
        })
    }

    /// Replaces the configuration wholesale. Buffered frames are kept; the
    /// next frames simply scan under the new configuration.
    pub fn set_config(&mut self, config: OcrConfig) -> Result<()> {
        config.validate()?;
        self.backend.set_config(&config)?;
        self.scanner.set_config(&config)?;
        self.stabilizer.set_profile(config.profile);
        self.session.set_profile(config.profile);
        self.profile = config.profile;
        Ok(())
    }

    /// Processes one video frame end to end.
    pub async fn process_frame(&mut self, frame: &B::Frame) -> Result<()> {
        let regions = self.backend.acquire_regions(frame).await?;
        let mut scan = self.scanner.scan_frame(&regions);
        scan.regions = Some(regions);
        self.process_scan(scan).await
    }

    /// Feeds one raw scan through stabilization and dispatch. This is the
    /// replay entry: a recorded scan sequence fed to a fresh tracker
    /// reproduces the original event sequence.
    pub async fn process_scan(&mut self, scan: FrameScan) -> Result<()> {
        let Some(mut dispatch) = self.stabilizer.push(scan) else {
            return Ok(());
        };

        if dispatch.pause_active {
            // The status displays blank under the vanilla pause overlay;
            // synthesize the same blanked record for this overlay
            dispatch.score = None;
            dispatch.lines = None;
            dispatch.level = None;
            dispatch.preview = None;
            if self.profile == TaskProfile::Classic {
                dispatch.counts = PieceCounts::default();
            }
        }

        let outcome = self.session.advance(&dispatch)?;
        if let Some(session_id) = outcome.new_game {
            let _ = self.events.send(TrackerEvent::NewGame(session_id));
        }

        // Field classification needs the derived level, which is why it
        // runs on dispatch rather than on scan
        let regions = dispatch.regions.take();
        let field = match &regions {
            Some(regions) => self.backend.classify_field(regions, outcome.level).await?,
            None => None,
        };

        if let (Some(level), Some(classified)) = (outcome.level, &field) {
            let learned = self.session.learn_palette(
                level,
                [classified.color1, classified.color2, classified.color3],
            );
            if learned {
                if let Some(palette) = self.session.learned_palette() {
                    let _ = self.events.send(TrackerEvent::PaletteReady(palette));
                }
            }
        }

        if let Some(regions) = regions {
            self.backend.recycle(regions);
        }

        let piece_counts = match self.profile {
            TaskProfile::Classic => {
                let mut totals = [None; 7];
                for piece in Piece::ALL {
                    totals[piece.index()] =
                        self.session.piece_total(piece, dispatch.counts[piece].as_ref());
                }
                Some(totals)
            }
            _ => None,
        };

        let event = DispatchEvent {
            session_id: self.session.session_id(),
            pause_active: dispatch.pause_active,
            score: outcome.score,
            lines: outcome.lines,
            level: outcome.level,
            preview: dispatch.preview,
            field,
            cur_piece: match self.profile {
                TaskProfile::DasTrainer => dispatch.cur_piece,
                _ => None,
            },
            instant_das: dispatch.instant_das.as_ref().map(|d| digits_to_value(d)),
            cur_piece_das: dispatch.cur_piece_das.as_ref().map(|d| digits_to_value(d)),
            piece_counts,
            raw: dispatch,
        };
        let _ = self.events.send(TrackerEvent::Frame(Box::new(event)));

        Ok(())
    }
}
