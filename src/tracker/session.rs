//! Game session management.
//!
//! Interprets stabilized readings: detects game starts, assigns persistent
//! session ids, tracks absolute counters past their display wraparound,
//! derives the level from lines, and learns a color palette live.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::TaskProfile;
use crate::correct::level::level_digits;
use crate::correct::{LevelCorrector, ScoreCorrector};
use crate::frame::{digits_to_value, Digits, FrameScan, Piece};
use crate::palette::{LearnedPalette, Rgb};
use crate::store::SessionStore;
use crate::tracker::stabilizer::BUFFER_CAPACITY;

/// Absolute line count from which raw readings are treated as low-order
/// deltas. The lines display misrenders past level 39; empirical constant
/// tied to known hardware behavior, do not re-derive.
pub const LINES_WRAP_FLOOR: u32 = 340;

/// Same for the piece counters, which show three digits but misrender past
/// 99 on long games.
pub const PIECE_WRAP_FLOOR: u32 = 100;

/// Fallback start level when the transition table has no entry.
const FALLBACK_START_LEVEL: u32 = 18;

/// Lines threshold at which per-10-lines leveling resumes for a start
/// level, per the hardware leveling rule. Start levels past 29 have no
/// defined transition.
pub fn transition_lines(start_level: u32) -> Option<u32> {
    if start_level > 29 {
        return None;
    }
    Some(((start_level + 1) * 10).min((start_level * 10).saturating_sub(50).max(100)))
}

/// Palette learning slot: untouched, counting down to a stable read, or
/// captured.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PaletteSlot {
    Unseen,
    Counting(u32),
    Filled([Rgb; 3]),
}

/// Per-dispatch session-derived values.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    /// Newly allocated session id, when this dispatch started a game.
    pub new_game: Option<u16>,
    pub score: Option<u32>,
    pub lines: Option<u32>,
    pub level: Option<u32>,
}

/// Session state machine. Owns the correctors (they reset with the game)
/// and the injected durable store.
#[derive(Debug)]
pub struct SessionManager<S: SessionStore> {
    store: S,
    profile: TaskProfile,
    session_id: u16,
    in_game: bool,
    cur_lines: Option<u32>,
    start_level: u32,
    transition: Option<u32>,
    piece_totals: [Option<u32>; 7],
    palette_slots: [PaletteSlot; 10],
    level_corrector: LevelCorrector,
    score_corrector: ScoreCorrector,
}

impl<S: SessionStore> SessionManager<S> {
    /// Allocates an initial session id immediately so events before the
    /// first detected game still carry a valid id, and so a restart never
    /// reuses the previous run's id.
    pub fn new(mut store: S, profile: TaskProfile) -> Result<Self> {
        let session_id = allocate_session_id(&mut store)?;
        Ok(Self {
            store,
            profile,
            session_id,
            in_game: false,
            cur_lines: None,
            start_level: 0,
            transition: None,
            piece_totals: [None; 7],
            palette_slots: [PaletteSlot::Unseen; 10],
            level_corrector: LevelCorrector::new(),
            score_corrector: ScoreCorrector::new(),
        })
    }

    pub fn set_profile(&mut self, profile: TaskProfile) {
        self.profile = profile;
    }

    /// Current session id. Never zero.
    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    /// Advances session state over one dispatch candidate and derives its
    /// session-level values.
    pub fn advance(&mut self, scan: &FrameScan) -> Result<SessionOutcome> {
        let mut new_game = None;

        if scan.pause_active
            || scan.lines.is_none()
            || scan.score.is_none()
            || scan.level.is_none()
        {
            self.in_game = false;
        } else if !self.in_game {
            self.in_game = true;

            // First dispatch ever also counts as a game start: there is no
            // earlier state to continue from.
            let signature = scan
                .score
                .as_ref()
                .zip(scan.lines.as_ref())
                .is_some_and(|(score, lines)| is_game_start(score, lines));
            if signature || self.cur_lines.is_none() {
                self.session_id = allocate_session_id(&mut self.store)?;
                self.score_corrector.reset();
                self.level_corrector.reset();
                self.palette_slots = [PaletteSlot::Unseen; 10];
                new_game = Some(self.session_id);
            }
        }

        // Exactly one correction per dispatch; right after a reset this
        // accepts the game's start level verbatim.
        let corrected_level = self.level_corrector.correct(level_digits(scan.level.as_ref()));

        if new_game.is_some() {
            self.cur_lines = scan.lines.as_ref().map(|d| digits_to_value(d));
            self.start_level = corrected_level
                .map(|d| digits_to_value(&d))
                .unwrap_or(0);
            self.transition = transition_lines(self.start_level);

            if self.profile == TaskProfile::Classic {
                for (piece, digits) in scan.counts.iter() {
                    self.piece_totals[piece.index()] = digits.map(|d| digits_to_value(d));
                }
            } else {
                self.piece_totals = [None; 7];
            }

            if self.transition.is_none() {
                warn!(
                    start_level = self.start_level,
                    "no line transition for start level, assuming an 18 start"
                );
                self.start_level = FALLBACK_START_LEVEL;
                self.transition = transition_lines(FALLBACK_START_LEVEL);
            }

            debug!(
                session_id = self.session_id,
                start_level = self.start_level,
                "new game"
            );
        }

        let lines = self.absolute_lines(scan.lines.as_ref());
        let level = self.derived_level(lines, corrected_level);
        let score = self
            .score_corrector
            .correct(scan.score.as_ref())
            .map(|d| digits_to_value(&d));

        Ok(SessionOutcome {
            new_game,
            score,
            lines,
            level,
        })
    }

    /// Absolute line count. Past the wrap floor the display only yields a
    /// trustworthy units digit, so readings become deltas against it.
    fn absolute_lines(&mut self, digits: Option<&Digits>) -> Option<u32> {
        let digits = digits?;

        match self.cur_lines {
            Some(cur) if cur >= LINES_WRAP_FLOOR => {
                let next = carry_units(cur, *digits.last()? as u32);
                self.cur_lines = Some(next);
                Some(next)
            }
            _ => {
                let value = digits_to_value(digits);
                self.cur_lines = Some(value);
                Some(value)
            }
        }
    }

    /// Level derived from lines; the display itself is only trusted when no
    /// transition is known.
    fn derived_level(&self, lines: Option<u32>, corrected: Option<[u8; 2]>) -> Option<u32> {
        let digits = corrected?;
        let lines = lines?;

        let Some(transition) = self.transition else {
            return Some(digits_to_value(&digits));
        };

        if lines < transition {
            Some(self.start_level)
        } else {
            Some(self.start_level + 1 + (lines - transition) / 10)
        }
    }

    /// Absolute count for one piece counter, tracked past its wrap floor.
    pub fn piece_total(&mut self, piece: Piece, digits: Option<&Digits>) -> Option<u32> {
        let digits = digits?;
        let idx = piece.index();

        match self.piece_totals[idx] {
            Some(cur) if cur >= PIECE_WRAP_FLOOR => {
                let next = carry_units(cur, *digits.last()? as u32);
                self.piece_totals[idx] = Some(next);
                Some(next)
            }
            _ => {
                let value = digits_to_value(digits);
                self.piece_totals[idx] = Some(value);
                Some(value)
            }
        }
    }

    /// Feeds one classified frame's colors into the palette learner.
    ///
    /// A slot is captured after its colors have been seen for a full
    /// buffer's worth of consecutive dispatches. Returns true exactly once:
    /// when the last of the ten slots fills.
    pub fn learn_palette(&mut self, level: u32, colors: [Rgb; 3]) -> bool {
        let slot = (level % 10) as usize;

        match self.palette_slots[slot] {
            PaletteSlot::Unseen => {
                self.palette_slots[slot] = PaletteSlot::Counting(BUFFER_CAPACITY as u32 - 1);
                false
            }
            PaletteSlot::Counting(n) => {
                if n > 1 {
                    self.palette_slots[slot] = PaletteSlot::Counting(n - 1);
                    false
                } else {
                    self.palette_slots[slot] = PaletteSlot::Filled(colors);
                    self.palette_slots
                        .iter()
                        .all(|s| matches!(s, PaletteSlot::Filled(_)))
                }
            }
            PaletteSlot::Filled(_) => false,
        }
    }

    /// The learned palette, once every slot has been captured.
    pub fn learned_palette(&self) -> Option<LearnedPalette> {
        let mut palette = [[crate::palette::BLACK; 3]; 10];
        for (slot, entry) in self.palette_slots.iter().enumerate() {
            match entry {
                PaletteSlot::Filled(colors) => palette[slot] = *colors,
                _ => return None,
            }
        }
        Some(palette)
    }
}

/// The game-start signature: a score of 0 or 1 in the units digit with
/// zeros everywhere else (works for 6- and 7-digit displays), and a line
/// count of 000 (mode A) or 025 (mode B).
fn is_game_start(score: &Digits, lines: &Digits) -> bool {
    let score_start = score[..score.len() - 1].iter().all(|&d| d == 0)
        && matches!(score.last(), Some(0) | Some(1));
    let lines_start = lines == &[0, 0, 0] || lines == &[0, 2, 5];
    score_start && lines_start
}

/// Units-digit carry: the new reading advances the running total within its
/// current decade, or rounds it up to the next one.
fn carry_units(cur: u32, new_units: u32) -> u32 {
    let cur_units = cur % 10;
    if new_units > cur_units {
        cur + (new_units - cur_units)
    } else if new_units < cur_units {
        cur.div_ceil(10) * 10 + new_units
    } else {
        cur
    }
}

fn allocate_session_id<S: SessionStore>(store: &mut S) -> Result<u16> {
    let next = match store.last_id()? {
        Some(last) => last.wrapping_add(1),
        // Nothing persisted yet: seed from the clock so concurrent fresh
        // setups don't all start at 1
        None => clock_seed(),
    };
    let id = if next == 0 { 1 } else { next };
    store.set_last_id(id)?;
    Ok(id)
}

fn clock_seed() -> u16 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 0xFFFF) as u16
}
