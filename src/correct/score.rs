//! Score display corrector.
//!
//! Past 999,999 the score display rolls its leading digit into letters
//! (A = 1.0M, B = 1.1M, ...). The letter glyphs alias digits under OCR
//! (A reads as 4, B as 8) and both directions occur. Score never
//! decreases within a game, so the last accepted leading glyph tells the
//! two apart: a 4 right after a 9xx,xxx or 1.0M reading must be the A
//! glyph, and an A right after a 3xx,xxx reading must be a plain 4.

use crate::frame::Digits;

/// Corrects the leading glyph of a score reading.
#[derive(Debug, Default)]
pub struct ScoreCorrector {
    last: Option<Digits>,
}

impl ScoreCorrector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the accepted-value memory. Call at game start.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Corrects one reading. `None` passes through without touching the
    /// memory; the first reading after a reset is accepted verbatim.
    pub fn correct(&mut self, digits: Option<&Digits>) -> Option<Digits> {
        let raw = digits?;
        if raw.is_empty() {
            return None;
        }

        let mut d = raw.clone();

        if let Some(last) = &self.last {
            let prev = last[0];
            d[0] = match d[0] {
                0x4 if prev == 0x9 || prev == 0xA => 0xA,
                0xA if prev == 0x3 || prev == 0x4 => 0x4,
                0x8 if prev == 0xB || prev == 0xD => 0xB,
                0xB if prev == 0x7 || prev == 0x8 => 0x8,
                first => first,
            };
        }

        self.last = Some(d.clone());
        Some(d)
    }
}
