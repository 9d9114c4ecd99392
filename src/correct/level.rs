//! Level display corrector.
//!
//! The level display encodes levels 30+ in raw tile values instead of
//! decimal: 30 shows as 00, 31 as 0A, 32 as 14, ... many of which collide
//! with legitimate low-level readings (00 is both level 0 and level 30) or
//! with OCR aliases of other glyphs (A reads as 4, B as 8). Level is
//! monotonically non-decreasing within a game, so the previous accepted
//! high digit resolves every collision.

use crate::frame::Digits;

/// Corrects a two-digit level reading.
#[derive(Debug, Default)]
pub struct LevelCorrector {
    last: Option<[u8; 2]>,
}

impl LevelCorrector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the accepted-value memory. Call at game start.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Corrects one reading. `None` passes through without touching the
    /// memory: the display is assumed paused and the last accepted value
    /// still applies on resume. The first reading after a reset is accepted
    /// verbatim.
    pub fn correct(&mut self, digits: Option<[u8; 2]>) -> Option<[u8; 2]> {
        let raw = digits?;

        let Some(last) = self.last else {
            self.last = Some(raw);
            return Some(raw);
        };

        let mut d = raw;

        match d[0] {
            0x0 => {
                if d[1] == 0x0 {
                    // 00: level 0 or 30
                    if last[0] == 0x2 || last[0] == 0x3 {
                        d[0] = 0x3;
                    }
                } else if d[1] == 0x4 || d[1] == 0xA {
                    // 04 or 0A: level 4 or 31
                    if last[0] == 0x3 {
                        d = [0x3, 0x1];
                    } else {
                        d[1] = 0x4;
                    }
                } else if d[1] == 0x6 {
                    // 06: level 6 or 54
                    if last[0] == 0x5 {
                        d = [0x5, 0x4];
                    }
                }
            }
            0x1 => {
                if d[1] == 0xE {
                    // 1E is only ever level 33
                    d = [0x3, 0x3];
                } else if d[1] == 0x4 || d[1] == 0xA {
                    // 14 or 1A: level 14 or 32
                    if last[0] == 0x3 {
                        d = [0x3, 0x2];
                    } else {
                        d[1] = 0x4;
                    }
                }
            }
            0x2 => {
                if d[1] == 0x8 || d[1] == 0xB {
                    // 28 or 2B: level 28 or 34
                    if last[0] == 0x3 {
                        d = [0x3, 0x4];
                    } else {
                        d[1] = 0x8;
                    }
                } else if d[1] == 0x0 {
                    // 20: level 20, 51 or 53
                    if last[0] == 0x5 {
                        d[0] = 0x5;
                        if last[1] == 0x0 || last[1] == 0x1 {
                            d[1] = 0x1;
                        } else {
                            d[1] = 0x3;
                        }
                    }
                } else if d[1] == 0x1 {
                    // 21: level 21, 55, 57, 59 or 61
                    if last[0] == 0x6 {
                        d[0] = 0x6;
                    } else if last[0] == 0x5 {
                        d[0] = 0x5;
                        if last[1] == 0x4 || last[1] == 0x5 {
                            d[1] = 0x5;
                        } else if last[1] == 0x6 || last[1] == 0x7 {
                            d[1] = 0x7;
                        } else {
                            d[1] = 0x9;
                        }
                    }
                } else if d[1] == 0x6 {
                    // 26: level 26 or 56
                    if last[0] == 0x5 {
                        d = [0x5, 0x6];
                    }
                }
            }
            0x3 => {
                if d[1] == 0x2 {
                    // 32 encodes level 35
                    d[1] = 0x5;
                } else if d[1] == 0xC {
                    // 3C encodes level 36
                    d[1] = 0x6;
                }
            }
            0x4 | 0xA => {
                if d[1] == 0x6 {
                    // 46: level 37 or 58
                    if last[0] == 0x3 {
                        d = [0x3, 0x7];
                    } else {
                        d = [0x5, 0x8];
                    }
                } else if d[1] == 0x0 {
                    // A0 encodes level 46
                    d = [0x4, 0x6];
                } else {
                    // AA encodes level 47
                    d = [0x4, 0x7];
                }
            }
            0x5 => {
                d[0] = 0x3;
                if d[1] == 0x0 {
                    // 50 encodes level 38
                    d[1] = 0x8;
                } else {
                    // 5A encodes level 39
                    d[1] = 0x9;
                }
            }
            0x6 => {
                if d[1] == 0xE {
                    // 6E encodes level 41
                    d = [0x4, 0x1];
                } else if d[1] == 0x6 {
                    // 66 encodes level 60
                    d[1] = 0x0;
                } else {
                    // 64 encodes level 40
                    d = [0x4, 0x0];
                }
            }
            0x7 => {
                // 78 encodes level 42
                d = [0x4, 0x2];
            }
            0x8 | 0xB => {
                if d[1] == 0x2 {
                    // 82 encodes level 43
                    d = [0x4, 0x3];
                } else if d[1] == 0x6 {
                    // 86 encodes level 62
                    d = [0x6, 0x2];
                } else if d[1] == 0xC {
                    // 8C encodes level 44
                    d = [0x4, 0x4];
                } else if d[1] == 0xE {
                    // BE encodes level 48
                    d = [0x4, 0x8];
                } else {
                    // B4 encodes level 49
                    d = [0x4, 0x9];
                }
            }
            0x9 => {
                // 96 encodes level 45
                d = [0x4, 0x5];
            }
            0xC => {
                // C6 encodes level 50
                d = [0x5, 0x0];
            }
            0xE => {
                // E6 encodes level 52
                d = [0x5, 0x2];
            }
            _ => {}
        }

        // A and B can never legally land in second place; coerce to the
        // digits they alias
        if d[1] == 0xA {
            d[1] = 0x4;
        } else if d[1] == 0xB {
            d[1] = 0x8;
        }

        self.last = Some(d);
        Some(d)
    }
}

/// Converts a digit vector into the corrector's fixed-size reading.
pub fn level_digits(digits: Option<&Digits>) -> Option<[u8; 2]> {
    digits.and_then(|d| <[u8; 2]>::try_from(d.as_slice()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reading_accepted_verbatim() {
        let mut corrector = LevelCorrector::new();
        assert_eq!(corrector.correct(Some([0x0, 0x0])), Some([0x0, 0x0]));
    }

    #[test]
    fn test_null_passes_through_and_keeps_memory() {
        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x3, 0x0]));
        assert_eq!(corrector.correct(None), None);
        // Memory preserved: 00 after a 3x reading still means level 30
        assert_eq!(corrector.correct(Some([0x0, 0x0])), Some([0x3, 0x0]));
    }

    #[test]
    fn test_00_after_level_29_reads_as_30() {
        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x2, 0x9]));
        assert_eq!(corrector.correct(Some([0x0, 0x0])), Some([0x3, 0x0]));
    }

    #[test]
    fn test_00_after_low_level_stays_00() {
        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x0, 0x0]));
        assert_eq!(corrector.correct(Some([0x0, 0x0])), Some([0x0, 0x0]));
    }

    #[test]
    fn test_1e_is_always_33() {
        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x0, 0x5]));
        assert_eq!(corrector.correct(Some([0x1, 0xE])), Some([0x3, 0x3]));
    }

    #[test]
    fn test_0a_resolves_by_history() {
        // After a 3x level, 0A means 31
        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x3, 0x0]));
        assert_eq!(corrector.correct(Some([0x0, 0xA])), Some([0x3, 0x1]));

        // After a low level, 0A is a misread of 04
        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x0, 0x3]));
        assert_eq!(corrector.correct(Some([0x0, 0xA])), Some([0x0, 0x4]));
    }

    #[test]
    fn test_46_resolves_by_history() {
        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x3, 0x6]));
        assert_eq!(corrector.correct(Some([0x4, 0x6])), Some([0x3, 0x7]));

        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x5, 0x7]));
        assert_eq!(corrector.correct(Some([0x4, 0x6])), Some([0x5, 0x8]));
    }

    #[test]
    fn test_encoded_40s_decode_unconditionally() {
        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x3, 0x9]));
        assert_eq!(corrector.correct(Some([0x6, 0x4])), Some([0x4, 0x0]));
        assert_eq!(corrector.correct(Some([0x6, 0xE])), Some([0x4, 0x1]));
        assert_eq!(corrector.correct(Some([0x7, 0x8])), Some([0x4, 0x2]));
        assert_eq!(corrector.correct(Some([0x8, 0x2])), Some([0x4, 0x3]));
        assert_eq!(corrector.correct(Some([0x8, 0xC])), Some([0x4, 0x4]));
        assert_eq!(corrector.correct(Some([0x9, 0x6])), Some([0x4, 0x5]));
        assert_eq!(corrector.correct(Some([0xA, 0x0])), Some([0x4, 0x6]));
        assert_eq!(corrector.correct(Some([0xA, 0xA])), Some([0x4, 0x7]));
        assert_eq!(corrector.correct(Some([0xB, 0xE])), Some([0x4, 0x8]));
        assert_eq!(corrector.correct(Some([0xB, 0x4])), Some([0x4, 0x9]));
        assert_eq!(corrector.correct(Some([0xC, 0x6])), Some([0x5, 0x0]));
    }

    #[test]
    fn test_20_and_21_resolve_in_the_50s() {
        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x5, 0x0]));
        // 20 after 50/51 means 51
        assert_eq!(corrector.correct(Some([0x2, 0x0])), Some([0x5, 0x1]));
        // 21 after 52/53 means... 59 path needs last[1] outside 4-7
        assert_eq!(corrector.correct(Some([0x2, 0x0])), Some([0x5, 0x1]));

        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x5, 0x4]));
        assert_eq!(corrector.correct(Some([0x2, 0x1])), Some([0x5, 0x5]));

        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x5, 0x6]));
        assert_eq!(corrector.correct(Some([0x2, 0x1])), Some([0x5, 0x7]));

        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x5, 0x8]));
        assert_eq!(corrector.correct(Some([0x2, 0x1])), Some([0x5, 0x9]));

        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x6, 0x0]));
        assert_eq!(corrector.correct(Some([0x2, 0x1])), Some([0x6, 0x1]));
    }

    #[test]
    fn test_second_digit_letters_always_coerced() {
        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x1, 0x8]));
        // 2B resolves through the 28/34 branch; 1B has no branch and falls
        // through to the universal second-digit coercion
        assert_eq!(corrector.correct(Some([0x2, 0xB])), Some([0x2, 0x8]));
        assert_eq!(corrector.correct(Some([0x1, 0xB])), Some([0x1, 0x8]));
    }

    #[test]
    fn test_reset_clears_memory() {
        let mut corrector = LevelCorrector::new();
        corrector.correct(Some([0x3, 0x0]));
        corrector.reset();
        // Fresh memory: 00 is accepted as level 0 again
        assert_eq!(corrector.correct(Some([0x0, 0x0])), Some([0x0, 0x0]));
    }

    #[test]
    fn test_level_digits_helper() {
        assert_eq!(level_digits(Some(&vec![0x1, 0x8])), Some([0x1, 0x8]));
        assert_eq!(level_digits(None), None);
        assert_eq!(level_digits(Some(&vec![0x1])), None);
    }
}
