//! Temporal stabilization of raw frame scans.
//!
//! Interlaced capture smears every on-screen change across two frames, so a
//! reading taken the instant a display changes is often garbage. Scans are
//! buffered and a changed value is only trusted once it has been observed
//! unchanged for a full buffer's worth of consecutive frames, at which
//! point it is stamped back onto the frames captured mid-transition.
//!
//! Fields stabilize in groups that change together on the hardware:
//! score on its own; lines and level as one unit (level is derived, not
//! independently verified); and one piece-display unit per task profile.

use std::collections::VecDeque;

use crate::config::TaskProfile;
use crate::frame::FrameScan;

/// Consecutive confirming frames required before a changed reading is
/// trusted. Changes settle over 2 frames on interlaced input; 3 for safety.
pub const BUFFER_CAPACITY: usize = 3;

/// Frame ring buffer plus per-group stability counters.
///
/// Counter protocol, applied after decrementing each frame: positive means
/// counting down to commit, zero means commit now (broadcast the newest
/// value over the whole buffer), negative means idle, watching for changes.
#[derive(Debug)]
pub struct Stabilizer {
    profile: TaskProfile,
    buffer: VecDeque<FrameScan>,
    score_delay: i32,
    lines_delay: i32,
    piece_delay: i32,
}

impl Stabilizer {
    pub fn new(profile: TaskProfile) -> Self {
        Self {
            profile,
            buffer: VecDeque::with_capacity(BUFFER_CAPACITY + 1),
            score_delay: 0,
            lines_delay: 0,
            piece_delay: 0,
        }
    }

    pub fn set_profile(&mut self, profile: TaskProfile) {
        self.profile = profile;
    }

    /// Buffers one scan and returns the oldest buffered, now-stabilized
    /// scan, or `None` while the buffer is still filling.
    pub fn push(&mut self, mut scan: FrameScan) -> Option<FrameScan> {
        if self.buffer.len() < BUFFER_CAPACITY {
            self.buffer.push_back(scan);
            return None;
        }

        // The vanilla pause overlay blanks score/lines/level; the gym-style
        // overlay doesn't, so pause is only trusted while all three still
        // read. Downstream synthesizes the blanked record.
        scan.pause_active = scan.pause.is_some_and(|p| p.lit)
            && scan.score.is_some()
            && scan.lines.is_some()
            && scan.level.is_some();

        self.update_score_group(&scan);
        self.update_lines_group(&scan);
        self.update_piece_group(&scan);

        self.buffer.push_back(scan);
        self.buffer.pop_front()
    }

    fn update_score_group(&mut self, scan: &FrameScan) {
        self.score_delay = (self.score_delay - 1).max(-1);
        if self.score_delay == 0 {
            for frame in self.buffer.iter_mut() {
                frame.score = scan.score.clone();
            }
        } else if self.score_delay < 0
            && !scan.pause_active
            && self.newest().score != scan.score
        {
            self.score_delay = BUFFER_CAPACITY as i32;
        }
    }

    fn update_lines_group(&mut self, scan: &FrameScan) {
        self.lines_delay = (self.lines_delay - 1).max(-1);
        if self.lines_delay == 0 {
            // Level is stamped along with lines: it only moves when lines do
            for frame in self.buffer.iter_mut() {
                frame.lines = scan.lines.clone();
                frame.level = scan.level.clone();
            }
        } else if self.lines_delay < 0
            && !scan.pause_active
            && self.newest().lines != scan.lines
        {
            self.lines_delay = BUFFER_CAPACITY as i32;
        }
    }

    fn update_piece_group(&mut self, scan: &FrameScan) {
        self.piece_delay = (self.piece_delay - 1).max(-1);

        match self.profile {
            TaskProfile::Classic => {
                if self.piece_delay == 0 {
                    for frame in self.buffer.iter_mut() {
                        frame.preview = scan.preview;
                        frame.counts = scan.counts.clone();
                    }
                } else if self.piece_delay < 0
                    && !scan.pause_active
                    && self.newest().counts != scan.counts
                {
                    self.piece_delay = BUFFER_CAPACITY as i32;
                }
            }
            TaskProfile::DasTrainer => {
                // The das trainer display is never blanked by the pause
                // overlay, so no suppression here. Instant DAS changes every
                // frame and is deliberately not part of the unit.
                if self.piece_delay == 0 {
                    for frame in self.buffer.iter_mut() {
                        frame.preview = scan.preview;
                        frame.cur_piece = scan.cur_piece;
                        frame.cur_piece_das = scan.cur_piece_das.clone();
                    }
                } else if self.piece_delay < 0 {
                    let newest = self.newest();
                    if newest.preview != scan.preview
                        || newest.cur_piece != scan.cur_piece
                        || newest.cur_piece_das != scan.cur_piece_das
                    {
                        self.piece_delay = BUFFER_CAPACITY as i32;
                    }
                }
            }
            TaskProfile::Minimal => {
                if self.piece_delay == 0 {
                    for frame in self.buffer.iter_mut() {
                        frame.preview = scan.preview;
                    }
                } else if self.piece_delay < 0
                    && !scan.pause_active
                    && self.newest().preview != scan.preview
                {
                    self.piece_delay = BUFFER_CAPACITY as i32;
                }
            }
        }
    }

    fn newest(&self) -> &FrameScan {
        self.buffer
            .back()
            .expect("stabilizer buffer is full when groups update")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{PauseProbe, Piece};

    fn scan(score: u32) -> FrameScan {
        FrameScan {
            score: Some(vec![
                (score / 100) as u8 % 10,
                (score / 10) as u8 % 10,
                (score % 10) as u8,
            ]),
            lines: Some(vec![0, 0, 0]),
            level: Some(vec![0, 0]),
            ..FrameScan::default()
        }
    }

    fn dispatch_scores(stab: &mut Stabilizer, scans: Vec<FrameScan>) -> Vec<Option<u32>> {
        scans
            .into_iter()
            .filter_map(|s| stab.push(s))
            .map(|d| d.score.map(|digits| crate::frame::digits_to_value(&digits)))
            .collect()
    }

    #[test]
    fn test_buffer_fills_before_dispatching() {
        let mut stab = Stabilizer::new(TaskProfile::Minimal);
        assert!(stab.push(scan(0)).is_none());
        assert!(stab.push(scan(0)).is_none());
        assert!(stab.push(scan(0)).is_none());
        assert!(stab.push(scan(0)).is_some());
    }

    #[test]
    fn test_steady_value_dispatches_unchanged() {
        let mut stab = Stabilizer::new(TaskProfile::Minimal);
        let out = dispatch_scores(&mut stab, (0..6).map(|_| scan(7)).collect());
        assert_eq!(out, vec![Some(7), Some(7), Some(7)]);
    }

    #[test]
    fn test_transient_flicker_never_dispatches() {
        // A → B → A within fewer than 3 frames: no dispatch reports B
        let mut stab = Stabilizer::new(TaskProfile::Minimal);
        let mut scans: Vec<FrameScan> = (0..4).map(|_| scan(100)).collect();
        scans.push(scan(999));
        scans.extend((0..6).map(|_| scan(100)));

        let out = dispatch_scores(&mut stab, scans);
        assert!(
            out.iter().all(|&s| s == Some(100)),
            "transient 999 leaked into dispatches: {:?}",
            out
        );
    }

    #[test]
    fn test_persistent_change_backfills_buffered_frames() {
        // 100 for 4 frames, then 250 persists. The countdown starts on the
        // change frame and commits a full buffer later; at the commit the
        // frames captured during the transition are stamped with 250, so no
        // dispatch ever reports a torn value.
        let mut stab = Stabilizer::new(TaskProfile::Minimal);
        let mut scans: Vec<FrameScan> = (0..4).map(|_| scan(100)).collect();
        scans.extend((0..6).map(|_| scan(250)));

        let out = dispatch_scores(&mut stab, scans);
        assert_eq!(
            out,
            vec![
                Some(100),
                Some(100),
                Some(100),
                Some(100),
                Some(250),
                Some(250),
                Some(250)
            ]
        );
    }

    #[test]
    fn test_null_reading_does_not_confirm_change() {
        // score flickers to None and back: None never matches the buffered
        // value, but the change countdown restarts when the value returns
        let mut stab = Stabilizer::new(TaskProfile::Minimal);
        let mut scans: Vec<FrameScan> = (0..4).map(|_| scan(100)).collect();
        let mut blank = scan(100);
        blank.score = None;
        scans.push(blank);
        scans.extend((0..5).map(|_| scan(100)));

        let out = dispatch_scores(&mut stab, scans);
        assert!(out.iter().all(|&s| s == Some(100)), "{:?}", out);
    }

    #[test]
    fn test_pause_suppresses_score_group() {
        let mut stab = Stabilizer::new(TaskProfile::Minimal);

        // Fill and settle at 100
        for _ in 0..4 {
            stab.push(scan(100));
        }

        // Paused frames with a garbage score reading: the suppressed group
        // must not start a countdown, so 555 is never committed. The paused
        // frames themselves dispatch with pause_active set and are blanked
        // downstream.
        for _ in 0..4 {
            let mut paused = scan(555);
            paused.pause = Some(PauseProbe {
                luma: 200.0,
                lit: true,
            });
            let out = stab.push(paused).unwrap();
            assert!(out.pause_active || out.score == Some(vec![1, 0, 0]));
        }

        // Pause lifts with the score back at 100: no stale 555 ever lands
        for _ in 0..6 {
            let out = stab.push(scan(100)).unwrap();
            assert!(out.pause_active || out.score == Some(vec![1, 0, 0]));
        }
    }

    #[test]
    fn test_das_trainer_not_suppressed_by_pause() {
        let mut stab = Stabilizer::new(TaskProfile::DasTrainer);

        let with_piece = |p: Option<Piece>, paused: bool| {
            let mut s = scan(100);
            s.cur_piece = p;
            if paused {
                s.pause = Some(PauseProbe {
                    luma: 200.0,
                    lit: true,
                });
            }
            s
        };

        for _ in 0..4 {
            stab.push(with_piece(Some(Piece::T), false));
        }
        // Piece change arrives under an active pause probe: the das unit
        // still stabilizes it
        let mut dispatched = Vec::new();
        for _ in 0..6 {
            if let Some(d) = stab.push(with_piece(Some(Piece::S), true)) {
                dispatched.push(d.cur_piece);
            }
        }
        assert!(dispatched.contains(&Some(Piece::S)));
    }

    #[test]
    fn test_lines_and_level_stamp_together() {
        let mut stab = Stabilizer::new(TaskProfile::Minimal);

        let with_lines = |lines: [u8; 3], level: [u8; 2]| {
            let mut s = scan(100);
            s.lines = Some(lines.to_vec());
            s.level = Some(level.to_vec());
            s
        };

        for _ in 0..4 {
            stab.push(with_lines([0, 0, 9], [0, 0]));
        }
        // Lines tick over and level follows; both must land together
        let mut out = Vec::new();
        for _ in 0..6 {
            if let Some(d) = stab.push(with_lines([0, 1, 0], [0, 1])) {
                out.push((d.lines, d.level));
            }
        }
        let committed = out
            .iter()
            .find(|(lines, _)| lines == &Some(vec![0, 1, 0]))
            .expect("change commits");
        assert_eq!(committed.1, Some(vec![0, 1]));
    }

    #[test]
    fn test_replay_is_deterministic() {
        // Same scan sequence into a fresh stabilizer: identical dispatches
        let make_scans = || -> Vec<FrameScan> {
            let mut scans: Vec<FrameScan> = (0..5).map(|_| scan(100)).collect();
            scans.extend((0..3).map(|_| scan(250)));
            scans.extend((0..4).map(|_| scan(300)));
            scans
        };

        let mut a = Stabilizer::new(TaskProfile::Minimal);
        let mut b = Stabilizer::new(TaskProfile::Minimal);
        let out_a = dispatch_scores(&mut a, make_scans());
        let out_b = dispatch_scores(&mut b, make_scans());
        assert_eq!(out_a, out_b);
    }
}
