//! Tracker replay tests: raw scan sequences in, event sequences out.
//!
//! These drive the stabilizer + session half of the pipeline through the
//! replay entry point, with a backend that acquires nothing, the way a
//! recorded scan log is replayed.

use std::sync::mpsc::{channel, Receiver};

use anyhow::Result;
use nestris_vision::config::{CropRect, CropTask, DigitTask, OcrConfig, TaskConfig, TaskProfile};
use nestris_vision::frame::{DispatchEvent, FrameScan, PauseProbe, Piece};
use nestris_vision::ocr::GlyphTemplates;
use nestris_vision::store::MemorySessionStore;
use nestris_vision::tracker::{GameTracker, TrackerEvent};
use nestris_vision::{AcquisitionBackend, FieldClassification, FrameRegions};

struct NullBackend;

impl AcquisitionBackend for NullBackend {
    type Frame = ();

    fn set_config(&mut self, _config: &OcrConfig) -> Result<()> {
        Ok(())
    }

    async fn acquire_regions(&mut self, _frame: &()) -> Result<FrameRegions> {
        Ok(FrameRegions::default())
    }

    async fn classify_field(
        &mut self,
        _regions: &FrameRegions,
        _level: Option<u32>,
    ) -> Result<Option<FieldClassification>> {
        Ok(None)
    }
}

fn test_config(profile: TaskProfile) -> OcrConfig {
    OcrConfig {
        profile,
        palette: Some("unused".to_string()),
        tasks: TaskConfig {
            score: DigitTask::new(CropRect::new(0, 0, 60, 14), "HDDDDD"),
            level: DigitTask::new(CropRect::new(0, 20, 20, 14), "HH"),
            lines: DigitTask::new(CropRect::new(0, 40, 30, 14), "DDD"),
            preview: CropTask::new(CropRect::new(0, 60, 31, 15)),
            field: CropTask::new(CropRect::new(40, 0, 79, 159)),
            cur_piece: Some(CropTask::new(CropRect::new(0, 80, 23, 12))),
            instant_das: Some(DigitTask::new(CropRect::new(0, 100, 30, 14), "DD")),
            cur_piece_das: Some(DigitTask::new(CropRect::new(0, 120, 30, 14), "DD")),
            piece_counts: None,
            color1: None,
            color2: None,
            color3: None,
        },
        filters: Default::default(),
    }
}

fn flat_templates() -> GlyphTemplates {
    let templates = (0..17).map(|k| vec![k as f32 * 15.0; 196]).collect();
    GlyphTemplates::new(templates).unwrap()
}

fn make_tracker(
    profile: TaskProfile,
) -> (GameTracker<NullBackend, MemorySessionStore>, Receiver<TrackerEvent>) {
    let (tx, rx) = channel();
    let tracker = GameTracker::new(
        test_config(profile),
        flat_templates(),
        NullBackend,
        MemorySessionStore::with_last_id(7),
        tx,
    )
    .unwrap();
    (tracker, rx)
}

fn game_scan(score: u32, lines: u32, level: u32) -> FrameScan {
    FrameScan {
        score: Some(vec![
            (score / 100_000 % 10) as u8,
            (score / 10_000 % 10) as u8,
            (score / 1_000 % 10) as u8,
            (score / 100 % 10) as u8,
            (score / 10 % 10) as u8,
            (score % 10) as u8,
        ]),
        lines: Some(vec![
            (lines / 100 % 10) as u8,
            (lines / 10 % 10) as u8,
            (lines % 10) as u8,
        ]),
        level: Some(vec![(level / 10 % 10) as u8, (level % 10) as u8]),
        ..FrameScan::default()
    }
}

fn frames(rx: &Receiver<TrackerEvent>) -> Vec<DispatchEvent> {
    rx.try_iter()
        .filter_map(|event| match event {
            TrackerEvent::Frame(frame) => Some(*frame),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_new_game_event_precedes_its_frame() {
    let (mut tracker, rx) = make_tracker(TaskProfile::Minimal);

    for _ in 0..4 {
        tracker.process_scan(game_scan(1, 0, 0)).await.unwrap();
    }

    let events: Vec<TrackerEvent> = rx.try_iter().collect();
    assert_eq!(events.len(), 2, "one NewGame and one Frame: {:?}", events);

    let TrackerEvent::NewGame(session_id) = &events[0] else {
        panic!("first event must be NewGame, got {:?}", events[0]);
    };
    // Store seeded at 7: construction takes 8, the game takes 9
    assert_eq!(*session_id, 9);

    let TrackerEvent::Frame(frame) = &events[1] else {
        panic!("second event must be Frame, got {:?}", events[1]);
    };
    assert_eq!(frame.session_id, 9);
    assert_eq!(frame.score, Some(1));
    assert_eq!(frame.lines, Some(0));
    assert_eq!(frame.level, Some(0));
    assert_eq!(frame.field, None, "nothing acquired, nothing classified");
}

#[tokio::test]
async fn test_mode_b_start_detected() {
    let (mut tracker, rx) = make_tracker(TaskProfile::Minimal);

    for _ in 0..4 {
        tracker.process_scan(game_scan(0, 25, 9)).await.unwrap();
    }

    let events: Vec<TrackerEvent> = rx.try_iter().collect();
    assert!(matches!(events[0], TrackerEvent::NewGame(_)));
}

#[tokio::test]
async fn test_transient_reading_never_dispatches() {
    let (mut tracker, rx) = make_tracker(TaskProfile::Minimal);

    // Steady at 1200 points, one garbage frame, steady again
    for _ in 0..5 {
        tracker.process_scan(game_scan(1200, 4, 0)).await.unwrap();
    }
    tracker.process_scan(game_scan(999_999, 4, 0)).await.unwrap();
    for _ in 0..6 {
        tracker.process_scan(game_scan(1200, 4, 0)).await.unwrap();
    }

    let scores: Vec<Option<u32>> = frames(&rx).iter().map(|f| f.score).collect();
    assert!(!scores.is_empty());
    assert!(
        scores.iter().all(|&s| s == Some(1200)),
        "transient leaked: {:?}",
        scores
    );
}

#[tokio::test]
async fn test_persistent_change_commits_with_backfill() {
    let (mut tracker, rx) = make_tracker(TaskProfile::Minimal);

    for _ in 0..5 {
        tracker.process_scan(game_scan(1200, 4, 0)).await.unwrap();
    }
    for _ in 0..7 {
        tracker.process_scan(game_scan(1600, 5, 0)).await.unwrap();
    }

    let out: Vec<(Option<u32>, Option<u32>)> =
        frames(&rx).iter().map(|f| (f.score, f.lines)).collect();

    // Old value dispatches until the commit; after it, only the new value.
    // The frames captured mid-transition were stamped and never show a mix
    let first_new = out
        .iter()
        .position(|&(score, _)| score == Some(1600))
        .expect("change commits");
    assert!(out[..first_new].iter().all(|&(s, l)| s == Some(1200) && l == Some(4)));
    assert!(out[first_new..].iter().all(|&(s, l)| s == Some(1600) && l == Some(5)));
}

#[tokio::test]
async fn test_replay_is_idempotent() {
    let scans = || {
        let mut all = Vec::new();
        for _ in 0..5 {
            all.push(game_scan(1, 0, 0));
        }
        for _ in 0..4 {
            all.push(game_scan(40, 1, 0));
        }
        let mut blank = game_scan(40, 1, 0);
        blank.score = None;
        all.push(blank);
        for _ in 0..5 {
            all.push(game_scan(100, 2, 0));
        }
        all
    };

    let mut runs = Vec::new();
    for _ in 0..2 {
        let (mut tracker, rx) = make_tracker(TaskProfile::Minimal);
        for scan in scans() {
            tracker.process_scan(scan).await.unwrap();
        }
        let summary: Vec<(u16, Option<u32>, Option<u32>, Option<u32>, bool)> = frames(&rx)
            .iter()
            .map(|f| (f.session_id, f.score, f.lines, f.level, f.pause_active))
            .collect();
        runs.push(summary);
    }

    assert_eq!(runs[0], runs[1]);
    assert!(!runs[0].is_empty());
}

#[tokio::test]
async fn test_paused_dispatch_is_blanked() {
    let (mut tracker, rx) = make_tracker(TaskProfile::Minimal);

    for _ in 0..5 {
        tracker.process_scan(game_scan(1200, 30, 5)).await.unwrap();
    }

    // Pause overlay comes up; raw readings stay legible on this hardware
    for _ in 0..5 {
        let mut scan = game_scan(1200, 30, 5);
        scan.pause = Some(PauseProbe {
            luma: 200.0,
            lit: true,
        });
        tracker.process_scan(scan).await.unwrap();
    }

    let out = frames(&rx);
    let paused: Vec<&DispatchEvent> = out.iter().filter(|f| f.pause_active).collect();
    assert!(!paused.is_empty());
    for frame in paused {
        assert_eq!(frame.score, None);
        assert_eq!(frame.lines, None);
        assert_eq!(frame.level, None);
        assert_eq!(frame.preview, None);
    }
}

#[tokio::test]
async fn test_resume_after_pause_keeps_session() {
    let (mut tracker, rx) = make_tracker(TaskProfile::Minimal);

    for _ in 0..5 {
        tracker.process_scan(game_scan(1, 0, 0)).await.unwrap();
    }

    for _ in 0..4 {
        let mut scan = game_scan(1, 0, 0);
        scan.pause = Some(PauseProbe {
            luma: 200.0,
            lit: true,
        });
        tracker.process_scan(scan).await.unwrap();
    }

    // Mid-game values resume: same session, no second NewGame
    for _ in 0..5 {
        tracker.process_scan(game_scan(120, 3, 0)).await.unwrap();
    }

    let new_games: Vec<u16> = rx
        .try_iter()
        .filter_map(|e| match e {
            TrackerEvent::NewGame(id) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(new_games.len(), 1);
}

#[tokio::test]
async fn test_das_trainer_instant_das_passes_through_raw() {
    let (mut tracker, rx) = make_tracker(TaskProfile::DasTrainer);

    // Instant DAS ticks every frame; preview and cur_piece hold steady
    for das in 0..8u32 {
        let mut scan = game_scan(0, 0, 0);
        scan.preview = Some(Piece::T);
        scan.cur_piece = Some(Piece::L);
        scan.instant_das = Some(vec![(das / 10) as u8, (das % 10) as u8]);
        scan.cur_piece_das = Some(vec![0, 8]);
        tracker.process_scan(scan).await.unwrap();
    }

    let out = frames(&rx);
    let das_values: Vec<Option<u32>> = out.iter().map(|f| f.instant_das).collect();
    // Each dispatch reports its own frame's reading, unstabilized
    assert_eq!(das_values, vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);

    for frame in &out {
        assert_eq!(frame.cur_piece, Some(Piece::L));
        assert_eq!(frame.cur_piece_das, Some(8));
    }
}
