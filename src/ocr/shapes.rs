//! Tetromino silhouette recognition via highlight probes.
//!
//! Piece sprites render a bright highlight in the top-left of every block.
//! Probing a handful of fixed coordinates for that highlight is enough to
//! tell the seven shapes apart, no template matching needed. The preview
//! box and the active-piece box need different probe trees: the renderer
//! draws L and J one pixel higher than S, Z, T and O in the latter.

use image::RgbaImage;

use crate::frame::Piece;
use crate::ocr::SHINE_LUMA_THRESHOLD;
use crate::palette::luma;

/// Block-highlight sample offsets within a probe's 2x3 window.
const PROBE_OFFSETS: [(u32, u32); 3] = [(0, 0), (1, 1), (1, 2)];

/// True if any probe pixel at (x, y) clears the shine threshold.
fn probe_lit(img: &RgbaImage, x: u32, y: u32) -> bool {
    PROBE_OFFSETS.iter().any(|&(dx, dy)| {
        let p = img.get_pixel(x + dx, y + dy);
        luma(p[0] as f32, p[1] as f32, p[2] as f32) > SHINE_LUMA_THRESHOLD
    })
}

/// Classifies the preview-box silhouette.
pub fn recognize_preview(img: &RgbaImage) -> Option<Piece> {
    // I renders wider than everything else: probe both ends of the middle
    // row. The blocks are white, so the off-corner probe still hits.
    if probe_lit(img, 0, 4) && probe_lit(img, 28, 4) {
        return Some(Piece::I);
    }

    // 3x2 matrix for T, L, J, S, Z
    let top = [
        probe_lit(img, 4, 0),
        probe_lit(img, 12, 0),
        probe_lit(img, 20, 0),
    ];

    if top[0] && top[1] && top[2] {
        // L, T, J hang their fourth block under the full top row
        if probe_lit(img, 4, 8) {
            return Some(Piece::L);
        }
        if probe_lit(img, 12, 8) {
            return Some(Piece::T);
        }
        if probe_lit(img, 20, 8) {
            return Some(Piece::J);
        }
        return None;
    }

    if top[1] && top[2] && probe_lit(img, 4, 8) && probe_lit(img, 12, 8) {
        return Some(Piece::S);
    }

    if top[0] && top[1] && probe_lit(img, 12, 8) && probe_lit(img, 20, 8) {
        return Some(Piece::Z);
    }

    if probe_lit(img, 8, 0)
        && probe_lit(img, 16, 0)
        && probe_lit(img, 8, 8)
        && probe_lit(img, 16, 8)
    {
        return Some(Piece::O);
    }

    None
}

/// Classifies the active-piece silhouette (das trainer).
pub fn recognize_active(img: &RgbaImage) -> Option<Piece> {
    if probe_lit(img, 0, 4) && probe_lit(img, 20, 4) {
        return Some(Piece::I);
    }

    // L and J sit one pixel higher than the rest
    let top = [
        probe_lit(img, 2, 0),
        probe_lit(img, 8, 0),
        probe_lit(img, 14, 0),
    ];

    if top[0] && top[1] && top[2] {
        if probe_lit(img, 2, 6) {
            return Some(Piece::L);
        }
        if probe_lit(img, 14, 6) {
            return Some(Piece::J);
        }
    }

    // S, Z, T at the lower alignment
    let top = [
        probe_lit(img, 2, 1),
        probe_lit(img, 8, 1),
        probe_lit(img, 14, 1),
    ];

    if top[0] && top[1] && top[2] {
        if probe_lit(img, 8, 7) {
            return Some(Piece::T);
        }
        return None;
    }

    if top[1] && top[2] && probe_lit(img, 2, 7) && probe_lit(img, 8, 7) {
        return Some(Piece::S);
    }

    if top[0] && top[1] && probe_lit(img, 8, 7) && probe_lit(img, 14, 7) {
        return Some(Piece::Z);
    }

    if probe_lit(img, 5, 1)
        && probe_lit(img, 11, 1)
        && probe_lit(img, 5, 7)
        && probe_lit(img, 11, 7)
    {
        return Some(Piece::O);
    }

    None
}
