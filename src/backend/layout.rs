//! Normalized region geometry.
//!
//! Every scanned display is resampled to a fixed size so the recognizers can
//! use fixed glyph cells and probe coordinates regardless of the capture
//! resolution. The sizes here are the contract between the acquisition
//! backend and the recognizers.

use crate::config::CropRect;

/// Horizontal pitch between glyph cells in a normalized digit region.
pub const DIGIT_PITCH: u32 = 16;
/// Side of one glyph cell. Glyphs are matched at 2x the native 7x7 sprite
/// for a usable difference signal.
pub const DIGIT_SIZE: u32 = 14;

/// Normalized size of a digit region with the given glyph count. The last
/// glyph cell carries no trailing gap.
pub fn digit_task_size(glyphs: usize) -> (u32, u32) {
    (glyphs as u32 * DIGIT_PITCH - 2, DIGIT_SIZE)
}

pub const PREVIEW_SIZE: (u32, u32) = (31, 15);
pub const CUR_PIECE_SIZE: (u32, u32) = (23, 12);
/// 10 cells of 8px per row, the last one a pixel narrower; 20 rows.
pub const FIELD_SIZE: (u32, u32) = (79, 159);
pub const COLOR_SIZE: (u32, u32) = (5, 5);
pub const PAUSE_SIZE: (u32, u32) = (19, 3);

/// Pause-text probe crop in field-normalized coordinates.
///
/// The probe rides the bottom edge of the letters U, S, E of the on-screen
/// "PAUSE" text, where they overlap the dark block margins.
const PAUSE_CROP_IN_FIELD: [f32; 4] = [30.0, 86.0, 19.0, 3.0];

/// Derives the pause-text crop from the playfield crop.
///
/// Returns `None` when the derived rectangle has no area (a degenerate field
/// crop); the caller disables pause scanning for the run.
pub fn derive_pause_crop(field: CropRect) -> Option<CropRect> {
    let sx = field.w as f32 / FIELD_SIZE.0 as f32;
    let sy = field.h as f32 / FIELD_SIZE.1 as f32;

    let w = (PAUSE_CROP_IN_FIELD[2] * sx).round() as i64;
    let h = (PAUSE_CROP_IN_FIELD[3] * sy).round() as i64;
    if w <= 0 || h <= 0 {
        return None;
    }

    Some(CropRect {
        x: (field.x as f32 + PAUSE_CROP_IN_FIELD[0] * sx).round() as u32,
        y: (field.y as f32 + PAUSE_CROP_IN_FIELD[1] * sy).round() as u32,
        w: w as u32,
        h: h as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_task_size() {
        assert_eq!(digit_task_size(3), (46, 14));
        assert_eq!(digit_task_size(6), (94, 14));
        assert_eq!(digit_task_size(7), (110, 14));
    }

    #[test]
    fn test_derive_pause_crop_identity_scale() {
        // A field crop already at normalized size has scale factors of 1
        let field = CropRect::new(100, 50, FIELD_SIZE.0, FIELD_SIZE.1);
        let pause = derive_pause_crop(field).unwrap();
        assert_eq!(pause, CropRect::new(130, 136, 19, 3));
    }

    #[test]
    fn test_derive_pause_crop_scales_with_field() {
        let field = CropRect::new(0, 0, FIELD_SIZE.0 * 2, FIELD_SIZE.1 * 2);
        let pause = derive_pause_crop(field).unwrap();
        assert_eq!(pause.w, 38);
        assert_eq!(pause.h, 6);
    }

    #[test]
    fn test_derive_pause_crop_degenerate_field() {
        // A field crop a few pixels tall rounds the probe height to zero
        let field = CropRect::new(0, 0, 79, 3);
        assert_eq!(derive_pause_crop(field), None);
    }
}
