//! 像素坐标与 (音高, 时间) 之间的映射。
//!
//! 视口尺寸随窗口变化，所以这里只保存尺寸，每次查询都重新计算行高和列宽。

use crate::structure::{
    Note, Pitch, HORIZON, MEASURE_COUNT, PITCH_COUNT, SECONDS_PER_MEASURE, SNAP_DIVISIONS,
};
use egui::{Pos2, Rect, Vec2};

/// Size of the note grid in pixels, excluding key labels and the transport bar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn from_size(size: Vec2) -> Self {
        Self::new(size.x, size.y)
    }

    pub fn row_height(&self) -> f32 {
        self.height / PITCH_COUNT as f32
    }

    pub fn measure_width(&self) -> f32 {
        self.width / MEASURE_COUNT as f32
    }

    /// Row under `y`, clamped into the grid.
    pub fn row_at(&self, y: f32) -> usize {
        let row = (y / self.row_height()).floor();
        row.clamp(0.0, (PITCH_COUNT - 1) as f32) as usize
    }

    pub fn x_to_time(&self, x: f32) -> f64 {
        (x / self.measure_width()) as f64 * SECONDS_PER_MEASURE
    }

    pub fn time_to_x(&self, time: f64) -> f32 {
        ((time / SECONDS_PER_MEASURE) as f32) * self.measure_width()
    }

    pub fn duration_to_width(&self, duration: f64) -> f32 {
        self.time_to_x(duration)
    }

    /// Unsnapped musical position under a grid-local point.
    pub fn position_to_musical(&self, pos: Pos2) -> (Pitch, f64) {
        (Pitch::from_row(self.row_at(pos.y)), self.x_to_time(pos.x))
    }

    /// Musical position for pointer input: time snapped to 1/16 and kept on the grid.
    pub fn pointer_to_musical(&self, pos: Pos2) -> (Pitch, f64) {
        let (pitch, time) = self.position_to_musical(pos);
        (pitch, snap_time(time).clamp(0.0, HORIZON))
    }

    /// Origin of a note: x at its start, y at the vertical centre of its row.
    /// Pitches outside the alphabet land on the origin.
    pub fn musical_to_position(&self, pitch: Pitch, time: f64) -> Pos2 {
        let Some(row) = pitch.row_index() else {
            return Pos2::ZERO;
        };
        let row_height = self.row_height();
        Pos2::new(
            self.time_to_x(time),
            row as f32 * row_height + row_height / 2.0,
        )
    }

    /// Rendered rectangle of a note, one row tall and centred on its row.
    pub fn note_rect(&self, note: &Note) -> Rect {
        let origin = self.musical_to_position(note.pitch, note.start);
        let half = self.row_height() / 2.0;
        Rect::from_min_max(
            Pos2::new(origin.x, origin.y - half),
            Pos2::new(origin.x + self.duration_to_width(note.duration), origin.y + half),
        )
    }

    /// Hit test used for clicks: inside horizontally, less than half a row away vertically.
    pub fn note_contains(&self, note: &Note, pos: Pos2) -> bool {
        let origin = self.musical_to_position(note.pitch, note.start);
        let width = self.duration_to_width(note.duration);
        pos.x >= origin.x
            && pos.x <= origin.x + width
            && (origin.y - pos.y).abs() < self.row_height() / 2.0
    }
}

pub fn snap_time(time: f64) -> f64 {
    (time * SNAP_DIVISIONS).round() / SNAP_DIVISIONS
}

/// Snaps `time` and keeps it inside `[0, max]`, rounding down when the snapped
/// value would cross `max`.
pub fn snap_within(time: f64, max: f64) -> f64 {
    let max = max.max(0.0);
    let snapped = snap_time(time.clamp(0.0, max));
    if snapped > max {
        ((max * SNAP_DIVISIONS).floor() / SNAP_DIVISIONS).max(0.0)
    } else {
        snapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{pitch_alphabet, NoteId, MIN_DURATION};

    fn viewport() -> Viewport {
        Viewport::new(1280.0, 720.0)
    }

    #[test]
    fn row_and_column_sizes_follow_the_viewport() {
        let vp = viewport();
        assert_eq!(vp.row_height(), 30.0);
        assert_eq!(vp.measure_width(), 40.0);
    }

    #[test]
    fn round_trip_recovers_pitch_and_time() {
        let vp = Viewport::new(1000.0, 500.0);
        for pitch in pitch_alphabet() {
            for step in 0..128 {
                let time = step as f64 / 16.0;
                let pos = vp.musical_to_position(pitch, time);
                let (p, t) = vp.pointer_to_musical(pos);
                assert_eq!(p, pitch);
                assert!((t - time).abs() <= 1.0 / 16.0, "{time} -> {t}");
            }
        }
    }

    #[test]
    fn rows_are_clamped() {
        let vp = viewport();
        assert_eq!(vp.position_to_musical(Pos2::new(0.0, -40.0)).0, Pitch::B5);
        assert_eq!(vp.position_to_musical(Pos2::new(0.0, 5000.0)).0, Pitch::C4);
    }

    #[test]
    fn unknown_pitch_maps_to_origin() {
        let vp = viewport();
        assert_eq!(vp.musical_to_position(Pitch::from_key(20), 3.0), Pos2::ZERO);
    }

    #[test]
    fn resize_changes_display_but_not_musical_values() {
        let note = Note::with_id(NoteId(1), Pitch::C4, 1.0, 0.5, 0.8);
        let small = Viewport::new(640.0, 240.0).note_rect(&note);
        let large = Viewport::new(1280.0, 480.0).note_rect(&note);
        assert_eq!(large.min.x, small.min.x * 2.0);
        assert_eq!(large.width(), small.width() * 2.0);
        assert_eq!(note.start, 1.0);
    }

    #[test]
    fn hit_test_uses_half_row_tolerance() {
        let vp = viewport();
        let note = Note::with_id(NoteId(1), Pitch::B5, 0.25, 0.5, 0.8);
        // row 0 centre is y = 15, x spans 40..120
        assert!(vp.note_contains(&note, Pos2::new(41.0, 15.0)));
        assert!(vp.note_contains(&note, Pos2::new(120.0, 29.0)));
        assert!(!vp.note_contains(&note, Pos2::new(80.0, 30.0)));
        assert!(!vp.note_contains(&note, Pos2::new(121.0, 15.0)));
    }

    #[test]
    fn snapping_stays_inside_bounds() {
        assert_eq!(snap_time(0.03), 0.0);
        assert_eq!(snap_time(0.04), 0.0625);
        assert_eq!(snap_within(-1.0, 4.0), 0.0);
        assert_eq!(snap_within(9.0, HORIZON - 0.5), 7.5);
        // max that is not on the grid rounds down
        let max = HORIZON - 0.3;
        let snapped = snap_within(7.9, max);
        assert!(snapped <= max);
        assert!(snapped >= max - MIN_DURATION);
    }
}
