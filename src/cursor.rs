//! Cursor demos on the 5x5 matrix: joystick-driven and button-driven

use crate::matrix::{self, Frame, MATRIX_SIZE, NUM_PIXELS};
use heapless::String;
use smart_leds::RGB8;

/// Raw joystick readings below/above these move the cursor
pub const LOW_THRESHOLD: u16 = 1000;
pub const HIGH_THRESHOLD: u16 = 3000;

const CENTER: usize = MATRIX_SIZE / 2;

/// Cursor moved by a two-axis analog joystick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickCursor {
    x: usize,
    y: usize,
}

impl Default for JoystickCursor {
    fn default() -> Self {
        Self {
            x: CENTER,
            y: CENTER,
        }
    }
}

fn step(pos: usize, raw: u16) -> usize {
    if raw < LOW_THRESHOLD {
        pos.saturating_sub(1)
    } else if raw > HIGH_THRESHOLD {
        (pos + 1).min(MATRIX_SIZE - 1)
    } else {
        pos
    }
}

impl JoystickCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves one cell per axis at most; returns true if the cursor moved
    pub fn update(&mut self, raw_x: u16, raw_y: u16) -> bool {
        let (x, y) = (step(self.x, raw_x), step(self.y, raw_y));
        let moved = (x, y) != (self.x, self.y);
        self.x = x;
        self.y = y;
        moved
    }

    pub fn recenter(&mut self) {
        *self = Self::default();
    }

    pub fn position(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    /// Strip index of the cursor
    pub fn index(&self) -> usize {
        self.x * MATRIX_SIZE + self.y
    }

    pub fn render(&self, color: RGB8) -> Frame {
        let mut frame = Frame::new();
        let _ = frame.set(self.index(), color);
        frame
    }
}

/// Console bar for one axis: `[----o----]` with the marker proportional to `raw`
pub fn axis_bar<const N: usize>(raw: u16, width: usize) -> String<N> {
    let width = width.min(N.saturating_sub(2)).max(1);
    let pos = (raw.min(4095) as usize * width / 4095).min(width - 1);
    let mut out = String::new();
    let _ = out.push('[');
    for i in 0..width {
        let _ = out.push(if i == pos { 'o' } else { '-' });
    }
    let _ = out.push(']');
    out
}

/// Button-driven painter: a cursor walks the strip and marks cells
#[derive(Debug, Clone)]
pub struct LinePainter {
    cursor: usize,
    marks: [bool; NUM_PIXELS],
}

impl Default for LinePainter {
    fn default() -> Self {
        Self {
            cursor: 0,
            marks: [false; NUM_PIXELS],
        }
    }
}

impl LinePainter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(NUM_PIXELS - 1);
    }

    /// Flips the mark under the cursor; returns the new mark state
    pub fn toggle(&mut self) -> bool {
        let mark = &mut self.marks[self.cursor];
        *mark = !*mark;
        *mark
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_marked(&self, index: usize) -> bool {
        self.marks.get(index).copied().unwrap_or(false)
    }

    /// Marks in the mark colour, the cursor on top in the cursor colour
    pub fn render(&self) -> Frame {
        let mut frame = Frame::new();
        for (i, marked) in self.marks.iter().enumerate() {
            if *marked {
                let _ = frame.set(i, matrix::YELLOW);
            }
        }
        let _ = frame.set(self.cursor, matrix::CURSOR_GREEN);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_the_middle() {
        let c = JoystickCursor::new();
        assert_eq!(c.position(), (2, 2));
        assert_eq!(c.index(), 12);
    }

    #[test]
    fn dead_zone_does_not_move() {
        let mut c = JoystickCursor::new();
        assert!(!c.update(2048, 2048));
        assert!(!c.update(1000, 3000));
        assert_eq!(c.position(), (2, 2));
    }

    #[test]
    fn moves_and_clamps_at_edges() {
        let mut c = JoystickCursor::new();
        for _ in 0..10 {
            c.update(4095, 0);
        }
        assert_eq!(c.position(), (4, 0));
        assert_eq!(c.index(), 20);
        assert!(!c.update(4095, 0));
        c.recenter();
        assert_eq!(c.position(), (2, 2));
    }

    #[test]
    fn render_lights_only_the_cursor() {
        let mut c = JoystickCursor::new();
        c.update(0, 4095);
        let f = c.render(matrix::CURSOR_GREEN);
        assert_eq!(f.lit_count(), 1);
        // x = 1, y = 3
        assert_eq!(f.pixel(8), Some(matrix::CURSOR_GREEN));
    }

    #[test]
    fn axis_bar_places_marker() {
        let left: String<42> = axis_bar(0, 40);
        assert!(left.starts_with("[o-"));
        assert_eq!(left.len(), 42);
        let right: String<42> = axis_bar(4095, 40);
        assert!(right.ends_with("-o]"));
        let mid: String<12> = axis_bar(2048, 10);
        assert_eq!(mid.as_str(), "[-----o----]");
    }

    #[test]
    fn axis_bar_exact_multiple_lands_on_its_cell() {
        // 2457 * 5 / 4095 = 3
        let bar: String<7> = axis_bar(2457, 5);
        assert_eq!(bar.as_str(), "[---o-]");
        let full: String<7> = axis_bar(4095, 5);
        assert_eq!(full.as_str(), "[----o]");
    }

    #[test]
    fn painter_cursor_stays_on_the_strip() {
        let mut p = LinePainter::new();
        p.move_left();
        assert_eq!(p.cursor(), 0);
        for _ in 0..40 {
            p.move_right();
        }
        assert_eq!(p.cursor(), 24);
    }

    #[test]
    fn painter_toggles_and_renders_marks() {
        let mut p = LinePainter::new();
        assert!(p.toggle());
        p.move_right();
        p.move_right();
        assert!(p.toggle());
        assert!(!p.toggle());
        assert!(p.toggle());

        let f = p.render();
        assert_eq!(f.pixel(0), Some(matrix::YELLOW));
        // cursor drawn over its own mark
        assert_eq!(f.pixel(2), Some(matrix::CURSOR_GREEN));
        assert_eq!(f.lit_count(), 2);
        assert!(p.is_marked(2));
        assert!(!p.is_marked(99));
    }
}
