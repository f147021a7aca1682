//! 5x5 addressable LED matrix frame
//!
//! Pixels are stored in strip order (index 0..25 along the data line). The
//! strip snakes through the rows, so [`serpentine_index`] maps a (row, col)
//! grid position to its strip index.

use crate::BoardError;
use smart_leds::RGB8;

pub const MATRIX_SIZE: usize = 5;
pub const NUM_PIXELS: usize = MATRIX_SIZE * MATRIX_SIZE;

pub const OFF: RGB8 = RGB8 { r: 0, g: 0, b: 0 };
pub const ALERT_RED: RGB8 = RGB8 { r: 30, g: 0, b: 0 };
pub const YELLOW: RGB8 = RGB8 { r: 30, g: 30, b: 0 };
pub const CURSOR_GREEN: RGB8 = RGB8 { r: 0, g: 3, b: 0 };

/// Row colours of the sound-level staircase, bottom row first
pub const LEVEL_COLORS: [RGB8; MATRIX_SIZE] = [
    RGB8 { r: 0, g: 0, b: 80 },
    RGB8 { r: 0, g: 80, b: 80 },
    RGB8 { r: 60, g: 60, b: 0 },
    RGB8 { r: 80, g: 40, b: 0 },
    RGB8 { r: 80, g: 0, b: 0 },
];

/// Strip index of a grid cell; even rows run left to right, odd rows back
pub const fn serpentine_index(row: usize, col: usize) -> usize {
    if row % 2 == 0 {
        row * MATRIX_SIZE + col
    } else {
        row * MATRIX_SIZE + (MATRIX_SIZE - 1 - col)
    }
}

/// Small xorshift generator for the random colour demo
#[derive(Debug, Clone)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    pub fn new(seed: u32) -> Self {
        // zero is a fixed point of xorshift
        Self {
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: [RGB8; NUM_PIXELS],
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            pixels: [OFF; NUM_PIXELS],
        }
    }
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filled(color: RGB8) -> Self {
        Self {
            pixels: [color; NUM_PIXELS],
        }
    }

    pub fn set(&mut self, index: usize, color: RGB8) -> Result<(), BoardError> {
        let pixel = self.pixels.get_mut(index).ok_or(BoardError::LedError)?;
        *pixel = color;
        Ok(())
    }

    pub fn pixel(&self, index: usize) -> Option<RGB8> {
        self.pixels.get(index).copied()
    }

    pub fn pixels(&self) -> &[RGB8; NUM_PIXELS] {
        &self.pixels
    }

    pub fn fill(&mut self, color: RGB8) {
        self.pixels = [color; NUM_PIXELS];
    }

    pub fn clear(&mut self) {
        self.fill(OFF);
    }

    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|p| **p != OFF).count()
    }

    /// Sound-level bar: row `r` (0 = bottom) lights `5 - r` LEDs when
    /// `level > r`; levels above 5 saturate
    pub fn staircase(level: u8) -> Self {
        let mut frame = Self::new();
        let level = (level as usize).min(MATRIX_SIZE);
        for row in 0..level {
            for col in 0..(MATRIX_SIZE - row) {
                frame.pixels[serpentine_index(row, col)] = LEVEL_COLORS[row];
            }
        }
        frame
    }

    /// Every channel of every pixel set to `next() % max`
    pub fn fill_random(&mut self, rng: &mut XorShift32, max: u8) {
        let max = max.max(1) as u32;
        for pixel in self.pixels.iter_mut() {
            *pixel = RGB8 {
                r: (rng.next_u32() % max) as u8,
                g: (rng.next_u32() % max) as u8,
                b: (rng.next_u32() % max) as u8,
            };
        }
    }

    /// WS2812 wire order, three bytes per pixel
    pub fn grb_bytes(&self) -> [u8; NUM_PIXELS * 3] {
        let mut out = [0u8; NUM_PIXELS * 3];
        for (chunk, p) in out.chunks_exact_mut(3).zip(self.pixels.iter()) {
            chunk[0] = p.g;
            chunk[1] = p.r;
            chunk[2] = p.b;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serpentine_rows_alternate() {
        assert_eq!(serpentine_index(0, 0), 0);
        assert_eq!(serpentine_index(0, 4), 4);
        assert_eq!(serpentine_index(1, 0), 9);
        assert_eq!(serpentine_index(1, 4), 5);
        assert_eq!(serpentine_index(4, 4), 24);
    }

    #[test]
    fn set_rejects_out_of_range() {
        let mut f = Frame::new();
        assert!(f.set(24, YELLOW).is_ok());
        assert_eq!(f.set(25, YELLOW), Err(BoardError::LedError));
        assert_eq!(f.lit_count(), 1);
        assert_eq!(f.pixel(24), Some(YELLOW));
        assert_eq!(f.pixel(25), None);
    }

    #[test]
    fn staircase_lights_a_triangle() {
        assert_eq!(Frame::staircase(0).lit_count(), 0);
        assert_eq!(Frame::staircase(1).lit_count(), 5);
        assert_eq!(Frame::staircase(3).lit_count(), 5 + 4 + 3);
        assert_eq!(Frame::staircase(5).lit_count(), 15);
        assert_eq!(Frame::staircase(200), Frame::staircase(5));
    }

    #[test]
    fn staircase_row_colours_and_layout() {
        let f = Frame::staircase(2);
        // bottom row: all five blue
        for col in 0..5 {
            assert_eq!(f.pixel(serpentine_index(0, col)), Some(LEVEL_COLORS[0]));
        }
        // second row: four cyan, the last column stays dark
        for col in 0..4 {
            assert_eq!(f.pixel(serpentine_index(1, col)), Some(LEVEL_COLORS[1]));
        }
        assert_eq!(f.pixel(serpentine_index(1, 4)), Some(OFF));
    }

    #[test]
    fn random_fill_stays_dim() {
        let mut rng = XorShift32::new(42);
        let mut f = Frame::new();
        f.fill_random(&mut rng, 10);
        assert!(f.pixels().iter().all(|p| p.r < 10 && p.g < 10 && p.b < 10));
    }

    #[test]
    fn xorshift_never_sticks_at_zero() {
        let mut rng = XorShift32::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn grb_order_on_the_wire() {
        let mut f = Frame::new();
        f.set(0, RGB8 { r: 1, g: 2, b: 3 }).unwrap();
        let bytes = f.grb_bytes();
        assert_eq!(&bytes[..3], &[2, 1, 3]);
        assert!(bytes[3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn fill_and_clear() {
        let mut f = Frame::filled(ALERT_RED);
        assert_eq!(f.lit_count(), NUM_PIXELS);
        f.clear();
        assert_eq!(f, Frame::new());
    }
}
