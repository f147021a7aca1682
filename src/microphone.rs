//! Microphone level meter
//!
//! A burst of ADC samples is reduced to its RMS value, re-centred around the
//! 1.65 V bias of the microphone amplifier, smoothed, and turned into a 0..=5
//! bar level for the LED staircase.

use num_traits::Float;

pub const ADC_REF_V: f32 = 3.3;
pub const ADC_COUNTS: f32 = 4096.0;
pub const BIAS_V: f32 = 1.65;

/// Below this the input is treated as silence
pub const NOISE_FLOOR_V: f32 = 0.1;
/// Width of one intensity step
pub const STEP_V: f32 = (ADC_REF_V / 5.0) / 20.0;
/// Highest level the LED bar can show
pub const MAX_BAR: u8 = 5;

/// Print a debug line every this many cycles
pub const DEBUG_INTERVAL: u32 = 100;

pub fn rms(samples: &[u16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|&s| (s as f32) * (s as f32)).sum();
    Float::sqrt(sum / samples.len() as f32)
}

/// ADC counts to volts relative to the bias point
pub fn adc_to_volts(raw: f32) -> f32 {
    raw * ADC_REF_V / ADC_COUNTS - BIAS_V
}

/// Number of whole steps contained in `volts`, 0 below the noise floor
pub fn intensity(volts: f32) -> u8 {
    if volts < NOISE_FLOOR_V {
        return 0;
    }
    let mut v = volts;
    let mut count: u8 = 0;
    loop {
        v -= STEP_V;
        if v <= 0.0 || count == u8::MAX {
            break;
        }
        count += 1;
    }
    count
}

pub fn bar_level(intensity: u8) -> u8 {
    intensity.min(MAX_BAR)
}

/// Result of one measurement cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub volts: f32,
    pub intensity: u8,
    pub bar: u8,
}

/// Smoothed level: 70 % of the new burst, 30 % of the previous level
#[derive(Debug, Clone, Default)]
pub struct LevelMeter {
    last: f32,
    cycles: u32,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, samples: &[u16]) -> Level {
        let v = 2.0 * Float::abs(adc_to_volts(rms(samples)));
        let smoothed = v * 0.7 + self.last * 0.3;
        self.last = smoothed;
        self.cycles = self.cycles.wrapping_add(1);

        let intensity = intensity(smoothed);
        Level {
            volts: smoothed,
            intensity,
            bar: bar_level(intensity),
        }
    }

    /// True on every `DEBUG_INTERVAL`-th cycle
    pub fn debug_due(&self) -> bool {
        self.cycles != 0 && self.cycles % DEBUG_INTERVAL == 0
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_signal_is_the_constant() {
        assert!((rms(&[2048; 200]) - 2048.0).abs() < 0.5);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn rms_weights_peaks() {
        let r = rms(&[0, 4000]);
        assert!((r - 2828.4).abs() < 1.0);
    }

    #[test]
    fn silence_is_level_zero() {
        let mut meter = LevelMeter::new();
        // bias point: 1.65 V is ~2048 counts
        let level = meter.process(&[2048; 200]);
        assert!(level.volts < NOISE_FLOOR_V);
        assert_eq!(level.intensity, 0);
        assert_eq!(level.bar, 0);
    }

    #[test]
    fn intensity_counts_steps() {
        assert_eq!(intensity(0.05), 0);
        // 0.2 V holds six 0.033 V steps with a remainder
        assert_eq!(intensity(0.2), 6);
        assert_eq!(intensity(3.31), 100);
        assert_eq!(intensity(100.0), 255);
    }

    #[test]
    fn bar_saturates_at_five() {
        assert_eq!(bar_level(0), 0);
        assert_eq!(bar_level(4), 4);
        assert_eq!(bar_level(99), 5);
    }

    #[test]
    fn smoothing_blends_with_previous_level() {
        let mut meter = LevelMeter::new();
        // 3000 counts: |3000*3.3/4096 - 1.65| * 2 ~= 1.5341 V
        let first = meter.process(&[3000; 10]);
        assert!((first.volts - 1.5341 * 0.7).abs() < 1e-3);
        let second = meter.process(&[3000; 10]);
        assert!((second.volts - (1.5341 * 0.7 + first.volts * 0.3)).abs() < 1e-3);
        assert_eq!(second.bar, 5);
    }

    #[test]
    fn debug_line_every_hundred_cycles() {
        let mut meter = LevelMeter::new();
        assert!(!meter.debug_due());
        for _ in 0..99 {
            meter.process(&[2048]);
            assert!(!meter.debug_due());
        }
        meter.process(&[2048]);
        assert!(meter.debug_due());
        assert_eq!(meter.cycles(), 100);
    }
}
