//! Analog temperature sensor
//!
//! Averages a burst of ADC samples and converts the mean voltage to °C with a
//! linear calibration (TMP36 by default).

use crate::{BoardError, config, println};
use embedded_hal::delay::DelayNs;

/// Full-scale ADC reading and the matching voltage in millivolts
pub const ADC_MAX: u16 = 4095;
pub const ADC_REF_MV: u32 = 3300;

/// Plausible range of the sensor; values outside are logged but still reported
pub const MIN_PLAUSIBLE_C: f32 = -40.0;
pub const MAX_PLAUSIBLE_C: f32 = 100.0;

/// One 12-bit analog channel.
///
/// Implemented for any `FnMut() -> Result<u16, BoardError>` so the firmware can
/// hand over a closure around `nb::block!(adc.read_oneshot(&mut pin))`.
pub trait AnalogInput {
    fn read_raw(&mut self) -> Result<u16, BoardError>;
}

impl<F> AnalogInput for F
where
    F: FnMut() -> Result<u16, BoardError>,
{
    fn read_raw(&mut self) -> Result<u16, BoardError> {
        self()
    }
}

/// Raw 12-bit reading to millivolts
pub fn raw_to_millivolts(raw: u16) -> f32 {
    raw.min(ADC_MAX) as f32 * ADC_REF_MV as f32 / ADC_MAX as f32
}

/// Linear sensor calibration: `reference_c` at `reference_mv`, `mv_per_degree` slope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub reference_c: f32,
    pub reference_mv: f32,
    pub mv_per_degree: f32,
}

impl Calibration {
    /// TMP36: 750 mV at 25 °C, 10 mV/°C
    pub const TMP36: Calibration = Calibration {
        reference_c: 25.0,
        reference_mv: 750.0,
        mv_per_degree: 10.0,
    };

    /// LM35: 0 mV at 0 °C, 10 mV/°C
    pub const LM35: Calibration = Calibration {
        reference_c: 0.0,
        reference_mv: 0.0,
        mv_per_degree: 10.0,
    };

    pub fn celsius(&self, millivolts: f32) -> f32 {
        self.reference_c + (millivolts - self.reference_mv) / self.mv_per_degree
    }
}

/// One averaged temperature reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub celsius: f32,
    pub plausible: bool,
}

impl Reading {
    pub fn new(celsius: f32) -> Self {
        Self {
            celsius,
            plausible: (MIN_PLAUSIBLE_C..=MAX_PLAUSIBLE_C).contains(&celsius),
        }
    }
}

/// Temperature sensor on an ADC channel
pub struct TemperatureSensor<A> {
    input: A,
    calibration: Calibration,
    samples: usize,
    sample_gap_us: u32,
}

impl<A: AnalogInput> TemperatureSensor<A> {
    pub fn new(input: A, calibration: Calibration) -> Self {
        Self {
            input,
            calibration,
            samples: config::TEMP_SAMPLES,
            sample_gap_us: config::TEMP_SAMPLE_GAP_US,
        }
    }

    /// Overrides the burst size and sample spacing
    pub fn with_sampling(mut self, samples: usize, sample_gap_us: u32) -> Self {
        self.samples = samples;
        self.sample_gap_us = sample_gap_us;
        self
    }

    /// Mean raw value of one burst
    pub fn read_average_raw(&mut self, delay: &mut impl DelayNs) -> Result<f32, BoardError> {
        if self.samples == 0 {
            return Err(BoardError::SensorError);
        }

        let mut sum: u32 = 0;
        for i in 0..self.samples {
            sum += self.input.read_raw()?.min(ADC_MAX) as u32;
            if i + 1 < self.samples {
                delay.delay_us(self.sample_gap_us);
            }
        }

        Ok(sum as f32 / self.samples as f32)
    }

    /// Averaged reading in °C
    pub fn read(&mut self, delay: &mut impl DelayNs) -> Result<Reading, BoardError> {
        let raw = self.read_average_raw(delay)?;
        let millivolts = raw * ADC_REF_MV as f32 / ADC_MAX as f32;
        let reading = Reading::new(self.calibration.celsius(millivolts));

        if !reading.plausible {
            println!(
                "[TEMP] Warning: reading {:.2} C outside {:.0}..{:.0} C, check sensor wiring",
                reading.celsius, MIN_PLAUSIBLE_C, MAX_PLAUSIBLE_C
            );
        }

        Ok(reading)
    }
}
