//! Temperature alert with hysteresis
//!
//! The alert is raised when the temperature reaches the threshold and cleared
//! only once it falls below `threshold - hysteresis`, so a reading hovering at
//! the limit does not toggle the buzzer every cycle.

use crate::{config, println};

/// Edge produced by [`AlertMonitor::evaluate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    Raised,
    Cleared,
}

/// Alert state shared with the display and the reporter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertSnapshot {
    pub threshold: f32,
    pub active: bool,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct AlertMonitor {
    threshold: f32,
    hysteresis: f32,
    step: f32,
    active: bool,
    count: u32,
}

impl Default for AlertMonitor {
    fn default() -> Self {
        Self::new(
            config::ALERT_THRESHOLD_C,
            config::ALERT_HYSTERESIS_C,
            config::THRESHOLD_STEP_C,
        )
    }
}

impl AlertMonitor {
    pub fn new(threshold: f32, hysteresis: f32, step: f32) -> Self {
        Self {
            threshold,
            hysteresis,
            step,
            active: false,
            count: 0,
        }
    }

    /// Feeds one reading; returns the edge if the alert state changed
    pub fn evaluate(&mut self, celsius: f32) -> Option<AlertTransition> {
        if !self.active && celsius >= self.threshold {
            self.active = true;
            self.count = self.count.wrapping_add(1);
            println!(
                "[ALERT] Raised at {:.2} C (limit {:.1} C, total {})",
                celsius, self.threshold, self.count
            );
            Some(AlertTransition::Raised)
        } else if self.active && celsius < self.threshold - self.hysteresis {
            self.active = false;
            println!("[ALERT] Cleared at {:.2} C", celsius);
            Some(AlertTransition::Cleared)
        } else {
            None
        }
    }

    pub fn raise_threshold(&mut self) -> f32 {
        self.threshold += self.step;
        println!("[ALERT] Limit raised to {:.1} C", self.threshold);
        self.threshold
    }

    pub fn lower_threshold(&mut self) -> f32 {
        self.threshold -= self.step;
        println!("[ALERT] Limit lowered to {:.1} C", self.threshold);
        self.threshold
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        AlertSnapshot {
            threshold: self.threshold,
            active: self.active,
            count: self.count,
        }
    }
}

/// How the matrix shows an active alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorStyle {
    /// Alert colour on for as long as the alert is active
    Steady,
    /// Alert colour toggled on every tick
    Blink,
}

/// Drives the visual alert frame by frame
#[derive(Debug, Clone)]
pub struct AlertIndicator {
    style: IndicatorStyle,
    phase: bool,
}

impl Default for AlertIndicator {
    fn default() -> Self {
        Self::new(config::ALERT_INDICATOR)
    }
}

impl AlertIndicator {
    pub fn new(style: IndicatorStyle) -> Self {
        Self {
            style,
            phase: false,
        }
    }

    /// Whether the alert colour is lit for this tick
    pub fn tick(&mut self, active: bool) -> bool {
        if !active {
            self.phase = false;
            return false;
        }

        match self.style {
            IndicatorStyle::Steady => true,
            IndicatorStyle::Blink => {
                self.phase = !self.phase;
                self.phase
            }
        }
    }

    pub fn style(&self) -> IndicatorStyle {
        self.style
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raises_at_threshold_and_counts_once() {
        let mut m = AlertMonitor::default();
        assert_eq!(m.evaluate(29.9), None);
        assert_eq!(m.evaluate(30.0), Some(AlertTransition::Raised));
        assert_eq!(m.evaluate(31.5), None);
        assert_eq!(m.evaluate(35.0), None);
        assert!(m.is_active());
        assert_eq!(m.count(), 1);
    }

    #[test]
    fn holds_inside_hysteresis_band() {
        let mut m = AlertMonitor::default();
        m.evaluate(30.5);
        // 28.0 is the edge of the band, not below it
        assert_eq!(m.evaluate(29.0), None);
        assert_eq!(m.evaluate(28.0), None);
        assert!(m.is_active());
        assert_eq!(m.evaluate(27.99), Some(AlertTransition::Cleared));
        assert!(!m.is_active());
    }

    #[test]
    fn each_new_crossing_counts() {
        let mut m = AlertMonitor::default();
        for _ in 0..3 {
            assert_eq!(m.evaluate(31.0), Some(AlertTransition::Raised));
            assert_eq!(m.evaluate(20.0), Some(AlertTransition::Cleared));
        }
        assert_eq!(m.count(), 3);
    }

    #[test]
    fn threshold_buttons_do_not_flip_state_by_themselves() {
        let mut m = AlertMonitor::default();
        m.evaluate(30.2);
        assert_eq!(m.raise_threshold(), 31.0);
        assert!(m.is_active());
        // 30.2 is still inside the 29..31 band
        assert_eq!(m.evaluate(30.2), None);
        m.lower_threshold();
        m.lower_threshold();
        assert_eq!(m.threshold(), 29.0);
        assert_eq!(m.evaluate(26.9), Some(AlertTransition::Cleared));
    }

    #[test]
    fn lowering_threshold_below_reading_raises_on_next_evaluate() {
        let mut m = AlertMonitor::default();
        assert_eq!(m.evaluate(27.0), None);
        for _ in 0..3 {
            m.lower_threshold();
        }
        assert_eq!(m.evaluate(27.0), Some(AlertTransition::Raised));
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut m = AlertMonitor::new(25.0, 2.0, 1.0);
        m.evaluate(26.0);
        let snap = m.snapshot();
        assert_eq!(snap.threshold, 25.0);
        assert!(snap.active);
        assert_eq!(snap.count, 1);
    }

    #[test]
    fn steady_indicator_follows_alert() {
        let mut ind = AlertIndicator::new(IndicatorStyle::Steady);
        assert!(!ind.tick(false));
        assert!(ind.tick(true));
        assert!(ind.tick(true));
        assert!(!ind.tick(false));
    }

    #[test]
    fn blink_indicator_toggles_while_active() {
        let mut ind = AlertIndicator::new(IndicatorStyle::Blink);
        assert!(ind.tick(true));
        assert!(!ind.tick(true));
        assert!(ind.tick(true));
        assert!(!ind.tick(false));
        // restarts lit after a clear
        assert!(ind.tick(true));
    }

    #[test]
    fn default_indicator_uses_configured_style() {
        let mut ind = AlertIndicator::default();
        assert_eq!(ind.style(), config::ALERT_INDICATOR);
        assert!(ind.tick(true));
        assert_eq!(ind.tick(true), config::ALERT_INDICATOR == IndicatorStyle::Steady);
    }
}
