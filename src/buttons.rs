//! Push buttons (active low, internal pull-up)

use crate::config;
use core::fmt::Write;
use heapless::String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Pressed,
    Released,
}

/// Time-based debouncer for one button.
///
/// An edge is accepted only when the level differs from the last accepted
/// state and at least `window_ms` passed since the last accepted edge.
#[derive(Debug, Clone)]
pub struct Debouncer {
    pressed: bool,
    last_change_ms: Option<u64>,
    window_ms: u64,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(config::DEBOUNCE_MS)
    }
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            pressed: false,
            last_change_ms: None,
            window_ms,
        }
    }

    /// Feeds the raw pin level (`true` = low = pressed)
    pub fn update(&mut self, pressed: bool, now_ms: u64) -> Option<ButtonEvent> {
        if pressed == self.pressed {
            return None;
        }

        if let Some(last) = self.last_change_ms {
            if now_ms.saturating_sub(last) < self.window_ms {
                return None;
            }
        }

        self.pressed = pressed;
        self.last_change_ms = Some(now_ms);
        Some(if pressed {
            ButtonEvent::Pressed
        } else {
            ButtonEvent::Released
        })
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}

/// Uptime as `HH:MM:SS`, hours wrapping at 24
pub fn format_uptime(ms: u64) -> String<8> {
    let secs = ms / 1000;
    let mut out = String::new();
    let _ = write!(
        out,
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    );
    out
}

/// Last event seen on a button, for the status page
#[derive(Debug, Clone, Default)]
pub struct ButtonLog {
    pub pressed: bool,
    pub last_event: String<32>,
    pub timestamp: String<8>,
}

impl ButtonLog {
    pub fn record(&mut self, name: &str, event: ButtonEvent, now_ms: u64) {
        self.pressed = event == ButtonEvent::Pressed;
        self.last_event.clear();
        let verb = match event {
            ButtonEvent::Pressed => "pressed",
            ButtonEvent::Released => "released",
        };
        let _ = write!(self.last_event, "{} {}", name, verb);
        self.timestamp = format_uptime(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release_are_reported_once() {
        let mut d = Debouncer::default();
        assert_eq!(d.update(false, 0), None);
        assert_eq!(d.update(true, 10), Some(ButtonEvent::Pressed));
        assert_eq!(d.update(true, 20), None);
        assert_eq!(d.update(false, 100), Some(ButtonEvent::Released));
        assert!(!d.is_pressed());
    }

    #[test]
    fn bounces_inside_window_are_ignored() {
        let mut d = Debouncer::new(50);
        assert_eq!(d.update(true, 1000), Some(ButtonEvent::Pressed));
        assert_eq!(d.update(false, 1010), None);
        assert_eq!(d.update(true, 1020), None);
        assert_eq!(d.update(false, 1049), None);
        assert_eq!(d.update(false, 1050), Some(ButtonEvent::Released));
    }

    #[test]
    fn first_press_is_not_delayed() {
        let mut d = Debouncer::new(50);
        assert_eq!(d.update(true, 5), Some(ButtonEvent::Pressed));
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(0).as_str(), "00:00:00");
        assert_eq!(format_uptime(3_723_000).as_str(), "01:02:03");
        assert_eq!(format_uptime(25 * 3600 * 1000).as_str(), "01:00:00");
    }

    #[test]
    fn log_records_last_event() {
        let mut log = ButtonLog::default();
        log.record("Button 1", ButtonEvent::Pressed, 61_000);
        assert!(log.pressed);
        assert_eq!(log.last_event.as_str(), "Button 1 pressed");
        assert_eq!(log.timestamp.as_str(), "00:01:01");
        log.record("Button 1", ButtonEvent::Released, 62_000);
        assert!(!log.pressed);
        assert_eq!(log.last_event.as_str(), "Button 1 released");
    }
}
