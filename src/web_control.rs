//! HTTP control of the single LED and the LED matrix, plus the two board buttons
//!
//! Requests are matched on the path of the request line, matrix routes first.
//! Responses are a short `key=value` plain-text status body.

use crate::BoardError;
use crate::buttons::{ButtonEvent, ButtonLog, format_uptime};
use crate::matrix::{self, Frame, XorShift32};
use core::fmt::Write;
use heapless::String;

/// Upper bound of a random colour channel
pub const RANDOM_MAX: u8 = 10;

pub const STATUS_BODY_CAPACITY: usize = 384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    LedOn,
    LedOff,
    MatrixAllOn,
    MatrixAllOff,
    MatrixRandom,
    Api,
    Status,
}

impl Route {
    /// Route of a raw HTTP request (only the request line is looked at)
    pub fn parse(request: &[u8]) -> Result<Self, BoardError> {
        let line_end = request
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .unwrap_or(request.len());
        let line = core::str::from_utf8(&request[..line_end]).map_err(|_| BoardError::ProtocolError)?;

        let mut parts = line.split_ascii_whitespace();
        let _method = parts.next().ok_or(BoardError::ProtocolError)?;
        let target = parts.next().ok_or(BoardError::ProtocolError)?;
        if !target.starts_with('/') {
            return Err(BoardError::ProtocolError);
        }
        let path = target.split('?').next().unwrap_or(target);

        Ok(Self::from_path(path))
    }

    pub fn from_path(path: &str) -> Self {
        if under(path, "/led/matrix/all/on") {
            Route::MatrixAllOn
        } else if under(path, "/led/matrix/all/off") {
            Route::MatrixAllOff
        } else if under(path, "/led/matrix/random") {
            Route::MatrixRandom
        } else if under(path, "/led/on") {
            Route::LedOn
        } else if under(path, "/led/off") {
            Route::LedOff
        } else if under(path, "/api") {
            Route::Api
        } else {
            Route::Status
        }
    }
}

/// `path` is `prefix` itself or a path below it, matched on whole segments
fn under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// What the matrix task should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixCommand {
    AllOn,
    AllOff,
    Random,
}

impl MatrixCommand {
    pub fn render(&self, rng: &mut XorShift32) -> Frame {
        match self {
            MatrixCommand::AllOn => Frame::filled(matrix::YELLOW),
            MatrixCommand::AllOff => Frame::new(),
            MatrixCommand::Random => {
                let mut frame = Frame::new();
                frame.fill_random(rng, RANDOM_MAX);
                frame
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            MatrixCommand::AllOn => "on",
            MatrixCommand::AllOff => "off",
            MatrixCommand::Random => "random",
        }
    }
}

/// Which of the two buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    One,
    Two,
}

/// Shared state of the web-control demo
#[derive(Debug, Clone, Default)]
pub struct ControlState {
    pub led_on: bool,
    pub matrix: Option<MatrixCommand>,
    pub buttons: [ButtonLog; 2],
    pub requests: u32,
    pub ip: Option<[u8; 4]>,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a request; returns the matrix command to run, if any
    pub fn apply(&mut self, route: Route) -> Option<MatrixCommand> {
        self.requests = self.requests.wrapping_add(1);
        let command = match route {
            Route::LedOn => {
                self.led_on = true;
                None
            }
            Route::LedOff => {
                self.led_on = false;
                None
            }
            Route::MatrixAllOn => Some(MatrixCommand::AllOn),
            Route::MatrixAllOff => Some(MatrixCommand::AllOff),
            Route::MatrixRandom => Some(MatrixCommand::Random),
            Route::Api | Route::Status => None,
        };
        if command.is_some() {
            self.matrix = command;
        }
        command
    }

    /// Button 1 press shows random colours; button 2 lights the matrix while held
    pub fn button_event(&mut self, button: Button, event: ButtonEvent, now_ms: u64) -> Option<MatrixCommand> {
        let (slot, name) = match button {
            Button::One => (0, "Button 1"),
            Button::Two => (1, "Button 2"),
        };
        self.buttons[slot].record(name, event, now_ms);

        let command = match (button, event) {
            (Button::One, ButtonEvent::Pressed) => Some(MatrixCommand::Random),
            (Button::One, ButtonEvent::Released) => None,
            (Button::Two, ButtonEvent::Pressed) => Some(MatrixCommand::AllOn),
            (Button::Two, ButtonEvent::Released) => Some(MatrixCommand::AllOff),
        };
        if command.is_some() {
            self.matrix = command;
        }
        command
    }

    pub fn status_body(&self, now_ms: u64) -> String<STATUS_BODY_CAPACITY> {
        let mut body = String::new();
        let _ = writeln!(body, "led={}", if self.led_on { "on" } else { "off" });
        let _ = writeln!(
            body,
            "matrix={}",
            self.matrix.map(|m| m.label()).unwrap_or("off")
        );
        for (i, log) in self.buttons.iter().enumerate() {
            let state = if log.pressed { "pressed" } else { "released" };
            if log.last_event.is_empty() {
                let _ = writeln!(body, "button{}={}", i + 1, state);
            } else {
                let _ = writeln!(
                    body,
                    "button{}={} ({} at {})",
                    i + 1,
                    state,
                    log.last_event,
                    log.timestamp
                );
            }
        }
        if let Some(ip) = self.ip {
            let _ = writeln!(body, "ip={}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]);
        }
        let _ = writeln!(body, "requests={}", self.requests);
        let _ = writeln!(body, "uptime={}", format_uptime(now_ms));
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line() {
        let req = b"GET /led/on HTTP/1.1\r\nHost: 192.168.1.50\r\n\r\n";
        assert_eq!(Route::parse(req), Ok(Route::LedOn));
        assert_eq!(
            Route::parse(b"GET /led/matrix/random?x=1 HTTP/1.1\r\n\r\n"),
            Ok(Route::MatrixRandom)
        );
        assert_eq!(Route::parse(b"GET / HTTP/1.1\r\n\r\n"), Ok(Route::Status));
        assert_eq!(Route::parse(b"GET /api/status HTTP/1.1\r\n\r\n"), Ok(Route::Api));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Route::parse(b""), Err(BoardError::ProtocolError));
        assert_eq!(Route::parse(b"GET\r\n"), Err(BoardError::ProtocolError));
        assert_eq!(Route::parse(b"GET led HTTP/1.1\r\n"), Err(BoardError::ProtocolError));
        assert_eq!(Route::parse(&[0xff, 0xfe, b' ', b'/']), Err(BoardError::ProtocolError));
    }

    #[test]
    fn matrix_routes_win_over_led_routes() {
        assert_eq!(Route::from_path("/led/matrix/all/on"), Route::MatrixAllOn);
        assert_eq!(Route::from_path("/led/matrix/all/off"), Route::MatrixAllOff);
        assert_eq!(Route::from_path("/led/off"), Route::LedOff);
        assert_eq!(Route::from_path("/favicon.ico"), Route::Status);
    }

    #[test]
    fn routes_match_whole_segments() {
        assert_eq!(Route::from_path("/led/onion"), Route::Status);
        assert_eq!(Route::from_path("/led/offset"), Route::Status);
        assert_eq!(Route::from_path("/led/matrix/randomize"), Route::Status);
        assert_eq!(Route::from_path("/apiary"), Route::Status);
        assert_eq!(Route::from_path("/led/on/"), Route::LedOn);
        assert_eq!(Route::from_path("/api"), Route::Api);
    }

    #[test]
    fn led_routes_toggle_the_flag() {
        let mut s = ControlState::new();
        assert_eq!(s.apply(Route::LedOn), None);
        assert!(s.led_on);
        assert_eq!(s.apply(Route::LedOff), None);
        assert!(!s.led_on);
        assert_eq!(s.apply(Route::MatrixAllOn), Some(MatrixCommand::AllOn));
        assert_eq!(s.apply(Route::Status), None);
        assert_eq!(s.matrix, Some(MatrixCommand::AllOn));
        assert_eq!(s.requests, 4);
    }

    #[test]
    fn button_behaviour() {
        let mut s = ControlState::new();
        assert_eq!(
            s.button_event(Button::One, ButtonEvent::Pressed, 1000),
            Some(MatrixCommand::Random)
        );
        assert_eq!(s.button_event(Button::One, ButtonEvent::Released, 1200), None);
        assert_eq!(
            s.button_event(Button::Two, ButtonEvent::Pressed, 2000),
            Some(MatrixCommand::AllOn)
        );
        assert_eq!(
            s.button_event(Button::Two, ButtonEvent::Released, 2500),
            Some(MatrixCommand::AllOff)
        );
        assert_eq!(s.buttons[1].last_event.as_str(), "Button 2 released");
    }

    #[test]
    fn commands_render_frames() {
        let mut rng = XorShift32::new(7);
        assert_eq!(MatrixCommand::AllOn.render(&mut rng).lit_count(), 25);
        assert_eq!(MatrixCommand::AllOff.render(&mut rng).lit_count(), 0);
        let random = MatrixCommand::Random.render(&mut rng);
        assert!(random.pixels().iter().all(|p| p.r < RANDOM_MAX && p.g < RANDOM_MAX && p.b < RANDOM_MAX));
    }

    #[test]
    fn status_body_is_plain_text() {
        let mut s = ControlState::new();
        s.ip = Some([192, 168, 1, 50]);
        s.apply(Route::LedOn);
        s.button_event(Button::One, ButtonEvent::Pressed, 65_000);
        let body = s.status_body(3_600_000);

        assert!(body.contains("led=on\n"));
        assert!(body.contains("matrix=random\n"));
        assert!(body.contains("button1=pressed (Button 1 pressed at 00:01:05)\n"));
        assert!(body.contains("button2=released\n"));
        assert!(body.contains("ip=192.168.1.50\n"));
        assert!(body.contains("uptime=01:00:00\n"));
    }
}
