//! Alert report sent to the TCP collector
//!
//! The collector matches the Portuguese labels followed by an unsigned number,
//! so the line layout is fixed and positive values carry no `+`:
//!
//! ```text
//! Temperatura: 31.25 C | Limite: 30.0 C | Alerta: Ativo | Alertas: 3
//! ```

use crate::BoardError;
use crate::alert::AlertSnapshot;
use core::fmt::Write;
use heapless::String;

/// Longest encoded report plus headroom
pub const REPORT_CAPACITY: usize = 128;

/// Characters of the report shown in log lines
pub const PREVIEW_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryReport {
    pub celsius: f32,
    pub threshold: f32,
    pub alert_active: bool,
    pub alert_count: u32,
}

impl TelemetryReport {
    pub fn new(celsius: f32, alert: &AlertSnapshot) -> Self {
        Self {
            celsius,
            threshold: alert.threshold,
            alert_active: alert.active,
            alert_count: alert.count,
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.alert_active { "Ativo" } else { "Inativo" }
    }

    pub fn encode(&self) -> Result<String<REPORT_CAPACITY>, BoardError> {
        let mut out = String::new();
        write!(
            out,
            "Temperatura: {:.2} C | Limite: {:.1} C | Alerta: {} | Alertas: {}",
            self.celsius,
            self.threshold,
            self.status_label(),
            self.alert_count
        )
        .map_err(|_| BoardError::ProtocolError)?;
        Ok(out)
    }
}

/// First `max` characters of a message, with `...` appended when cut
pub fn preview(message: &str, max: usize) -> String<{ PREVIEW_CHARS + 3 }> {
    let mut out = String::new();
    let max = max.min(PREVIEW_CHARS);
    let mut chars = message.chars();
    for c in chars.by_ref().take(max) {
        let _ = out.push(c);
    }
    if chars.next().is_some() {
        let _ = out.push_str("...");
    }
    out
}

/// Dotted-quad IPv4 address
pub fn parse_ipv4(s: &str) -> Option<[u8; 4]> {
    let mut parts = [0u8; 4];
    let mut idx = 0;
    for part in s.trim().split('.') {
        if idx >= 4 || part.is_empty() || part.len() > 3 {
            return None;
        }
        parts[idx] = part.parse::<u8>().ok()?;
        idx += 1;
    }
    if idx != 4 {
        return None;
    }
    Some(parts)
}

/// Where reports go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportTarget {
    pub ip: [u8; 4],
    pub port: u16,
}

impl ReportTarget {
    pub fn parse(ip: &str, port: u16) -> Result<Self, BoardError> {
        let ip = parse_ipv4(ip).ok_or(BoardError::ConfigError)?;
        if port == 0 || ip == [0, 0, 0, 0] {
            return Err(BoardError::ConfigError);
        }
        Ok(Self { ip, port })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(active: bool, count: u32) -> AlertSnapshot {
        AlertSnapshot {
            threshold: 30.0,
            active,
            count,
        }
    }

    #[test]
    fn encodes_the_collector_format() {
        let report = TelemetryReport::new(31.254, &snapshot(true, 3));
        assert_eq!(
            report.encode().unwrap().as_str(),
            "Temperatura: 31.25 C | Limite: 30.0 C | Alerta: Ativo | Alertas: 3"
        );
    }

    #[test]
    fn negative_temperatures_are_signed() {
        let report = TelemetryReport {
            celsius: -5.5,
            threshold: -2.0,
            alert_active: false,
            alert_count: 0,
        };
        assert_eq!(
            report.encode().unwrap().as_str(),
            "Temperatura: -5.50 C | Limite: -2.0 C | Alerta: Inativo | Alertas: 0"
        );
    }

    #[test]
    fn preview_truncates_long_messages() {
        let msg = "Temperatura: 31.25 C | Limite: 30.0 C | Alerta: Ativo | Alertas: 3";
        let p = preview(msg, PREVIEW_CHARS);
        assert_eq!(p.as_str(), "Temperatura: 31.25 C | Limite: 30.0 C | ...");
        assert_eq!(preview("short", PREVIEW_CHARS).as_str(), "short");
    }

    #[test]
    fn ipv4_parsing() {
        assert_eq!(parse_ipv4("192.168.1.100"), Some([192, 168, 1, 100]));
        assert_eq!(parse_ipv4(" 10.0.0.1 "), Some([10, 0, 0, 1]));
        assert_eq!(parse_ipv4("10.0.0"), None);
        assert_eq!(parse_ipv4("10.0.0.1.2"), None);
        assert_eq!(parse_ipv4("10.0.0.256"), None);
        assert_eq!(parse_ipv4("10..0.1"), None);
        assert_eq!(parse_ipv4("collector.local"), None);
    }

    #[test]
    fn target_rejects_unusable_addresses() {
        assert_eq!(
            ReportTarget::parse("192.168.1.100", 5000),
            Ok(ReportTarget {
                ip: [192, 168, 1, 100],
                port: 5000
            })
        );
        assert_eq!(ReportTarget::parse("0.0.0.0", 5000), Err(BoardError::ConfigError));
        assert_eq!(ReportTarget::parse("192.168.1.100", 0), Err(BoardError::ConfigError));
        assert_eq!(ReportTarget::parse("nope", 5000), Err(BoardError::ConfigError));
    }
}
