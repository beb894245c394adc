use crate::error::{InputError, ProbeError};
use crate::types::{ScanResult, ScanTarget};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};

/// A finished scan as shown to the user, stamped when it is rendered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub address: String,
    pub start_port: u16,
    pub end_port: u16,
    pub completed_at: String,
    pub open: Vec<u16>,
    pub closed: Vec<u16>,
}

impl ScanReport {
    pub fn new(target: &ScanTarget, result: ScanResult, completed_at: String) -> Self {
        Self {
            address: target.address.clone(),
            start_port: target.start_port,
            end_port: target.end_port,
            completed_at,
            open: result.open,
            closed: result.closed,
        }
    }

    /// Stamp with the current local time.
    pub fn completed_now(target: &ScanTarget, result: ScanResult) -> Self {
        Self::new(target, result, timestamp_now())
    }

    /// Plain text lines: header, blank line, open ports, then closed ports.
    pub fn lines(&self) -> Vec<String> {
        let mut out = self.header();
        out.reserve(self.open.len() + self.closed.len());
        out.extend(self.open.iter().map(|p| open_line(*p)));
        out.extend(self.closed.iter().map(|p| closed_line(*p)));
        out
    }

    /// Lines joined for the terminal; open ports green, closed ports red.
    pub fn render(&self, color: bool) -> String {
        if !color {
            return self.lines().join("\n");
        }
        let mut out = self.header();
        out.extend(self.open.iter().map(|p| open_line(*p).green().to_string()));
        out.extend(self.closed.iter().map(|p| closed_line(*p).red().to_string()));
        out.join("\n")
    }

    fn header(&self) -> Vec<String> {
        vec![format!("Scan completed at {}", self.completed_at), String::new()]
    }
}

pub fn open_line(port: u16) -> String {
    format!("Port {port} is open.")
}

pub fn closed_line(port: u16) -> String {
    format!("Port {port} is closed.")
}

/// Local time as `YYYY-MM-DD HH:MM:SS`.
///
/// The local offset cannot be read once the process has several threads on some
/// platforms; UTC is used then.
pub fn timestamp_now() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_timestamp(now)
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    at.format(&fmt)
        .unwrap_or_else(|_| String::from("1970-01-01 00:00:00"))
}

/// User-facing message for a failed scan.
pub fn error_message(err: &ProbeError) -> String {
    match err {
        ProbeError::InvalidRange { .. } => format!("Invalid input: {err}"),
        ProbeError::UnresolvableAddress { .. } => "Failed to connect to the target.".to_string(),
        ProbeError::Cancelled => "Scan cancelled.".to_string(),
    }
}

/// User-facing message for rejected form input.
pub fn input_error_message(err: &InputError) -> String {
    format!("Invalid input: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> ScanReport {
        let target = ScanTarget::new("127.0.0.1", 80, 82);
        let result = ScanResult { open: vec![80], closed: vec![81, 82] };
        ScanReport::new(&target, result, "2024-05-01 12:30:00".into())
    }

    #[test]
    fn lines_list_open_before_closed() {
        assert_eq!(
            sample().lines(),
            vec![
                "Scan completed at 2024-05-01 12:30:00",
                "",
                "Port 80 is open.",
                "Port 81 is closed.",
                "Port 82 is closed.",
            ]
        );
    }

    #[test]
    fn uncolored_render_is_joined_lines() {
        let r = sample();
        assert_eq!(r.render(false), r.lines().join("\n"));
    }

    #[test]
    fn colored_render_keeps_text() {
        colored::control::set_override(true);
        let out = sample().render(true);
        colored::control::unset_override();
        assert!(out.starts_with("Scan completed at 2024-05-01 12:30:00\n\n"));
        assert!(out.contains("Port 80 is open."));
        assert!(out.contains("\u{1b}["));
    }

    #[test]
    fn timestamp_format() {
        let at = datetime!(2023-01-02 03:04:05 UTC);
        assert_eq!(format_timestamp(at), "2023-01-02 03:04:05");
    }

    #[test]
    fn messages_are_keyed_by_kind() {
        let unres = ProbeError::UnresolvableAddress {
            address: "x".into(),
            reason: "nope".into(),
        };
        assert_eq!(error_message(&unres), "Failed to connect to the target.");
        assert_eq!(error_message(&ProbeError::Cancelled), "Scan cancelled.");
        assert!(error_message(&ProbeError::InvalidRange { start: 9, end: 1 })
            .starts_with("Invalid input:"));
        assert_eq!(
            input_error_message(&InputError::EmptyAddress),
            "Invalid input: address must not be empty"
        );
    }
}
