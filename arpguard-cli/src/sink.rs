//! Alert log
//!
//! Every event becomes one `[YYYY-mm-dd HH:MM:SS] [LEVEL] message` line,
//! appended to the log file and echoed to stdout with the severity's color.

use arpguard_core::Result;
use arpguard_detect::{DetectionEvent, EventSink, Severity};
use chrono::{DateTime, Local};
use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format one log line
pub fn format_line(timestamp: DateTime<Local>, severity: Severity, message: &str) -> String {
    format!(
        "[{}] [{}] {}",
        timestamp.format(TIMESTAMP_FORMAT),
        severity.label(),
        message
    )
}

/// File plus console alert log
pub struct AlertLog<W: Write, C: Write = io::Stdout> {
    writer: W,
    console: Option<C>,
    color: bool,
}

impl AlertLog<File> {
    /// Open `path` for appending, creating it when missing
    pub fn open<P: AsRef<Path>>(path: P, color: bool) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file, color && io::stdout().is_tty()))
    }
}

impl<W: Write> AlertLog<W> {
    pub fn new(writer: W, color: bool) -> Self {
        Self::with_console(writer, io::stdout(), color)
    }
}

impl<W: Write, C: Write> AlertLog<W, C> {
    /// Echo to `console` instead of stdout
    pub fn with_console(writer: W, console: C, color: bool) -> Self {
        Self {
            writer,
            console: Some(console),
            color,
        }
    }

    /// Write to the log only, no console echo
    pub fn without_console(mut self) -> Self {
        self.console = None;
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Record a free-form line
    pub fn record(&mut self, severity: Severity, message: &str) {
        let line = format_line(Local::now(), severity, message);

        if let Err(e) = writeln!(self.writer, "{}", line).and_then(|_| self.writer.flush()) {
            warn!(error = %e, "failed to write alert log");
        }

        if let Some(console) = self.console.as_mut() {
            let echoed = match (self.color, severity) {
                (true, Severity::Alert) => writeln!(console, "{}", line.as_str().red()),
                (true, Severity::Warning) => writeln!(console, "{}", line.as_str().yellow()),
                _ => writeln!(console, "{}", line),
            };
            // Stop echoing once the console is gone
            if let Err(e) = echoed.and_then(|_| console.flush()) {
                warn!(error = %e, "failed to echo alert to console");
                self.console = None;
            }
        }
    }
}

impl<W: Write, C: Write> EventSink for AlertLog<W, C> {
    fn emit(&mut self, event: &DetectionEvent) {
        self.record(event.severity(), &event.to_string());
    }
}

/// Cloneable handle letting several workers write through one sink
pub struct SharedSink<S>(Arc<Mutex<S>>);

impl<S> SharedSink<S> {
    pub fn new(sink: S) -> Self {
        Self(Arc::new(Mutex::new(sink)))
    }

    /// Run `f` with exclusive access to the inner sink
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.0.lock())
    }
}

impl<S> Clone for SharedSink<S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S: EventSink> EventSink for SharedSink<S> {
    fn emit(&mut self, event: &DetectionEvent) {
        self.0.lock().emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arpguard_core::MacAddr;
    use arpguard_detect::CollectingSink;
    use chrono::TimeZone;
    use std::net::Ipv4Addr;

    fn contents(log: &AlertLog<Vec<u8>>) -> String {
        String::from_utf8(log.get_ref().clone()).unwrap()
    }

    #[test]
    fn test_format_line() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            format_line(ts, Severity::Warning, "binding table full"),
            "[2024-03-09 07:05:01] [WARNING] binding table full"
        );
    }

    #[test]
    fn test_spoof_alert_line() {
        let mut log = AlertLog::new(Vec::new(), false).without_console();
        log.emit(&DetectionEvent::SpoofDetected {
            address: Ipv4Addr::new(192, 168, 1, 1),
            previous: MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            observed: MacAddr::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]),
        });

        let text = contents(&log);
        assert!(text.ends_with(
            "[ALERT] ARP SPOOFING DETECTED! IP: 192.168.1.1 is being claimed by \
             de:ad:be:ef:00:01 (previously: 00:11:22:33:44:55)\n"
        ));
        assert!(text.starts_with('['));
    }

    #[test]
    fn test_lines_append() {
        let mut log = AlertLog::new(Vec::new(), false).without_console();
        log.record(Severity::Info, "started");
        log.emit(&DetectionEvent::HostDiscovered {
            address: Ipv4Addr::new(10, 0, 0, 5),
            hardware: MacAddr::new([0xaa; 6]),
        });

        let text = contents(&log);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO] started"));
        assert!(lines[1].contains("[INFO]"));
        assert!(lines[1].contains("10.0.0.5"));
    }

    /// Console whose reader has gone away
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_closed_console_keeps_logging() {
        let mut log = AlertLog::with_console(Vec::new(), ClosedPipe, false);
        log.record(Severity::Info, "started");
        log.emit(&DetectionEvent::SpoofDetected {
            address: Ipv4Addr::new(192, 168, 1, 1),
            previous: MacAddr::new([0xaa; 6]),
            observed: MacAddr::new([0xbb; 6]),
        });

        let text = String::from_utf8(log.get_ref().clone()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("[ALERT]"));
    }

    #[test]
    fn test_console_echo_matches_log_line() {
        let mut log = AlertLog::with_console(Vec::new(), Vec::new(), false);
        log.record(Severity::Warning, "binding table full");

        let console = log.console.as_ref().map(|c| String::from_utf8(c.clone()).unwrap());
        let file = String::from_utf8(log.get_ref().clone()).unwrap();
        assert_eq!(console.as_deref(), Some(file.as_str()));
    }

    #[test]
    fn test_shared_sink_clones_write_through() {
        let shared = SharedSink::new(CollectingSink::new());
        let mut a = shared.clone();
        let mut b = shared.clone();

        let event = DetectionEvent::HostDiscovered {
            address: Ipv4Addr::new(10, 0, 0, 5),
            hardware: MacAddr::new([0xaa; 6]),
        };
        a.emit(&event);
        b.emit(&event);

        assert_eq!(shared.with(|sink| sink.events.len()), 2);
    }
}
