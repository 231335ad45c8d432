//! Application log and the monitor's status stream.
//!
//! `log` is the process-wide log: console plus `logs/verify_responder.log`.
//! The monitor worker never writes there directly; it pushes [`LogEvent`]s
//! through a channel which the main loop drains and forwards.

use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

use crate::paths;

const LOG_FILE_NAME: &str = "verify_responder.log";

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    append_to_log_file(&line);
}

fn append_to_log_file(line: &str) {
    let log_path = paths::get_logs_dir().join(LOG_FILE_NAME);
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Installs a panic hook that records panics in the log file.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprint!("{}", log_msg);
        append_to_log_file(&log_msg);
    }));
}

/// A single status line produced by the monitor.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub at: DateTime<Local>,
    pub message: String,
}

impl LogEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LogEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.message)
    }
}

/// Producer half of the status stream. Cloneable, never blocks.
#[derive(Clone)]
pub struct LogSender {
    tx: Sender<LogEvent>,
}

impl LogSender {
    /// Pushes a status line. A dropped receiver is not an error for the worker.
    pub fn send(&self, message: impl Into<String>) {
        let _ = self.tx.send(LogEvent::new(message));
    }
}

/// Consumer half of the status stream.
pub struct LogReceiver {
    rx: Receiver<LogEvent>,
}

impl LogReceiver {
    /// Returns every event queued so far without waiting for more.
    pub fn drain(&self) -> Vec<LogEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }
}

/// Creates the unbounded status channel.
pub fn log_channel() -> (LogSender, LogReceiver) {
    let (tx, rx) = channel();
    (LogSender { tx }, LogReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_returns_events_in_order() {
        let (sender, receiver) = log_channel();
        sender.send("first");
        sender.send(String::from("second"));

        let messages: Vec<String> = receiver.drain().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn test_send_after_receiver_dropped_is_ignored() {
        let (sender, receiver) = log_channel();
        drop(receiver);
        // Must not panic
        sender.send("nobody is listening");
    }

    #[test]
    fn test_drain_after_sender_dropped() {
        let (sender, receiver) = log_channel();
        sender.send("last words");
        drop(sender);

        assert_eq!(receiver.drain().len(), 1);
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn test_event_display_has_timestamp_prefix() {
        let event = LogEvent::new("OCR: /verify 1234");
        let text = event.to_string();
        assert!(text.starts_with('['));
        assert!(text.ends_with("] OCR: /verify 1234"));
    }
}
