//! Communication log: an ordered record of every request and response.
//!
//! The [`LogRecorder`] is the audit trail of the access layer. It is separate
//! from diagnostic `tracing` output: entries are kept in memory, in the order
//! they were created, until the owner renders, clears or reallocates them.
//!
//! # Rendering
//!
//! Each entry renders as one line:
//!
//! ```text
//! 13:45:30.123 >> 00 2A //WO value: 42, [PLC: 10.0.0.5], DB1.0
//! 13:45:30.245 << 01 02 //RS [PLC: 10.0.0.5], DB1.4
//! ```
//!
//! `>>` marks data sent to the PLC and `<<` data received. Binary payloads
//! are upper-case hex pairs, text payloads are printed verbatim, and the
//! annotation follows `//` when present.
//!
//! # Example
//!
//! ```
//! use s7_gate::{Direction, LogEntry, LogRecorder};
//!
//! let recorder = LogRecorder::new(16);
//! recorder.append(LogEntry::bytes(Direction::Received, vec![0x01, 0x02], "RS DB1.0"));
//! recorder.append(LogEntry::note(Direction::Sent, "write exception: attempt 1/3"));
//!
//! let mut out = Vec::new();
//! recorder.render(&mut out).unwrap();
//! let text = String::from_utf8(out).unwrap();
//! assert!(text.lines().next().unwrap().ends_with("<< 01 02 //RS DB1.0"));
//! assert_eq!(recorder.len(), 2);
//! ```

use std::io::{self, Write};
use std::time::Instant;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::trace;

/// Direction of a logged communication event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Data sent to the PLC.
    Sent,
    /// Data received from the PLC.
    Received,
}

impl Direction {
    /// Arrow used when rendering.
    pub fn arrow(self) -> &'static str {
        match self {
            Direction::Sent => ">>",
            Direction::Received => "<<",
        }
    }
}

/// Payload of a log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    /// Raw bytes, rendered as hex pairs.
    Bytes(Vec<u8>),
    /// Pre-rendered text, rendered verbatim.
    Text(String),
}

/// One recorded communication event. Immutable once created.
#[derive(Debug, Clone)]
pub struct LogEntry {
    at: Instant,
    wall: DateTime<Local>,
    direction: Direction,
    payload: Option<LogPayload>,
    annotation: Option<String>,
}

impl LogEntry {
    fn new(direction: Direction, payload: Option<LogPayload>, annotation: Option<String>) -> Self {
        Self {
            at: Instant::now(),
            wall: Local::now(),
            direction,
            payload,
            annotation,
        }
    }

    /// Entry carrying raw bytes and an annotation.
    pub fn bytes(direction: Direction, data: Vec<u8>, annotation: impl Into<String>) -> Self {
        Self::new(direction, Some(LogPayload::Bytes(data)), Some(annotation.into()))
    }

    /// Entry carrying a text payload and an annotation.
    pub fn text(direction: Direction, text: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self::new(
            direction,
            Some(LogPayload::Text(text.into())),
            Some(annotation.into()),
        )
    }

    /// Entry with an annotation and no payload.
    pub fn note(direction: Direction, annotation: impl Into<String>) -> Self {
        Self::new(direction, None, Some(annotation.into()))
    }

    /// Monotonic creation instant, for ordering and interval checks.
    pub fn at(&self) -> Instant {
        self.at
    }

    /// Wall-clock creation time, for display.
    pub fn wall_time(&self) -> DateTime<Local> {
        self.wall
    }

    /// Direction of the event.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Payload, if any.
    pub fn payload(&self) -> Option<&LogPayload> {
        self.payload.as_ref()
    }

    /// Payload bytes, if the payload is binary.
    pub fn payload_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Some(LogPayload::Bytes(b)) => Some(b),
            _ => None,
        }
    }

    /// Annotation, if any.
    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ",
            self.wall.format("%H:%M:%S%.3f"),
            self.direction.arrow()
        )?;
        match &self.payload {
            Some(LogPayload::Bytes(data)) => {
                for b in data {
                    write!(f, "{:02X} ", b)?;
                }
            }
            Some(LogPayload::Text(text)) => write!(f, "{}", text)?,
            None => {}
        }
        if let Some(annotation) = &self.annotation {
            write!(f, "//{}", annotation)?;
        }
        Ok(())
    }
}

/// Thread-safe, append-only log of communication events.
#[derive(Debug, Default)]
pub struct LogRecorder {
    entries: Mutex<Vec<LogEntry>>,
}

impl LogRecorder {
    /// Creates an empty recorder with room for `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Appends an entry at the tail.
    pub fn append(&self, entry: LogEntry) {
        trace!(
            direction = entry.direction.arrow(),
            annotation = entry.annotation.as_deref().unwrap_or(""),
            "communication log entry"
        );
        self.entries.lock().push(entry);
    }

    /// Returns a copy of all entries, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes all entries, keeping the allocation.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Discards all entries and allocates fresh storage for `capacity`
    /// entries.
    pub fn reallocate(&self, capacity: usize) {
        *self.entries.lock() = Vec::with_capacity(capacity);
    }

    /// Writes every entry, one per line, oldest first.
    ///
    /// Writes a copy, so appends are not blocked by a slow sink.
    pub fn render<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        for entry in self.snapshot().iter() {
            writeln!(sink, "{}", entry)?;
        }
        Ok(())
    }

    /// Writes a dated `title` heading, every entry, and two blank lines.
    ///
    /// The entries are kept; call [`clear`](Self::clear) afterwards to start
    /// a fresh log.
    pub fn flush<W: Write>(&self, title: &str, sink: &mut W) -> io::Result<()> {
        writeln!(sink, "{}  {}", Local::now().format("%Y/%m/%d %H:%M:%S"), title)?;
        self.render(sink)?;
        writeln!(sink)?;
        writeln!(sink)?;
        sink.flush()
    }
}
