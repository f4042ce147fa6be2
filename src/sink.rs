//! Where accepted readings go.
//!
//! Persistence is best-effort: a failing sink is logged and the session
//! carries on.

use std::error::Error;
use std::fmt;
use std::io::{self, Write};

use chrono::{DateTime, Local};

use crate::reading::PhysicalReading;

/// Error type sinks report. Never fatal to a session.
pub type SinkError = Box<dyn Error + Send + Sync>;

/// One persisted row, timestamped when the reading was accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingRecord {
    pub timestamp: DateTime<Local>,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub gas_resistance: u32,
}

impl ReadingRecord {
    pub fn new(timestamp: DateTime<Local>, reading: &PhysicalReading) -> Self {
        Self {
            timestamp,
            temperature: reading.temperature,
            pressure: reading.pressure,
            humidity: reading.relative_humidity,
            gas_resistance: reading.gas_resistance,
        }
    }

    pub fn now(reading: &PhysicalReading) -> Self {
        Self::new(Local::now(), reading)
    }
}

impl fmt::Display for ReadingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} T: {:.2} degC, P: {:.2} hPa, H: {:.2} %rH, G: {} Ohms",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.temperature,
            self.pressure,
            self.humidity,
            self.gas_resistance
        )
    }
}

/// Persistence collaborator.
pub trait ReadingSink {
    fn persist(&mut self, record: &ReadingRecord) -> Result<(), SinkError>;
}

impl<S: ReadingSink + ?Sized> ReadingSink for &mut S {
    fn persist(&mut self, record: &ReadingRecord) -> Result<(), SinkError> {
        S::persist(self, record)
    }
}

/// Keeps every record in memory.
impl ReadingSink for Vec<ReadingRecord> {
    fn persist(&mut self, record: &ReadingRecord) -> Result<(), SinkError> {
        self.push(record.clone());
        Ok(())
    }
}

/// Prints one line per record.
pub struct ConsoleSink<W: Write = io::Stdout> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReadingSink for ConsoleSink<W> {
    fn persist(&mut self, record: &ReadingRecord) -> Result<(), SinkError> {
        writeln!(self.out, "{}", record)?;
        self.out.flush()?;
        Ok(())
    }
}
