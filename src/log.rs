//! Append-only JSONL event log.
//!
//! One event per line, `\n` terminated. Appends write every record and then
//! fsync before returning. Reads tolerate exactly one kind of damage: a
//! final record cut short by a crash (no trailing newline and not valid
//! JSON) is dropped. Anything else that fails to parse is corruption.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::event::Event;

/// Largest single record accepted on read (10 MiB)
pub const MAX_RECORD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    max_record_bytes: usize,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_record_bytes: MAX_RECORD_BYTES,
        }
    }

    pub fn with_max_record_bytes(mut self, max_record_bytes: usize) -> Self {
        self.max_record_bytes = max_record_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event in file order. A missing file is an empty history.
    pub fn read(&self) -> Result<Vec<Event>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut reader = BufReader::new(file);

        let mut events = Vec::new();
        // (line, record, record ended with its own newline)
        let mut pending: Option<(usize, Vec<u8>, bool)> = None;
        let mut line_no = 0usize;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = (&mut reader)
                .take(self.max_record_bytes as u64 + 2)
                .read_until(b'\n', &mut buf)?;
            if read == 0 {
                break;
            }
            line_no += 1;

            let record = trim_record(&buf);
            if record.len() > self.max_record_bytes {
                return Err(self.corruption(
                    line_no,
                    format!("record exceeds {} bytes", self.max_record_bytes),
                ));
            }
            if record.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let terminated = buf.ends_with(b"\n");
            let previous = pending.replace((line_no, record.to_vec(), terminated));
            if let Some((prev_line, prev, _)) = previous {
                events.push(self.parse_record(prev_line, &prev)?);
            }
        }

        if let Some((last_line, last, terminated)) = pending {
            match self.parse_record(last_line, &last) {
                Ok(event) => events.push(event),
                Err(err) if !terminated => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = last_line,
                        error = %err,
                        "dropping truncated final record"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(events)
    }

    /// Append events as one batch, then flush to stable storage.
    pub fn append(&self, events: &[Event]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut records = Vec::with_capacity(events.len());
        for event in events {
            let mut line = serde_json::to_vec(event)?;
            line.push(b'\n');
            records.push(line);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for record in &records {
            write_record(&mut file, record)?;
        }
        file.sync_data()?;
        Ok(())
    }

    fn parse_record(&self, line: usize, record: &[u8]) -> Result<Event> {
        serde_json::from_slice(record).map_err(|err| self.corruption(line, err.to_string()))
    }

    fn corruption(&self, line: usize, reason: String) -> Error {
        Error::Corruption {
            path: self.path.clone(),
            line,
            reason,
        }
    }
}

fn trim_record(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// Write the whole record, retrying short writes.
fn write_record<W: Write>(writer: &mut W, mut record: &[u8]) -> io::Result<()> {
    while !record.is_empty() {
        match writer.write(record) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write event record",
                ))
            }
            Ok(n) => record = &record[n..],
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
