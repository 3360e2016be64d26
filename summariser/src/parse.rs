use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use regex::bytes::Regex;

use crate::event::{EventKind, LogEvent};

/// `<timestamp> <+|-> <size> ...`, anything after the size is ignored.
static RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+([+-])\s+(\d+)").expect("record pattern is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to open link log {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Open a link log for reading. Each call reads the file again from the start.
pub fn parse(path: &Path) -> Result<LogEvents<BufReader<File>>, ParseError> {
    let file = File::open(path).map_err(|source| ParseError::Open {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_reader(BufReader::new(file)))
}

pub fn parse_reader<R: BufRead>(reader: R) -> LogEvents<R> {
    LogEvents {
        reader,
        line: Vec::new(),
        line_number: 0,
    }
}

/// Lazily parsed records of a link log, in file order.
///
/// Lines that are not records, such as the emulator's header comments or diagnostics that are not
/// valid UTF-8, are skipped. An I/O error ends the sequence.
pub struct LogEvents<R> {
    reader: R,
    line: Vec<u8>,
    line_number: usize,
}

impl<R: BufRead> Iterator for LogEvents<R> {
    type Item = LogEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_number += 1;
                    if let Some(event) = parse_line(&self.line) {
                        return Some(event);
                    }
                    log::trace!(
                        "Skipping line {}: {}",
                        self.line_number,
                        String::from_utf8_lossy(&self.line).trim_end()
                    );
                }
                Err(e) => {
                    log::warn!("Stopped reading link log after line {}: {e}", self.line_number);
                    return None;
                }
            }
        }
    }
}

fn parse_line(line: &[u8]) -> Option<LogEvent> {
    let captures = RECORD.captures(line)?;
    let timestamp_ms = number(&captures[1])?;
    let kind = match &captures[2] {
        b"+" => EventKind::Sent,
        _ => EventKind::Acked,
    };
    let size = number(&captures[3])?;

    Some(LogEvent {
        timestamp_ms,
        kind,
        size,
    })
}

fn number(digits: &[u8]) -> Option<u64> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}
