//! Destination writers composed by the pipeline.
//!
//! Every destination implements [`LogWriter`]. Writers take `&self` so that a
//! single instance can be shared between threads behind an `Arc`; each
//! implementation provides its own synchronisation.

pub mod fanout;
pub mod rotator;
pub mod timestamp;

pub use fanout::FanoutWriter;
pub use rotator::{RotatingFile, RotationPolicy};
pub use timestamp::{LOG_TIMESTAMP_FORMAT, TimestampPrepender};

use std::io::{self, Write};
use std::sync::Arc;

/// A destination for complete log entries.
///
/// One call to [`LogWriter::write`] carries exactly one entry, which may
/// contain embedded newlines.
pub trait LogWriter: Send + Sync {
    fn write(&self, entry: &[u8]) -> io::Result<usize>;

    /// Writes several slices as one logical write.
    ///
    /// A failed part does not stop the remaining parts; the first error is
    /// reported once all parts were attempted. Implementations that hold a lock
    /// should hold it across all parts so entries never interleave.
    fn write_parts(&self, parts: &[&[u8]]) -> io::Result<usize> {
        let mut written = 0;
        let mut first_err = None;
        for part in parts {
            match self.write(part) {
                Ok(n) => written += n,
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }
}

impl<W: LogWriter + ?Sized> LogWriter for Arc<W> {
    fn write(&self, entry: &[u8]) -> io::Result<usize> {
        (**self).write(entry)
    }

    fn write_parts(&self, parts: &[&[u8]]) -> io::Result<usize> {
        (**self).write_parts(parts)
    }
}

/// Writes every part with `write_all`, continuing past failures.
pub(crate) fn write_all_parts<W: Write>(out: &mut W, parts: &[&[u8]]) -> io::Result<usize> {
    let mut written = 0;
    let mut first_err = None;
    for part in parts {
        match out.write_all(part) {
            Ok(()) => written += part.len(),
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    if let Err(e) = out.flush() {
        first_err.get_or_insert(e);
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(written),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleStream {
    Stderr,
    Stdout,
}

/// Standard error or standard output.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleWriter {
    stream: ConsoleStream,
}

impl ConsoleWriter {
    pub fn stderr() -> Self {
        Self {
            stream: ConsoleStream::Stderr,
        }
    }

    pub fn stdout() -> Self {
        Self {
            stream: ConsoleStream::Stdout,
        }
    }
}

impl LogWriter for ConsoleWriter {
    fn write(&self, entry: &[u8]) -> io::Result<usize> {
        self.write_parts(&[entry])
    }

    fn write_parts(&self, parts: &[&[u8]]) -> io::Result<usize> {
        match self.stream {
            ConsoleStream::Stderr => write_all_parts(&mut io::stderr().lock(), parts),
            ConsoleStream::Stdout => write_all_parts(&mut io::stdout().lock(), parts),
        }
    }
}
