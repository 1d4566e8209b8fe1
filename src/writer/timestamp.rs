use super::LogWriter;
use chrono::{DateTime, Utc};
use std::io;
use std::sync::Arc;

/// `Jan 02 15:04:05.000`, always in UTC.
pub const LOG_TIMESTAMP_FORMAT: &str = "%b %d %H:%M:%S%.3f";

const SEPARATOR: &str = " - ";

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Prefixes every entry with a UTC timestamp.
///
/// The timestamp is written once per call, not once per line: the structured
/// logger hands over each entry whole, so embedded line breaks belong to the
/// same entry.
pub struct TimestampPrepender<W> {
    inner: W,
    clock: Clock,
}

impl<W: LogWriter> TimestampPrepender<W> {
    pub fn new(inner: W) -> Self {
        Self::with_clock(inner, Arc::new(Utc::now))
    }

    pub fn with_clock(inner: W, clock: Clock) -> Self {
        Self { inner, clock }
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    fn stamp(&self) -> String {
        format!("{}{SEPARATOR}", (self.clock)().format(LOG_TIMESTAMP_FORMAT))
    }
}

/// The reported length covers the caller's bytes only, never the timestamp.
impl<W: LogWriter> LogWriter for TimestampPrepender<W> {
    fn write(&self, entry: &[u8]) -> io::Result<usize> {
        let stamp = self.stamp();
        self.inner.write_parts(&[stamp.as_bytes(), entry])?;
        Ok(entry.len())
    }

    fn write_parts(&self, parts: &[&[u8]]) -> io::Result<usize> {
        let stamp = self.stamp();
        let mut all = Vec::with_capacity(parts.len() + 1);
        all.push(stamp.as_bytes());
        all.extend_from_slice(parts);
        self.inner.write_parts(&all)?;
        Ok(parts.iter().map(|p| p.len()).sum())
    }
}

impl<W: std::fmt::Debug> std::fmt::Debug for TimestampPrepender<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampPrepender")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::testing::RecordingWriter;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    fn fixed_clock() -> Clock {
        Arc::new(|| {
            Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5)
                .single()
                .expect("valid fixed time")
        })
    }

    #[test]
    fn test_formats_timestamp_and_separator() {
        let recorder = Arc::new(RecordingWriter::default());
        let writer = TimestampPrepender::with_clock(recorder.clone(), fixed_clock());

        writer.write(b"hello\n").unwrap();

        assert_eq!(recorder.entry_strings(), vec!["Jan 02 15:04:05.000 - hello\n"]);
    }

    #[test]
    fn test_reports_entry_length_without_timestamp() {
        let recorder = Arc::new(RecordingWriter::default());
        let writer = TimestampPrepender::with_clock(recorder.clone(), fixed_clock());

        assert_eq!(writer.write(b"abc").unwrap(), 3);
        assert_eq!(writer.write_parts(&[b"ab", b"cde"]).unwrap(), 5);
        assert_eq!(
            recorder.entry_strings(),
            vec!["Jan 02 15:04:05.000 - abc", "Jan 02 15:04:05.000 - abcde"]
        );
    }

    #[test]
    fn test_backs_io_write_without_overrunning_buffer() {
        use std::io::Write;

        struct Adapter<W>(W);

        impl<W: LogWriter> Write for Adapter<W> {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.write(buf)
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let recorder = Arc::new(RecordingWriter::default());
        let mut adapter = Adapter(TimestampPrepender::with_clock(recorder.clone(), fixed_clock()));

        adapter.write_all(b"abc").unwrap();

        assert_eq!(recorder.entries().len(), 1);
    }

    #[test]
    fn test_one_timestamp_for_multiline_entry() {
        let recorder = Arc::new(RecordingWriter::default());
        let writer = TimestampPrepender::with_clock(recorder.clone(), fixed_clock());
        let entry = b"panic: boom\n  at frame one\n  at frame two\n";

        writer.write(entry).unwrap();

        let written = recorder.entries();
        assert_eq!(written.len(), 1);
        let text = String::from_utf8(written[0].clone()).unwrap();
        assert_eq!(text.matches("15:04:05.000").count(), 1);
        let suffix = text.split_once(" - ").unwrap().1;
        assert_eq!(suffix.as_bytes(), entry);
    }

    #[test]
    fn test_millisecond_precision() {
        let recorder = Arc::new(RecordingWriter::default());
        let clock: Clock = Arc::new(|| {
            Utc.with_ymd_and_hms(2024, 11, 30, 23, 59, 58)
                .single()
                .expect("valid fixed time")
                + chrono::Duration::milliseconds(7)
        });
        let writer = TimestampPrepender::with_clock(recorder.clone(), clock);

        writer.write(b"x").unwrap();

        assert_eq!(recorder.entry_strings(), vec!["Nov 30 23:59:58.007 - x"]);
    }

    /// Rejects the first part of every logical write.
    struct StampRejecting {
        delivered: Mutex<Vec<Vec<u8>>>,
    }

    impl LogWriter for StampRejecting {
        fn write(&self, entry: &[u8]) -> io::Result<usize> {
            self.delivered.lock().push(entry.to_vec());
            Ok(entry.len())
        }

        fn write_parts(&self, parts: &[&[u8]]) -> io::Result<usize> {
            for part in &parts[1..] {
                self.write(part)?;
            }
            Err(io::Error::other("timestamp rejected"))
        }
    }

    #[test]
    fn test_entry_written_even_when_timestamp_fails() {
        let inner = StampRejecting {
            delivered: Mutex::new(Vec::new()),
        };
        let writer = TimestampPrepender::with_clock(inner, fixed_clock());

        assert!(writer.write(b"visible").is_err());
        assert_eq!(writer.inner().delivered.lock().as_slice(), &[b"visible".to_vec()]);
    }
}
