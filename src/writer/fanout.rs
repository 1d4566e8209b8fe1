use super::LogWriter;
use std::io;
use std::sync::Arc;

/// Duplicates each entry to all of its writers, even if some of them fail.
///
/// Failures of individual destinations are discarded: a clogged remote socket
/// or a full disk must never turn a log call into an error for the caller.
#[derive(Clone)]
pub struct FanoutWriter {
    writers: Vec<Arc<dyn LogWriter>>,
}

impl FanoutWriter {
    pub fn new(writers: Vec<Arc<dyn LogWriter>>) -> Self {
        Self { writers }
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl LogWriter for FanoutWriter {
    /// Never fails and always reports the full entry as written.
    fn write(&self, entry: &[u8]) -> io::Result<usize> {
        for writer in &self.writers {
            let _ = writer.write(entry);
        }
        Ok(entry.len())
    }

    fn write_parts(&self, parts: &[&[u8]]) -> io::Result<usize> {
        for writer in &self.writers {
            let _ = writer.write_parts(parts);
        }
        Ok(parts.iter().map(|p| p.len()).sum())
    }
}

impl std::fmt::Debug for FanoutWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutWriter")
            .field("writers", &self.writers.len())
            .finish()
    }
}
