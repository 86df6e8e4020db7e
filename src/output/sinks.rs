//! Byte sinks.

use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use super::LogSink;

/// Sink writing to any [`Write`] implementation.
///
/// Writes are serialized by a mutex so concurrent broadcasts never
/// interleave bytes within one buffer; each buffer is flushed immediately.
pub struct WriterSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl WriterSink {
    /// Creates a sink that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Creates a sink that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates a sink that writes to stderr.
    ///
    /// The usual choice in a relayed child: stdout may be the log channel.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink appending to the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn append_to_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(Box::new(file)))
    }
}

impl LogSink for WriterSink {
    fn write_log(&self, buf: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(buf)?;
        writer.flush()
    }
}

impl std::fmt::Debug for WriterSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterSink").finish_non_exhaustive()
    }
}

/// Placeholder sink. Reports itself absent and discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write_log(&self, _buf: &[u8]) -> std::io::Result<()> {
        Ok(())
    }

    fn is_absent(&self) -> bool {
        true
    }
}
