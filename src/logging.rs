//
// logging.rs
// dicom-batch
//
// Tracing setup: compact console output plus an append-only log file that can be re-pointed at runtime.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Name of the log file created inside the chosen log folder.
pub const LOG_FILE_NAME: &str = "dicom_batch.log";

/// Shared handle to the current log file. Writes are dropped while no folder is set.
#[derive(Clone, Default)]
pub struct LogSink {
    file: Arc<Mutex<Option<File>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or creates) `<folder>/dicom_batch.log` in append mode and routes file output there.
    pub fn redirect(&self, folder: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(folder)?;
        let path = folder.join(LOG_FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        *self.lock() = Some(file);
        Ok(path)
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        // A panic while holding the lock leaves the file handle usable.
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct LogSinkWriter<'a> {
    guard: MutexGuard<'a, Option<File>>,
}

impl Write for LogSinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.guard.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.guard.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogSinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LogSinkWriter { guard: self.lock() }
    }
}

/// Builds the subscriber: `RUST_LOG` filter (default `info`), stderr output and the file sink.
pub fn subscriber(sink: LogSink) -> impl Subscriber + Send + Sync {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .compact(),
        )
        .with(
            fmt::layer()
                .with_writer(sink)
                .with_ansi(false)
                .with_target(false),
        )
}

/// Installs the global subscriber. Calling it twice keeps the first one.
pub fn init(sink: LogSink) {
    let _ = tracing::subscriber::set_global_default(subscriber(sink));
}
