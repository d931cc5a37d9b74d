//
// batch.rs
// dicom-batch
//
// Sequential batch driver: walks the input tree, runs one processor per file, logs failures and reports progress.
//
// Thales Matheus Mendonça Santos - November 2025

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local, TimeDelta};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::settings::FolderRole;
use crate::walker::{DicomWalker, WalkedFile};

/// Errors that stop a run before any file is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("no {0} folder selected")]
    MissingFolder(FolderRole),

    #[error("input folder {0:?} does not exist or is not a directory")]
    InputNotFound(PathBuf),
}

/// One per-file step of a batch (anonymize, export image, dump info).
pub trait FileProcessor {
    /// Human-readable operation name used in log lines.
    fn name(&self) -> &str;

    /// Settings role holding this operation's output root.
    fn output_role(&self) -> FolderRole;

    /// Processes a single file and returns the written artifact(s).
    fn process(&self, file: &WalkedFile, output_root: &Path) -> Result<Vec<PathBuf>>;
}

/// Receives a notification after every file, success or not.
pub trait ProgressReporter {
    fn report(&mut self, current: usize, total: usize);
}

impl<F: FnMut(usize, usize)> ProgressReporter for F {
    fn report(&mut self, current: usize, total: usize) {
        self(current, total)
    }
}

/// Reporter that discards notifications.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _current: usize, _total: usize) {}
}

/// Renders `Progress: NN% complete` on a single terminal line.
pub struct ConsoleProgress<W: Write> {
    out: W,
}

impl ConsoleProgress<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self {
            out: std::io::stderr(),
        }
    }
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ProgressReporter for ConsoleProgress<W> {
    fn report(&mut self, current: usize, total: usize) {
        let _ = write!(self.out, "\rProgress: {}% complete", percent(current, total));
        if current >= total {
            let _ = writeln!(self.out);
        }
        let _ = self.out.flush();
    }
}

pub fn percent(current: usize, total: usize) -> usize {
    if total == 0 {
        100
    } else {
        current * 100 / total
    }
}

/// Result of processing one file.
#[derive(Debug)]
pub enum FileOutcome {
    Written(Vec<PathBuf>),
    Failed(String),
}

#[derive(Debug)]
pub struct FileReport {
    pub file: WalkedFile,
    pub outcome: FileOutcome,
}

/// What a completed run did. Failures are counted here and detailed in the log.
#[derive(Debug)]
pub struct RunSummary {
    pub operation: String,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub reports: Vec<FileReport>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn succeeded(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, FileOutcome::Written(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn elapsed(&self) -> TimeDelta {
        self.finished - self.started
    }
}

/// Checks the required folders, then processes every file under `input` in walk order.
///
/// Individual file failures are logged and recorded in the summary; only missing folders
/// abort the run.
pub fn run<P: FileProcessor + ?Sized>(
    processor: &P,
    input: Option<&Path>,
    output: Option<&Path>,
    progress: &mut dyn ProgressReporter,
) -> Result<RunSummary, BatchError> {
    let (input, output) = match (input, output) {
        (Some(input), Some(output)) => (input, output),
        (None, _) => return Err(abort(BatchError::MissingFolder(FolderRole::Input))),
        (_, None) => {
            return Err(abort(BatchError::MissingFolder(processor.output_role())));
        }
    };
    if !input.is_dir() {
        return Err(abort(BatchError::InputNotFound(input.to_path_buf())));
    }

    info!("{} started.", processor.name());
    let started = Local::now();

    let files: Vec<WalkedFile> = DicomWalker::new(input).files().collect();
    let total = files.len();
    info!("Found {} DICOM file(s) in {:?}.", total, input);

    let mut reports = Vec::with_capacity(total);
    for (index, file) in files.into_iter().enumerate() {
        let outcome = match processor.process(&file, output) {
            Ok(paths) => {
                info!(
                    "{}: {} -> {}",
                    processor.name(),
                    file.display_name(),
                    display_paths(&paths)
                );
                FileOutcome::Written(paths)
            }
            Err(err) => {
                error!("Error processing file {}: {:#}", file.display_name(), err);
                FileOutcome::Failed(format!("{:#}", err))
            }
        };
        reports.push(FileReport { file, outcome });
        progress.report(index + 1, total);
    }

    let finished = Local::now();
    let summary = RunSummary {
        operation: processor.name().to_string(),
        started,
        finished,
        reports,
    };
    info!(
        "{} finished. Elapsed: {}",
        processor.name(),
        format_elapsed(summary.elapsed())
    );

    Ok(summary)
}

fn abort(err: BatchError) -> BatchError {
    warn!("Run not started: {}", err);
    err
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `H:MM:SS.mmm`
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let millis = elapsed.num_milliseconds().max(0);
    let secs = millis / 1000;
    format!(
        "{}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        millis % 1000
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::fs;
    use tempfile::tempdir;

    /// Copies the file, failing for names containing "bad".
    struct CopyProcessor;

    impl FileProcessor for CopyProcessor {
        fn name(&self) -> &str {
            "copy"
        }

        fn output_role(&self) -> FolderRole {
            FolderRole::InfoOutput
        }

        fn process(&self, file: &WalkedFile, output_root: &Path) -> Result<Vec<PathBuf>> {
            if file.display_name().contains("bad") {
                bail!("corrupt file");
            }
            let target = file.mirrored_path(output_root, &file.display_name());
            fs::create_dir_all(target.parent().unwrap())?;
            fs::copy(&file.path, &target)?;
            Ok(vec![target])
        }
    }

    #[test]
    fn missing_folders_abort_before_any_work() {
        let dir = tempdir().unwrap();
        let mut calls = 0;
        let mut count = |_: usize, _: usize| calls += 1;

        let err = run(&CopyProcessor, None, Some(dir.path()), &mut count).unwrap_err();
        assert_eq!(err, BatchError::MissingFolder(FolderRole::Input));

        let err = run(&CopyProcessor, Some(dir.path()), None, &mut count).unwrap_err();
        assert_eq!(err, BatchError::MissingFolder(FolderRole::InfoOutput));

        let missing = dir.path().join("nope");
        let err = run(&CopyProcessor, Some(&missing), Some(dir.path()), &mut count).unwrap_err();
        assert_eq!(err, BatchError::InputNotFound(missing));
        assert_eq!(calls, 0);
    }

    #[test]
    fn failures_do_not_stop_the_batch() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        fs::create_dir_all(input.path().join("sub")).unwrap();
        fs::write(input.path().join("a.dcm"), b"a").unwrap();
        fs::write(input.path().join("sub/bad.dcm"), b"b").unwrap();
        fs::write(input.path().join("sub/c.dcm"), b"c").unwrap();

        let mut seen = Vec::new();
        let mut record = |current: usize, total: usize| seen.push((current, total));
        let summary = run(
            &CopyProcessor,
            Some(input.path()),
            Some(output.path()),
            &mut record,
        )
        .unwrap();

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
        assert!(output.path().join("a.dcm").exists());
        assert!(output.path().join("sub/c.dcm").exists());
        assert!(!output.path().join("sub/bad.dcm").exists());
    }

    #[test]
    fn console_progress_prints_percentages() {
        let mut buffer = Vec::new();
        {
            let mut progress = ConsoleProgress::new(&mut buffer);
            progress.report(1, 3);
            progress.report(3, 3);
        }
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Progress: 33% complete"));
        assert!(text.ends_with("Progress: 100% complete\n"));
    }

    #[test]
    fn elapsed_is_formatted_like_a_clock() {
        assert_eq!(format_elapsed(TimeDelta::milliseconds(3_723_045)), "1:02:03.045");
        assert_eq!(percent(0, 0), 100);
    }
}
