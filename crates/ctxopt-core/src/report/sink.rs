//! Output destinations for the rendered report.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::config::SessionConfig;

/// Prefix of locally written report files.
pub const LOCAL_REPORT_PREFIX: &str = "AI_CONTEXT_RECOMMENDATIONS_";

/// Highest collision suffix tried before giving up.
const MAX_COLLISION_SUFFIX: u32 = 1000;

/// A destination that accepts one rendered document per call.
pub trait ReportSink: Send + Sync {
    /// Human-readable destination, used in diagnostics.
    fn describe(&self) -> String;

    /// Write `document`, returning where it ended up.
    fn write(&self, document: &str) -> io::Result<PathBuf>;
}

// Compile-time assertion: ReportSink must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ReportSink) {}
};

/// Choose the sink once from configuration: the CI step summary when a
/// destination is configured, otherwise a timestamped file in the workspace.
pub fn select_sink(config: &SessionConfig) -> Box<dyn ReportSink> {
    match &config.summary_destination {
        Some(path) => Box::new(StepSummarySink::new(path)),
        None => Box::new(LocalFileSink::new(&config.workspace)),
    }
}

/// Appends to a CI step-summary file. Earlier content is never truncated.
#[derive(Debug, Clone)]
pub struct StepSummarySink {
    path: PathBuf,
}

impl StepSummarySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for StepSummarySink {
    fn describe(&self) -> String {
        format!("step summary {}", self.path.display())
    }

    fn write(&self, document: &str) -> io::Result<PathBuf> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        file.write_all(document.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(self.path.clone())
    }
}

/// Writes a new `AI_CONTEXT_RECOMMENDATIONS_<timestamp>.md` file, adding
/// `_2`, `_3`, ... when the name is already taken.
#[derive(Debug, Clone)]
pub struct LocalFileSink {
    dir: PathBuf,
    now: fn() -> NaiveDateTime,
}

impl LocalFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, || Local::now().naive_local())
    }

    /// Use a fixed clock (tests).
    pub fn with_clock(dir: impl Into<PathBuf>, now: fn() -> NaiveDateTime) -> Self {
        Self {
            dir: dir.into(),
            now,
        }
    }

    fn candidate(&self, stem: &str, attempt: u32) -> PathBuf {
        let name = if attempt == 1 {
            format!("{stem}.md")
        } else {
            format!("{stem}_{attempt}.md")
        };
        self.dir.join(name)
    }
}

impl ReportSink for LocalFileSink {
    fn describe(&self) -> String {
        format!("local file in {}", self.dir.display())
    }

    fn write(&self, document: &str) -> io::Result<PathBuf> {
        let stem = format!(
            "{LOCAL_REPORT_PREFIX}{}",
            (self.now)().format("%Y%m%d%H%M%S")
        );
        for attempt in 1..=MAX_COLLISION_SUFFIX {
            let path = self.candidate(&stem, attempt);
            match create_new(&path) {
                Ok(mut file) => {
                    file.write_all(document.as_bytes())?;
                    file.flush()?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free report name for {stem} in {}", self.dir.display()),
        ))
    }
}

fn create_new(path: &Path) -> io::Result<std::fs::File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}
