//! Human-facing progress output.
//!
//! Diagnostics go through `tracing`; the lines printed here are the
//! operator-visible transcript of a run and always go to stdout.

use std::fmt::Display;

/// Print a single `[YYYY-MM-DD HH:MM:SS] message` line to stdout.
pub fn line(message: impl Display) {
    println!("{}", stamp(message));
}

/// Print a timestamped line to stderr.
pub fn error(message: impl Display) {
    eprintln!("{}", stamp(message));
}

fn stamp(message: impl Display) -> String {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{now}] {message}")
}

/// Horizontal rule used to frame the live activity section.
pub fn rule() {
    line("-".repeat(78));
}
