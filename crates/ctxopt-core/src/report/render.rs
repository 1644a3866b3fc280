//! Markdown rendering of a session outcome.

use std::fmt::Write as _;

use crate::config::ContextFile;
use crate::session::SessionOutcome;

const ISSUES_HEADING: &str = "Issues & Recommendations";

/// Agent text split into its prose and its final fenced document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    /// Text outside the last fenced block.
    pub issues: String,
    /// Body of the last fenced block, or the whole text if it has none.
    pub document: String,
}

/// Split agent text at its last complete fenced block.
pub fn split_report(text: &str) -> SplitReport {
    let lines: Vec<&str> = text.lines().collect();
    let Some((open, close)) = last_fenced_block(&lines) else {
        return SplitReport {
            issues: String::new(),
            document: text.trim().to_string(),
        };
    };

    let mut outside: Vec<&str> = lines[..open].to_vec();
    outside.extend_from_slice(&lines[close + 1..]);
    SplitReport {
        issues: strip_issues_heading(outside.join("\n").trim()),
        document: lines[open + 1..close].join("\n").trim_end().to_string(),
    }
}

/// Line indices of the opening and closing fence of the last block.
fn last_fenced_block(lines: &[&str]) -> Option<(usize, usize)> {
    let mut last = None;
    let mut open: Option<(usize, usize)> = None;
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        let run = leading_backticks(trimmed);
        match open {
            None if run >= 3 => open = Some((idx, run)),
            Some((start, width)) if run >= width && trimmed[run..].trim().is_empty() => {
                last = Some((start, idx));
                open = None;
            }
            _ => {}
        }
    }
    last
}

fn leading_backticks(s: &str) -> usize {
    s.bytes().take_while(|b| *b == b'`').count()
}

/// Drop a leading "Issues & Recommendations" heading the agent wrote itself.
fn strip_issues_heading(text: &str) -> String {
    let mut lines = text.lines();
    match lines.next() {
        Some(first)
            if first.trim_start().starts_with('#')
                && first.to_lowercase().contains("issues") =>
        {
            lines.collect::<Vec<_>>().join("\n").trim().to_string()
        }
        _ => text.to_string(),
    }
}

/// Fence wide enough to wrap `content`: one backtick longer than its longest
/// backtick run, and at least three.
pub fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut current = 0;
    for c in content.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

/// Render the full report document for `outcome`.
pub fn render_document(outcome: &SessionOutcome, context_file: ContextFile) -> String {
    let text = outcome.report().unwrap_or_default();
    let split = split_report(text);
    let summary = outcome.summary();

    let mut out = format!("# AI Context Recommendations: {context_file}\n\n");

    let _ = writeln!(out, "## {ISSUES_HEADING}\n");
    if split.issues.is_empty() {
        out.push_str("_No separate recommendations were provided._\n\n");
    } else {
        let _ = writeln!(out, "{}\n", split.issues);
    }

    let _ = writeln!(out, "## Recommended {context_file}\n");
    if split.document.is_empty() {
        out.push_str("_The agent produced no document._\n\n");
    } else {
        let fence = fence_for(&split.document);
        let _ = writeln!(out, "{fence}markdown\n{}\n{fence}\n", split.document);
    }

    let _ = writeln!(out, "## Analysis Statistics\n");
    let _ = writeln!(out, "{}", summary.render_statistics());

    if let SessionOutcome::Failure { error, .. } = outcome {
        let c = &summary.counters;
        let _ = write!(
            out,
            "\n## Run Failed (partial report)\n\n\
             - Error kind: {}\n\
             - Message: {}\n\
             - Progress at failure: {} tool invocations, {} tool results ({} failed), \
             {} reasoning blocks, {} lifecycle events, {} unrecognised\n",
            error.kind(),
            error,
            c.tool_invocations,
            c.tool_results,
            c.tool_failures,
            c.reasoning_blocks,
            c.lifecycle_events,
            c.other_activity,
        );
    }
    out
}
