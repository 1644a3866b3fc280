//! Integration tests for the `ctxopt` binary.
//!
//! Each test runs the real binary with a scrubbed environment and an isolated
//! `XDG_CONFIG_HOME`, so neither the developer's config nor their API key
//! leaks in.

use std::path::Path;
use std::process::{Command, Output};

const SCRUBBED: &[&str] = &[
    "CLAUDE_API_KEY",
    "ANTHROPIC_API_KEY",
    "CONTEXT_FILE",
    "WORKSPACE_DIR",
    "GITHUB_STEP_SUMMARY",
    "CTXOPT_CLAUDE_BINARY",
    "CTXOPT_IDLE_TIMEOUT_SECS",
    "CTXOPT_PROMPTS_DIR",
];

fn ctxopt(config_home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ctxopt"));
    for name in SCRUBBED {
        cmd.env_remove(name);
    }
    cmd.env("XDG_CONFIG_HOME", config_home).env("RUST_LOG", "warn");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn missing_api_key_exits_with_configuration_error() {
    let home = tempfile::tempdir().unwrap();
    let workspace = tempfile::tempdir().unwrap();

    let output = ctxopt(home.path())
        .env("CONTEXT_FILE", "CLAUDE.md")
        .arg("--workspace")
        .arg(workspace.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("ConfigurationInvalid"), "{}", stderr(&output));
    assert_eq!(std::fs::read_dir(workspace.path()).unwrap().count(), 0);
}

#[test]
fn init_writes_config_and_refuses_to_overwrite() {
    let home = tempfile::tempdir().unwrap();

    let first = ctxopt(home.path()).arg("init").output().unwrap();
    assert!(first.status.success(), "{}", stderr(&first));
    let path = home.path().join("ctxopt").join("config.toml");
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("binary = \"claude\""));

    let second = ctxopt(home.path()).arg("init").output().unwrap();
    assert_eq!(second.status.code(), Some(1));
    assert!(stderr(&second).contains("already exists"));

    let forced = ctxopt(home.path()).args(["init", "--force"]).output().unwrap();
    assert!(forced.status.success());
}

#[test]
fn completions_print_a_script() {
    let home = tempfile::tempdir().unwrap();
    let output = ctxopt(home.path()).args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("ctxopt"));
}

#[cfg(unix)]
mod with_fake_agent {
    use super::*;
    use ctxopt_test_utils::{result_success, text, tool_use, write_fake_claude, write_streaming_claude};
    use serde_json::json;

    #[test]
    fn successful_run_writes_local_report() {
        let home = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let claude = write_streaming_claude(
            bin.path(),
            &[
                tool_use("t1", "Read", json!({ "file_path": "Cargo.toml" })),
                text("Reviewing the crate layout."),
                result_success("Keep it short\n\n```markdown\n# CLAUDE.md\n```"),
            ],
        );

        let output = ctxopt(home.path())
            .env("CLAUDE_API_KEY", "sk-test")
            .env("CONTEXT_FILE", "claude.md")
            .env("WORKSPACE_DIR", workspace.path())
            .env("CTXOPT_CLAUDE_BINARY", &claude)
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
        let out = stdout(&output);
        assert!(out.contains("Reading: Cargo.toml"), "{out}");
        assert!(out.contains("Analysis completed successfully"));

        let reports: Vec<_> = std::fs::read_dir(workspace.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.starts_with("AI_CONTEXT_RECOMMENDATIONS_"))
            .collect();
        assert_eq!(reports.len(), 1, "{reports:?}");
    }

    #[test]
    fn step_summary_destination_is_appended() {
        let home = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let summary = home.path().join("summary.md");
        std::fs::write(&summary, "## Earlier step\n").unwrap();
        let claude = write_streaming_claude(bin.path(), &[result_success("All good")]);

        let output = ctxopt(home.path())
            .env("CLAUDE_API_KEY", "sk-test")
            .env("CONTEXT_FILE", "AGENTS.md")
            .env("GITHUB_STEP_SUMMARY", &summary)
            .args(["run", "--workspace"])
            .arg(workspace.path())
            .arg("--claude-binary")
            .arg(&claude)
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
        let body = std::fs::read_to_string(&summary).unwrap();
        assert!(body.starts_with("## Earlier step\n"));
        assert!(body.contains("# AI Context Recommendations: AGENTS.md"));
        assert_eq!(std::fs::read_dir(workspace.path()).unwrap().count(), 0);
    }

    #[test]
    fn silent_agent_times_out() {
        let home = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let claude = write_fake_claude(bin.path(), "cat > /dev/null\nsleep 30");

        let output = ctxopt(home.path())
            .env("CLAUDE_API_KEY", "sk-test")
            .env("CONTEXT_FILE", "CLAUDE.md")
            .env("CTXOPT_IDLE_TIMEOUT_SECS", "1")
            .arg("--workspace")
            .arg(workspace.path())
            .arg("--claude-binary")
            .arg(&claude)
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1));
        assert!(stderr(&output).contains("Timeout"), "{}", stderr(&output));
    }

    /// Exited processes that linger as zombies count as dead.
    fn process_alive(pid: u32) -> bool {
        if Path::new("/proc/self").exists() {
            return match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
                Ok(stat) => !stat
                    .rsplit_once(')')
                    .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
                Err(_) => false,
            };
        }
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    #[test]
    fn agent_ignoring_sigterm_is_killed_before_exit() {
        let home = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let pid_file = bin.path().join("agent.pid");
        let claude = write_fake_claude(
            bin.path(),
            &format!(
                "trap '' TERM\ncat > /dev/null\necho $$ > {}\nexec sleep 60",
                pid_file.display()
            ),
        );

        let output = ctxopt(home.path())
            .env("CLAUDE_API_KEY", "sk-test")
            .env("CONTEXT_FILE", "CLAUDE.md")
            .env("CTXOPT_IDLE_TIMEOUT_SECS", "1")
            .arg("--workspace")
            .arg(workspace.path())
            .arg("--claude-binary")
            .arg(&claude)
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1));
        assert!(stderr(&output).contains("Timeout"), "{}", stderr(&output));
        let pid: u32 = std::fs::read_to_string(&pid_file)
            .expect("fake agent never wrote its pid")
            .trim()
            .parse()
            .unwrap();
        assert!(!process_alive(pid), "agent {pid} outlived ctxopt");
    }
}
