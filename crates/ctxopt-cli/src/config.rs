//! Configuration file management for ctxopt.
//!
//! Provides a TOML config file at `~/.config/ctxopt/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ctxopt_core::config::{DEFAULT_AGENT_BINARY, DEFAULT_IDLE_TIMEOUT, RawInputs};

use crate::run_cmd::RunArgs;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub agent: AgentSection,
    pub prompts: PromptsSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Agent CLI name or path.
    pub binary: Option<String>,
    /// Directories searched for the agent CLI before `PATH`.
    pub search_paths: Option<Vec<PathBuf>>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsSection {
    /// Directory holding `system-prompt.txt` and `optimizer-prompt.txt`.
    pub dir: Option<PathBuf>,
}

impl ConfigFile {
    /// The file `ctxopt init` writes.
    pub fn starter() -> Self {
        Self {
            agent: AgentSection {
                binary: Some(DEFAULT_AGENT_BINARY.to_string()),
                search_paths: None,
                idle_timeout_secs: Some(DEFAULT_IDLE_TIMEOUT.as_secs()),
            },
            prompts: PromptsSection::default(),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the ctxopt config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/ctxopt` or `~/.config/ctxopt`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("ctxopt");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ctxopt")
}

/// Return the path to the ctxopt config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file. A missing file is `Ok(None)`; a malformed one is an
/// error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(path)
}

// -----------------------------------------------------------------------
// Resolution
// -----------------------------------------------------------------------

/// Resolve run inputs from flags, the process environment and the config
/// file.
pub fn resolve_inputs(args: &RunArgs, file: Option<&ConfigFile>) -> Result<RawInputs> {
    resolve_with(args, file, |name| std::env::var(name).ok())
}

/// Resolution chain with an injectable environment lookup.
///
/// - API key: `CLAUDE_API_KEY` > `ANTHROPIC_API_KEY`
/// - context file: `--context-file` > `CONTEXT_FILE`
/// - workspace: `--workspace` > `WORKSPACE_DIR` > current dir
/// - agent binary: `--claude-binary` > `CTXOPT_CLAUDE_BINARY` > `agent.binary`
/// - idle timeout: `--idle-timeout` > `CTXOPT_IDLE_TIMEOUT_SECS` > `agent.idle_timeout_secs`
/// - prompts: `--prompts-dir` > `CTXOPT_PROMPTS_DIR` > `prompts.dir`
pub fn resolve_with(
    args: &RunArgs,
    file: Option<&ConfigFile>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<RawInputs> {
    let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());
    let agent = file.map(|f| &f.agent);

    let idle_timeout_secs = match (args.idle_timeout, env("CTXOPT_IDLE_TIMEOUT_SECS")) {
        (Some(secs), _) => Some(secs),
        (None, Some(raw)) => Some(
            raw.trim()
                .parse::<u64>()
                .with_context(|| format!("CTXOPT_IDLE_TIMEOUT_SECS is not a number: {raw:?}"))?,
        ),
        (None, None) => agent.and_then(|a| a.idle_timeout_secs),
    };

    Ok(RawInputs {
        api_key: env("CLAUDE_API_KEY").or_else(|| env("ANTHROPIC_API_KEY")),
        context_file: args.context_file.clone().or_else(|| env("CONTEXT_FILE")),
        workspace: args
            .workspace
            .clone()
            .or_else(|| env("WORKSPACE_DIR").map(PathBuf::from)),
        summary_destination: env("GITHUB_STEP_SUMMARY").map(PathBuf::from),
        prompts_dir: args
            .prompts_dir
            .clone()
            .or_else(|| env("CTXOPT_PROMPTS_DIR").map(PathBuf::from))
            .or_else(|| file.and_then(|f| f.prompts.dir.clone())),
        agent_binary: args
            .claude_binary
            .clone()
            .or_else(|| env("CTXOPT_CLAUDE_BINARY"))
            .or_else(|| agent.and_then(|a| a.binary.clone())),
        search_paths: agent.and_then(|a| a.search_paths.clone()),
        idle_timeout: idle_timeout_secs.map(Duration::from_secs),
    })
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn file() -> ConfigFile {
        ConfigFile {
            agent: AgentSection {
                binary: Some("/opt/claude/bin/claude".into()),
                search_paths: Some(vec![PathBuf::from("/opt/claude/bin")]),
                idle_timeout_secs: Some(120),
            },
            prompts: PromptsSection {
                dir: Some(PathBuf::from("/etc/ctxopt/prompts")),
            },
        }
    }

    #[test]
    fn flags_override_env_and_file() {
        let args = RunArgs {
            workspace: Some(PathBuf::from("/flag/ws")),
            context_file: Some("AGENTS.md".into()),
            claude_binary: Some("flag-claude".into()),
            idle_timeout: Some(30),
            prompts_dir: Some(PathBuf::from("/flag/prompts")),
        };
        let env = env_of(&[
            ("WORKSPACE_DIR", "/env/ws"),
            ("CONTEXT_FILE", "CLAUDE.md"),
            ("CTXOPT_CLAUDE_BINARY", "env-claude"),
            ("CTXOPT_IDLE_TIMEOUT_SECS", "60"),
            ("CTXOPT_PROMPTS_DIR", "/env/prompts"),
        ]);

        let raw = resolve_with(&args, Some(&file()), env).unwrap();

        assert_eq!(raw.workspace, Some(PathBuf::from("/flag/ws")));
        assert_eq!(raw.context_file.as_deref(), Some("AGENTS.md"));
        assert_eq!(raw.agent_binary.as_deref(), Some("flag-claude"));
        assert_eq!(raw.idle_timeout, Some(Duration::from_secs(30)));
        assert_eq!(raw.prompts_dir, Some(PathBuf::from("/flag/prompts")));
    }

    #[test]
    fn env_overrides_file() {
        let env = env_of(&[
            ("CLAUDE_API_KEY", "sk-env"),
            ("CONTEXT_FILE", "CLAUDE.md"),
            ("CTXOPT_CLAUDE_BINARY", "env-claude"),
            ("CTXOPT_IDLE_TIMEOUT_SECS", " 60 "),
            ("GITHUB_STEP_SUMMARY", "/tmp/summary.md"),
        ]);

        let raw = resolve_with(&RunArgs::default(), Some(&file()), env).unwrap();

        assert_eq!(raw.api_key.as_deref(), Some("sk-env"));
        assert_eq!(raw.context_file.as_deref(), Some("CLAUDE.md"));
        assert_eq!(raw.agent_binary.as_deref(), Some("env-claude"));
        assert_eq!(raw.idle_timeout, Some(Duration::from_secs(60)));
        assert_eq!(raw.summary_destination, Some(PathBuf::from("/tmp/summary.md")));
        assert_eq!(raw.prompts_dir, Some(PathBuf::from("/etc/ctxopt/prompts")));
        assert_eq!(raw.search_paths, Some(vec![PathBuf::from("/opt/claude/bin")]));
    }

    #[test]
    fn file_values_apply_when_nothing_else_is_set() {
        let raw = resolve_with(&RunArgs::default(), Some(&file()), env_of(&[])).unwrap();
        assert_eq!(raw.agent_binary.as_deref(), Some("/opt/claude/bin/claude"));
        assert_eq!(raw.idle_timeout, Some(Duration::from_secs(120)));
        assert_eq!(raw.api_key, None);
        assert_eq!(raw.workspace, None);
    }

    #[test]
    fn anthropic_key_is_a_fallback() {
        let env = env_of(&[("ANTHROPIC_API_KEY", "sk-fallback"), ("CLAUDE_API_KEY", "  ")]);
        let raw = resolve_with(&RunArgs::default(), None, env).unwrap();
        assert_eq!(raw.api_key.as_deref(), Some("sk-fallback"));

        let env = env_of(&[("ANTHROPIC_API_KEY", "sk-fallback"), ("CLAUDE_API_KEY", "sk-main")]);
        let raw = resolve_with(&RunArgs::default(), None, env).unwrap();
        assert_eq!(raw.api_key.as_deref(), Some("sk-main"));
    }

    #[test]
    fn bad_idle_timeout_env_is_an_error() {
        let env = env_of(&[("CTXOPT_IDLE_TIMEOUT_SECS", "soon")]);
        let err = resolve_with(&RunArgs::default(), None, env).unwrap_err();
        assert!(err.to_string().contains("CTXOPT_IDLE_TIMEOUT_SECS"));
    }

    #[test]
    fn starter_config_roundtrips_through_toml() {
        let contents = toml::to_string_pretty(&ConfigFile::starter()).unwrap();
        assert!(contents.contains("[agent]"));
        assert!(contents.contains("idle_timeout_secs = 600"));

        let loaded: ConfigFile = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.agent.binary.as_deref(), Some("claude"));
        assert!(loaded.prompts.dir.is_none());
    }

    #[test]
    fn partial_file_uses_defaults() {
        let loaded: ConfigFile = toml::from_str("[prompts]\ndir = \"/p\"\n").unwrap();
        assert_eq!(loaded.prompts.dir, Some(PathBuf::from("/p")));
        assert!(loaded.agent.binary.is_none());
    }

    #[test]
    fn save_and_load_under_xdg_config_home() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let orig_xdg = std::env::var("XDG_CONFIG_HOME").ok();
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let missing = load_config();
        let saved = save_config(&ConfigFile::starter());
        let loaded = load_config();

        match orig_xdg {
            Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }

        assert!(missing.unwrap().is_none());
        assert_eq!(saved.unwrap(), tmp.path().join("ctxopt").join("config.toml"));
        let loaded = loaded.unwrap().expect("config file should exist");
        assert_eq!(loaded.agent.idle_timeout_secs, Some(600));
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let _lock = lock_env();
        let path = config_path();
        assert!(
            path.ends_with("ctxopt/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
