//! Session configuration: the immutable inputs of one analysis run.
//!
//! [`RawInputs`] is what the outer surface (CLI flags, environment, config
//! file) collected; [`SessionConfig::resolve`] validates it and loads the
//! prompt templates. Any problem is reported as
//! [`SessionError::ConfigurationInvalid`] before a session is attempted.

pub mod prompts;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SessionError;

pub use prompts::{CONTEXT_FILE_PLACEHOLDER, PromptSet};

/// Idle interval used when nothing else is configured.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Agent binary looked up when nothing else is configured.
pub const DEFAULT_AGENT_BINARY: &str = "claude";

/// Directory holding the agent CLI inside the published container image.
pub const CONTAINER_BIN_DIR: &str = "/agent/node_modules/.bin";

// -----------------------------------------------------------------------
// Capabilities
// -----------------------------------------------------------------------

/// A tool the agent is permitted to use inside the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    ReadFile,
    WriteFile,
    ListFiles,
    SearchContent,
    RunCommand,
    MultiEdit,
    Edit,
    TodoList,
}

impl Capability {
    /// The allow-list granted to every session.
    pub const DEFAULT: [Capability; 8] = [
        Capability::ReadFile,
        Capability::WriteFile,
        Capability::ListFiles,
        Capability::SearchContent,
        Capability::RunCommand,
        Capability::MultiEdit,
        Capability::Edit,
        Capability::TodoList,
    ];

    /// Tool name as understood by the agent CLI.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::ReadFile => "Read",
            Self::WriteFile => "Write",
            Self::ListFiles => "Glob",
            Self::SearchContent => "Grep",
            Self::RunCommand => "Bash",
            Self::MultiEdit => "MultiEdit",
            Self::Edit => "Edit",
            Self::TodoList => "TodoWrite",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::DEFAULT.into_iter().find(|c| c.tool_name() == name)
    }
}

/// How the agent treats file modifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionMode {
    #[default]
    AcceptEdits,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AcceptEdits => "acceptEdits",
        }
    }
}

// -----------------------------------------------------------------------
// Context file
// -----------------------------------------------------------------------

/// The context document the agent is asked to produce or improve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextFile {
    Claude,
    Agents,
}

impl ContextFile {
    /// Parse a user-supplied name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "CLAUDE.MD" => Some(Self::Claude),
            "AGENTS.MD" => Some(Self::Agents),
            _ => None,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Claude => "CLAUDE.md",
            Self::Agents => "AGENTS.md",
        }
    }
}

impl fmt::Display for ContextFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

// -----------------------------------------------------------------------
// Credentials
// -----------------------------------------------------------------------

/// Agent credential. `Debug` never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

// -----------------------------------------------------------------------
// Raw inputs
// -----------------------------------------------------------------------

/// Unvalidated inputs, already merged from flags, environment and config file.
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub api_key: Option<String>,
    pub context_file: Option<String>,
    /// Defaults to the process working directory.
    pub workspace: Option<PathBuf>,
    /// CI step-summary destination; selects platform-summary emission.
    pub summary_destination: Option<PathBuf>,
    pub prompts_dir: Option<PathBuf>,
    pub agent_binary: Option<String>,
    /// Directories searched for the agent binary before `PATH`.
    pub search_paths: Option<Vec<PathBuf>>,
    pub idle_timeout: Option<Duration>,
}

// -----------------------------------------------------------------------
// Validated configuration
// -----------------------------------------------------------------------

/// Validated, immutable configuration for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub workspace: PathBuf,
    pub context_file: ContextFile,
    pub capabilities: Vec<Capability>,
    pub permission_mode: PermissionMode,
    pub system_prompt: String,
    /// Task instructions with the context filename already substituted.
    pub task_prompt: String,
    pub api_key: ApiKey,
    pub agent_binary: String,
    pub search_paths: Vec<PathBuf>,
    pub idle_timeout: Duration,
    pub summary_destination: Option<PathBuf>,
}

impl SessionConfig {
    /// Validate raw inputs and load the prompt templates.
    pub fn resolve(inputs: RawInputs) -> Result<Self, SessionError> {
        let api_key = inputs
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SessionError::config("an agent API key is required (CLAUDE_API_KEY)"))?;

        let context_raw = inputs
            .context_file
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                SessionError::config("a context file is required (CONTEXT_FILE): CLAUDE.md or AGENTS.md")
            })?;
        let context_file = ContextFile::parse(&context_raw).ok_or_else(|| {
            SessionError::config(format!(
                "unsupported context file {context_raw:?} (expected CLAUDE.md or AGENTS.md)"
            ))
        })?;

        let workspace = match inputs.workspace {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(|e| {
                SessionError::config(format!("cannot determine working directory: {e}"))
            })?,
        };
        if !workspace.is_dir() {
            return Err(SessionError::config(format!(
                "workspace {} is not a directory",
                workspace.display()
            )));
        }

        let prompts = match &inputs.prompts_dir {
            Some(dir) => PromptSet::load(dir)?,
            None => PromptSet::embedded(),
        };

        let idle_timeout = inputs.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT);
        if idle_timeout.is_zero() {
            return Err(SessionError::config("idle timeout must be greater than zero"));
        }

        let search_paths = inputs
            .search_paths
            .unwrap_or_else(|| default_search_paths(&workspace));

        Ok(Self {
            task_prompt: prompts.render_task(context_file),
            system_prompt: prompts.system,
            workspace,
            context_file,
            capabilities: Capability::DEFAULT.to_vec(),
            permission_mode: PermissionMode::AcceptEdits,
            api_key: ApiKey::new(api_key),
            agent_binary: inputs
                .agent_binary
                .unwrap_or_else(|| DEFAULT_AGENT_BINARY.to_string()),
            search_paths,
            idle_timeout,
            summary_destination: inputs.summary_destination,
        })
    }

    /// Comma-separated tool allow-list for the agent CLI.
    pub fn allowed_tools(&self) -> String {
        self.capabilities
            .iter()
            .map(|c| c.tool_name())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// An existing context document in the workspace, in canonical or
    /// lowercase spelling.
    pub fn existing_context_file(&self) -> Option<PathBuf> {
        let name = self.context_file.file_name();
        [name.to_string(), name.to_lowercase()]
            .into_iter()
            .map(|n| self.workspace.join(n))
            .find(|p| p.is_file())
    }
}

fn default_search_paths(workspace: &Path) -> Vec<PathBuf> {
    vec![
        PathBuf::from(CONTAINER_BIN_DIR),
        workspace.join("node_modules").join(".bin"),
    ]
}
