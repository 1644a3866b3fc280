//! Prompt templates handed to the agent.
//!
//! The templates are opaque text. The only processing is substituting the
//! context filename into the task template.

use std::path::Path;

use crate::config::ContextFile;
use crate::error::SessionError;

/// Placeholder in the task template replaced by the context filename.
pub const CONTEXT_FILE_PLACEHOLDER: &str = "{context_file}";

pub const SYSTEM_PROMPT_FILE: &str = "system-prompt.txt";
pub const TASK_PROMPT_FILE: &str = "optimizer-prompt.txt";

const EMBEDDED_SYSTEM: &str = include_str!("../../prompts/system-prompt.txt");
const EMBEDDED_TASK: &str = include_str!("../../prompts/optimizer-prompt.txt");

/// The system prompt and the task template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub system: String,
    pub task_template: String,
}

impl PromptSet {
    /// Templates compiled into the binary.
    pub fn embedded() -> Self {
        Self {
            system: EMBEDDED_SYSTEM.to_string(),
            task_template: EMBEDDED_TASK.to_string(),
        }
    }

    /// Load both templates from `dir`.
    pub fn load(dir: &Path) -> Result<Self, SessionError> {
        Ok(Self {
            system: read_template(dir, SYSTEM_PROMPT_FILE)?,
            task_template: read_template(dir, TASK_PROMPT_FILE)?,
        })
    }

    pub fn render_task(&self, context_file: ContextFile) -> String {
        self.task_template
            .replace(CONTEXT_FILE_PLACEHOLDER, context_file.file_name())
    }
}

fn read_template(dir: &Path, name: &str) -> Result<String, SessionError> {
    let path = dir.join(name);
    std::fs::read_to_string(&path).map_err(|e| {
        SessionError::config(format!("cannot read prompt template {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_task_template_has_placeholder() {
        let prompts = PromptSet::embedded();
        assert!(prompts.task_template.contains(CONTEXT_FILE_PLACEHOLDER));
        assert!(!prompts.system.trim().is_empty());
    }

    #[test]
    fn render_substitutes_every_occurrence() {
        let prompts = PromptSet {
            system: String::new(),
            task_template: "update {context_file}; keep {context_file} short".to_string(),
        };
        assert_eq!(
            prompts.render_task(ContextFile::Agents),
            "update AGENTS.md; keep AGENTS.md short"
        );
    }

    #[test]
    fn load_reads_both_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(SYSTEM_PROMPT_FILE), "sys").unwrap();
        std::fs::write(tmp.path().join(TASK_PROMPT_FILE), "task {context_file}").unwrap();

        let prompts = PromptSet::load(tmp.path()).unwrap();
        assert_eq!(prompts.system, "sys");
        assert_eq!(prompts.render_task(ContextFile::Claude), "task CLAUDE.md");
    }

    #[test]
    fn load_missing_template_is_configuration_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(SYSTEM_PROMPT_FILE), "sys").unwrap();

        let err = PromptSet::load(tmp.path()).unwrap_err();
        assert!(matches!(err, SessionError::ConfigurationInvalid(ref m) if m.contains(TASK_PROMPT_FILE)));
    }
}
