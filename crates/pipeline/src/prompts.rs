//! Role prompt resolution.
//!
//! A role's system prompt lives in `<prompts_dir>/<role>.md` (or `.txt`).
//! Anything that goes wrong while finding it (no directory, no file, an
//! unreadable or blank file) yields [`DEFAULT_PROMPT`]. Resolution never
//! fails.

use jurisflow_config::AppConfig;
use jurisflow_core::role::PipelineRole;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prompt used whenever a role has no usable prompt file.
pub const DEFAULT_PROMPT: &str = "Você é um assistente jurídico especializado em direito \
previdenciário e trabalhista brasileiro. Analise o caso apresentado com rigor técnico, \
cite a legislação aplicável quando pertinente e responda em português, de forma clara \
e objetiva.";

const EXTENSIONS: [&str; 2] = ["md", "txt"];

/// Maps role names to system prompts.
#[derive(Debug, Clone, Default)]
pub struct PromptResolver {
    dir: Option<PathBuf>,
}

impl PromptResolver {
    /// Resolve prompts from files in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A resolver with no prompt directory; every role gets the default.
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.pipeline.prompts_path())
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// The system prompt for a pipeline role.
    pub fn resolve_role(&self, role: PipelineRole) -> String {
        self.resolve(role.as_str())
    }

    /// The system prompt for an arbitrary role name.
    ///
    /// Unknown names resolve like known ones: to their file if it exists,
    /// otherwise to the default.
    pub fn resolve(&self, role: &str) -> String {
        let role = role.trim();
        let Some(dir) = &self.dir else {
            return DEFAULT_PROMPT.to_string();
        };

        // Role names become file names; anything path-like is refused.
        if role.is_empty() || !role.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            warn!(role, "Invalid role name for prompt lookup, using default prompt");
            return DEFAULT_PROMPT.to_string();
        }

        for ext in EXTENSIONS {
            let path = dir.join(format!("{role}.{ext}"));
            match std::fs::read_to_string(&path) {
                Ok(content) if !content.trim().is_empty() => {
                    debug!(role, file = %path.display(), "Loaded role prompt");
                    return content.trim().to_string();
                }
                Ok(_) => {
                    warn!(role, file = %path.display(), "Role prompt file is empty");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(role, file = %path.display(), error = %e, "Failed to read role prompt");
                }
            }
        }

        warn!(role, dir = %dir.display(), "No usable prompt for role, using default prompt");
        DEFAULT_PROMPT.to_string()
    }
}
