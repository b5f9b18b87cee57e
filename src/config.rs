//! Workflow configuration.
//!
//! Loads the typed config from an optional JSON file, layers environment and
//! explicit overrides on top, and validates everything before a stage runs.
use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_REFERENCE_URL: &str =
    "https://github.com/langchain-ai/langgraph/blob/main/libs/langgraph/tests/test_pregel.py";
pub const DEFAULT_CODE_LANGUAGE: &str = "python";
pub const DEFAULT_MAX_STEPS: usize = 25;
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20240620";

pub const ENV_DRAFT_MODEL: &str = "GRAPH_ENGINEER_DRAFT_MODEL";
pub const ENV_GATHER_MODEL: &str = "GRAPH_ENGINEER_GATHER_MODEL";
pub const ENV_CRITIQUE_MODEL: &str = "GRAPH_ENGINEER_CRITIQUE_MODEL";
pub const ENV_LM_COMMAND: &str = "GRAPH_ENGINEER_LM_COMMAND";

/// Model backend a stage resolves its collaborator to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Openai,
    Anthropic,
    /// Local command speaking the stdin/stdout prompt protocol.
    Command,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Openai, Backend::Anthropic, Backend::Command];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Command => "command",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = WorkflowError;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        Backend::ALL
            .into_iter()
            .find(|backend| backend.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                WorkflowError::configuration(format!(
                    "unknown model backend {trimmed:?} (expected one of: openai, anthropic, command)"
                ))
            })
    }
}

fn default_reference_url() -> String {
    DEFAULT_REFERENCE_URL.to_string()
}

fn default_code_language() -> String {
    DEFAULT_CODE_LANGUAGE.to_string()
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.to_string()
}

fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.to_string()
}

/// Per-invocation workflow configuration. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    #[serde(default)]
    pub draft_model: Backend,
    #[serde(default)]
    pub gather_model: Backend,
    #[serde(default)]
    pub critique_model: Backend,

    /// Reference text embedded in the Draft and Critique prompts.
    #[serde(default = "default_reference_url")]
    pub reference_url: String,

    /// Command line for the `command` backend (parsed with shell-words).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_command: Option<String>,

    /// Fence language tag Check looks for.
    #[serde(default = "default_code_language")]
    pub code_language: String,

    /// Upper bound on stage executions per invocation.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            draft_model: Backend::default(),
            gather_model: Backend::default(),
            critique_model: Backend::default(),
            reference_url: default_reference_url(),
            lm_command: None,
            code_language: default_code_language(),
            max_steps: default_max_steps(),
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
        }
    }
}

/// Explicit overrides, typically from CLI flags. Raw strings so that unknown
/// backend names are reported as configuration errors.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub draft_model: Option<String>,
    pub gather_model: Option<String>,
    pub critique_model: Option<String>,
    pub lm_command: Option<String>,
}

impl ConfigOverrides {
    /// Overrides taken from `GRAPH_ENGINEER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            draft_model: get(ENV_DRAFT_MODEL),
            gather_model: get(ENV_GATHER_MODEL),
            critique_model: get(ENV_CRITIQUE_MODEL),
            lm_command: get(ENV_LM_COMMAND),
        }
    }

    /// Layer `self` over `base`; values set here win.
    pub fn or(self, base: ConfigOverrides) -> Self {
        Self {
            draft_model: self.draft_model.or(base.draft_model),
            gather_model: self.gather_model.or(base.gather_model),
            critique_model: self.critique_model.or(base.critique_model),
            lm_command: self.lm_command.or(base.lm_command),
        }
    }
}

impl GraphConfig {
    /// Parse a JSON config document.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| WorkflowError::configuration(format!("parse config JSON: {err}")))
    }

    /// Load a config file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|err| {
            WorkflowError::configuration(format!("read config {}: {err}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Apply overrides, then validate.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(raw) = overrides.draft_model.as_deref() {
            self.draft_model = raw.parse()?;
        }
        if let Some(raw) = overrides.gather_model.as_deref() {
            self.gather_model = raw.parse()?;
        }
        if let Some(raw) = overrides.critique_model.as_deref() {
            self.critique_model = raw.parse()?;
        }
        if let Some(command) = overrides.lm_command {
            self.lm_command = Some(command);
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject configs that could only fail later, mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(WorkflowError::configuration("max_steps must be at least 1"));
        }
        if self.code_language.trim().is_empty() {
            return Err(WorkflowError::configuration(
                "code_language must be non-empty",
            ));
        }
        if self.reference_url.trim().is_empty() {
            return Err(WorkflowError::configuration(
                "reference_url must be non-empty",
            ));
        }
        let uses_command = [self.draft_model, self.gather_model, self.critique_model]
            .contains(&Backend::Command);
        let has_command = self
            .lm_command
            .as_deref()
            .is_some_and(|command| !command.trim().is_empty());
        if uses_command && !has_command {
            return Err(WorkflowError::configuration(format!(
                "the command backend needs lm_command (or {ENV_LM_COMMAND})"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
