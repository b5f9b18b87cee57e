//! Model collaborators.
//!
//! A stage hands a [`ModelRequest`] (ordered prompt turns plus the decision
//! schemas it is willing to accept) to a [`ChatModel`] and gets back free text,
//! a typed [`Decision`], or both. Which backend serves a stage is resolved per
//! call through a [`ModelProvider`].
mod anthropic;
mod command;
mod openai;

pub use anthropic::AnthropicModel;
pub use command::CommandModel;
pub use openai::OpenAiModel;

use crate::config::{Backend, GraphConfig};
use crate::error::{Result as WorkflowResult, WorkflowError};
use crate::state::Role;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_ANTHROPIC_BASE_URL: &str = "ANTHROPIC_BASE_URL";

/// One `{role, content}` turn sent to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Structured decisions a model may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionKind {
    Build,
    Accept,
}

impl DecisionKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Build => "Build",
            Self::Accept => "Accept",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Build => "Call once the graph topology is understood well enough to build an MVP.",
            Self::Accept => "Record the review verdict for the drafted graph.",
        }
    }

    /// JSON schema of the decision's arguments.
    pub fn parameters(self) -> Value {
        match self {
            Self::Build => json!({
                "type": "object",
                "properties": {
                    "requirements": {
                        "type": "string",
                        "description": "Detailed description of the nodes and edges to build."
                    }
                },
                "required": ["requirements"]
            }),
            Self::Accept => json!({
                "type": "object",
                "properties": {
                    "logic": {
                        "type": "string",
                        "description": "Reasoning behind the verdict, addressed to the developer."
                    },
                    "accepted": {
                        "type": "boolean",
                        "description": "True when the graph flow is correct as written."
                    }
                },
                "required": ["logic", "accepted"]
            }),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Build, Self::Accept]
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub requirements: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accept {
    pub logic: String,
    #[serde(alias = "accept")]
    pub accepted: bool,
}

/// A typed decision carried by a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Build(Build),
    Accept(Accept),
}

impl Decision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Build(_) => DecisionKind::Build,
            Self::Accept(_) => DecisionKind::Accept,
        }
    }

    /// Decode tool/function arguments for the named decision.
    pub fn parse(name: &str, args: Value) -> Result<Self> {
        let kind = DecisionKind::from_name(name)
            .ok_or_else(|| anyhow!("unknown decision {name:?}"))?;
        let decision = match kind {
            DecisionKind::Build => Self::Build(
                serde_json::from_value(args).context("decode Build arguments")?,
            ),
            DecisionKind::Accept => Self::Accept(
                serde_json::from_value(args).context("decode Accept arguments")?,
            ),
        };
        Ok(decision)
    }

    /// Arguments passed as a JSON-encoded string, as function-calling APIs do.
    pub fn parse_encoded(name: &str, encoded: &str) -> Result<Self> {
        let args: Value = serde_json::from_str(encoded)
            .with_context(|| format!("parse {name} arguments as JSON"))?;
        Self::parse(name, args)
    }
}

/// Everything a backend needs for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub messages: Vec<PromptMessage>,
    /// Decisions the reply may carry.
    pub decisions: Vec<DecisionKind>,
    /// When set the backend must force one of `decisions`.
    pub require_decision: bool,
}

impl ModelRequest {
    pub fn text(messages: Vec<PromptMessage>) -> Self {
        Self {
            messages,
            decisions: Vec::new(),
            require_decision: false,
        }
    }

    /// Free text or one of `decisions`.
    pub fn with_optional(messages: Vec<PromptMessage>, decisions: &[DecisionKind]) -> Self {
        Self {
            messages,
            decisions: decisions.to_vec(),
            require_decision: false,
        }
    }

    /// Exactly one of `decisions`.
    pub fn with_required(messages: Vec<PromptMessage>, decisions: &[DecisionKind]) -> Self {
        Self {
            messages,
            decisions: decisions.to_vec(),
            require_decision: true,
        }
    }

    pub fn prompt_bytes(&self) -> usize {
        self.messages.iter().map(|m| m.content.len()).sum()
    }
}

/// A model's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub content: String,
    pub decision: Option<Decision>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            decision: None,
        }
    }

    pub fn decision(decision: Decision) -> Self {
        Self {
            content: String::new(),
            decision: Some(decision),
        }
    }
}

/// A chat model that can be invoked with an ordered conversation.
pub trait ChatModel {
    fn invoke(&self, request: &ModelRequest) -> Result<ModelReply>;
}

/// Resolves a backend identifier to a ready collaborator.
pub trait ModelProvider {
    fn resolve(&self, backend: Backend) -> WorkflowResult<Box<dyn ChatModel>>;
}

/// Provider backed by the real HTTP APIs and the local command protocol.
///
/// Credentials are looked up at resolution time so a missing key only fails
/// the stage that needs it, before that stage has any effect.
#[derive(Debug, Clone)]
pub struct DefaultProvider {
    openai_model: String,
    anthropic_model: String,
    lm_command: Option<String>,
}

impl DefaultProvider {
    pub fn from_config(config: &GraphConfig) -> Self {
        Self {
            openai_model: config.openai_model.clone(),
            anthropic_model: config.anthropic_model.clone(),
            lm_command: config.lm_command.clone(),
        }
    }
}

fn required_env(key: &str, backend: Backend) -> WorkflowResult<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            WorkflowError::configuration(format!("{key} must be set to use the {backend} backend"))
        })
}

impl ModelProvider for DefaultProvider {
    fn resolve(&self, backend: Backend) -> WorkflowResult<Box<dyn ChatModel>> {
        match backend {
            Backend::Openai => {
                let api_key = required_env(ENV_OPENAI_API_KEY, backend)?;
                let mut model = OpenAiModel::new(api_key, &self.openai_model);
                if let Ok(base_url) = std::env::var(ENV_OPENAI_BASE_URL) {
                    model = model.with_base_url(base_url);
                }
                Ok(Box::new(model))
            }
            Backend::Anthropic => {
                let api_key = required_env(ENV_ANTHROPIC_API_KEY, backend)?;
                let mut model = AnthropicModel::new(api_key, &self.anthropic_model);
                if let Ok(base_url) = std::env::var(ENV_ANTHROPIC_BASE_URL) {
                    model = model.with_base_url(base_url);
                }
                Ok(Box::new(model))
            }
            Backend::Command => {
                let command = self.lm_command.as_deref().ok_or_else(|| {
                    WorkflowError::configuration("the command backend needs lm_command")
                })?;
                Ok(Box::new(CommandModel::new(command)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_decodes_legacy_field_name() {
        let decision =
            Decision::parse("Accept", json!({"logic": "fine", "accept": true})).expect("parse");
        assert_eq!(
            decision,
            Decision::Accept(Accept {
                logic: "fine".to_string(),
                accepted: true
            })
        );
    }

    #[test]
    fn build_decodes_from_encoded_arguments() {
        let decision =
            Decision::parse_encoded("build", r#"{"requirements":"A then B"}"#).expect("parse");
        assert_eq!(decision.kind(), DecisionKind::Build);
    }

    #[test]
    fn unknown_decision_names_are_rejected() {
        assert!(Decision::parse("Reject", json!({})).is_err());
    }

    #[test]
    fn missing_fields_are_rejected() {
        assert!(Decision::parse("Accept", json!({"logic": "no verdict"})).is_err());
    }

    #[test]
    fn command_backend_without_command_is_a_configuration_error() {
        let provider = DefaultProvider::from_config(&GraphConfig::default());
        let err = provider.resolve(Backend::Command).err().expect("resolution fails");
        assert!(matches!(err, WorkflowError::Configuration(_)), "{err}");
    }
}
