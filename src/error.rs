//! Errors surfaced to callers of the workflow.
//!
//! Parse failures inside Check and loader degradation never reach this type;
//! they are folded back into the conversation instead.
use crate::workflow::Node;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Bad or incomplete configuration, raised before any stage side effect.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A model collaborator call failed or broke its contract.
    #[error("model invocation failed in {node}: {message}")]
    ModelInvocation { node: Node, message: String },

    #[error("step limit of {limit} reached without a terminal state")]
    StepLimit { limit: usize },

    #[error("session error: {0}")]
    Session(String),
}

impl WorkflowError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Wrap a collaborator failure, keeping the full context chain.
    pub fn model(node: Node, err: &anyhow::Error) -> Self {
        Self::ModelInvocation {
            node,
            message: format!("{err:#}"),
        }
    }
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;
