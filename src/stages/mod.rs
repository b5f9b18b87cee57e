//! The four workflow stages.
//!
//! Each stage reads the current state, talks to at most one model, and
//! returns a [`StateUpdate`](crate::state::StateUpdate). None of them touch
//! shared state directly.
mod check;
mod critique;
mod draft;
mod gather;

pub use check::{check, MULTIPLE_BLOCKS_ERROR, NO_BLOCK_ERROR};
pub use critique::{critique, swap_roles, ACCEPT_ACKNOWLEDGEMENT};
pub use draft::draft;
pub use gather::gather;

use crate::config::{Backend, GraphConfig};
use crate::error::{Result, WorkflowError};
use crate::lm_log::{LmLog, LmLogBuilder};
use crate::loader::ReferenceSource;
use crate::model::{ModelProvider, ModelReply, ModelRequest, PromptMessage};
use crate::state::Message;
use crate::workflow::Node;

const GATHER_PROMPT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/gather.md"));
const DRAFT_PROMPT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/draft.md"));
const CRITIQUE_PROMPT: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/critique.md"));

/// Collaborators and settings a stage runs against.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub config: &'a GraphConfig,
    pub models: &'a dyn ModelProvider,
    pub reference: &'a dyn ReferenceSource,
    pub log: Option<&'a LmLog>,
    /// Stage execution number within the current run, for logging.
    pub step: usize,
}

impl<'a> StageContext<'a> {
    pub fn new(
        config: &'a GraphConfig,
        models: &'a dyn ModelProvider,
        reference: &'a dyn ReferenceSource,
    ) -> Self {
        Self {
            config,
            models,
            reference,
            log: None,
            step: 0,
        }
    }

    pub fn with_log(mut self, log: Option<&'a LmLog>) -> Self {
        self.log = log;
        self
    }

    pub fn at_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Backend configured for a model-backed stage.
    pub fn backend_for(&self, node: Node) -> Option<Backend> {
        match node {
            Node::Gather => Some(self.config.gather_model),
            Node::Draft => Some(self.config.draft_model),
            Node::Critique => Some(self.config.critique_model),
            Node::Check => None,
        }
    }

    /// Reference text with any template placeholders the prompt needs filled in.
    fn render(&self, template: &str) -> String {
        let reference = self.reference.fetch(&self.config.reference_url);
        template
            .replace("{language}", &self.config.code_language)
            .replace("{reference}", &reference)
    }

    /// Resolve this stage's model and invoke it, logging the call.
    ///
    /// Resolution failures surface as configuration errors before the model is
    /// contacted; invocation failures as model errors.
    fn invoke(&self, node: Node, request: &ModelRequest) -> Result<ModelReply> {
        let backend = self.backend_for(node).ok_or_else(|| {
            WorkflowError::configuration(format!("{node} does not use a model"))
        })?;
        let model = self.models.resolve(backend)?;
        let builder =
            LmLogBuilder::new(self.step, node, backend).with_message_count(request.messages.len());
        tracing::debug!(
            %node,
            %backend,
            messages = request.messages.len(),
            prompt_bytes = request.prompt_bytes(),
            "invoking model"
        );
        match model.invoke(request) {
            Ok(reply) => {
                let kind = reply.decision.as_ref().map(|decision| decision.kind());
                self.write_log(builder.success(kind, reply.content.len()));
                Ok(reply)
            }
            Err(err) => {
                self.write_log(builder.failed(format!("{err:#}")));
                Err(WorkflowError::model(node, &err))
            }
        }
    }

    fn write_log(&self, entry: crate::lm_log::LmLogEntry) {
        let Some(log) = self.log else {
            return;
        };
        if let Err(err) = log.append(&entry) {
            tracing::warn!(path = %log.path().display(), error = %format!("{err:#}"), "lm_log append failed");
        }
    }
}

fn prompt_turns(messages: &[Message]) -> impl Iterator<Item = PromptMessage> + '_ {
    messages
        .iter()
        .map(|message| PromptMessage::new(message.role, message.content.clone()))
}

#[cfg(test)]
pub(crate) mod testing;
