//! Drives the transition table to a terminal step.
use super::routes::route_start;
use super::table::TransitionTable;
use super::{Next, Node};
use crate::config::GraphConfig;
use crate::error::{Result, WorkflowError};
use crate::lm_log::LmLog;
use crate::loader::ReferenceSource;
use crate::model::ModelProvider;
use crate::stages::StageContext;
use crate::state::{merge, Message, StateUpdate, WorkflowState};
use serde::Serialize;

/// How a run ended. Both come from the same terminal step; the state decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting on the user; resume with their next message.
    Suspended,
    /// The reviewer accepted the artifact.
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Nodes executed, in order.
    pub trail: Vec<Node>,
}

impl RunOutcome {
    pub fn steps(&self) -> usize {
        self.trail.len()
    }
}

pub struct Executor<'a> {
    table: TransitionTable,
    config: &'a GraphConfig,
    models: &'a dyn ModelProvider,
    reference: &'a dyn ReferenceSource,
    log: Option<&'a LmLog>,
}

impl<'a> Executor<'a> {
    /// Build an executor over the standard table. Fails on invalid config.
    pub fn new(
        config: &'a GraphConfig,
        models: &'a dyn ModelProvider,
        reference: &'a dyn ReferenceSource,
    ) -> Result<Self> {
        Self::with_table(TransitionTable::standard()?, config, models, reference)
    }

    pub fn with_table(
        table: TransitionTable,
        config: &'a GraphConfig,
        models: &'a dyn ModelProvider,
        reference: &'a dyn ReferenceSource,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            table,
            config,
            models,
            reference,
            log: None,
        })
    }

    pub fn with_log(mut self, log: Option<&'a LmLog>) -> Self {
        self.log = log;
        self
    }

    /// Append an external message, then run.
    ///
    /// An accepted state is terminal and takes no further input.
    pub fn resume(&self, state: &mut WorkflowState, message: Message) -> Result<RunOutcome> {
        if state.is_complete() {
            return Err(WorkflowError::Session(
                "conversation already accepted; start a new one".to_string(),
            ));
        }
        apply(state, StateUpdate::append(message));
        self.run(state)
    }

    /// Run stages until a router answers [`Next::End`].
    ///
    /// `state` is only replaced after a stage succeeds, so on error it holds
    /// the result of the last successful merge.
    pub fn run(&self, state: &mut WorkflowState) -> Result<RunOutcome> {
        let mut trail = Vec::new();
        if state.is_complete() {
            tracing::debug!("state already accepted; nothing to run");
            return Ok(RunOutcome {
                status: RunStatus::Completed,
                trail,
            });
        }

        let mut node = route_start(state);
        tracing::info!(entry = %node, messages = state.messages.len(), "workflow run started");
        loop {
            if trail.len() >= self.config.max_steps {
                tracing::warn!(limit = self.config.max_steps, "step limit reached");
                return Err(WorkflowError::StepLimit {
                    limit: self.config.max_steps,
                });
            }
            let step = trail.len() + 1;
            let transition = self.table.get(node).ok_or_else(|| {
                WorkflowError::configuration(format!("no transition for {node}"))
            })?;
            let ctx = StageContext::new(self.config, self.models, self.reference)
                .with_log(self.log)
                .at_step(step);

            let update = (transition.action)(state, &ctx)?;
            apply(state, update);
            trail.push(node);

            let next = (transition.router)(state);
            if !transition.targets.contains(&next) {
                return Err(WorkflowError::configuration(format!(
                    "router for {node} returned undeclared outcome {next}"
                )));
            }
            tracing::info!(step, %node, %next, "stage complete");

            match next {
                Next::Node(to) => node = to,
                Next::End => {
                    let status = if state.is_complete() {
                        RunStatus::Completed
                    } else {
                        RunStatus::Suspended
                    };
                    tracing::info!(?status, steps = trail.len(), "workflow run halted");
                    return Ok(RunOutcome { status, trail });
                }
            }
        }
    }
}

fn apply(state: &mut WorkflowState, update: StateUpdate) {
    *state = merge(std::mem::take(state), update);
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
