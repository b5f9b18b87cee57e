//! Conversational builder for graph workflow code.
//!
//! A user describes the graph they want; the assistant gathers requirements,
//! drafts a single code block, checks that exactly one block came back, and
//! has a reviewer critique it, looping until the reviewer accepts. Runs
//! suspend whenever the user has to answer a question and resume from the
//! persisted [`state::WorkflowState`].
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod lm_log;
pub mod loader;
pub mod model;
pub mod session;
pub mod stages;
pub mod state;
pub mod workflow;

pub use config::{Backend, GraphConfig};
pub use error::WorkflowError;
pub use state::{Message, OutputView, WorkflowState};
pub use workflow::{Executor, RunOutcome, RunStatus};
