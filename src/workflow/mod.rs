//! The gather → draft → check → critique state machine.
//!
//! Stages are wired through an explicit [`TransitionTable`]; the
//! [`Executor`] runs one stage per step, merges its update, and asks that
//! stage's router where to go next until a router answers [`Next::End`].
mod executor;
mod routes;
mod table;

pub use executor::{Executor, RunOutcome, RunStatus};
pub use routes::{route_check, route_critique, route_gather, route_start};
pub use table::{Action, Router, Transition, TransitionTable};

use serde::{Deserialize, Serialize};

/// A stage of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Gather,
    Draft,
    Check,
    Critique,
}

impl Node {
    pub const ALL: [Node; 4] = [Node::Gather, Node::Draft, Node::Check, Node::Critique];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gather => "gather",
            Self::Draft => "draft",
            Self::Check => "check",
            Self::Critique => "critique",
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the executor goes after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Node(Node),
    /// Return control to the caller, either suspended or complete.
    End,
}

impl std::fmt::Display for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(node) => node.fmt(f),
            Self::End => f.write_str("end"),
        }
    }
}
