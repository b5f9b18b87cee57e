//! Stage/router wiring, validated once at construction.
use super::routes::{route_check, route_critique, route_gather};
use super::{Next, Node};
use crate::error::{Result, WorkflowError};
use crate::stages::{self, StageContext};
use crate::state::{StateUpdate, WorkflowState};
use std::collections::BTreeMap;

pub type Action = fn(&WorkflowState, &StageContext<'_>) -> Result<StateUpdate>;
pub type Router = fn(&WorkflowState) -> Next;

/// What runs at a node and how the next node is chosen.
#[derive(Clone, Copy)]
pub struct Transition {
    pub action: Action,
    pub router: Router,
    /// Every outcome `router` may produce.
    pub targets: &'static [Next],
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

fn route_draft(_state: &WorkflowState) -> Next {
    Next::Node(Node::Check)
}

/// Total mapping from node to transition.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    entries: BTreeMap<Node, Transition>,
}

impl TransitionTable {
    /// Build a table, rejecting duplicate or missing nodes and transitions
    /// that declare no outcomes.
    pub fn new(entries: impl IntoIterator<Item = (Node, Transition)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (node, transition) in entries {
            if map.insert(node, transition).is_some() {
                return Err(WorkflowError::configuration(format!(
                    "transition table has two entries for {node}"
                )));
            }
        }
        for node in Node::ALL {
            let transition = map.get(&node).ok_or_else(|| {
                WorkflowError::configuration(format!("transition table has no entry for {node}"))
            })?;
            if transition.targets.is_empty() {
                return Err(WorkflowError::configuration(format!(
                    "{node} declares no router outcomes"
                )));
            }
        }
        Ok(Self { entries: map })
    }

    /// The gather → draft → check → critique wiring.
    pub fn standard() -> Result<Self> {
        Self::new([
            (
                Node::Gather,
                Transition {
                    action: stages::gather,
                    router: route_gather,
                    targets: &[Next::Node(Node::Draft), Next::End],
                },
            ),
            (
                Node::Draft,
                Transition {
                    action: stages::draft,
                    router: route_draft,
                    targets: &[Next::Node(Node::Check)],
                },
            ),
            (
                Node::Check,
                Transition {
                    action: stages::check,
                    router: route_check,
                    targets: &[Next::Node(Node::Critique), Next::Node(Node::Draft)],
                },
            ),
            (
                Node::Critique,
                Transition {
                    action: stages::critique,
                    router: route_critique,
                    targets: &[Next::End, Next::Node(Node::Draft)],
                },
            ),
        ])
    }

    pub fn get(&self, node: Node) -> Option<&Transition> {
        self.entries.get(&node)
    }
}
