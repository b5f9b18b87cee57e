//! Routers: pure functions from state to the next step.
use super::{Next, Node};
use crate::state::{Origin, WorkflowState};

/// Entry point: draft straight away when requirements are already known.
pub fn route_start(state: &WorkflowState) -> Node {
    if state.requirements().is_some() {
        Node::Draft
    } else {
        Node::Gather
    }
}

/// After gathering: draft once requirements exist, otherwise wait for the user.
pub fn route_gather(state: &WorkflowState) -> Next {
    if state.requirements().is_some() {
        Next::Node(Node::Draft)
    } else {
        Next::End
    }
}

/// After checking: a model reply left last means the block parsed.
pub fn route_check(state: &WorkflowState) -> Next {
    match state.last_message().map(|message| message.origin) {
        Some(Origin::Model) => Next::Node(Node::Critique),
        _ => Next::Node(Node::Draft),
    }
}

/// After critique: stop on acceptance, redraft otherwise.
pub fn route_critique(state: &WorkflowState) -> Next {
    if state.is_complete() {
        Next::End
    } else {
        Next::Node(Node::Draft)
    }
}
