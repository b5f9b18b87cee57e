use super::{StageContext, CRITIQUE_PROMPT};
use crate::error::{Result, WorkflowError};
use crate::model::{Decision, DecisionKind, ModelRequest, PromptMessage};
use crate::state::{Message, Origin, Role, StateUpdate, WorkflowState};
use crate::workflow::Node;

pub const ACCEPT_ACKNOWLEDGEMENT: &str = "okay, sending to user";

/// Present the conversation from the reviewer's side: the drafter's turns
/// become user turns, everything else becomes assistant turns.
pub fn swap_roles(messages: &[Message]) -> Vec<PromptMessage> {
    messages
        .iter()
        .map(|message| {
            let role = match message.origin {
                Origin::Model => Role::User,
                Origin::System | Origin::User | Origin::SyntheticFeedback => Role::Assistant,
            };
            PromptMessage::new(role, message.content.clone())
        })
        .collect()
}

/// Review the current draft and record an explicit verdict.
pub fn critique(state: &WorkflowState, ctx: &StageContext<'_>) -> Result<StateUpdate> {
    let instruction = ctx.render(CRITIQUE_PROMPT);
    let requirements = state.requirements.clone().unwrap_or_default();
    let messages = [
        PromptMessage::new(Role::User, instruction),
        PromptMessage::new(Role::Assistant, requirements),
    ]
    .into_iter()
    .chain(swap_roles(&state.messages))
    .collect();
    let request = ModelRequest::with_required(messages, &[DecisionKind::Accept]);
    let reply = ctx.invoke(Node::Critique, &request)?;

    let accept = match reply.decision {
        Some(Decision::Accept(accept)) => accept,
        Some(other) => {
            return Err(WorkflowError::ModelInvocation {
                node: Node::Critique,
                message: format!("expected an Accept decision, got {}", other.kind().name()),
            })
        }
        None => {
            return Err(WorkflowError::ModelInvocation {
                node: Node::Critique,
                message: "reviewer returned no Accept decision".to_string(),
            })
        }
    };

    tracing::info!(accepted = accept.accepted, "critique verdict");
    let mut update = StateUpdate::append(Message::feedback(accept.logic));
    if accept.accepted {
        update.push(Message::model(ACCEPT_ACKNOWLEDGEMENT));
    }
    update.accepted = Some(accept.accepted);
    Ok(update)
}
