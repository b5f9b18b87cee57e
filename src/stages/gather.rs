use super::{prompt_turns, StageContext, GATHER_PROMPT};
use crate::error::{Result, WorkflowError};
use crate::model::{Decision, DecisionKind, ModelRequest, PromptMessage};
use crate::state::{Message, MessageOp, Role, StateUpdate, WorkflowState};
use crate::workflow::Node;

/// Gather requirements from the user.
///
/// A plain reply is a clarifying question and is appended to the dialogue. A
/// `Build` decision records the requirements and clears the whole dialogue so
/// drafting starts from the requirements alone.
pub fn gather(state: &WorkflowState, ctx: &StageContext<'_>) -> Result<StateUpdate> {
    let messages = std::iter::once(PromptMessage::new(Role::System, GATHER_PROMPT))
        .chain(prompt_turns(&state.messages))
        .collect();
    let request = ModelRequest::with_optional(messages, &[DecisionKind::Build]);
    let reply = ctx.invoke(Node::Gather, &request)?;

    match reply.decision {
        None => {
            tracing::info!(messages = state.messages.len() + 1, "gather asked a question");
            Ok(StateUpdate::append(Message::model(reply.content)))
        }
        Some(Decision::Build(build)) => {
            if build.requirements.trim().is_empty() {
                return Err(WorkflowError::ModelInvocation {
                    node: Node::Gather,
                    message: "Build decision carried empty requirements".to_string(),
                });
            }
            tracing::info!(
                cleared = state.messages.len(),
                requirements_bytes = build.requirements.len(),
                "gather settled requirements"
            );
            Ok(StateUpdate {
                messages: state
                    .messages
                    .iter()
                    .map(|message| MessageOp::Delete {
                        id: message.id.clone(),
                    })
                    .collect(),
                requirements: Some(build.requirements),
                ..StateUpdate::default()
            })
        }
        Some(other) => Err(WorkflowError::ModelInvocation {
            node: Node::Gather,
            message: format!("unexpected {} decision", other.kind().name()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::model::{Accept, Build, ModelReply};
    use crate::stages::testing::{FixedReference, ScriptedProvider};
    use crate::state::{merge, Origin};

    fn run(state: &WorkflowState, provider: &ScriptedProvider) -> Result<StateUpdate> {
        let config = GraphConfig::default();
        let reference = FixedReference("ref");
        let ctx = StageContext::new(&config, provider, &reference);
        gather(state, &ctx)
    }

    #[test]
    fn plain_reply_appends_one_model_question() {
        let state = WorkflowState::from_user_message("build me an agent");
        let provider = ScriptedProvider::replies(vec![ModelReply::text("What nodes?")]);
        let update = run(&state, &provider).expect("gather");
        let merged = merge(state, update);

        assert_eq!(merged.requirements, None);
        assert_eq!(merged.messages.len(), 2);
        assert_eq!(merged.messages[1].origin, Origin::Model);
        assert_eq!(merged.messages[1].content, "What nodes?");
    }

    #[test]
    fn build_decision_sets_requirements_and_clears_dialogue() {
        let mut state = WorkflowState::from_user_message("build me an agent");
        state.messages.push(Message::model("What nodes?"));
        state.messages.push(Message::user("A then B"));
        let provider = ScriptedProvider::replies(vec![ModelReply::decision(Decision::Build(
            Build {
                requirements: "X".to_string(),
            },
        ))]);
        let update = run(&state, &provider).expect("gather");
        let merged = merge(state, update);

        assert_eq!(merged.requirements.as_deref(), Some("X"));
        assert!(merged.messages.is_empty());
    }

    #[test]
    fn prompt_starts_with_system_instruction_then_dialogue() {
        let state = WorkflowState::from_user_message("hello");
        let provider = ScriptedProvider::replies(vec![ModelReply::text("?")]);
        run(&state, &provider).expect("gather");

        let requests = provider.requests();
        let request = &requests[0].1;
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[1].content, "hello");
        assert_eq!(request.decisions, vec![DecisionKind::Build]);
        assert!(!request.require_decision);
    }

    #[test]
    fn empty_build_requirements_are_rejected() {
        let state = WorkflowState::from_user_message("hi");
        let provider = ScriptedProvider::replies(vec![ModelReply::decision(Decision::Build(
            Build {
                requirements: "  ".to_string(),
            },
        ))]);
        assert!(run(&state, &provider).is_err());
    }

    #[test]
    fn foreign_decisions_are_rejected() {
        let state = WorkflowState::from_user_message("hi");
        let provider = ScriptedProvider::replies(vec![ModelReply::decision(Decision::Accept(
            Accept {
                logic: "?".to_string(),
                accepted: true,
            },
        ))]);
        let err = run(&state, &provider).unwrap_err();
        assert!(matches!(err, WorkflowError::ModelInvocation { node: Node::Gather, .. }));
    }

    #[test]
    fn model_failure_is_a_model_invocation_error() {
        let state = WorkflowState::from_user_message("hi");
        let provider = ScriptedProvider::new(vec![Err(anyhow::anyhow!("401 unauthorized"))]);
        let err = run(&state, &provider).unwrap_err();
        assert!(err.to_string().contains("401"), "{err}");
    }
}
