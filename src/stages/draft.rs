use super::{prompt_turns, StageContext, DRAFT_PROMPT};
use crate::error::Result;
use crate::model::{ModelRequest, PromptMessage};
use crate::state::{Message, Role, StateUpdate, WorkflowState};
use crate::workflow::Node;

/// Draft (or redraft) the artifact from the requirements and any feedback
/// accumulated since the last draft.
pub fn draft(state: &WorkflowState, ctx: &StageContext<'_>) -> Result<StateUpdate> {
    let system = ctx.render(DRAFT_PROMPT);
    let requirements = state.requirements.clone().unwrap_or_default();
    let messages = [
        PromptMessage::new(Role::System, system),
        PromptMessage::new(Role::User, requirements),
    ]
    .into_iter()
    .chain(prompt_turns(&state.messages))
    .collect();
    let reply = ctx.invoke(Node::Draft, &ModelRequest::text(messages))?;
    tracing::info!(response_bytes = reply.content.len(), "draft produced a candidate");
    Ok(StateUpdate::append(Message::model(reply.content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::model::ModelReply;
    use crate::stages::testing::{FixedReference, ScriptedProvider};
    use crate::state::{merge, Origin};

    #[test]
    fn appends_reply_verbatim_and_embeds_reference() {
        let config = GraphConfig::default();
        let reference = FixedReference("REFERENCE BODY");
        let reply = "Here:\n```python\nprint(1)\n```\n";
        let provider = ScriptedProvider::replies(vec![ModelReply::text(reply)]);
        let ctx = StageContext::new(&config, &provider, &reference);

        let mut state = WorkflowState {
            requirements: Some("two nodes".to_string()),
            ..WorkflowState::default()
        };
        state.messages.push(Message::feedback("Found multiple code blocks!"));

        let update = draft(&state, &ctx).expect("draft");
        assert_eq!(update.requirements, None);
        assert_eq!(update.code, None);
        assert_eq!(update.accepted, None);
        let merged = merge(state, update);
        assert_eq!(merged.messages.len(), 2);
        assert_eq!(merged.messages[1].origin, Origin::Model);
        assert_eq!(merged.messages[1].content, reply);

        let requests = provider.requests();
        let sent = &requests[0].1.messages;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].content.contains("REFERENCE BODY"));
        assert!(sent[0].content.contains("```python\n...\n```"));
        assert!(!sent[0].content.contains("{reference}"));
        assert_eq!(sent[1].role, Role::User);
        assert_eq!(sent[1].content, "two nodes");
        assert_eq!(sent[2].content, "Found multiple code blocks!");
        assert!(requests[0].1.decisions.is_empty());
    }
}
