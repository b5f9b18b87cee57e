use super::StageContext;
use crate::error::Result;
use crate::extract::{extract_code_blocks, fence};
use crate::state::{Message, StateUpdate, WorkflowState};

pub const NO_BLOCK_ERROR: &str = "Did not find a code block!";
pub const MULTIPLE_BLOCKS_ERROR: &str = "Found multiple code blocks!";

fn parse_feedback(language: &str, error: &str) -> String {
    format!(
        "Make sure your response contains a code block in the following format:\n\n```{language}\n...\n```\n\nWhen trying to parse out that code block, got this error: {error}"
    )
}

/// Check that the latest reply carries exactly one fenced block.
///
/// On success the block becomes `code` and no message is added, leaving the
/// model's reply last. Anything else appends feedback for the drafter. This
/// stage never fails.
pub fn check(state: &WorkflowState, ctx: &StageContext<'_>) -> Result<StateUpdate> {
    let language = ctx.config.code_language.as_str();
    let content = state
        .last_message()
        .map(|message| message.content.as_str())
        .unwrap_or_default();

    let blocks = match extract_code_blocks(content, language) {
        Ok(blocks) => blocks,
        Err(err) => {
            tracing::warn!(error = %err, "code block extraction failed");
            return Ok(feedback(language, &err.to_string()));
        }
    };

    match blocks.as_slice() {
        [] => {
            tracing::info!("check found no code block");
            Ok(feedback(language, NO_BLOCK_ERROR))
        }
        [body] => {
            tracing::info!(code_bytes = body.len(), "check accepted a single code block");
            Ok(StateUpdate {
                code: Some(fence(body, language)),
                ..StateUpdate::default()
            })
        }
        _ => {
            tracing::info!(blocks = blocks.len(), "check found multiple code blocks");
            Ok(feedback(language, MULTIPLE_BLOCKS_ERROR))
        }
    }
}

fn feedback(language: &str, error: &str) -> StateUpdate {
    StateUpdate::append(Message::feedback(parse_feedback(language, error)))
}
