//! Local LM command backend.
//!
//! Renders the conversation as a text prompt on stdin and reads the reply from
//! stdout, so any tool that turns text into text can serve a stage (`llm`,
//! `ollama run`, a wrapper script). Decisions are requested as a single JSON
//! object carrying a `decision` field.
use super::{ChatModel, Decision, DecisionKind, ModelReply, ModelRequest};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CommandModel {
    command: String,
}

impl CommandModel {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl ChatModel for CommandModel {
    fn invoke(&self, request: &ModelRequest) -> Result<ModelReply> {
        let prompt = render_prompt(request);
        let response = invoke_lm_command(&self.command, &prompt)?;
        parse_reply(&response, request)
    }
}

/// Flatten a request into the stdin prompt.
pub(crate) fn render_prompt(request: &ModelRequest) -> String {
    let mut prompt = String::from("# Conversation\n");
    for message in &request.messages {
        prompt.push_str(&format!("\n## {}\n\n{}\n", message.role, message.content));
    }
    if request.decisions.is_empty() {
        return prompt;
    }

    prompt.push_str("\n# Response Format\n\n");
    if request.require_decision {
        prompt.push_str("Respond ONLY with one JSON object choosing one of the decisions below.\n");
    } else {
        prompt.push_str(
            "Either reply in plain text, or respond ONLY with one JSON object choosing one of the decisions below.\n",
        );
    }
    for kind in &request.decisions {
        prompt.push_str(&format!(
            "\n- `{}`: {}\n  Shape: {{\"decision\": \"{}\", ...}} with arguments matching:\n  {}\n",
            kind.name(),
            kind.description(),
            kind.name(),
            kind.parameters()
        ));
    }
    prompt
}

/// Interpret command output, pulling out a decision object when one was bound.
pub(crate) fn parse_reply(text: &str, request: &ModelRequest) -> Result<ModelReply> {
    let content = text.trim().to_string();
    if request.decisions.is_empty() {
        return Ok(ModelReply::text(content));
    }
    let cleaned = strip_code_fences(&content);
    let decision = match find_decision_object(&cleaned, &request.decisions) {
        Some((kind, args)) => Some(Decision::parse(kind.name(), args)?),
        None => None,
    };
    if request.require_decision && decision.is_none() {
        return Err(anyhow!(
            "LM response did not contain a required decision; first 500 chars: {}",
            &content[..floor_char_boundary(&content, 500)]
        ));
    }
    Ok(ModelReply { content, decision })
}

fn floor_char_boundary(text: &str, max: usize) -> usize {
    if text.len() <= max {
        return text.len();
    }
    (0..=max)
        .rev()
        .find(|idx| text.is_char_boundary(*idx))
        .unwrap_or(0)
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if let Some(first) = lines.first() {
        if first.trim_start().starts_with("```") {
            lines.remove(0);
        }
    }
    if let Some(last) = lines.last() {
        if last.trim_start().starts_with("```") {
            lines.pop();
        }
    }
    lines.join("\n").trim().to_string()
}

/// First JSON object in `raw` whose `decision` field names a bound kind.
fn find_decision_object(raw: &str, allowed: &[DecisionKind]) -> Option<(DecisionKind, Value)> {
    for (idx, ch) in raw.char_indices() {
        if ch != '{' {
            continue;
        }
        let slice = &raw[idx..];
        let mut deserializer = serde_json::Deserializer::from_str(slice);
        let Ok(Value::Object(mut object)) = Value::deserialize(&mut deserializer) else {
            continue;
        };
        let Some(Value::String(name)) = object.remove("decision") else {
            continue;
        };
        if let Some(kind) = DecisionKind::from_name(&name).filter(|kind| allowed.contains(kind)) {
            return Some((kind, Value::Object(object)));
        }
    }
    None
}

/// Invoke the LM command with the given prompt on stdin.
fn invoke_lm_command(command: &str, prompt: &str) -> Result<String> {
    let args =
        shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
    let Some((program, rest)) = args.split_first() else {
        return Err(anyhow!("LM command is empty"));
    };

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawn LM command: {program}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(prompt.as_bytes())
            .context("write prompt to LM stdin")?;
    }

    let output = child.wait_with_output().context("wait for LM command")?;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        elapsed_ms,
        prompt_bytes = prompt.len(),
        response_bytes = output.stdout.len(),
        "lm invoke complete"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "LM command failed with status {}: {}",
            output.status,
            stderr.trim()
        ));
    }

    String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")
}
