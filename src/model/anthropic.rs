//! Anthropic Messages API backend.
use super::{ChatModel, Decision, ModelReply, ModelRequest};
use crate::state::Role;
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct AnthropicModel {
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicModel {
    pub fn new(api_key: impl Into<String>, model: &str) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl ChatModel for AnthropicModel {
    fn invoke(&self, request: &ModelRequest) -> Result<ModelReply> {
        let body = request_body(&self.model, request);
        let url = format!("{}/messages", self.base_url);
        let start = Instant::now();
        let mut response = ureq::post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .send_json(&body)
            .with_context(|| format!("POST {url}"))?;
        let value: Value = response
            .body_mut()
            .read_json()
            .context("decode messages response")?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            model = %self.model,
            prompt_bytes = request.prompt_bytes(),
            "anthropic invoke complete"
        );
        parse_response(&value)
    }
}

/// The Messages API takes system text out of band and expects user and
/// assistant turns to alternate, so system turns are hoisted and adjacent
/// same-role turns are joined.
fn split_system(request: &ModelRequest) -> (String, Vec<(Role, String)>) {
    let mut system = Vec::new();
    let mut turns: Vec<(Role, String)> = Vec::new();
    for message in &request.messages {
        if message.role == Role::System {
            system.push(message.content.as_str());
            continue;
        }
        match turns.last_mut() {
            Some((role, content)) if *role == message.role => {
                content.push_str("\n\n");
                content.push_str(&message.content);
            }
            _ => turns.push((message.role, message.content.clone())),
        }
    }
    (system.join("\n\n"), turns)
}

fn request_body(model: &str, request: &ModelRequest) -> Value {
    let (system, turns) = split_system(request);
    let messages: Vec<Value> = turns
        .iter()
        .map(|(role, content)| json!({"role": role.as_str(), "content": content}))
        .collect();
    let mut body = json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "temperature": 0,
        "messages": messages,
    });
    if !system.is_empty() {
        body["system"] = json!(system);
    }
    if request.decisions.is_empty() {
        return body;
    }
    let tools: Vec<Value> = request
        .decisions
        .iter()
        .map(|kind| {
            json!({
                "name": kind.name(),
                "description": kind.description(),
                "input_schema": kind.parameters(),
            })
        })
        .collect();
    let tool_choice = match (request.require_decision, request.decisions.as_slice()) {
        (true, [only]) => json!({"type": "tool", "name": only.name()}),
        (true, _) => json!({"type": "any"}),
        (false, _) => json!({"type": "auto"}),
    };
    body["tools"] = Value::Array(tools);
    body["tool_choice"] = tool_choice;
    body
}

fn parse_response(value: &Value) -> Result<ModelReply> {
    if value.get("type").and_then(Value::as_str) == Some("error") {
        return Err(anyhow!("anthropic returned an error: {}", value["error"]));
    }
    let blocks = value
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("messages response has no content"))?;
    let mut text = Vec::new();
    let mut decision = None;
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(chunk) = block.get("text").and_then(Value::as_str) {
                    text.push(chunk);
                }
            }
            Some("tool_use") if decision.is_none() => {
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("tool_use block without a name"))?;
                let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                decision = Some(Decision::parse(name, input)?);
            }
            _ => {}
        }
    }
    Ok(ModelReply {
        content: text.join(""),
        decision,
    })
}
