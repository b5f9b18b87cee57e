//! OpenAI Chat Completions backend.
use super::{ChatModel, Decision, ModelReply, ModelRequest};
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiModel {
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiModel {
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

impl ChatModel for OpenAiModel {
    fn invoke(&self, request: &ModelRequest) -> Result<ModelReply> {
        let body = request_body(&self.model, request);
        let url = format!("{}/chat/completions", self.base_url);
        let start = Instant::now();
        let mut response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&body)
            .with_context(|| format!("POST {url}"))?;
        let value: Value = response
            .body_mut()
            .read_json()
            .context("decode chat completion response")?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            model = %self.model,
            prompt_bytes = request.prompt_bytes(),
            "openai invoke complete"
        );
        parse_response(&value)
    }
}

fn request_body(model: &str, request: &ModelRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
        .collect();
    let mut body = json!({
        "model": model,
        "temperature": 0,
        "messages": messages,
    });
    if request.decisions.is_empty() {
        return body;
    }
    let tools: Vec<Value> = request
        .decisions
        .iter()
        .map(|kind| {
            json!({
                "type": "function",
                "function": {
                    "name": kind.name(),
                    "description": kind.description(),
                    "parameters": kind.parameters(),
                }
            })
        })
        .collect();
    let tool_choice = match (request.require_decision, request.decisions.as_slice()) {
        (true, [only]) => json!({"type": "function", "function": {"name": only.name()}}),
        (true, _) => json!("required"),
        (false, _) => json!("auto"),
    };
    body["tools"] = Value::Array(tools);
    body["tool_choice"] = tool_choice;
    body
}

fn parse_response(value: &Value) -> Result<ModelReply> {
    if let Some(error) = value.get("error") {
        return Err(anyhow!("openai returned an error: {error}"));
    }
    let message = value
        .pointer("/choices/0/message")
        .ok_or_else(|| anyhow!("chat completion response has no choices"))?;
    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let decision = match message
        .get("tool_calls")
        .and_then(Value::as_array)
        .and_then(|calls| calls.first())
    {
        Some(call) => {
            let name = call
                .pointer("/function/name")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("tool call without a function name"))?;
            let arguments = call
                .pointer("/function/arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}");
            Some(Decision::parse_encoded(name, arguments)?)
        }
        None => None,
    };
    Ok(ModelReply { content, decision })
}
