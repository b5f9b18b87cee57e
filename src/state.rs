//! Conversation state and the reducer that folds stage updates into it.
//!
//! Stages never mutate state in place. They return a [`StateUpdate`] and the
//! executor applies it with [`merge`], so every transition goes through one
//! code path regardless of which stage produced it.
use serde::{Deserialize, Serialize};

/// Chat role a message is presented with when sent to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which actor authored a message.
///
/// Set once by whoever creates the message; routers read it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    System,
    User,
    Model,
    SyntheticFeedback,
}

impl Origin {
    /// Role a freshly authored message of this origin carries.
    pub fn default_role(self) -> Role {
        match self {
            Self::System => Role::System,
            Self::User | Self::SyntheticFeedback => Role::User,
            Self::Model => Role::Assistant,
        }
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within a conversation; generated when absent on input.
    #[serde(default = "new_message_id")]
    pub id: String,
    pub role: Role,
    pub origin: Origin,
    pub content: String,
}

/// Generate a fresh message id.
pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Message {
    pub fn new(origin: Origin, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: origin.default_role(),
            origin,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Origin::User, content)
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Origin::Model, content)
    }

    pub fn feedback(content: impl Into<String>) -> Self {
        Self::new(Origin::SyntheticFeedback, content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Aggregate workflow state threaded through every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
}

impl WorkflowState {
    /// Start a conversation from a single user message.
    pub fn from_user_message(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
            ..Self::default()
        }
    }

    /// Requirements, treating an empty string as unset.
    pub fn requirements(&self) -> Option<&str> {
        self.requirements
            .as_deref()
            .filter(|value| !value.is_empty())
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// True once a reviewer has accepted the artifact.
    pub fn is_complete(&self) -> bool {
        self.accepted == Some(true)
    }

    /// Externally visible projection of the state.
    pub fn output(&self) -> OutputView {
        OutputView {
            code: self.code.clone(),
            requirements: self.requirements.clone(),
            accepted: self.accepted,
        }
    }
}

/// What callers see of a run: the artifact, the requirements it answers, and
/// whether it was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputView {
    pub code: Option<String>,
    pub requirements: Option<String>,
    pub accepted: Option<bool>,
}

/// Operation against the message sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MessageOp {
    Append(Message),
    /// Replace in place when the id exists, append otherwise.
    Upsert(Message),
    /// Remove by id; missing ids are ignored.
    Delete { id: String },
}

/// Partial state returned by a stage. Absent fields leave state untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub messages: Vec<MessageOp>,
    pub requirements: Option<String>,
    pub code: Option<String>,
    pub accepted: Option<bool>,
}

impl StateUpdate {
    pub fn append(message: Message) -> Self {
        Self {
            messages: vec![MessageOp::Append(message)],
            ..Self::default()
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(MessageOp::Append(message));
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.requirements.is_none()
            && self.code.is_none()
            && self.accepted.is_none()
    }
}

/// Fold an update into the current state.
///
/// Scalar fields overwrite when present. Message operations apply in order and
/// never reorder retained messages.
pub fn merge(mut current: WorkflowState, update: StateUpdate) -> WorkflowState {
    for op in update.messages {
        apply_message_op(&mut current.messages, op);
    }
    if let Some(requirements) = update.requirements {
        current.requirements = Some(requirements);
    }
    if let Some(code) = update.code {
        current.code = Some(code);
    }
    if let Some(accepted) = update.accepted {
        current.accepted = Some(accepted);
    }
    current
}

fn apply_message_op(messages: &mut Vec<Message>, op: MessageOp) {
    match op {
        MessageOp::Append(message) => messages.push(message),
        MessageOp::Upsert(message) => {
            match messages.iter_mut().find(|existing| existing.id == message.id) {
                Some(existing) => *existing = message,
                None => messages.push(message),
            }
        }
        MessageOp::Delete { id } => messages.retain(|existing| existing.id != id),
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
