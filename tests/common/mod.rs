//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use graph_engineer::config::Backend;
use graph_engineer::loader::ReferenceSource;
use graph_engineer::model::{
    Accept, Build, ChatModel, Decision, ModelProvider, ModelReply, ModelRequest,
};
use graph_engineer::WorkflowError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Default)]
struct Script {
    replies: RefCell<VecDeque<Result<ModelReply>>>,
    requests: RefCell<Vec<(Backend, ModelRequest)>>,
}

/// Model provider replaying a fixed list of replies, whichever backend asks.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Rc<Script>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        let script = Script {
            replies: RefCell::new(replies.into_iter().map(Ok).collect()),
            requests: RefCell::new(Vec::new()),
        };
        Self {
            script: Rc::new(script),
        }
    }

    pub fn requests(&self) -> Vec<(Backend, ModelRequest)> {
        self.script.requests.borrow().clone()
    }
}

struct ScriptedModel {
    backend: Backend,
    script: Rc<Script>,
}

impl ChatModel for ScriptedModel {
    fn invoke(&self, request: &ModelRequest) -> Result<ModelReply> {
        self.script
            .requests
            .borrow_mut()
            .push((self.backend, request.clone()));
        self.script
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("scripted model has no replies left")))
    }
}

impl ModelProvider for ScriptedProvider {
    fn resolve(&self, backend: Backend) -> Result<Box<dyn ChatModel>, WorkflowError> {
        Ok(Box::new(ScriptedModel {
            backend,
            script: Rc::clone(&self.script),
        }))
    }
}

/// Reference source that never touches the network.
pub struct FixedReference(pub &'static str);

impl ReferenceSource for FixedReference {
    fn fetch(&self, _url: &str) -> String {
        self.0.to_string()
    }
}

pub fn build(requirements: &str) -> ModelReply {
    ModelReply::decision(Decision::Build(Build {
        requirements: requirements.to_string(),
    }))
}

pub fn verdict(accepted: bool, logic: &str) -> ModelReply {
    ModelReply::decision(Decision::Accept(Accept {
        logic: logic.to_string(),
        accepted,
    }))
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
