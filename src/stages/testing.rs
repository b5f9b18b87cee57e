//! Scripted collaborators for stage and executor tests.
use crate::config::Backend;
use crate::error::Result as WorkflowResult;
use crate::loader::ReferenceSource;
use crate::model::{ChatModel, ModelProvider, ModelReply, ModelRequest};
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
struct Script {
    replies: RefCell<VecDeque<Result<ModelReply>>>,
    requests: RefCell<Vec<(Backend, ModelRequest)>>,
}

/// Hands out models that replay a fixed list of replies in order.
#[derive(Clone, Default)]
pub(crate) struct ScriptedProvider {
    script: Rc<Script>,
}

impl ScriptedProvider {
    pub(crate) fn new(replies: Vec<Result<ModelReply>>) -> Self {
        let script = Script {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        };
        Self {
            script: Rc::new(script),
        }
    }

    pub(crate) fn replies(replies: Vec<ModelReply>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    pub(crate) fn requests(&self) -> Vec<(Backend, ModelRequest)> {
        self.script.requests.borrow().clone()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.script.replies.borrow().len()
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
    fn resolve(&self, backend: Backend) -> WorkflowResult<Box<dyn ChatModel>> {
        Ok(Box::new(ScriptedModel {
            backend,
            script: Rc::clone(&self.script),
        }))
    }
}

/// Reference source returning the same text for every url.
pub(crate) struct FixedReference(pub(crate) &'static str);

impl ReferenceSource for FixedReference {
    fn fetch(&self, _url: &str) -> String {
        self.0.to_string()
    }
}
