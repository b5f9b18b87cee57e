//! Model invocation log.
//!
//! Every stage call that reaches a model is appended to a newline-delimited
//! JSON file so a run can be reconstructed afterwards:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"step":1,"node":"gather","backend":"openai","duration_ms":900,...}
//! {"schema_version":1,"ts":1707900004000,"step":2,"node":"draft","backend":"openai","duration_ms":4100,...}
//! ```
use crate::config::Backend;
use crate::model::DecisionKind;
use crate::workflow::Node;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Current schema version for log entries.
pub const LM_LOG_SCHEMA_VERSION: u32 = 1;

/// Outcome of a model invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmOutcome {
    Success,
    Failed,
}

/// A single model invocation log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmLogEntry {
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the invocation finished.
    pub ts: u64,

    /// Stage execution number within the invocation (1-indexed).
    pub step: usize,

    pub node: Node,

    pub backend: Backend,

    pub duration_ms: u64,

    /// Turns in the prompt sent to the model.
    pub message_count: usize,

    /// Decision carried by the reply, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_bytes: Option<usize>,

    pub outcome: LmOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Times an invocation and produces its entry.
pub struct LmLogBuilder {
    start: Instant,
    step: usize,
    node: Node,
    backend: Backend,
    message_count: usize,
}

impl LmLogBuilder {
    pub fn new(step: usize, node: Node, backend: Backend) -> Self {
        Self {
            start: Instant::now(),
            step,
            node,
            backend,
            message_count: 0,
        }
    }

    pub fn with_message_count(mut self, count: usize) -> Self {
        self.message_count = count;
        self
    }

    pub fn success(self, decision: Option<DecisionKind>, response_bytes: usize) -> LmLogEntry {
        self.build(LmOutcome::Success, decision, Some(response_bytes), None)
    }

    pub fn failed(self, error: impl Into<String>) -> LmLogEntry {
        self.build(LmOutcome::Failed, None, None, Some(error.into()))
    }

    fn build(
        self,
        outcome: LmOutcome,
        decision: Option<DecisionKind>,
        response_bytes: Option<usize>,
        error: Option<String>,
    ) -> LmLogEntry {
        LmLogEntry {
            schema_version: LM_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            step: self.step,
            node: self.node,
            backend: self.backend,
            duration_ms: self.start.elapsed().as_millis() as u64,
            message_count: self.message_count,
            decision,
            response_bytes,
            outcome,
            error,
        }
    }
}

/// Append-only JSONL log file.
#[derive(Debug, Clone)]
pub struct LmLog {
    path: PathBuf,
}

impl LmLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &LmLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("create directory for lm_log")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open lm_log for append: {}", self.path.display()))?;
        let line = serde_json::to_string(entry).context("serialize lm_log entry")?;
        writeln!(file, "{line}").context("write lm_log entry")?;
        Ok(())
    }

    /// Load all entries, skipping lines that fail to parse.
    pub fn load(&self) -> Result<Vec<LmLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("open lm_log: {}", self.path.display()))?;
        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("read line {} of lm_log", line_num + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LmLogEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(line = line_num + 1, error = %err, "skip corrupt lm_log entry");
                }
            }
        }
        Ok(entries)
    }
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
