//! Persisted conversation state between invocations.
//!
//! A suspended run hands its state back to the caller; the CLI keeps it in a
//! JSON file and resupplies it with the user's next message.
use crate::state::WorkflowState;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default location: `<data dir>/graph-engineer/session.json`.
pub fn default_session_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(data_dir.join("graph-engineer").join("session.json"))
}

/// Load a session, or `None` when the file does not exist yet.
pub fn load(path: &Path) -> Result<Option<WorkflowState>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(path).with_context(|| format!("read session {}", path.display()))?;
    let state = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse session JSON {}", path.display()))?;
    Ok(Some(state))
}

/// Write a session atomically: a temp file in the same directory is renamed
/// over the target so readers never see a partial file.
pub fn save(path: &Path, state: &WorkflowState) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("create session dir {}", dir.display()))?;
    let text = serde_json::to_string_pretty(state).context("serialize session")?;
    let mut staged = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("stage session in {}", dir.display()))?;
    staged
        .write_all(text.as_bytes())
        .context("write staged session")?;
    staged
        .persist(path)
        .with_context(|| format!("publish session {}", path.display()))?;
    Ok(())
}
