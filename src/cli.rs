//! CLI argument parsing.
//!
//! The CLI is thin: it loads a session, hands it to the executor, and
//! persists whatever comes back.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "graph-engineer",
    version,
    about = "Conversational builder for LangGraph-style workflow code",
    after_help = "Examples:\n  graph-engineer chat \"Build a two-stage pipeline A->B then stop\"\n  graph-engineer chat \"B should not loop\"\n  graph-engineer show\n  graph-engineer chat --new --draft-model anthropic \"A RAG agent with a grader\"",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Emit debug logging on stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Chat(ChatArgs),
    Show(ShowArgs),
}

/// Send one message and run until the assistant needs input or is done.
#[derive(Parser, Debug)]
#[command(about = "Send a message and run the workflow")]
pub struct ChatArgs {
    /// Message from the user
    pub message: String,

    /// Session file holding the persisted conversation
    #[arg(long, value_name = "PATH")]
    pub session: Option<PathBuf>,

    /// Discard any existing session and start over
    #[arg(long)]
    pub new: bool,

    /// JSON config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Backend for drafting (openai, anthropic, command)
    #[arg(long, value_name = "BACKEND")]
    pub draft_model: Option<String>,

    /// Backend for requirement gathering
    #[arg(long, value_name = "BACKEND")]
    pub gather_model: Option<String>,

    /// Backend for critique
    #[arg(long, value_name = "BACKEND")]
    pub critique_model: Option<String>,

    /// Command line for the command backend
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Append model invocation records to this JSONL file
    #[arg(long, value_name = "PATH")]
    pub lm_log: Option<PathBuf>,

    /// Print the full run result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Print the current output snapshot of a session.
#[derive(Parser, Debug)]
#[command(about = "Show the code, requirements, and verdict of a session")]
pub struct ShowArgs {
    /// Session file holding the persisted conversation
    #[arg(long, value_name = "PATH")]
    pub session: Option<PathBuf>,
}
