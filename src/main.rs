use anyhow::{anyhow, Result};
use clap::Parser;
use graph_engineer::cli::{ChatArgs, Command, RootArgs, ShowArgs};
use graph_engineer::config::{ConfigOverrides, GraphConfig};
use graph_engineer::lm_log::LmLog;
use graph_engineer::loader::CachedLoader;
use graph_engineer::model::DefaultProvider;
use graph_engineer::session;
use graph_engineer::state::{Message, Origin, WorkflowState};
use graph_engineer::workflow::{Executor, RunOutcome, RunStatus};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "GRAPH_ENGINEER_LOG";

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Chat(args) => cmd_chat(args),
        Command::Show(args) => cmd_show(&args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("graph_engineer=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_session_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => session::default_session_path(),
    }
}

#[derive(Serialize)]
struct ChatReport<'a> {
    #[serde(flatten)]
    outcome: &'a RunOutcome,
    output: graph_engineer::OutputView,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<&'a str>,
}

fn cmd_chat(args: ChatArgs) -> Result<()> {
    let session_path = resolve_session_path(args.session.as_deref())?;
    let explicit = ConfigOverrides {
        draft_model: args.draft_model,
        gather_model: args.gather_model,
        critique_model: args.critique_model,
        lm_command: args.lm,
    };
    let config = GraphConfig::load(args.config.as_deref())?
        .with_overrides(explicit.or(ConfigOverrides::from_env()))?;

    let mut state = if args.new {
        WorkflowState::default()
    } else {
        session::load(&session_path)?.unwrap_or_default()
    };

    let provider = DefaultProvider::from_config(&config);
    let loader = CachedLoader::http();
    let lm_log = args.lm_log.map(LmLog::new);
    let executor = Executor::new(&config, &provider, &loader)?.with_log(lm_log.as_ref());

    let result = executor.resume(&mut state, Message::user(args.message));
    session::save(&session_path, &state)?;
    let outcome = result?;

    let reply = last_model_reply(&state);
    if args.json {
        let report = ChatReport {
            outcome: &outcome,
            output: state.output(),
            reply,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match outcome.status {
        RunStatus::Suspended => {
            let question = reply.ok_or_else(|| anyhow!("suspended without a question"))?;
            println!("{question}");
        }
        RunStatus::Completed => {
            if let Some(code) = state.code.as_deref() {
                println!("{code}");
            }
            eprintln!("accepted after {} steps", outcome.steps());
            eprintln!("session: {}", session_path.display());
        }
    }
    Ok(())
}

fn last_model_reply(state: &WorkflowState) -> Option<&str> {
    state
        .messages
        .iter()
        .rev()
        .find(|message| message.origin == Origin::Model)
        .map(|message| message.content.as_str())
}

fn cmd_show(args: &ShowArgs) -> Result<()> {
    let session_path = resolve_session_path(args.session.as_deref())?;
    let state = session::load(&session_path)?
        .ok_or_else(|| anyhow!("no session at {}", session_path.display()))?;
    println!("{}", serde_json::to_string_pretty(&state.output())?);
    Ok(())
}
