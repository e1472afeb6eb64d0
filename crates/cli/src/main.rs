//! `confab` — local harness for the assistant backend.
//!
//! Wires the engine against the in-process context store and either a real
//! OpenAI-compatible endpoint or the scripted offline backend. The real
//! transport layer (HTTP service, voice front-end) is a separate concern;
//! this binary exists to exercise the pipeline end to end from a terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use confab_config::AppConfig;
use confab_context::InMemoryContextStore;
use confab_core::completion::CompletionBackend;
use confab_core::utterance::{ConversationId, ScopeId, Utterance};
use confab_engine::Engine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(name = "confab", version, about = "Conversational assistant backend harness")]
struct Cli {
    /// Path to confab.toml; defaults apply when omitted
    #[arg(long, env = "CONFAB_CONFIG")]
    config: Option<PathBuf>,

    /// User scope id to run under
    #[arg(long, default_value = "local")]
    scope: String,

    /// Use the scripted offline backend instead of HTTP
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send one utterance and print the reply
    Ask { text: Vec<String> },

    /// Interactive line-oriented session (default)
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confab=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path).map_err(|e| anyhow::anyhow!(e))?,
        None => AppConfig::load_default().map_err(|e| anyhow::anyhow!(e))?,
    };

    let store = Arc::new(InMemoryContextStore::new());
    let registry = Arc::new(confab_handlers::default_registry(store.clone()));

    let backend: Arc<dyn CompletionBackend> = if cli.offline {
        info!("running with the scripted offline backend");
        Arc::new(confab_engine::testing::ScriptedBackend::always(
            "I'm running offline, so that's the best I can do.",
        ))
    } else {
        Arc::new(
            confab_completion::HttpBackend::new(
                &config.backend.base_url,
                config.backend.api_key.clone().unwrap_or_default(),
                Duration::from_millis(config.backend.request_timeout_ms),
            )
            .context("building completion backend")?,
        )
    };

    let engine = Engine::new(config, store, backend, registry);
    let reaper = engine.start_reaper();

    let scope = ScopeId::new(&cli.scope);
    let result = match cli.command.unwrap_or(Command::Repl) {
        Command::Ask { text } => ask_once(&engine, &scope, &text.join(" ")).await,
        Command::Repl => repl(&engine, &scope).await,
    };

    reaper.abort();
    result
}

async fn ask_once(engine: &Engine, scope: &ScopeId, text: &str) -> Result<()> {
    let utterance = Utterance::new(text, scope.clone(), ConversationId::new());
    let reply = engine.handle(utterance).await?;
    println!("{}", reply.text);
    print_metadata(&reply);
    Ok(())
}

async fn repl(engine: &Engine, scope: &ScopeId) -> Result<()> {
    let conversation = ConversationId::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all(b"confab> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            stdout.write_all(b"confab> ").await?;
            stdout.flush().await?;
            continue;
        }
        if text == "/quit" || text == "/exit" {
            break;
        }

        let utterance = Utterance::new(text, scope.clone(), conversation.clone());
        match engine.handle(utterance).await {
            Ok(reply) => {
                println!("{}", reply.text);
                print_metadata(&reply);
            }
            Err(err) => println!("(request failed: {err})"),
        }

        stdout.write_all(b"confab> ").await?;
        stdout.flush().await?;
    }
    Ok(())
}

fn print_metadata(reply: &confab_core::reply::Reply) {
    if reply.has_low_confidence_claims() {
        let flagged = reply
            .annotations
            .iter()
            .filter(|a| a.verdict != confab_core::reply::Verdict::Supported)
            .count();
        println!("  [{} claim(s) not grounded in stored facts]", flagged);
    }
    if let Some(report) = &reply.task_report {
        if !report.all_succeeded() {
            println!("  [{} step(s) incomplete]", report.failures().count());
        }
    }
}
