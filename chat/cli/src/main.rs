//! Streamchat - Terminal Chat Front-end
//!
//! A line-based REPL over the streamchat core: type a message, watch the
//! reply stream in, stop it with Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! # Chat with the default Ollama model
//! streamchat
//!
//! # Pick a model and a remote Ollama server
//! streamchat --model deepseek-r1:7b --host http://gpu-box:11434
//!
//! # Use an OpenAI-compatible API
//! OPENAI_API_KEY=sk-... streamchat --backend openai
//!
//! # Resume a previous session
//! streamchat --list-sessions
//! streamchat --session 20250101_120000_123_UTC
//!
//! # Verbose logging (to stderr)
//! streamchat -v
//! RUST_LOG=streamchat_core=trace streamchat
//! ```
//!
//! # Keys
//!
//! - `Ctrl+C` while a reply is streaming: stop the reply
//! - `Ctrl+C` or `Ctrl+D` at the prompt: quit

mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use streamchat_core::{
    default_config_path, load_config_from_path, BackendKind, ChatBackend, ChatConfig,
    ConfigOverrides, Conversation, ModelCatalog, OllamaBackend, OpenAiBackend, SessionId,
    SessionStore, StreamingChatOrchestrator,
};

use repl::Repl;

/// Streamchat - stream chat replies from local or hosted LLMs
#[derive(Parser, Debug)]
#[command(name = "streamchat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "STREAMCHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend to use (ollama, openai)
    #[arg(short = 'b', long, value_name = "KIND")]
    backend: Option<BackendKind>,

    /// Model to start with
    #[arg(short = 'm', long, value_name = "NAME")]
    model: Option<String>,

    /// Server URL for the selected backend
    #[arg(long, value_name = "URL")]
    host: Option<String>,

    /// Directory for session history
    #[arg(long, value_name = "DIR")]
    session_dir: Option<PathBuf>,

    /// Resume a stored session
    #[arg(short = 's', long, value_name = "ID")]
    session: Option<String>,

    /// Print available models and exit
    #[arg(long)]
    list_models: bool,

    /// Print recent sessions and exit
    #[arg(long)]
    list_sessions: bool,

    /// Debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            backend: self.backend,
            model: self.model.clone(),
            host: self.host.clone(),
            session_dir: self.session_dir.clone(),
        }
    }
}

/// Initialize logging to stderr so stdout carries only chat text
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!(
            "streamchat={level},streamchat_core={level}"
        ))
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Build the backend the configuration selects
fn build_backend(config: &ChatConfig) -> Arc<dyn ChatBackend> {
    match config.backend {
        BackendKind::Ollama => Arc::new(OllamaBackend::with_timeouts(
            &config.ollama_host,
            config.connect_timeout,
            config.request_timeout,
        )),
        BackendKind::OpenAi => Arc::new(OpenAiBackend::with_timeouts(
            &config.openai_base_url,
            config.openai_api_key.clone(),
            config.connect_timeout,
            config.request_timeout,
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config =
        load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);

    info!(
        backend = %config.backend,
        model = %config.preferred_model(),
        source = %config.source(),
        "Configuration loaded"
    );

    let store = SessionStore::new(&config.session_dir);
    if args.list_sessions {
        repl::print_sessions(&store, config.max_sessions_display).await;
        return Ok(());
    }

    let backend = build_backend(&config);
    if let Err(e) = backend.validate() {
        warn!(error = %e, "Backend is not fully configured");
    } else if !backend.health_check().await {
        warn!(url = %backend.chat_url(), "Backend is not reachable");
    }

    let catalog = ModelCatalog::discover(backend.as_ref(), Some(config.preferred_model())).await;
    if args.list_models {
        repl::print_models(&catalog);
        return Ok(());
    }

    let orchestrator =
        StreamingChatOrchestrator::new(config.thinking_registry()).with_backend(backend);

    let conversation = match args.session {
        Some(id) => Conversation::resume(&store, SessionId::from(id)).await,
        None => Conversation::new(),
    };

    Repl::new(
        orchestrator,
        catalog,
        store,
        conversation,
        config.max_sessions_display,
    )
    .run()
    .await
}
