//! Interactive read-eval-print loop
//!
//! Reads lines from stdin, sends plain text as chat turns and handles the
//! slash commands. Reply fragments go straight to stdout as they arrive.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use streamchat_core::{
    CancellationSignal, Conversation, ModelCatalog, SessionId, SessionStore, StreamPhase,
    StreamingChatOrchestrator,
};

const HELP: &str = "\
Commands:
  /new            start a new session
  /sessions       list recent sessions
  /load <id>      resume a stored session
  /models         list available models
  /model <name>   switch model
  /help           show this help
  /quit           exit

Anything else is sent to the model. Ctrl+C stops a reply; Ctrl+D quits.";

/// One parsed input line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplCommand {
    /// Chat text for the model
    Send(String),
    /// Start a fresh session
    New,
    /// List recent sessions
    Sessions,
    /// Resume a stored session
    Load(String),
    /// List models
    Models,
    /// Switch model
    Model(String),
    /// Show help
    Help,
    /// Exit
    Quit,
    /// Blank line
    Empty,
    /// A command used wrongly, with the message to show
    Invalid(String),
}

impl ReplCommand {
    /// Parse one line of input
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Send(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match (name, arg.is_empty()) {
            ("new", _) => Self::New,
            ("sessions", _) => Self::Sessions,
            ("load", false) => Self::Load(arg.to_string()),
            ("load", true) => Self::Invalid("Usage: /load <session id>".to_string()),
            ("models", _) => Self::Models,
            ("model", false) => Self::Model(arg.to_string()),
            ("model", true) => Self::Invalid("Usage: /model <name>".to_string()),
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit" | "q", _) => Self::Quit,
            (other, _) => Self::Invalid(format!("Unknown command /{other}. Type /help.")),
        }
    }
}

/// Print recent sessions, newest first
pub async fn print_sessions(store: &SessionStore, limit: usize) {
    let sessions = store.list(limit).await;
    if sessions.is_empty() {
        println!("No saved sessions in {}", store.dir().display());
        return;
    }
    for summary in sessions {
        println!("  {}  {}", summary.id, summary.title);
    }
}

/// Print the model catalog, marking the current model
pub fn print_models(catalog: &ModelCatalog) {
    let current = catalog.current().map(|m| m.name);
    if catalog.available().is_empty() {
        println!("No models available");
        return;
    }
    for (display, name) in catalog.choices() {
        let marker = if current.as_deref() == Some(name.as_str()) {
            '*'
        } else {
            ' '
        };
        println!("{marker} {display:<28} {name}");
    }
}

fn write_fragment(fragment: &str) {
    let mut out = std::io::stdout().lock();
    if out
        .write_all(fragment.as_bytes())
        .and_then(|()| out.flush())
        .is_err()
    {
        warn!("Failed to write to stdout");
    }
}

/// Terminal session state
pub struct Repl {
    orchestrator: StreamingChatOrchestrator,
    catalog: ModelCatalog,
    store: SessionStore,
    conversation: Conversation,
    list_limit: usize,
}

impl Repl {
    /// Create a REPL around an existing conversation
    pub fn new(
        orchestrator: StreamingChatOrchestrator,
        catalog: ModelCatalog,
        store: SessionStore,
        conversation: Conversation,
        list_limit: usize,
    ) -> Self {
        Self {
            orchestrator,
            catalog,
            store,
            conversation,
            list_limit,
        }
    }

    fn banner(&self) {
        let model = self
            .catalog
            .current()
            .map_or_else(|| "no model".to_string(), |m| m.display_name);
        println!(
            "streamchat - {model} - session {} (/help for commands)",
            self.conversation.id()
        );
    }

    fn replay_history(&self) {
        for turn in self.conversation.transcript() {
            println!("{}: {}\n", turn.role, turn.content);
        }
    }

    /// Run until `/quit`, Ctrl+D or Ctrl+C at the prompt
    pub async fn run(mut self) -> Result<()> {
        self.banner();
        self.replay_history();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            write_fragment("> ");

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            };
            let Some(line) = line else {
                println!();
                break;
            };

            match ReplCommand::parse(&line) {
                ReplCommand::Empty => {}
                ReplCommand::Send(text) => self.send(&text).await,
                ReplCommand::New => {
                    self.conversation = Conversation::new();
                    println!("Started session {}", self.conversation.id());
                }
                ReplCommand::Sessions => print_sessions(&self.store, self.list_limit).await,
                ReplCommand::Load(id) => self.load(SessionId::from(id)).await,
                ReplCommand::Models => print_models(&self.catalog),
                ReplCommand::Model(name) => match self.catalog.select(&name) {
                    Ok(model) => println!("Now using {}", model.display_name),
                    Err(e) => println!("{e}"),
                },
                ReplCommand::Help => println!("{HELP}"),
                ReplCommand::Invalid(message) => println!("{message}"),
                ReplCommand::Quit => break,
            }
        }

        Ok(())
    }

    async fn load(&mut self, id: SessionId) {
        if !self.store.exists(&id).await {
            println!("No session named {id}");
            return;
        }
        self.conversation = Conversation::resume(&self.store, id).await;
        println!("Resumed session {}", self.conversation.id());
        self.replay_history();
    }

    async fn send(&mut self, text: &str) {
        let cancel = CancellationSignal::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let result = self
            .conversation
            .exchange(
                &self.orchestrator,
                self.catalog.current(),
                &self.store,
                text,
                cancel,
                write_fragment,
            )
            .await;
        watcher.abort();
        println!("\n");

        match result {
            Ok(Some(outcome)) if outcome.phase == StreamPhase::Failed => {
                warn!(session = %self.conversation.id(), "Turn failed");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Failed to save session");
                eprintln!("{e}");
            }
        }
    }
}
