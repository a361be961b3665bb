//! Model Selection
//!
//! Describes which model a turn is sent to and on which backend, and keeps
//! the process-wide "current model" that a front-end can switch.
//!
//! The current model is only ever read as an immutable snapshot: each turn
//! clones the descriptor once when it starts, so a switch made while a
//! response is streaming takes effect on the next turn.

use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::backend::{ChatBackend, ChatError};

/// Which wire protocol a model is served over
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local Ollama server (`/api/chat`, newline-delimited JSON)
    #[default]
    Ollama,
    /// OpenAI-compatible API (`/v1/chat/completions`, server-sent events)
    #[serde(rename = "openai")]
    OpenAi,
}

impl BackendKind {
    /// Configuration name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!(
                "unknown backend `{other}` (expected `ollama` or `openai`)"
            )),
        }
    }
}

/// A model a turn can be sent to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Canonical backend identifier, e.g. `deepseek-r1:4b`
    pub name: String,
    /// Human-readable name, e.g. `Deepseek R1 (4b)`
    pub display_name: String,
    /// Backend serving this model
    pub backend: BackendKind,
}

impl ModelDescriptor {
    /// Create a descriptor, deriving the display name from the model name
    pub fn new(name: impl Into<String>, backend: BackendKind) -> Self {
        let name = name.into();
        Self {
            display_name: display_name(&name),
            name,
            backend,
        }
    }

    /// The model family without version tag, lowercased
    #[must_use]
    pub fn base_name(&self) -> String {
        base_name(&self.name)
    }
}

/// Strip the version tag (everything from the first `:`) and lowercase
///
/// `DeepSeek-R1:4b` becomes `deepseek-r1`.
#[must_use]
pub fn base_name(model_name: &str) -> String {
    model_name
        .split(':')
        .next()
        .unwrap_or(model_name)
        .to_lowercase()
}

/// Turn a model identifier into a label for menus
///
/// Drops a `:latest` tag, title-cases the dash-separated family name and
/// appends any other tag in parentheses.
#[must_use]
pub fn display_name(model_name: &str) -> String {
    let name = model_name.strip_suffix(":latest").unwrap_or(model_name);
    let (family, version) = match name.split_once(':') {
        Some((family, version)) => (family, version),
        None => (name, ""),
    };

    let words: Vec<String> = family
        .replace('-', " ")
        .split_whitespace()
        .map(capitalize)
        .collect();
    let label = words.join(" ");

    if version.is_empty() {
        label
    } else {
        format!("{label} ({version})")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// The set of selectable models plus the current selection
#[derive(Debug, Default)]
pub struct ModelCatalog {
    available: Vec<ModelDescriptor>,
    current: RwLock<Option<ModelDescriptor>>,
}

impl ModelCatalog {
    /// Build a catalog and pick the starting model
    ///
    /// Uses `preferred` if it is among `available`, otherwise the first
    /// available model.
    #[must_use]
    pub fn new(available: Vec<ModelDescriptor>, preferred: Option<&str>) -> Self {
        let mut current = None;

        if let Some(wanted) = preferred {
            current = available.iter().find(|m| m.name == wanted).cloned();
            if current.is_none() {
                tracing::warn!(model = %wanted, "Preferred model not installed");
            }
        }

        if current.is_none() {
            current = available.first().cloned();
            if let Some(ref model) = current {
                tracing::info!(model = %model.name, "Using first available model");
            }
        }

        Self {
            available,
            current: RwLock::new(current),
        }
    }

    /// Enumerate a backend's installed models
    ///
    /// If discovery fails or finds nothing, a configured `preferred` model is
    /// registered as the only entry so turns still reach the backend.
    pub async fn discover(backend: &dyn ChatBackend, preferred: Option<&str>) -> Self {
        let kind = backend.kind();
        let mut available = match backend.list_models().await {
            Ok(models) => models
                .into_iter()
                .map(|info| ModelDescriptor::new(info.name, kind))
                .collect::<Vec<_>>(),
            Err(e) => {
                tracing::warn!(backend = %backend.name(), error = %e, "Model discovery failed");
                Vec::new()
            }
        };

        if available.is_empty() {
            if let Some(name) = preferred {
                available.push(ModelDescriptor::new(name, kind));
            }
        }

        tracing::debug!(count = available.len(), backend = %kind, "Discovered models");
        Self::new(available, preferred)
    }

    /// Snapshot of the current model
    #[must_use]
    pub fn current(&self) -> Option<ModelDescriptor> {
        self.current.read().clone()
    }

    /// Switch the current model
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Configuration`] if `name` is not in the catalog.
    pub fn select(&self, name: &str) -> Result<ModelDescriptor, ChatError> {
        let model = self
            .get(name)
            .cloned()
            .ok_or_else(|| ChatError::Configuration(format!("model `{name}` is not available")))?;
        *self.current.write() = Some(model.clone());
        tracing::info!(model = %model.name, "Model changed");
        Ok(model)
    }

    /// Look up a model by canonical name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModelDescriptor> {
        self.available.iter().find(|m| m.name == name)
    }

    /// All selectable models
    #[must_use]
    pub fn available(&self) -> &[ModelDescriptor] {
        &self.available
    }

    /// `(display_name, name)` pairs for a selection menu
    #[must_use]
    pub fn choices(&self) -> Vec<(String, String)> {
        self.available
            .iter()
            .map(|m| (m.display_name.clone(), m.name.clone()))
            .collect()
    }
}
