//! Per-model thinking delimiters

use std::collections::HashMap;

use crate::model::base_name;

/// Default text shown where a thinking region opens
pub const DEFAULT_START_REPLACEMENT: &str = "🤔 [Thinking...] ";
/// Default text shown where a thinking region closes
pub const DEFAULT_END_REPLACEMENT: &str = " [...done thinking] 💡 ";

/// Model families known to wrap reasoning in `<think>` tags
const BUILTIN_THINK_TAG_MODELS: &[&str] = &["deepseek-r1", "qwq", "qwen3"];

/// Delimiters bracketing a model's thinking output, and what to show instead
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThinkingMarkerSpec {
    /// Raw text opening a thinking region
    pub start_delimiter: String,
    /// Raw text closing a thinking region
    pub end_delimiter: String,
    /// Display text substituted for the start delimiter
    pub start_replacement: String,
    /// Display text substituted for the end delimiter
    pub end_replacement: String,
}

impl ThinkingMarkerSpec {
    /// Create a spec with the default replacement texts
    pub fn new(start_delimiter: impl Into<String>, end_delimiter: impl Into<String>) -> Self {
        Self {
            start_delimiter: start_delimiter.into(),
            end_delimiter: end_delimiter.into(),
            start_replacement: DEFAULT_START_REPLACEMENT.to_string(),
            end_replacement: DEFAULT_END_REPLACEMENT.to_string(),
        }
    }

    /// Override the replacement texts
    #[must_use]
    pub fn with_replacements(
        mut self,
        start_replacement: impl Into<String>,
        end_replacement: impl Into<String>,
    ) -> Self {
        self.start_replacement = start_replacement.into();
        self.end_replacement = end_replacement.into();
        self
    }

    /// Whether both delimiters are non-empty
    #[must_use]
    pub fn has_delimiters(&self) -> bool {
        !self.start_delimiter.is_empty() && !self.end_delimiter.is_empty()
    }

    /// `<think>` / `</think>` with default replacements
    #[must_use]
    pub fn think_tags() -> Self {
        Self::new("<think>", "</think>")
    }
}

/// Immutable table from model base name to thinking delimiters
///
/// Built once at startup; lookups never mutate it, so a single instance can
/// be shared by every streaming call.
#[derive(Clone, Debug, Default)]
pub struct ThinkingMarkerRegistry {
    entries: HashMap<String, ThinkingMarkerSpec>,
}

impl ThinkingMarkerRegistry {
    /// An empty registry: every model passes through unmodified
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table of reasoning models using `<think>` tags
    #[must_use]
    pub fn builtin() -> Self {
        Self::builtin_with_replacements(DEFAULT_START_REPLACEMENT, DEFAULT_END_REPLACEMENT)
    }

    /// The built-in table, showing custom text in place of the delimiters
    #[must_use]
    pub fn builtin_with_replacements(start_replacement: &str, end_replacement: &str) -> Self {
        Self::from_entries(BUILTIN_THINK_TAG_MODELS.iter().map(|name| {
            (
                (*name).to_string(),
                ThinkingMarkerSpec::think_tags()
                    .with_replacements(start_replacement, end_replacement),
            )
        }))
    }

    /// Build from `(base name, spec)` pairs; later pairs win on duplicates
    ///
    /// Specs with an empty delimiter are skipped with a warning.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, ThinkingMarkerSpec)>,
    {
        Self::empty().merged(entries)
    }

    /// Merge `overrides` over this table, returning the combined registry
    #[must_use]
    pub fn merged<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, ThinkingMarkerSpec)>,
    {
        for (name, spec) in overrides {
            if !spec.has_delimiters() {
                tracing::warn!(model = %name, "Ignoring thinking markers with an empty delimiter");
                continue;
            }
            self.entries.insert(name.to_lowercase(), spec);
        }
        self
    }

    /// Find the delimiters for a model
    ///
    /// The lookup key is the model's base name: the text before the first `:`,
    /// compared case-insensitively. `None` means the model's output is passed
    /// through untouched.
    #[must_use]
    pub fn lookup(&self, model_name: &str) -> Option<&ThinkingMarkerSpec> {
        self.entries.get(&base_name(model_name))
    }

    /// Number of configured model families
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no model has thinking delimiters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
