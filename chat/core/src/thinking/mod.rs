//! Thinking-Region Rewriting
//!
//! Reasoning models interleave their chain of thought with the answer,
//! bracketed by model-specific delimiters such as `<think>` and `</think>`.
//! This module surfaces that text to the reader with the raw delimiters
//! replaced by visible markers.
//!
//! - [`ThinkingMarkerRegistry`] maps a model's base name to its delimiters
//! - [`StreamBuffer`] rewrites one response incrementally, chunk by chunk
//!
//! # Example
//!
//! ```
//! use streamchat_core::thinking::{StreamBuffer, ThinkingMarkerRegistry};
//!
//! let registry = ThinkingMarkerRegistry::builtin();
//! let mut buffer = StreamBuffer::new(registry.lookup("deepseek-r1:7b").cloned());
//!
//! let mut shown = String::new();
//! for chunk in ["<thi", "nk>hmm</think>", "Answer"] {
//!     shown.extend(buffer.process(chunk));
//! }
//! shown.extend(buffer.flush());
//! assert!(shown.ends_with("Answer"));
//! assert!(!shown.contains("<think>"));
//! ```

mod buffer;
mod registry;

pub use buffer::StreamBuffer;
pub use registry::{
    ThinkingMarkerRegistry, ThinkingMarkerSpec, DEFAULT_END_REPLACEMENT,
    DEFAULT_START_REPLACEMENT,
};
