//! Incremental thinking-marker rewriter
//!
//! Raw model text arrives in arbitrarily sized chunks, so a delimiter such
//! as `<think>` can be split across two (or more) of them. [`StreamBuffer`]
//! accumulates raw text, replaces complete delimiters with their display
//! text, and holds back only the trailing bytes that could still grow into
//! the delimiter it is waiting for.

use super::registry::ThinkingMarkerSpec;

/// Stateful rewriter for one streaming response
///
/// Owned by a single streaming call and discarded at its end. Call
/// [`flush`](Self::flush) before discarding it or any held-back text is lost.
#[derive(Debug)]
pub struct StreamBuffer {
    markers: Option<ThinkingMarkerSpec>,
    pending: String,
    inside_thinking: bool,
}

impl StreamBuffer {
    /// Create a buffer; `None` disables rewriting entirely
    #[must_use]
    pub fn new(markers: Option<ThinkingMarkerSpec>) -> Self {
        Self {
            markers,
            pending: String::new(),
            inside_thinking: false,
        }
    }

    /// Whether the last delimiter seen opened a thinking region
    #[must_use]
    pub fn inside_thinking(&self) -> bool {
        self.inside_thinking
    }

    /// Bytes currently held back waiting for more input
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed one raw chunk, returning the display fragments now ready
    ///
    /// Without markers the chunk is returned unchanged and nothing is held.
    /// Thinking-region content is surfaced verbatim between the replacements.
    pub fn process(&mut self, chunk: &str) -> Vec<String> {
        let Some(markers) = self.markers.as_ref() else {
            return if chunk.is_empty() {
                Vec::new()
            } else {
                vec![chunk.to_string()]
            };
        };

        self.pending.push_str(chunk);
        let mut out = Vec::new();

        loop {
            let (delimiter, replacement) = if self.inside_thinking {
                (&markers.end_delimiter, &markers.end_replacement)
            } else {
                (&markers.start_delimiter, &markers.start_replacement)
            };

            // An empty delimiter never matches
            let found = if delimiter.is_empty() {
                None
            } else {
                self.pending.find(delimiter.as_str())
            };

            if let Some(pos) = found {
                push_nonempty(&mut out, &self.pending[..pos]);
                push_nonempty(&mut out, replacement);
                self.pending.drain(..pos + delimiter.len());
                self.inside_thinking = !self.inside_thinking;
                continue;
            }

            // No complete delimiter: release everything except a tail that
            // might be the start of one.
            let held = partial_delimiter_suffix(&self.pending, delimiter);
            let ready = self.pending.len() - held;
            if ready > 0 {
                out.push(self.pending[..ready].to_string());
                self.pending.drain(..ready);
            }
            break;
        }

        out
    }

    /// Release any held-back text
    ///
    /// Emits the residue exactly once whether or not a thinking region is
    /// still open; a second call returns nothing.
    pub fn flush(&mut self) -> Vec<String> {
        if self.pending.is_empty() {
            Vec::new()
        } else {
            vec![std::mem::take(&mut self.pending)]
        }
    }
}

fn push_nonempty(out: &mut Vec<String>, text: &str) {
    if !text.is_empty() {
        out.push(text.to_string());
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of
/// `delimiter`
fn partial_delimiter_suffix(text: &str, delimiter: &str) -> usize {
    if delimiter.is_empty() {
        return 0;
    }
    let longest = delimiter.len().saturating_sub(1).min(text.len());
    let first = text.len() - longest;

    (first..text.len())
        .filter(|&i| text.is_char_boundary(i))
        .find(|&i| delimiter.starts_with(&text[i..]))
        .map_or(0, |i| text.len() - i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scenario_markers() -> ThinkingMarkerSpec {
        ThinkingMarkerSpec::new("<think>", "</think>").with_replacements("🤔 [...] ", "💡")
    }

    fn run(buffer: &mut StreamBuffer, chunks: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(buffer.process(chunk));
        }
        out.extend(buffer.flush());
        out
    }

    #[test]
    fn test_delimiters_split_across_chunks() {
        let mut buffer = StreamBuffer::new(Some(scenario_markers()));
        let out = run(&mut buffer, &["Hello <think", ">thinking... </thi", "nk> world"]);

        assert_eq!(out.concat(), "Hello 🤔 [...] thinking... 💡 world");
        assert_eq!(out[0], "Hello ");
        assert_eq!(out[1], "🤔 [...] ");
    }

    #[test]
    fn test_every_two_way_split_round_trips() {
        let raw = "pre <think>inner é text</think> post";
        let expected = "pre 🤔 [...] inner é text💡 post";

        for split in (0..=raw.len()).filter(|&i| raw.is_char_boundary(i)) {
            let mut buffer = StreamBuffer::new(Some(scenario_markers()));
            let out = run(&mut buffer, &[&raw[..split], &raw[split..]]);
            assert_eq!(out.concat(), expected, "split at byte {split}");
        }
    }

    #[test]
    fn test_byte_at_a_time_round_trips() {
        let raw = "a<think>b</think>c";
        let chunks: Vec<String> = raw.chars().map(String::from).collect();
        let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();

        let mut buffer = StreamBuffer::new(Some(scenario_markers()));
        let out = run(&mut buffer, &chunk_refs);
        assert_eq!(out.concat(), "a🤔 [...] b💡c");
    }

    #[test]
    fn test_both_markers_in_one_chunk() {
        let mut buffer = StreamBuffer::new(Some(scenario_markers()));
        let out = buffer.process("<think>plan</think>answer");

        assert_eq!(out, vec!["🤔 [...] ", "plan", "💡", "answer"]);
        assert!(!buffer.inside_thinking());
        assert!(buffer.flush().is_empty());
    }

    #[test]
    fn test_plain_text_is_released_immediately() {
        let mut buffer = StreamBuffer::new(Some(scenario_markers()));
        assert_eq!(buffer.process("no markers here"), vec!["no markers here"]);
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_only_partial_delimiter_is_held() {
        let mut buffer = StreamBuffer::new(Some(scenario_markers()));
        assert_eq!(buffer.process("Hello <thi"), vec!["Hello "]);
        assert_eq!(buffer.pending_len(), "<thi".len());

        // Turned out not to be a delimiter
        assert_eq!(buffer.process("s is"), vec!["<this is"]);
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_passthrough_without_markers() {
        let chunks = ["<think>", "raw ", "", "</think>", " text"];
        let mut buffer = StreamBuffer::new(None);

        let mut out = Vec::new();
        for chunk in chunks {
            let fragments = buffer.process(chunk);
            assert_eq!(buffer.pending_len(), 0);
            out.extend(fragments);
        }
        out.extend(buffer.flush());

        assert_eq!(out.concat(), chunks.concat());
    }

    #[test]
    fn test_flush_is_idempotent() {
        let mut buffer = StreamBuffer::new(Some(scenario_markers()));
        buffer.process("tail <thi");

        assert_eq!(buffer.flush(), vec!["<thi"]);
        assert!(buffer.flush().is_empty());
    }

    #[test]
    fn test_unterminated_region_keeps_everything() {
        let mut buffer = StreamBuffer::new(Some(scenario_markers()));
        let out = run(&mut buffer, &["<think>still reasoning", " when the stream </th"]);

        assert_eq!(out.concat(), "🤔 [...] still reasoning when the stream </th");
        assert!(buffer.inside_thinking());
    }

    #[test]
    fn test_stray_end_delimiter_is_plain_text() {
        let mut buffer = StreamBuffer::new(Some(scenario_markers()));
        let out = run(&mut buffer, &["done</think> and more"]);

        assert_eq!(out.concat(), "done</think> and more");
        assert!(!buffer.inside_thinking());
    }

    #[test]
    fn test_start_delimiter_inside_region_is_content() {
        let mut buffer = StreamBuffer::new(Some(scenario_markers()));
        let out = run(&mut buffer, &["<think>a <think> b</think>c"]);

        assert_eq!(out.concat(), "🤔 [...] a <think> b💡c");
    }

    #[test]
    fn test_partial_suffix_respects_char_boundaries() {
        assert_eq!(partial_delimiter_suffix("abc<", "<think>"), 1);
        assert_eq!(partial_delimiter_suffix("abc", "<think>"), 0);
        assert_eq!(partial_delimiter_suffix("x«", "«»"), "«".len());
        assert_eq!(partial_delimiter_suffix("<think", "<think>"), 6);
        assert_eq!(partial_delimiter_suffix("", "<think>"), 0);
    }

    #[test]
    fn test_empty_delimiters_never_match() {
        let mut buffer = StreamBuffer::new(Some(ThinkingMarkerSpec::new("", "")));
        assert_eq!(buffer.process("hi"), vec!["hi"]);
        assert!(!buffer.inside_thinking());
        assert!(buffer.flush().is_empty());

        let mut buffer = StreamBuffer::new(Some(ThinkingMarkerSpec::new("<think>", "")));
        let out = run(&mut buffer, &["<think>never", " closed"]);
        assert_eq!(out.concat(), "🤔 [Thinking...] never closed");
        assert!(buffer.inside_thinking());
    }
}
