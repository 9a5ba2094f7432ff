//! Removal of model reasoning from answers.
//!
//! Reasoning models wrap their scratch work in `<think>` or `<thinking>`
//! tags. [`strip_reasoning`] cleans a complete answer; [`ReasoningFilter`]
//! does the same for a fragment stream.

use std::sync::LazyLock;

use regex::Regex;

/// Opening and closing tag pairs, lowercase.
const TAGS: [(&str, &str); 2] = [("<thinking>", "</thinking>"), ("<think>", "</think>")];

/// Phrases that mark a line as thinking aloud.
const THINKING_MARKERS: [&str; 6] = [
    "let me think",
    "thinking about",
    "i need to consider",
    "let me analyze",
    "first, i should",
    "i should examine",
];

/// Line prefixes that end a thinking-aloud passage.
const ANSWER_OPENERS: [&str; 3] = ["Based on", "According to", "The"];

static REASONING_SPANS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?is)<thinking>.*?</thinking>").expect("valid thinking pattern"),
        Regex::new(r"(?is)<think>.*?</think>").expect("valid think pattern"),
    ]
});

/// Removes tagged reasoning spans and thinking-aloud passages from a
/// complete answer.
///
/// A passage starts at a line containing a thinking marker (the line is
/// dropped) and ends at the next line opening like an answer, which is kept.
pub fn strip_reasoning(text: &str) -> String {
    let mut text = text.to_string();
    for span in REASONING_SPANS.iter() {
        text = span.replace_all(&text, "").into_owned();
    }

    let mut kept = Vec::new();
    let mut skipping = false;
    for line in text.split('\n') {
        let lower = line.trim().to_lowercase();
        if THINKING_MARKERS.iter().any(|marker| lower.contains(marker)) {
            skipping = true;
            continue;
        }

        let trimmed = line.trim();
        if skipping && ANSWER_OPENERS.iter().any(|opener| trimmed.starts_with(opener)) {
            skipping = false;
        }

        if !skipping {
            kept.push(line);
        }
    }

    kept.join("\n").trim().to_string()
}

/// Streaming counterpart of [`strip_reasoning`] for tagged spans.
///
/// Tags may be split across fragments. The filter holds back at most the
/// trailing bytes that could still turn into a tag, and drops leading
/// whitespace until the first visible text. An unterminated span at the end
/// of the stream is discarded.
#[derive(Debug, Default, Clone)]
pub struct ReasoningFilter {
    pending: String,
    closing: Option<&'static str>,
    started: bool,
}

impl ReasoningFilter {
    /// Creates a filter outside any reasoning span.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one fragment and returns the text that is now safe to show.
    pub fn push(&mut self, fragment: &str) -> String {
        self.pending.push_str(fragment);
        let mut visible = String::new();

        loop {
            // ASCII lowercasing keeps byte offsets aligned with `pending`.
            let lower = self.pending.to_ascii_lowercase();

            match self.closing {
                Some(closing) => match lower.find(closing) {
                    Some(at) => {
                        self.pending.drain(..at + closing.len());
                        self.closing = None;
                    }
                    None => {
                        let keep = partial_suffix(&lower, [closing]);
                        self.pending.drain(..self.pending.len() - keep);
                        break;
                    }
                },
                None => {
                    let opening = TAGS
                        .iter()
                        .filter_map(|&(open, close)| lower.find(open).map(|at| (at, open, close)))
                        .min_by_key(|&(at, ..)| at);

                    match opening {
                        Some((at, open, close)) => {
                            visible.push_str(&self.pending[..at]);
                            self.pending.drain(..at + open.len());
                            self.closing = Some(close);
                        }
                        None => {
                            let keep = partial_suffix(&lower, TAGS.map(|(open, _)| open));
                            let cut = self.pending.len() - keep;
                            visible.push_str(&self.pending[..cut]);
                            self.pending.drain(..cut);
                            break;
                        }
                    }
                }
            }
        }

        self.reveal(visible)
    }

    /// Flushes held-back text once the stream has ended.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        if self.closing.take().is_some() {
            return String::new();
        }
        self.reveal(rest)
    }

    fn reveal(&mut self, mut text: String) -> String {
        if !self.started {
            text = text.trim_start().to_string();
            self.started = !text.is_empty();
        }
        text
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of a tag.
fn partial_suffix<const N: usize>(text: &str, tags: [&str; N]) -> usize {
    tags.into_iter()
        .flat_map(|tag| (1..tag.len()).rev().find(|&n| text.ends_with(&tag[..n])))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(fragments: &[&str]) -> String {
        let mut filter = ReasoningFilter::new();
        let mut out: String = fragments.iter().map(|f| filter.push(f)).collect();
        out.push_str(&filter.finish());
        out
    }

    #[test]
    fn strips_tagged_spans() {
        assert_eq!(
            strip_reasoning("<think>\nhmm\n</think>\n\nParis is the capital."),
            "Paris is the capital."
        );
        assert_eq!(strip_reasoning("A <THINKING>secret</thinking>B"), "A B");
    }

    #[test]
    fn strips_thinking_aloud_lines() {
        let answer = "Let me think about this.\nstill pondering\nThe answer is 4.\nDone.";
        assert_eq!(strip_reasoning(answer), "The answer is 4.\nDone.");
    }

    #[test]
    fn thinking_aloud_without_opener_drops_the_rest() {
        assert_eq!(strip_reasoning("Intro\nI need to consider x\ny"), "Intro");
    }

    #[test]
    fn plain_answer_is_untouched() {
        assert_eq!(strip_reasoning("  Plain answer.\n"), "Plain answer.");
    }

    #[test]
    fn stream_removes_span_in_one_fragment() {
        assert_eq!(stream(&["<think>x</think>Hello", " world"]), "Hello world");
    }

    #[test]
    fn stream_handles_tags_split_across_fragments() {
        assert_eq!(
            stream(&["Hi <thi", "nking>sec", "ret</thin", "king> there"]),
            "Hi  there"
        );
        assert_eq!(stream(&["<", "t", "h", "i", "n", "k", ">", "x", "</think>", "ok"]), "ok");
    }

    #[test]
    fn stream_holds_back_only_possible_tags() {
        let mut filter = ReasoningFilter::new();
        assert_eq!(filter.push("a <b"), "a <b");
        assert_eq!(filter.push(" c <th"), " c ");
        assert_eq!(filter.push("e end"), "<the end");
        assert_eq!(filter.finish(), "");
    }

    #[test]
    fn stream_flushes_partial_tag_at_end() {
        assert_eq!(stream(&["value <"]), "value <");
    }

    #[test]
    fn stream_discards_unterminated_span() {
        assert_eq!(stream(&["Answer.<think>never closed"]), "Answer.");
    }

    #[test]
    fn stream_trims_leading_whitespace() {
        let mut filter = ReasoningFilter::new();
        assert_eq!(filter.push("<think>x</think>\n\n"), "");
        assert_eq!(filter.push("  Yes"), "Yes");
        assert_eq!(filter.push(" indeed"), " indeed");
    }

    #[test]
    fn stream_keeps_multibyte_text() {
        assert_eq!(stream(&["héllo <thi", "nk>é</think>wörld"]), "héllo wörld");
    }
}
