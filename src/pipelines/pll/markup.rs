//! `<span>` markup parsing and validation.
//!
//! A marked sentence holds its interest words between angle brackets:
//! `"The <women> are strong"`. Several disjoint spans are allowed
//! (`"<a><b> word"`), nesting is not.

use std::ops::Range;

use crate::error::MarkupRejection;

/// Opens a marked span.
pub const SPAN_OPEN: char = '<';
/// Closes a marked span.
pub const SPAN_CLOSE: char = '>';

/// One `<...>` region of a [`MarkedSentence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Byte offset of the opening `<`.
    pub start: usize,
    /// Byte offset just past the closing `>`.
    pub end: usize,
    /// Interior text, trimmed.
    pub text: String,
}

/// A validated sentence with at least one span and at least one word outside
/// every span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedSentence {
    raw: String,
    spans: Vec<Span>,
}

impl MarkedSentence {
    /// The input as given.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Spans in order of appearance.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Words outside every span.
    pub fn context_words(&self) -> Vec<&str> {
        let mut words = Vec::new();
        let mut cursor = 0;
        for span in &self.spans {
            words.extend(self.raw[cursor..span.start].split_whitespace());
            cursor = span.end;
        }
        words.extend(self.raw[cursor..].split_whitespace());
        words
    }

    /// Every word, delimiters removed.
    pub fn all_words(&self) -> Vec<&str> {
        self.raw
            .split(|c| c == SPAN_OPEN || c == SPAN_CLOSE)
            .flat_map(str::split_whitespace)
            .collect()
    }

    /// Word index ranges of each span inside [`all_words`](Self::all_words).
    pub fn span_word_ranges(&self) -> Vec<Range<usize>> {
        self.spans
            .iter()
            .map(|span| {
                let before = self.raw[..span.start]
                    .split(|c| c == SPAN_OPEN || c == SPAN_CLOSE)
                    .flat_map(str::split_whitespace)
                    .count();
                before..before + span.text.split_whitespace().count()
            })
            .collect()
    }

    /// The sentence with every span removed, words joined by single spaces.
    pub fn context_text(&self) -> String {
        self.context_words().join(" ")
    }

    /// The sentence with delimiters removed, words joined by single spaces.
    pub fn full_text(&self) -> String {
        self.all_words().join(" ")
    }
}

/// Validate `raw` and extract its spans.
///
/// Rules run in a fixed order and the first failure is returned:
/// marker counts, doubled markers, bracket matching, span interiors, and
/// finally that some context is left once spans are removed.
pub fn parse(raw: &str) -> std::result::Result<MarkedSentence, MarkupRejection> {
    let opening = raw.matches(SPAN_OPEN).count();
    let closing = raw.matches(SPAN_CLOSE).count();
    if opening + closing == 0 {
        return Err(MarkupRejection::NoMarkers);
    }
    if opening != closing {
        return Err(MarkupRejection::UnbalancedMarkers { opening, closing });
    }

    if raw.contains("<<") || raw.contains(">>") {
        return Err(MarkupRejection::DoubledMarkers);
    }

    check_balanced(raw)?;

    let spans = collect_spans(raw)?;

    let sentence = MarkedSentence {
        raw: raw.to_string(),
        spans,
    };
    if sentence.context_words().is_empty() {
        return Err(MarkupRejection::NoContext);
    }

    Ok(sentence)
}

fn check_balanced(raw: &str) -> std::result::Result<(), MarkupRejection> {
    let mut stack = Vec::new();
    for (offset, c) in raw.char_indices() {
        if c == SPAN_OPEN {
            stack.push(offset);
        } else if c == SPAN_CLOSE && stack.pop().is_none() {
            return Err(MarkupRejection::UnmatchedCloser { offset });
        }
    }
    match stack.first() {
        Some(&offset) => Err(MarkupRejection::UnclosedOpener { offset }),
        None => Ok(()),
    }
}

/// Pairs each `<` with the first `>` after it.
fn collect_spans(raw: &str) -> std::result::Result<Vec<Span>, MarkupRejection> {
    let mut spans = Vec::new();
    let mut search_from = 0;

    while let Some(rel_open) = raw[search_from..].find(SPAN_OPEN) {
        let start = search_from + rel_open;
        let interior_start = start + SPAN_OPEN.len_utf8();
        let Some(rel_close) = raw[interior_start..].find(SPAN_CLOSE) else {
            return Err(MarkupRejection::UnclosedOpener { offset: start });
        };
        let interior = &raw[interior_start..interior_start + rel_close];
        let end = interior_start + rel_close + SPAN_CLOSE.len_utf8();

        let text = interior.trim();
        if text.is_empty() {
            return Err(MarkupRejection::EmptySpan { offset: start });
        }
        if interior.contains(SPAN_OPEN) || interior.contains(SPAN_CLOSE) {
            return Err(MarkupRejection::NestedSpan { offset: start });
        }

        spans.push(Span {
            start,
            end,
            text: text.to_string(),
        });
        search_from = end;
    }

    Ok(spans)
}
