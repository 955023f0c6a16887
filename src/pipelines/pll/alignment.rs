//! Token alignment between the context-only and the full tokenization.
//!
//! Subword tokenizers do not keep a stable character-to-token mapping when
//! text is edited, so span tokens are found by diffing two independent
//! tokenizations instead: tokens in the longest common subsequence are
//! context, tokens only in the full sequence are span, and tokens only in the
//! context sequence are anomalous (the tokenizer re-segmented around the
//! removed span).

use std::ops::Range;

use super::markup::MarkedSentence;
use crate::error::{PipelineError, Result};

/// Role of one token in the alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    /// Present in both tokenizations; masked and scored.
    Context,
    /// Only in the full tokenization; held fixed, never masked.
    Span,
    /// Only in the context tokenization; neither masked nor fed to the model.
    Anomalous,
}

/// One step of the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentEntry {
    /// Token id.
    pub token_id: u32,
    /// Classification.
    pub class: TokenClass,
    /// Index into the full token sequence, `None` for anomalous entries.
    pub full_position: Option<usize>,
}

/// Both tokenizations of one marked sentence and their diff.
#[derive(Debug, Clone)]
pub struct TokenAlignment {
    context_tokens: Vec<u32>,
    full_tokens: Vec<u32>,
    entries: Vec<AlignmentEntry>,
}

impl TokenAlignment {
    /// Tokens of the sentence with spans removed.
    pub fn context_tokens(&self) -> &[u32] {
        &self.context_tokens
    }

    /// Tokens of the sentence with spans present.
    pub fn full_tokens(&self) -> &[u32] {
        &self.full_tokens
    }

    /// Diff entries in sequence order.
    pub fn entries(&self) -> &[AlignmentEntry] {
        &self.entries
    }

    fn count(&self, class: TokenClass) -> usize {
        self.entries.iter().filter(|e| e.class == class).count()
    }

    /// Number of scoreable context tokens.
    pub fn context_count(&self) -> usize {
        self.count(TokenClass::Context)
    }

    /// Number of span tokens.
    pub fn span_count(&self) -> usize {
        self.count(TokenClass::Span)
    }

    /// Number of anomalous tokens.
    pub fn anomalous_count(&self) -> usize {
        self.count(TokenClass::Anomalous)
    }
}

/// Sentinel positions (`[START]`, `[END]`) wrapped around every query.
pub const SENTINEL_TOKENS: usize = 2;

impl TokenAlignment {
    /// Diff two token sequences.
    ///
    /// `span_hint` holds the ranges of `full_tokens` where the marked spans
    /// are expected to land. Among the longest common subsequences, the one
    /// that puts the most span tokens inside those ranges wins, so a span
    /// word repeated in the neighbouring context is not mistaken for it.
    pub fn from_tokens(
        context_tokens: Vec<u32>,
        full_tokens: Vec<u32>,
        span_hint: &[Range<usize>],
    ) -> Self {
        let entries = diff(&context_tokens, &full_tokens, span_hint);
        Self {
            context_tokens,
            full_tokens,
            entries,
        }
    }
}

/// Tokenize both views of `sentence` with `tokenize` and diff the results.
///
/// `tokenize` must not add sentinel tokens. The full tokenization is checked
/// against `max_input_length` (sentinels included) before anything else is
/// tokenized or diffed.
pub fn align<F>(
    sentence: &MarkedSentence,
    max_input_length: usize,
    mut tokenize: F,
) -> Result<TokenAlignment>
where
    F: FnMut(&str) -> Result<Vec<u32>>,
{
    let full_text = sentence.full_text();
    let full_tokens = tokenize(&full_text)?;
    let tokens = full_tokens.len() + SENTINEL_TOKENS;
    if tokens > max_input_length {
        return Err(PipelineError::LengthExceeded {
            tokens,
            max: max_input_length,
        });
    }

    let context_text = sentence.context_text();
    let context_tokens = tokenize(&context_text)?;

    let words = sentence.all_words();
    let mut prefix_len = |count: usize| -> Result<usize> {
        if count == 0 {
            return Ok(0);
        }
        Ok(tokenize(&words[..count].join(" "))?.len().min(full_tokens.len()))
    };
    let span_hint = sentence
        .span_word_ranges()
        .into_iter()
        .map(|range| Ok(prefix_len(range.start)?..prefix_len(range.end)?))
        .collect::<Result<Vec<_>>>()?;

    let alignment = TokenAlignment::from_tokens(context_tokens, full_tokens, &span_hint);

    let anomalous = alignment.anomalous_count();
    if anomalous > 0 {
        tracing::warn!(
            anomalous,
            context_text = %context_text,
            full_text = %full_text,
            "tokenizations diverge outside the marked span; anomalous tokens are left unscored"
        );
    }

    Ok(alignment)
}

#[derive(Clone, Copy)]
enum Step {
    Match,
    Insert,
    Delete,
}

/// LCS diff of `context` (old) against `full` (new).
///
/// Every common subsequence of maximal length is a valid answer. Ties are
/// broken by the number of span tokens falling inside `span_hint`, then by
/// matching before inserting before deleting.
pub fn diff(context: &[u32], full: &[u32], span_hint: &[Range<usize>]) -> Vec<AlignmentEntry> {
    let n = context.len();
    let m = full.len();

    // A match outweighs every possible hint bonus.
    let match_weight = m as u64 + 1;
    let bonus = |j: usize| u64::from(span_hint.iter().any(|r| r.contains(&j)));

    // best[i][j] = weighted score of context[i..] against full[j..]
    let mut best = vec![vec![0u64; m + 1]; n + 1];
    for j in (0..m).rev() {
        best[n][j] = best[n][j + 1] + bonus(j);
    }
    let step = |best: &[Vec<u64>], i: usize, j: usize| -> (u64, Step) {
        let mut choice = (best[i][j + 1] + bonus(j), Step::Insert);
        if context[i] == full[j] {
            let matched = best[i + 1][j + 1] + match_weight;
            if matched >= choice.0 {
                choice = (matched, Step::Match);
            }
        }
        if best[i + 1][j] > choice.0 {
            choice = (best[i + 1][j], Step::Delete);
        }
        choice
    };
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            let (score, _) = step(&best, i, j);
            best[i][j] = score;
        }
    }

    let mut entries = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        let next = if i == n {
            Step::Insert
        } else if j == m {
            Step::Delete
        } else {
            step(&best, i, j).1
        };
        match next {
            Step::Match => {
                entries.push(AlignmentEntry {
                    token_id: full[j],
                    class: TokenClass::Context,
                    full_position: Some(j),
                });
                i += 1;
                j += 1;
            }
            Step::Insert => {
                entries.push(AlignmentEntry {
                    token_id: full[j],
                    class: TokenClass::Span,
                    full_position: Some(j),
                });
                j += 1;
            }
            Step::Delete => {
                entries.push(AlignmentEntry {
                    token_id: context[i],
                    class: TokenClass::Anomalous,
                    full_position: None,
                });
                i += 1;
            }
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::pll::markup::parse;
    use std::collections::HashMap;

    fn classes(entries: &[AlignmentEntry]) -> Vec<TokenClass> {
        entries.iter().map(|e| e.class).collect()
    }

    fn span_positions(alignment: &TokenAlignment) -> Vec<usize> {
        alignment
            .entries()
            .iter()
            .filter(|e| e.class == TokenClass::Span)
            .filter_map(|e| e.full_position)
            .collect()
    }

    /// Whitespace tokenizer assigning ids in first-seen order.
    fn word_tokenizer() -> impl FnMut(&str) -> Result<Vec<u32>> {
        let mut vocab: HashMap<String, u32> = HashMap::new();
        move |text: &str| {
            Ok(text
                .split_whitespace()
                .map(|w| {
                    let next = vocab.len() as u32;
                    *vocab.entry(w.to_string()).or_insert(next)
                })
                .collect())
        }
    }

    #[test]
    fn inserted_span_tokens_are_span() {
        use TokenClass::*;
        let entries = diff(&[1, 3, 4], &[1, 2, 3, 4], &[]);
        assert_eq!(classes(&entries), [Context, Span, Context, Context]);
        assert_eq!(entries[1].full_position, Some(1));
        assert_eq!(entries[3].full_position, Some(3));
    }

    #[test]
    fn multi_token_span_at_start() {
        use TokenClass::*;
        let entries = diff(&[7, 8], &[5, 6, 7, 8], &[0..2]);
        assert_eq!(classes(&entries), [Span, Span, Context, Context]);
    }

    #[test]
    fn context_only_tokens_are_anomalous() {
        use TokenClass::*;
        // "dumb ." re-segmented as one token once the span is gone
        let entries = diff(&[1, 9], &[1, 2, 3], &[1..3]);
        assert_eq!(classes(&entries), [Context, Span, Span, Anomalous]);
        assert_eq!(entries[3].full_position, None);
        assert_eq!(entries[3].token_id, 9);
    }

    #[test]
    fn every_full_token_appears_once_in_order() {
        let full = [4, 1, 4, 2, 4, 3];
        let entries = diff(&[1, 4, 3], &full, &[0..1, 3..5]);
        let positions: Vec<usize> = entries.iter().filter_map(|e| e.full_position).collect();
        assert_eq!(positions, (0..full.len()).collect::<Vec<_>>());
    }

    #[test]
    fn without_hint_matching_heads_are_context() {
        use TokenClass::*;
        let entries = diff(&[1, 2], &[1, 1, 2], &[]);
        assert_eq!(classes(&entries), [Context, Span, Context]);
    }

    #[test]
    fn hint_picks_span_copy_of_repeated_token() {
        use TokenClass::*;
        // "the cat sat on <the mat> the dog"
        let context = [1, 2, 3, 4, 1, 6];
        let full = [1, 2, 3, 4, 1, 5, 1, 6];
        let entries = diff(&context, &full, &[4..6]);
        assert_eq!(
            classes(&entries),
            [Context, Context, Context, Context, Span, Span, Context, Context]
        );

        // "<the> the cat" and "the <the> cat"
        assert_eq!(classes(&diff(&[1, 2], &[1, 1, 2], &[0..1])), [Span, Context, Context]);
        assert_eq!(classes(&diff(&[1, 2], &[1, 1, 2], &[1..2])), [Context, Span, Context]);
    }

    #[test]
    fn hint_never_costs_a_common_token() {
        // Hinting a range that matches the context must not drop a match.
        let entries = diff(&[1, 2, 3], &[1, 2, 9, 3], &[0..2]);
        let context = entries
            .iter()
            .filter(|e| e.class == TokenClass::Context)
            .count();
        assert_eq!(context, 3);
    }

    #[test]
    fn span_repeated_in_following_context() {
        let sentence = parse("the cat sat on <the mat> the dog").unwrap();
        let alignment = align(&sentence, 64, word_tokenizer()).unwrap();
        assert_eq!(span_positions(&alignment), [4, 5]);
        assert_eq!(alignment.context_count(), 6);
        assert_eq!(alignment.anomalous_count(), 0);
    }

    #[test]
    fn span_repeated_in_preceding_or_following_word() {
        let leading = parse("<the> the cat").unwrap();
        let alignment = align(&leading, 64, word_tokenizer()).unwrap();
        assert_eq!(span_positions(&alignment), [0]);

        let trailing = parse("the <the> cat").unwrap();
        let alignment = align(&trailing, 64, word_tokenizer()).unwrap();
        assert_eq!(span_positions(&alignment), [1]);
    }

    #[test]
    fn context_count_matches_retained_context_tokens() {
        let sentence = parse("The <women> are women").unwrap();
        let alignment = align(&sentence, 64, word_tokenizer()).unwrap();
        assert_eq!(alignment.context_tokens().len(), 3);
        assert_eq!(alignment.full_tokens().len(), 4);
        assert_eq!(alignment.context_count(), 3);
        assert_eq!(alignment.span_count(), 1);
        assert_eq!(alignment.anomalous_count(), 0);
        assert_eq!(alignment.entries()[1].class, TokenClass::Span);
    }

    #[test]
    fn long_input_is_rejected_before_the_context_is_tokenized() {
        let sentence = parse("the <cat> sat on the mat").unwrap();
        let mut calls = 0;
        let result = align(&sentence, 7, |text: &str| {
            calls += 1;
            Ok(text.split_whitespace().map(|_| 0).collect())
        });
        assert!(matches!(
            result,
            Err(PipelineError::LengthExceeded { tokens: 8, max: 7 })
        ));
        assert_eq!(calls, 1);
    }

    #[test]
    fn sentinels_count_toward_the_limit() {
        let sentence = parse("the <cat> sat").unwrap();
        assert!(align(&sentence, 5, word_tokenizer()).is_ok());
        assert!(align(&sentence, 4, word_tokenizer()).is_err());
    }

    #[test]
    fn tokenizer_errors_propagate() {
        let sentence = parse("a <b>").unwrap();
        let result = align(&sentence, 64, |_: &str| {
            Err(PipelineError::Tokenization("boom".into()))
        });
        assert!(result.is_err());
    }
}
