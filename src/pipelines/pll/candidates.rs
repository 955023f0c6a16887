//! Candidate fill words for a single `*` blank.

use std::collections::HashSet;

use candle_core::{DType, IndexOp, D};
use candle_nn::ops::softmax;

use super::language::ClosedClassWords;
use super::model::MaskedLanguageModel;
use crate::error::{PipelineError, Result};

/// Marks the blank of a substitution template.
pub const BLANK: char = '*';

/// A proposed fill word.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Surface form, trimmed.
    pub word: String,
    /// Model probability at the blank. Only used to order proposals.
    pub probability: f32,
}

/// Closed word classes a proposal may be excluded from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExcludedCategories {
    /// Drop articles.
    pub articles: bool,
    /// Drop prepositions.
    pub prepositions: bool,
    /// Drop conjunctions.
    pub conjunctions: bool,
}

/// Which vocabulary entries may be proposed.
///
/// Punctuation, continuation fragments and special tokens are always
/// rejected; banned words and closed-class words are caller-controlled.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    banned: HashSet<String>,
    exclude: ExcludedCategories,
}

impl CandidateFilter {
    /// A filter with no banned words and no excluded classes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Never propose these words (case-insensitive).
    pub fn banned_words<I>(mut self, words: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.banned.extend(
            words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty()),
        );
        self
    }

    /// Exclude articles.
    pub fn exclude_articles(mut self, yes: bool) -> Self {
        self.exclude.articles = yes;
        self
    }

    /// Exclude prepositions.
    pub fn exclude_prepositions(mut self, yes: bool) -> Self {
        self.exclude.prepositions = yes;
        self
    }

    /// Exclude conjunctions.
    pub fn exclude_conjunctions(mut self, yes: bool) -> Self {
        self.exclude.conjunctions = yes;
        self
    }

    /// Currently excluded classes.
    pub fn excluded(&self) -> ExcludedCategories {
        self.exclude
    }

    /// Whether `word` is banned.
    pub fn is_banned(&self, word: &str) -> bool {
        self.banned.contains(&word.to_lowercase())
    }

    fn excludes(&self, word: &str, closed: &ClosedClassWords) -> bool {
        (self.exclude.articles && closed.is_article(word))
            || (self.exclude.prepositions && closed.is_preposition(word))
            || (self.exclude.conjunctions && closed.is_conjunction(word))
    }
}

/// Check that `template` is non-empty and holds exactly one blank.
pub fn check_template(template: &str) -> Result<()> {
    if template.trim().is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let found = template.matches(BLANK).count();
    if found != 1 {
        return Err(PipelineError::BlankCount { found });
    }
    Ok(())
}

/// Propose up to `n` fill words for the blank of `template`, best first.
///
/// Runs one forward pass with the blank masked, then walks the vocabulary by
/// descending probability keeping only alphanumeric, word-initial,
/// non-special entries that pass `filter`.
pub fn propose<M>(
    template: &str,
    filter: &CandidateFilter,
    closed: &ClosedClassWords,
    n: usize,
    model: &M,
) -> Result<Vec<Candidate>>
where
    M: MaskedLanguageModel + ?Sized,
{
    check_template(template)?;
    if n == 0 {
        return Ok(vec![]);
    }

    let special = model.special_tokens();
    let blank_at = template.find(BLANK).unwrap_or(0);
    let after_space = template[..blank_at]
        .chars()
        .next_back()
        .is_some_and(char::is_whitespace);

    let masked = template.replacen(BLANK, &special.mask_token, 1);
    let ids = model.encode(&masked, true, false)?;
    let max = model.max_input_length();
    if ids.len() > max {
        return Err(PipelineError::LengthExceeded {
            tokens: ids.len(),
            max,
        });
    }
    let mask_index = ids
        .iter()
        .position(|&id| id == special.mask_id)
        .ok_or_else(|| {
            let preview: String = template.chars().take(50).collect();
            PipelineError::Tokenization(format!(
                "Mask token was lost while tokenizing '{preview}'"
            ))
        })?;

    let logits = model.forward(&[ids])?;
    let row = logits.i((0, mask_index))?.to_dtype(DType::F32)?;
    let probs = softmax(&row, D::Minus1)?.to_vec1::<f32>()?;

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&i, &j| probs[j].total_cmp(&probs[i]));

    let scheme = model.subword_scheme();
    let mut out = Vec::with_capacity(n);
    let mut examined = 0usize;
    for idx in order {
        if out.len() >= n {
            break;
        }
        examined += 1;

        let id = idx as u32;
        if special.contains(id) {
            continue;
        }
        let Some(entry) = model.vocab_entry(id) else {
            continue;
        };
        if scheme.is_continuation(&entry, after_space) {
            continue;
        }

        let decoded = model.decode(id)?;
        let word = decoded.trim();
        if word.is_empty() || !word.chars().all(char::is_alphanumeric) {
            continue;
        }
        if filter.is_banned(word) || filter.excludes(word, closed) {
            continue;
        }

        out.push(Candidate {
            word: word.to_string(),
            probability: probs[idx],
        });
    }

    tracing::debug!(
        accepted = out.len(),
        examined,
        requested = n,
        "proposed fill candidates"
    );

    Ok(out)
}
