//! Ranking of scored sentences.
//!
//! Two entry points: one template with a `*` blank filled by several
//! candidate words, or a small set of independently marked sentences.

use std::collections::HashSet;

use super::candidates::{check_template, propose, CandidateFilter, BLANK};
use super::config::PllConfig;
use super::language::ClosedClassWords;
use super::markup::{self, MarkedSentence, SPAN_CLOSE, SPAN_OPEN};
use super::model::MaskedLanguageModel;
use super::scorer::{align_sentence, score};
use crate::error::{PipelineError, Result};
use crate::pipelines::stats::{PllStats, PllStatsBuilder};

/// Most sentences a sentence set may hold.
pub const MAX_SENTENCES: usize = 6;
/// Leading sentences of a set that must not be blank.
pub const MANDATORY_SENTENCES: usize = 2;

/// One scored sentence in a [`RankingResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSentence {
    /// The sentence as scored, span markup included.
    pub sentence: String,
    /// Pseudo-log-likelihood.
    pub score: f32,
    /// `min_score / score`: how many times better than the worst entry.
    pub ratio: f32,
}

/// Sentences ordered by descending score, ties kept in input order.
#[derive(Debug, Clone)]
pub struct RankingResult {
    /// Ranked entries, best first.
    pub entries: Vec<RankedSentence>,
    /// Execution statistics.
    pub stats: PllStats,
}

impl RankingResult {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was ranked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries best first.
    pub fn iter(&self) -> impl Iterator<Item = &RankedSentence> {
        self.entries.iter()
    }

    /// Highest scoring entry.
    pub fn best(&self) -> Option<&RankedSentence> {
        self.entries.first()
    }

    /// Entry for `sentence`, if it was ranked.
    pub fn get(&self, sentence: &str) -> Option<&RankedSentence> {
        self.entries.iter().find(|e| e.sentence == sentence)
    }
}

/// Sort `scored` by descending score and attach ratios.
///
/// The sort is stable, so equal scores keep their input order.
pub fn rank_scores(scored: Vec<(String, f32)>) -> Vec<RankedSentence> {
    let mut scored = scored;
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    let min_score = scored
        .iter()
        .map(|(_, s)| *s)
        .min_by(|a, b| a.total_cmp(b))
        .unwrap_or(0.0);

    scored
        .into_iter()
        .map(|(sentence, score)| RankedSentence {
            ratio: relative_ratio(min_score, score),
            sentence,
            score,
        })
        .collect()
}

/// `min_score / score`, which grows with `score` for the negative values a
/// PLL takes.
pub fn relative_ratio(min_score: f32, score: f32) -> f32 {
    if score == 0.0 {
        if min_score == 0.0 {
            1.0
        } else {
            f32::INFINITY
        }
    } else {
        min_score / score
    }
}

/// Collapse whitespace runs and trim.
pub fn normalize_template(template: &str) -> String {
    template.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace the blank of `template` with `word` wrapped as a span.
pub fn render_substitution(template: &str, word: &str) -> String {
    let marked = format!("{SPAN_OPEN}{word}{SPAN_CLOSE}");
    template.replacen(BLANK, &marked, 1)
}

/// A rank-by-substitution call.
#[derive(Debug, Clone)]
pub struct SubstitutionRequest {
    template: String,
    candidates: Vec<String>,
    filter: CandidateFilter,
    max_candidates: Option<usize>,
}

impl SubstitutionRequest {
    /// Rank fillers of the single `*` blank in `template`.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            candidates: Vec::new(),
            filter: CandidateFilter::default(),
            max_candidates: None,
        }
    }

    /// Explicit words to try. When none are given the model proposes them.
    pub fn candidates<I>(mut self, words: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.candidates = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        self
    }

    /// Words proposals must avoid.
    pub fn banned_words<I>(mut self, words: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.filter = self.filter.banned_words(words);
        self
    }

    /// Keep articles out of proposals.
    pub fn exclude_articles(mut self, yes: bool) -> Self {
        self.filter = self.filter.exclude_articles(yes);
        self
    }

    /// Keep prepositions out of proposals.
    pub fn exclude_prepositions(mut self, yes: bool) -> Self {
        self.filter = self.filter.exclude_prepositions(yes);
        self
    }

    /// Keep conjunctions out of proposals.
    pub fn exclude_conjunctions(mut self, yes: bool) -> Self {
        self.filter = self.filter.exclude_conjunctions(yes);
        self
    }

    /// Propose at most `n` words when no explicit list is given.
    pub fn max_candidates(mut self, n: usize) -> Self {
        self.max_candidates = Some(n);
        self
    }

    /// The template as given.
    pub fn template(&self) -> &str {
        &self.template
    }
}

/// Score every candidate substitution of `request.template`.
///
/// The template is validated (blank count, length, span markup) before any
/// forward pass, and every rendered sentence is validated before the first
/// one is scored.
pub fn rank_by_substitution<M>(
    model: &M,
    request: &SubstitutionRequest,
    closed: &ClosedClassWords,
    config: &PllConfig,
) -> Result<RankingResult>
where
    M: MaskedLanguageModel + ?Sized,
{
    let mut stats = PllStats::start();

    let template = normalize_template(&request.template);
    check_template(&template)?;

    let masked = template.replacen(BLANK, &model.special_tokens().mask_token, 1);
    let tokens = model.encode(&masked, true, false)?.len();
    let max = model.max_input_length();
    if tokens > max {
        return Err(PipelineError::LengthExceeded { tokens, max });
    }

    // A sentence that is nothing but the blank has no context to score.
    markup::parse(&render_substitution(&template, "x"))?;

    let words: Vec<String> = if request.candidates.is_empty() {
        let n = request.max_candidates.unwrap_or(config.default_candidates);
        propose(&template, &request.filter, closed, n, model)?
            .into_iter()
            .map(|c| c.word)
            .collect()
    } else {
        request.candidates.clone()
    };

    let sentences = words
        .iter()
        .map(|word| {
            let rendered = render_substitution(&template, word);
            markup::parse(&rendered).map_err(PipelineError::from)
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        template = template.as_str(),
        candidates = sentences.len(),
        "ranking substitutions"
    );

    let scored = score_all(model, sentences, config, &mut stats)?;
    Ok(RankingResult {
        entries: rank_scores(scored),
        stats: stats.finish(),
    })
}

/// Validate a sentence set, returning each non-blank sentence with its
/// 1-based ordinal.
///
/// The first [`MANDATORY_SENTENCES`] entries must be present; later blank
/// entries are skipped.
pub fn validate_sentence_set(sentences: &[&str]) -> Result<Vec<(usize, MarkedSentence)>> {
    if sentences.len() > MAX_SENTENCES {
        return Err(PipelineError::TooManySentences {
            given: sentences.len(),
            max: MAX_SENTENCES,
        });
    }

    let mut parsed = Vec::with_capacity(sentences.len());
    for ordinal in 1..=MAX_SENTENCES.max(MANDATORY_SENTENCES) {
        let sentence = sentences.get(ordinal - 1).map_or("", |s| s.trim());
        if sentence.is_empty() {
            if ordinal <= MANDATORY_SENTENCES {
                return Err(PipelineError::MandatorySentenceMissing { ordinal });
            }
            continue;
        }
        let marked = markup::parse(sentence)
            .map_err(|reason| PipelineError::InvalidSentence { ordinal, reason })?;
        parsed.push((ordinal, marked));
    }

    Ok(parsed)
}

/// Score every non-blank sentence of `sentences` (1 to 6 entries).
pub fn rank_by_sentence_set<M>(
    model: &M,
    sentences: &[&str],
    config: &PllConfig,
) -> Result<RankingResult>
where
    M: MaskedLanguageModel + ?Sized,
{
    let mut stats = PllStats::start();
    let parsed = validate_sentence_set(sentences)?;

    let scored = score_all(
        model,
        parsed.into_iter().map(|(_, s)| s).collect(),
        config,
        &mut stats,
    )?;
    Ok(RankingResult {
        entries: rank_scores(scored),
        stats: stats.finish(),
    })
}

/// Score each distinct sentence once, in input order.
fn score_all<M>(
    model: &M,
    sentences: Vec<MarkedSentence>,
    config: &PllConfig,
    stats: &mut PllStatsBuilder,
) -> Result<Vec<(String, f32)>>
where
    M: MaskedLanguageModel + ?Sized,
{
    let mut seen = HashSet::new();
    let mut scored = Vec::with_capacity(sentences.len());
    for sentence in sentences {
        if !seen.insert(sentence.raw().to_string()) {
            continue;
        }
        let alignment = align_sentence(&sentence, model)?;
        let value = score(&alignment, model, config.max_batch_size)?;
        stats.record_sentence(alignment.context_count());
        scored.push((sentence.raw().to_string(), value));
    }
    Ok(scored)
}
