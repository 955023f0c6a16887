use std::sync::Arc;

use super::candidates::{self, Candidate, CandidateFilter};
use super::config::PllConfig;
use super::language::{ClosedClassWords, Language};
use super::markup;
use super::model::MaskedLanguageModel;
use super::ranking::{self, RankingResult, SubstitutionRequest};
use super::scorer;
use crate::error::{PipelineError, Result};
use crate::pipelines::stats::PllStats;

// ============ Output types ============

/// Output from [`PllPipeline::score`].
#[derive(Debug, Clone)]
pub struct ScoreOutput {
    /// Sentence as given, markup included.
    pub sentence: String,
    /// Pseudo-log-likelihood of the context tokens.
    pub score: f32,
    /// Tokens masked and scored.
    pub context_tokens: usize,
    /// Tokens belonging to the spans, never masked.
    pub span_tokens: usize,
    /// Tokens the alignment could not attribute, never masked.
    pub anomalous_tokens: usize,
    /// Execution statistics.
    pub stats: PllStats,
}

// ============ Pipeline ============

/// Scores and ranks sentences with `<span>` interest words.
///
/// Construct with [`PllPipelineBuilder`](super::PllPipelineBuilder), or wrap
/// any [`MaskedLanguageModel`] with [`PllPipeline::from_model`].
///
/// # Examples
///
/// ```rust,no_run
/// # use candle_pll::pll::{PllPipelineBuilder, ModernBertSize};
/// # fn main() -> candle_pll::error::Result<()> {
/// let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base).build()?;
///
/// let ranked = pipeline.rank_by_sentence_set(&[
///     "The <men> are strong",
///     "The <women> are strong",
/// ])?;
/// for entry in ranked.iter() {
///     println!("{:.3} ({:.2}x) {}", entry.score, entry.ratio, entry.sentence);
/// }
/// # Ok(())
/// # }
/// ```
pub struct PllPipeline<M: MaskedLanguageModel> {
    pub(crate) model: Arc<M>,
    pub(crate) config: PllConfig,
    pub(crate) closed: ClosedClassWords,
}

impl<M: MaskedLanguageModel> PllPipeline<M> {
    /// Wrap an already loaded model with default settings and English word
    /// tables.
    pub fn from_model(model: M) -> Self {
        Self::with_parts(
            Arc::new(model),
            PllConfig::default(),
            ClosedClassWords::for_language(Language::English),
        )
    }

    pub(crate) fn with_parts(model: Arc<M>, config: PllConfig, closed: ClosedClassWords) -> Self {
        Self {
            model,
            config,
            closed,
        }
    }

    /// Replace the tunables.
    pub fn with_config(mut self, config: PllConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the closed-class word tables used by proposal filters.
    pub fn with_closed_class_words(mut self, closed: ClosedClassWords) -> Self {
        self.closed = closed;
        self
    }

    /// Pseudo-log-likelihood of the context of one marked sentence.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use candle_pll::pll::{PllPipelineBuilder, ModernBertSize};
    /// # fn main() -> candle_pll::error::Result<()> {
    /// # let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base).build()?;
    /// let output = pipeline.score("The <doctor> finished her shift")?;
    /// println!("{}: {:.3}", output.sentence, output.score);
    /// # Ok(())
    /// # }
    /// ```
    pub fn score(&self, sentence: &str) -> Result<ScoreOutput> {
        let mut stats = PllStats::start();

        let sentence = sentence.trim();
        if sentence.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let marked = markup::parse(sentence)?;
        let alignment = scorer::align_sentence(&marked, self.model.as_ref())?;
        let score = scorer::score(&alignment, self.model.as_ref(), self.config.max_batch_size)?;
        stats.record_sentence(alignment.context_count());

        Ok(ScoreOutput {
            sentence: sentence.to_string(),
            score,
            context_tokens: alignment.context_count(),
            span_tokens: alignment.span_count(),
            anomalous_tokens: alignment.anomalous_count(),
            stats: stats.finish(),
        })
    }

    /// Up to `n` fill words for the `*` blank of `template`, most probable
    /// first.
    pub fn propose(
        &self,
        template: &str,
        filter: &CandidateFilter,
        n: usize,
    ) -> Result<Vec<Candidate>> {
        let template = ranking::normalize_template(template);
        candidates::propose(&template, filter, &self.closed, n, self.model.as_ref())
    }

    /// Rank the sentences obtained by filling the template's blank with each
    /// candidate word.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use candle_pll::pll::{PllPipelineBuilder, ModernBertSize, SubstitutionRequest};
    /// # fn main() -> candle_pll::error::Result<()> {
    /// # let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base).build()?;
    /// let request = SubstitutionRequest::new("The weather today is *.")
    ///     .exclude_articles(true)
    ///     .max_candidates(5);
    /// let ranked = pipeline.rank_by_substitution(&request)?;
    /// println!("best: {}", ranked.best().map_or("-", |b| b.sentence.as_str()));
    /// # Ok(())
    /// # }
    /// ```
    pub fn rank_by_substitution(&self, request: &SubstitutionRequest) -> Result<RankingResult> {
        ranking::rank_by_substitution(self.model.as_ref(), request, &self.closed, &self.config)
    }

    /// Rank between two and six independently marked sentences.
    pub fn rank_by_sentence_set(&self, sentences: &[&str]) -> Result<RankingResult> {
        ranking::rank_by_sentence_set(self.model.as_ref(), sentences, &self.config)
    }

    /// Tunables in effect.
    pub fn config(&self) -> &PllConfig {
        &self.config
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Returns the device (CPU/GPU) the model is running on.
    pub fn device(&self) -> &candle_core::Device {
        self.model.device()
    }
}
