//! Pseudo-log-likelihood scoring and ranking of marked sentences.
//!
//! Words of interest are wrapped in angle brackets: `The <nurse> said that
//! <she> was tired`. The bracketed spans stay visible to the model but are
//! never scored; every other token is masked in turn and the log-probability
//! the model assigns to it is summed. Comparing sentences that differ only in
//! their spans tells how the spans shift the plausibility of the context.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use candle_pll::pll::{ModernBertSize, PllPipelineBuilder};
//!
//! # fn main() -> candle_pll::error::Result<()> {
//! let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base).build()?;
//!
//! let output = pipeline.score("The <nurse> said that she was tired")?;
//! println!("{:.3} over {} tokens", output.score, output.context_tokens);
//! # Ok(())
//! # }
//! ```
//!
//! # Ranking Substitutions
//!
//! Fill the single `*` blank of a template with explicit words, or let the
//! model propose them:
//!
//! ```rust,no_run
//! # use candle_pll::pll::{ModernBertSize, PllPipelineBuilder, SubstitutionRequest};
//! # fn main() -> candle_pll::error::Result<()> {
//! # let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base).build()?;
//! let request = SubstitutionRequest::new("The * fixed the car.")
//!     .candidates(["mechanic", "nurse", "child"]);
//! let ranked = pipeline.rank_by_substitution(&request)?;
//!
//! for entry in ranked.iter() {
//!     println!("{:>8.3} {}", entry.score, entry.sentence);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Ranking a Sentence Set
//!
//! Two to six independently marked sentences; the first two are mandatory
//! and later blank entries are skipped:
//!
//! ```rust,no_run
//! # use candle_pll::pll::{ModernBertSize, PllPipelineBuilder};
//! # fn main() -> candle_pll::error::Result<()> {
//! # let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base).build()?;
//! let ranked = pipeline.rank_by_sentence_set(&[
//!     "<He> is a brilliant engineer",
//!     "<She> is a brilliant engineer",
//! ])?;
//! println!("best: {:?}", ranked.best());
//! # Ok(())
//! # }
//! ```
//!
//! # Supported Models
//!
//! | Model | Sizes | Builder Method |
//! |-------|-------|----------------|
//! | ModernBERT | `Base`, `Large` | [`PllPipelineBuilder::modernbert`] |
//!
//! Any other model can be used through [`MaskedLanguageModel`] and
//! [`PllPipeline::from_model`].

// ============ Internal API ============

pub(crate) mod builder;
pub(crate) mod config;
pub(crate) mod pipeline;

// ============ Components ============

pub mod alignment;
pub mod candidates;
pub mod language;
pub mod markup;
pub mod model;
pub mod ranking;
pub mod scorer;

// ============ Public API ============

pub use crate::models::ModernBertSize;
pub use crate::pipelines::stats::PllStats;
pub use builder::PllPipelineBuilder;
pub use candidates::{Candidate, CandidateFilter, ExcludedCategories};
pub use config::PllConfig;
pub use language::{ClosedClassWords, Language};
pub use markup::{MarkedSentence, Span};
pub use model::{LoadableModel, MaskedLanguageModel, SpecialTokens, SubwordScheme};
pub use pipeline::{PllPipeline, ScoreOutput};
pub use ranking::{RankedSentence, RankingResult, SubstitutionRequest};

/// Only for generic annotations. Use [`PllPipelineBuilder::modernbert`].
pub type PllModernBert = crate::models::modernbert::PllModernBertModel;
