use std::sync::Arc;

use super::config::PllConfig;
use super::language::{ClosedClassWords, Language};
use super::model::LoadableModel;
use super::pipeline::PllPipeline;
use crate::error::Result;
use crate::pipelines::cache::ModelOptions;
use crate::pipelines::utils::{BasePipelineBuilder, DeviceRequest, StandardPipelineBuilder};

crate::pipelines::utils::impl_device_methods!(delegated: PllPipelineBuilder<M: LoadableModel>);

/// Builder for creating [`PllPipeline`] instances.
///
/// Use [`Self::modernbert`] as the entry point.
///
/// # Examples
///
/// ```rust,no_run
/// # use candle_pll::pll::{Language, ModernBertSize, PllPipelineBuilder};
/// # fn main() -> candle_pll::error::Result<()> {
/// let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base)
///     .cuda(0)
///     .language(Language::Spanish)
///     .max_batch_size(256)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct PllPipelineBuilder<M: LoadableModel>(
    StandardPipelineBuilder<M::Options>,
    PllSettings,
);

struct PllSettings {
    config: PllConfig,
    closed: Option<ClosedClassWords>,
    language: Language,
}

impl<M: LoadableModel> PllPipelineBuilder<M> {
    pub(crate) fn new(options: M::Options) -> Self {
        Self(
            StandardPipelineBuilder::new(options),
            PllSettings {
                config: PllConfig::default(),
                closed: None,
                language: Language::default(),
            },
        )
    }

    /// Language of the built-in closed-class word tables (English by default).
    pub fn language(mut self, language: Language) -> Self {
        self.1.language = language;
        self
    }

    /// Use custom closed-class word tables instead of a built-in language.
    pub fn closed_class_words(mut self, words: ClosedClassWords) -> Self {
        self.1.closed = Some(words);
        self
    }

    /// Most masked queries a single sentence may send through the model.
    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.1.config.max_batch_size = n;
        self
    }

    /// Candidates proposed when a substitution request lists none.
    pub fn default_candidates(mut self, n: usize) -> Self {
        self.1.config.default_candidates = n;
        self
    }

    /// Builds the pipeline with configured settings.
    ///
    /// # Errors
    ///
    /// Returns an error if model loading or device initialization fails.
    pub fn build(self) -> Result<PllPipeline<M>>
    where
        M: Send + Sync + 'static,
        M::Options: ModelOptions,
    {
        BasePipelineBuilder::build(self)
    }
}

impl<M> BasePipelineBuilder<M> for PllPipelineBuilder<M>
where
    M: LoadableModel + Send + Sync + 'static,
    M::Options: ModelOptions,
{
    type Pipeline = PllPipeline<M>;
    type Options = M::Options;

    fn options(&self) -> &Self::Options {
        &self.0.options
    }

    fn device_request(&self) -> &DeviceRequest {
        &self.0.device_request
    }

    fn create_model(options: Self::Options, device: candle_core::Device) -> Result<M> {
        M::load(options, device)
    }

    fn construct_pipeline(self, model: Arc<M>) -> Result<Self::Pipeline> {
        let PllSettings {
            config,
            closed,
            language,
        } = self.1;
        let closed = closed.unwrap_or_else(|| ClosedClassWords::for_language(language));
        Ok(PllPipeline::with_parts(model, config, closed))
    }
}

impl PllPipelineBuilder<super::PllModernBert> {
    /// Creates a builder for a ModernBERT masked language model.
    pub fn modernbert(size: crate::models::ModernBertSize) -> Self {
        Self::new(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModernBertSize;

    #[test]
    fn settings_default_to_english_and_standard_limits() {
        let builder = PllPipelineBuilder::modernbert(ModernBertSize::Base);
        assert_eq!(builder.1.language, Language::English);
        assert_eq!(builder.1.config, PllConfig::default());
        assert!(matches!(builder.0.device_request, DeviceRequest::Cpu));
    }

    #[test]
    fn setters_record_choices() {
        let builder = PllPipelineBuilder::modernbert(ModernBertSize::Large)
            .cuda(1)
            .language(Language::Spanish)
            .max_batch_size(64)
            .default_candidates(3);
        assert_eq!(builder.1.language, Language::Spanish);
        assert_eq!(builder.1.config.max_batch_size, 64);
        assert_eq!(builder.1.config.default_candidates, 3);
        assert!(matches!(builder.0.device_request, DeviceRequest::Cuda(1)));

        let builder = builder.cpu();
        assert!(matches!(builder.0.device_request, DeviceRequest::Cpu));
    }
}
