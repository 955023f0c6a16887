use std::collections::HashSet;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::modernbert::{
    Config, ModernBertForMaskedLM as CandleModernBertForMaskedLM,
};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::Deserialize;
use tokenizers::Tokenizer;

use crate::error::{PipelineError, Result};
use crate::pipelines::pll::model::{
    LoadableModel, MaskedLanguageModel, SpecialTokens, SubwordScheme,
};

/// Available ModernBERT model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModernBertSize {
    /// Base model (~150M parameters).
    Base,
    /// Large model (~400M parameters).
    Large,
}

impl ModernBertSize {
    fn repo_id(&self) -> &'static str {
        match self {
            ModernBertSize::Base => "answerdotai/ModernBERT-base",
            ModernBertSize::Large => "answerdotai/ModernBERT-large",
        }
    }
}

impl std::fmt::Display for ModernBertSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModernBertSize::Base => "modernbert-base",
            ModernBertSize::Large => "modernbert-large",
        };
        write!(f, "{name}")
    }
}

impl crate::pipelines::cache::ModelOptions for ModernBertSize {
    fn cache_key(&self) -> String {
        self.to_string()
    }
}

const MASK_TOKEN: &str = "[MASK]";
const START_TOKEN: &str = "[CLS]";
const END_TOKEN: &str = "[SEP]";

/// ModernBERT masked LM with its tokenizer.
pub struct PllModernBertModel {
    model: CandleModernBertForMaskedLM,
    tokenizer: Tokenizer,
    special: SpecialTokens,
    max_input_length: usize,
    vocab_size: usize,
    device: Device,
}

impl PllModernBertModel {
    /// Download (or reuse) ModernBERT weights and tokenizer.
    pub fn new(size: ModernBertSize, device: Device) -> Result<Self> {
        let repo_id = size.repo_id();
        let (config, limits, vb) = load_model_weights(repo_id, &device)?;
        let model = CandleModernBertForMaskedLM::load(vb, &config)?;
        let tokenizer = load_tokenizer(repo_id)?;
        let special = special_tokens(&tokenizer)?;

        tracing::debug!(
            model = %size,
            max_input_length = limits.max_position_embeddings,
            vocab_size = limits.vocab_size,
            "loaded masked language model"
        );

        Ok(Self {
            model,
            tokenizer,
            special,
            max_input_length: limits.max_position_embeddings,
            vocab_size: limits.vocab_size,
            device,
        })
    }
}

impl MaskedLanguageModel for PllModernBertModel {
    fn encode(&self, text: &str, add_special_tokens: bool, truncate: bool) -> Result<Vec<u32>> {
        let encoding = self.tokenizer.encode(text, add_special_tokens).map_err(|e| {
            PipelineError::Tokenization(format!(
                "Tokenization failed on '{}': {}",
                &text.chars().take(50).collect::<String>(),
                e
            ))
        })?;
        let mut ids = encoding.get_ids().to_vec();
        if truncate && ids.len() > self.max_input_length {
            ids.truncate(self.max_input_length);
            if add_special_tokens {
                if let Some(last) = ids.last_mut() {
                    *last = self.special.end_id;
                }
            }
        }
        Ok(ids)
    }

    fn decode(&self, token_id: u32) -> Result<String> {
        self.tokenizer.decode(&[token_id], false).map_err(|e| {
            PipelineError::Tokenization(format!("Failed to decode token {token_id}: {e}"))
        })
    }

    fn vocab_entry(&self, token_id: u32) -> Option<String> {
        self.tokenizer.id_to_token(token_id)
    }

    fn special_tokens(&self) -> &SpecialTokens {
        &self.special
    }

    fn subword_scheme(&self) -> SubwordScheme {
        SubwordScheme::ByteLevelBpe
    }

    fn max_input_length(&self) -> usize {
        self.max_input_length
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn forward(&self, batch: &[Vec<u32>]) -> Result<Tensor> {
        let seq_len = batch.first().map_or(0, Vec::len);
        if seq_len == 0 || batch.iter().any(|ids| ids.len() != seq_len) {
            return Err(PipelineError::Unexpected(
                "Forward pass needs non-empty sequences of equal length".to_string(),
            ));
        }

        let flat: Vec<u32> = batch.iter().flatten().copied().collect();
        let input_ids = Tensor::from_vec(flat, (batch.len(), seq_len), &self.device)?;
        let attention_mask = Tensor::ones((batch.len(), seq_len), DType::U32, &self.device)?;

        tracing::debug!(batch = batch.len(), seq_len, "modernbert forward");
        Ok(self.model.forward(&input_ids, &attention_mask)?)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

impl LoadableModel for PllModernBertModel {
    type Options = ModernBertSize;

    fn load(options: Self::Options, device: Device) -> Result<Self> {
        PllModernBertModel::new(options, device)
    }
}

fn special_tokens(tokenizer: &Tokenizer) -> Result<SpecialTokens> {
    let require = |token: &str| {
        tokenizer.token_to_id(token).ok_or_else(|| {
            PipelineError::Tokenization(format!("Tokenizer has no '{token}' token"))
        })
    };

    let mask_id = require(MASK_TOKEN)?;
    let start_id = require(START_TOKEN)?;
    let end_id = require(END_TOKEN)?;

    // Every added token flagged special, reserved `[unused*]` slots included.
    let mut all = tokenizer
        .get_added_tokens_decoder()
        .iter()
        .filter(|(_, token)| token.special)
        .map(|(&id, _)| id)
        .collect::<HashSet<_>>();
    all.extend([mask_id, start_id, end_id]);

    Ok(SpecialTokens {
        mask_id,
        mask_token: MASK_TOKEN.to_string(),
        start_id,
        end_id,
        all,
    })
}

fn load_tokenizer(repo_id: &str) -> Result<Tokenizer> {
    let api = Api::new()?;
    let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));
    let tokenizer_path = repo.get("tokenizer.json")?;
    let path_str = tokenizer_path.display().to_string();
    Tokenizer::from_file(&tokenizer_path).map_err(|e| {
        PipelineError::Tokenization(format!(
            "Failed to load tokenizer from '{}': {}",
            path_str, e
        ))
    })
}

/// Limits read from `config.json` next to the weights.
#[derive(Deserialize)]
struct ModelLimitsJson {
    max_position_embeddings: usize,
    vocab_size: usize,
}

fn load_model_weights(
    repo_id: &str,
    device: &Device,
) -> Result<(Config, ModelLimitsJson, VarBuilder<'static>)> {
    let api = Api::new()?;
    let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));

    let config_path = repo.get("config.json")?;
    let weights_path = repo
        .get("model.safetensors")
        .or_else(|_| repo.get("pytorch_model.bin"))?;

    let config_str = std::fs::read_to_string(&config_path)?;
    let config: Config = serde_json::from_str(&config_str)?;
    let limits: ModelLimitsJson = serde_json::from_str(&config_str)?;

    let vb = if weights_path.extension().is_some_and(|e| e == "safetensors") {
        unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? }
    } else {
        VarBuilder::from_pth(&weights_path, DType::F32, device)?
    };

    Ok((config, limits, vb))
}
