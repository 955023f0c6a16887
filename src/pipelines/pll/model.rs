//! The masked language model behind a pipeline.

use std::collections::HashSet;

use candle_core::{Device, Tensor};

use crate::error::Result;

/// Reserved token ids of a loaded model.
#[derive(Debug, Clone)]
pub struct SpecialTokens {
    /// Id substituted at the masked position.
    pub mask_id: u32,
    /// Surface form of the mask token, e.g. `[MASK]`.
    pub mask_token: String,
    /// Sentinel prepended to every query (`[CLS]`).
    pub start_id: u32,
    /// Sentinel appended to every query (`[SEP]`).
    pub end_id: u32,
    /// Every reserved id, sentinels and mask included.
    pub all: HashSet<u32>,
}

impl SpecialTokens {
    /// Whether `id` is reserved.
    pub fn contains(&self, id: u32) -> bool {
        self.all.contains(&id)
    }
}

/// How a vocabulary marks the pieces of a word split across several tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubwordScheme {
    /// BERT-style: non-initial pieces start with `##`.
    WordPiece,
    /// GPT-style byte-level BPE: word-initial pieces start with `Ġ`.
    ByteLevelBpe,
}

impl SubwordScheme {
    /// Whether the raw vocabulary entry is a non-initial piece of a word.
    ///
    /// `after_space` tells whether the position being filled follows
    /// whitespace. Byte-level vocabularies only mark word starts that follow a
    /// space, so at the very beginning of a text nothing can be ruled out.
    pub fn is_continuation(&self, vocab_entry: &str, after_space: bool) -> bool {
        match self {
            SubwordScheme::WordPiece => vocab_entry.starts_with("##"),
            SubwordScheme::ByteLevelBpe => after_space && !vocab_entry.starts_with('Ġ'),
        }
    }
}

/// The masked language model and its tokenizer, seen as one black box.
///
/// Implement this to score with a model other than the bundled ModernBERT.
/// Every method must be deterministic for identical input.
pub trait MaskedLanguageModel {
    /// Tokenize `text`. With `add_special_tokens` the start/end sentinels
    /// are included; with `truncate` the result is cut to
    /// [`max_input_length`](Self::max_input_length).
    fn encode(&self, text: &str, add_special_tokens: bool, truncate: bool) -> Result<Vec<u32>>;

    /// Surface string of a single token.
    fn decode(&self, token_id: u32) -> Result<String>;

    /// Raw vocabulary entry of a token (`##ing`, `Ġdog`), if the id exists.
    fn vocab_entry(&self, token_id: u32) -> Option<String>;

    /// Reserved ids of this model.
    fn special_tokens(&self) -> &SpecialTokens;

    /// Continuation-marking convention of the vocabulary.
    fn subword_scheme(&self) -> SubwordScheme;

    /// Longest sequence the model accepts, sentinels included.
    fn max_input_length(&self) -> usize;

    /// Number of vocabulary entries (last logits dimension).
    fn vocab_size(&self) -> usize;

    /// Run one forward pass over equal-length sequences.
    ///
    /// Returns unnormalized logits shaped `(batch, seq_len, vocab_size)`; row
    /// `i` belongs to `batch[i]`.
    fn forward(&self, batch: &[Vec<u32>]) -> Result<Tensor>;

    /// Device the model runs on.
    fn device(&self) -> &Device;
}

/// A [`MaskedLanguageModel`] the pipeline builder knows how to load.
pub trait LoadableModel: MaskedLanguageModel + Sized {
    /// Model variant selector.
    type Options: std::fmt::Debug + Clone;

    /// Download (or reuse) weights and tokenizer and place them on `device`.
    fn load(options: Self::Options, device: Device) -> Result<Self>;
}

impl<M: MaskedLanguageModel + ?Sized> MaskedLanguageModel for std::sync::Arc<M> {
    fn encode(&self, text: &str, add_special_tokens: bool, truncate: bool) -> Result<Vec<u32>> {
        (**self).encode(text, add_special_tokens, truncate)
    }

    fn decode(&self, token_id: u32) -> Result<String> {
        (**self).decode(token_id)
    }

    fn vocab_entry(&self, token_id: u32) -> Option<String> {
        (**self).vocab_entry(token_id)
    }

    fn special_tokens(&self) -> &SpecialTokens {
        (**self).special_tokens()
    }

    fn subword_scheme(&self) -> SubwordScheme {
        (**self).subword_scheme()
    }

    fn max_input_length(&self) -> usize {
        (**self).max_input_length()
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn forward(&self, batch: &[Vec<u32>]) -> Result<Tensor> {
        (**self).forward(batch)
    }

    fn device(&self) -> &Device {
        (**self).device()
    }
}

#[cfg(test)]
mod tests {
    use super::SubwordScheme;

    #[test]
    fn wordpiece_continuations_use_hash_prefix() {
        assert!(SubwordScheme::WordPiece.is_continuation("##ing", true));
        assert!(SubwordScheme::WordPiece.is_continuation("##ing", false));
        assert!(!SubwordScheme::WordPiece.is_continuation("dog", true));
    }

    #[test]
    fn byte_level_continuations_lack_word_start_marker() {
        assert!(!SubwordScheme::ByteLevelBpe.is_continuation("Ġdog", true));
        assert!(SubwordScheme::ByteLevelBpe.is_continuation("ing", true));
        // first word of a text carries no marker
        assert!(!SubwordScheme::ByteLevelBpe.is_continuation("The", false));
    }
}
