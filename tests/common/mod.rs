#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use candle_core::{Device, Tensor};
use candle_pll::error::{PipelineError, Result};
use candle_pll::pll::{MaskedLanguageModel, SpecialTokens, SubwordScheme};

pub const PAD: u32 = 0;
pub const UNK: u32 = 1;
pub const CLS: u32 = 2;
pub const SEP: u32 = 3;
pub const MASK: u32 = 4;

const VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "##ing", ".", "the", "a", "an", "weather",
    "today", "is", "sunny", "rainy", "cold", "with", "and", "men", "women", "are", "strong",
    "he", "she", "nurse", "doctor", "said", "that", "was", "tired", "car", "fixed", "mechanic",
    "child", "engineer", "brilliant", "cat", "sat", "on", "mat", "dog", "x",
];

/// Whitespace-tokenized toy masked LM over CPU tensors.
///
/// Logits at position `p` are
/// `bias[v] + 0.1 * sum(sin((t + 1) * (v + 1))) + 0.05 * sin((p + 1) * (v + 2))`
/// over the tokens `t` of the row, so they depend on every token of the
/// input (spans included), differ between positions and are identical for
/// identical input. Biases dominate, which fixes the order of proposals.
pub struct ToyModel {
    index: HashMap<&'static str, u32>,
    bias: Vec<f32>,
    special: SpecialTokens,
    max_input_length: usize,
    encode_calls: AtomicUsize,
    forward_calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    device: Device,
}

impl ToyModel {
    pub fn new() -> Self {
        let index = VOCAB
            .iter()
            .enumerate()
            .map(|(i, w)| (*w, i as u32))
            .collect::<HashMap<_, _>>();

        let mut bias = vec![0.0; VOCAB.len()];
        for (word, value) in [
            ("[MASK]", 110.0),
            ("##ing", 100.0),
            (".", 90.0),
            ("the", 80.0),
            ("sunny", 70.0),
            ("with", 60.0),
            ("rainy", 50.0),
            ("and", 40.0),
            ("cold", 30.0),
        ] {
            bias[index[word] as usize] = value;
        }

        Self {
            index,
            bias,
            special: SpecialTokens {
                mask_id: MASK,
                mask_token: "[MASK]".to_string(),
                start_id: CLS,
                end_id: SEP,
                all: HashSet::from([PAD, UNK, CLS, SEP, MASK]),
            },
            max_input_length: 64,
            encode_calls: AtomicUsize::new(0),
            forward_calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            device: Device::Cpu,
        }
    }

    pub fn with_max_input_length(mut self, max: usize) -> Self {
        self.max_input_length = max;
        self
    }

    pub fn encode_calls(&self) -> usize {
        self.encode_calls.load(Ordering::SeqCst)
    }

    pub fn forward_calls(&self) -> usize {
        self.forward_calls.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    /// Logits row the model produces at `position` of `row`.
    pub fn logits_at(&self, row: &[u32], position: usize) -> Vec<f32> {
        (0..VOCAB.len())
            .map(|v| {
                let context: f32 = row
                    .iter()
                    .map(|&t| ((t as f32 + 1.0) * (v as f32 + 1.0)).sin())
                    .sum();
                let place = ((position as f32 + 1.0) * (v as f32 + 2.0)).sin();
                self.bias[v] + 0.1 * context + 0.05 * place
            })
            .collect()
    }

    pub fn id(&self, word: &str) -> u32 {
        self.index.get(word).copied().unwrap_or(UNK)
    }
}

impl MaskedLanguageModel for ToyModel {
    fn encode(&self, text: &str, add_special_tokens: bool, truncate: bool) -> Result<Vec<u32>> {
        self.encode_calls.fetch_add(1, Ordering::SeqCst);
        let mut ids: Vec<u32> = text
            .split_whitespace()
            .map(|w| {
                if w == "[MASK]" {
                    MASK
                } else {
                    self.id(&w.to_lowercase())
                }
            })
            .collect();
        if add_special_tokens {
            ids.insert(0, CLS);
            ids.push(SEP);
        }
        if truncate {
            ids.truncate(self.max_input_length);
        }
        Ok(ids)
    }

    fn decode(&self, token_id: u32) -> Result<String> {
        VOCAB
            .get(token_id as usize)
            .map(|w| w.trim_start_matches("##").to_string())
            .ok_or_else(|| PipelineError::Tokenization(format!("unknown id {token_id}")))
    }

    fn vocab_entry(&self, token_id: u32) -> Option<String> {
        VOCAB.get(token_id as usize).map(|w| w.to_string())
    }

    fn special_tokens(&self) -> &SpecialTokens {
        &self.special
    }

    fn subword_scheme(&self) -> SubwordScheme {
        SubwordScheme::WordPiece
    }

    fn max_input_length(&self) -> usize {
        self.max_input_length
    }

    fn vocab_size(&self) -> usize {
        VOCAB.len()
    }

    fn forward(&self, batch: &[Vec<u32>]) -> Result<Tensor> {
        self.forward_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(batch.len());

        let seq_len = batch.first().map_or(0, Vec::len);
        let vocab = VOCAB.len();
        let mut data = Vec::with_capacity(batch.len() * seq_len * vocab);
        for row in batch {
            assert_eq!(row.len(), seq_len, "toy model needs equal-length rows");
            for position in 0..seq_len {
                data.extend(self.logits_at(row, position));
            }
        }
        Ok(Tensor::from_vec(
            data,
            (batch.len(), seq_len, vocab),
            &self.device,
        )?)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
