//! Masked batch scoring (pseudo-log-likelihood).
//!
//! Every context token gets its own copy of the full sentence with only that
//! token replaced by the mask. All copies run through the model in one batch,
//! and the log-probability the model gives back to each original token at its
//! masked position is summed into the sentence score. Span tokens are never
//! masked, so they condition every query.

use candle_core::{DType, IndexOp, Tensor, D};
use candle_nn::ops::log_softmax;

use super::alignment::{align, TokenAlignment, TokenClass, SENTINEL_TOKENS};
use super::markup::MarkedSentence;
use super::model::{MaskedLanguageModel, SpecialTokens};
use crate::error::{PipelineError, Result};

/// One model input with exactly one position masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedQuery {
    /// `[START] + full tokens + [END]` with one token replaced by the mask.
    pub input_ids: Vec<u32>,
    /// Index of the mask inside `input_ids`.
    pub position: usize,
    /// Token that was at `position` before masking.
    pub original_token_id: u32,
}

/// Log-probability recovered for one masked context token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenLogProb {
    /// Index of the token inside the sentinel-wrapped sequence.
    pub position: usize,
    /// The scored token.
    pub token_id: u32,
    /// `log P(token | rest of the sentence)`.
    pub log_prob: f32,
}

/// Build one masked query per context entry of `alignment`.
///
/// Span and anomalous entries produce no query.
pub fn build_queries(alignment: &TokenAlignment, special: &SpecialTokens) -> Vec<MaskedQuery> {
    let mut base = Vec::with_capacity(alignment.full_tokens().len() + 2);
    base.push(special.start_id);
    base.extend_from_slice(alignment.full_tokens());
    base.push(special.end_id);

    alignment
        .entries()
        .iter()
        .filter(|entry| entry.class == TokenClass::Context)
        .filter_map(|entry| entry.full_position)
        .map(|full_position| {
            let position = full_position + 1;
            let mut input_ids = base.clone();
            let original_token_id = input_ids[position];
            input_ids[position] = special.mask_id;
            MaskedQuery {
                input_ids,
                position,
                original_token_id,
            }
        })
        .collect()
}

/// Per-token log-probabilities for every context token of `alignment`.
///
/// Fails with [`PipelineError::LengthExceeded`] when the wrapped sequence is
/// longer than the model accepts and with
/// [`PipelineError::BatchLimitExceeded`] when more than `max_batch_size`
/// queries would be needed. Both checks run before the forward pass.
pub fn score_tokens<M>(
    alignment: &TokenAlignment,
    model: &M,
    max_batch_size: usize,
) -> Result<Vec<TokenLogProb>>
where
    M: MaskedLanguageModel + ?Sized,
{
    let tokens = alignment.full_tokens().len() + SENTINEL_TOKENS;
    let max = model.max_input_length();
    if tokens > max {
        return Err(PipelineError::LengthExceeded { tokens, max });
    }

    let queries = build_queries(alignment, model.special_tokens());
    if queries.is_empty() {
        return Err(PipelineError::Unexpected(
            "No context token survived alignment; nothing to score".to_string(),
        ));
    }
    if queries.len() > max_batch_size {
        return Err(PipelineError::BatchLimitExceeded {
            queries: queries.len(),
            max: max_batch_size,
        });
    }

    let _span = tracing::debug_span!("pll_score", queries = queries.len(), tokens).entered();

    let (batch, targets): (Vec<Vec<u32>>, Vec<(usize, u32)>) = queries
        .into_iter()
        .map(|q| (q.input_ids, (q.position, q.original_token_id)))
        .unzip();

    let logits = model.forward(&batch)?;
    let (batch_size, seq_len, vocab_size) = logits.dims3()?;
    if batch_size != batch.len() || seq_len != tokens {
        return Err(PipelineError::Unexpected(format!(
            "Model returned logits shaped ({batch_size}, {seq_len}, {vocab_size}) for a batch of {} sequences of length {tokens}",
            batch.len()
        )));
    }

    // Row i of the batch belongs to query i; read each back by index.
    let rows = targets
        .iter()
        .enumerate()
        .map(|(row, &(position, _))| logits.i((row, position)))
        .collect::<candle_core::Result<Vec<_>>>()?;
    let rows = Tensor::stack(&rows, 0)?.to_dtype(DType::F32)?;
    let log_probs = log_softmax(&rows, D::Minus1)?.to_vec2::<f32>()?;

    targets
        .into_iter()
        .zip(log_probs)
        .map(|((position, token_id), row)| {
            let log_prob = row.get(token_id as usize).copied().ok_or_else(|| {
                PipelineError::Unexpected(format!(
                    "Token id {token_id} is outside the model vocabulary of {vocab_size}"
                ))
            })?;
            Ok(TokenLogProb {
                position,
                token_id,
                log_prob,
            })
        })
        .collect()
}

/// Pseudo-log-likelihood of the context tokens of `alignment`.
///
/// Higher is more plausible. Only comparable across sentences built with the
/// same marking convention; no length normalization is applied.
pub fn score<M>(alignment: &TokenAlignment, model: &M, max_batch_size: usize) -> Result<f32>
where
    M: MaskedLanguageModel + ?Sized,
{
    let tokens = score_tokens(alignment, model, max_batch_size)?;
    let total = tokens.iter().map(|t| t.log_prob).sum::<f32>();
    tracing::debug!(tokens = tokens.len(), score = total, "scored sentence");
    Ok(total)
}

/// Tokenize both views of `sentence` without sentinels or truncation.
///
/// Fails with [`PipelineError::LengthExceeded`] as soon as the full
/// tokenization is known to be too long for `model`.
pub fn align_sentence<M>(sentence: &MarkedSentence, model: &M) -> Result<TokenAlignment>
where
    M: MaskedLanguageModel + ?Sized,
{
    align(sentence, model.max_input_length(), |text| {
        model.encode(text, false, false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn special() -> SpecialTokens {
        SpecialTokens {
            mask_id: 4,
            mask_token: "[MASK]".to_string(),
            start_id: 2,
            end_id: 3,
            all: HashSet::from([0, 1, 2, 3, 4]),
        }
    }

    /// "a <b> c d" tokenized as 10 20 30 40.
    fn alignment() -> TokenAlignment {
        TokenAlignment::from_tokens(vec![10, 30, 40], vec![10, 20, 30, 40], &[1..2])
    }

    #[test]
    fn one_query_per_context_token() {
        let alignment = alignment();
        let queries = build_queries(&alignment, &special());

        assert_eq!(queries.len(), alignment.context_count());
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].input_ids, [2, 4, 20, 30, 40, 3]);
        assert_eq!(queries[1].input_ids, [2, 10, 20, 4, 40, 3]);
        assert_eq!(queries[2].input_ids, [2, 10, 20, 30, 4, 3]);
        assert_eq!(
            queries.iter().map(|q| q.position).collect::<Vec<_>>(),
            [1, 3, 4]
        );
        assert_eq!(
            queries.iter().map(|q| q.original_token_id).collect::<Vec<_>>(),
            [10, 30, 40]
        );
    }

    #[test]
    fn span_position_is_never_masked() {
        let alignment = alignment();
        for q in build_queries(&alignment, &special()) {
            assert_eq!(q.input_ids[2], 20);
            assert_eq!(q.input_ids.len(), 6);
            assert_eq!(q.input_ids.iter().filter(|&&t| t == 4).count(), 1);
        }
    }
}
