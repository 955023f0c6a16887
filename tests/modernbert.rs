#![cfg(feature = "cuda")]

use candle_pll::error::{PipelineError, Result};
use candle_pll::pll::{CandidateFilter, ModernBertSize, PllPipelineBuilder, SubstitutionRequest};

#[test]
fn modernbert_scores_marked_sentence() -> Result<()> {
    let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base)
        .cuda(0)
        .build()?;

    let output = pipeline.score("The <nurse> said that she was tired.")?;
    assert!(output.score.is_finite());
    assert!(output.score < 0.0);
    assert!(output.context_tokens > 0);
    assert_eq!(output.stats.masked_queries, output.context_tokens);
    Ok(())
}

#[test]
fn modernbert_prefers_grammatical_sentence() -> Result<()> {
    let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base)
        .cuda(0)
        .build()?;

    let ranked = pipeline.rank_by_sentence_set(&[
        "The <cat> sat on the mat.",
        "<Cat> the mat on sat the.",
    ])?;
    assert_eq!(ranked.len(), 2);
    assert_eq!(
        ranked.best().map(|b| b.sentence.as_str()),
        Some("The <cat> sat on the mat.")
    );
    Ok(())
}

#[test]
fn modernbert_proposes_whole_words() -> Result<()> {
    let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base)
        .cuda(0)
        .build()?;

    let filter = CandidateFilter::new().exclude_articles(true);
    let candidates = pipeline.propose("The capital of France is *.", &filter, 5)?;
    assert!(!candidates.is_empty());
    assert!(candidates.len() <= 5);
    for c in &candidates {
        assert!(c.word.chars().all(char::is_alphanumeric), "{}", c.word);
        assert!(!["a", "an", "the"].contains(&c.word.to_lowercase().as_str()));
    }
    Ok(())
}

#[test]
fn modernbert_ranks_substitutions() -> Result<()> {
    let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base)
        .cuda(0)
        .build()?;

    let request = SubstitutionRequest::new("The weather today is *.").max_candidates(4);
    let ranked = pipeline.rank_by_substitution(&request)?;
    assert!(!ranked.is_empty() && ranked.len() <= 4);
    assert!(ranked
        .entries
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));
    Ok(())
}

#[test]
fn modernbert_rejects_bad_template() -> Result<()> {
    let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base)
        .cuda(0)
        .build()?;

    assert!(matches!(
        pipeline.rank_by_substitution(&SubstitutionRequest::new("* and *")),
        Err(PipelineError::BlankCount { found: 2 })
    ));
    Ok(())
}

#[test]
fn pipelines_share_loaded_weights() -> Result<()> {
    let first = PllPipelineBuilder::modernbert(ModernBertSize::Base)
        .cuda(0)
        .build()?;
    let second = PllPipelineBuilder::modernbert(ModernBertSize::Base)
        .cuda(0)
        .build()?;

    assert!(std::ptr::eq(first.model(), second.model()));
    Ok(())
}
