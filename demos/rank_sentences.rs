use candle_pll::error::Result;
use candle_pll::pll::{ModernBertSize, PllPipelineBuilder, RankingResult, SubstitutionRequest};

fn print_ranking(ranked: &RankingResult) {
    for (i, entry) in ranked.iter().enumerate() {
        println!(
            "  {}. {:>9.3}  x{:<5.2} {}",
            i + 1,
            entry.score,
            entry.ratio,
            entry.sentence
        );
    }
    println!(
        "  ({} sentences, {} masked queries, {:.2}ms)",
        ranked.stats.sentences_scored,
        ranked.stats.masked_queries,
        ranked.stats.total_time.as_secs_f64() * 1000.0
    );
}

fn main() -> Result<()> {
    println!("Building pipeline...");

    let pipeline = PllPipelineBuilder::modernbert(ModernBertSize::Base).build()?;

    println!("Pipeline built successfully.");

    // Single sentence
    let sentence = "The <nurse> said that she was tired.";
    let output = pipeline.score(sentence)?;

    println!("\n=== Score ===");
    println!("Sentence: \"{}\"", output.sentence);
    println!(
        "PLL: {:.4} over {} context tokens ({} span tokens)",
        output.score, output.context_tokens, output.span_tokens
    );

    // Explicit candidates
    println!("\n=== Rank by substitution ===");
    let request = SubstitutionRequest::new("The * fixed the car in an hour.")
        .candidates(["mechanic", "nurse", "child", "engineer"]);
    print_ranking(&pipeline.rank_by_substitution(&request)?);

    // Candidates proposed by the model
    println!("\n=== Rank by proposed substitution ===");
    let request = SubstitutionRequest::new("The weather today is *.")
        .exclude_articles(true)
        .exclude_prepositions(true)
        .exclude_conjunctions(true)
        .max_candidates(5);
    print_ranking(&pipeline.rank_by_substitution(&request)?);

    // Free-form sentence set
    println!("\n=== Rank by sentence set ===");
    let ranked = pipeline.rank_by_sentence_set(&[
        "<He> is a brilliant engineer.",
        "<She> is a brilliant engineer.",
        "<They> are brilliant engineers.",
    ])?;
    print_ranking(&ranked);

    Ok(())
}
