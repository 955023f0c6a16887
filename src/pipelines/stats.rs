use std::time::{Duration, Instant};

/// Statistics for one scoring or ranking call.
#[derive(Debug, Clone, Default)]
pub struct PllStats {
    /// Total execution time.
    pub total_time: Duration,
    /// Number of sentences scored.
    pub sentences_scored: usize,
    /// Masked queries sent through the model, summed over sentences.
    pub masked_queries: usize,
}

impl PllStats {
    /// Create a new stats tracker (call at start of operation).
    pub(crate) fn start() -> PllStatsBuilder {
        PllStatsBuilder {
            start_time: Instant::now(),
            sentences_scored: 0,
            masked_queries: 0,
        }
    }
}

/// Accumulates counts from creation until [`finish`](Self::finish).
pub(crate) struct PllStatsBuilder {
    start_time: Instant,
    sentences_scored: usize,
    masked_queries: usize,
}

impl PllStatsBuilder {
    /// Record one scored sentence and the queries it needed.
    pub fn record_sentence(&mut self, masked_queries: usize) {
        self.sentences_scored += 1;
        self.masked_queries += masked_queries;
    }

    /// Finalize stats.
    pub fn finish(self) -> PllStats {
        PllStats {
            total_time: self.start_time.elapsed(),
            sentences_scored: self.sentences_scored,
            masked_queries: self.masked_queries,
        }
    }
}
