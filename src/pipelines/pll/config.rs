/// Tunables shared by every call of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PllConfig {
    /// Most masked queries one sentence may produce. Bounds the forward-pass
    /// batch; longer sentences fail with `BatchLimitExceeded`.
    pub max_batch_size: usize,
    /// Candidates proposed when a substitution request lists none.
    pub default_candidates: usize,
}

impl PllConfig {
    /// Default masked-query bound.
    pub const DEFAULT_MAX_BATCH_SIZE: usize = 512;
    /// Default number of proposed candidates.
    pub const DEFAULT_CANDIDATES: usize = 5;
}

impl Default for PllConfig {
    fn default() -> Self {
        Self {
            max_batch_size: Self::DEFAULT_MAX_BATCH_SIZE,
            default_candidates: Self::DEFAULT_CANDIDATES,
        }
    }
}
