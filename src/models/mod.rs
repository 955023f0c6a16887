// ============ Model implementations ============

pub(crate) mod modernbert;

// Public size enum (for builder entry points)
pub use modernbert::ModernBertSize;
