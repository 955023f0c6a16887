//! Pseudo-log-likelihood sentence ranking with masked language models in Rust.
//!
//! Powered by [Candle](https://github.com/huggingface/candle). Mark the words
//! you care about with `<...>`, and the pipeline tells you how plausible the
//! rest of the sentence is around them.

#![deny(missing_docs)]

// ============ Internal API ============

pub(crate) mod models;
pub(crate) mod pipelines;

// ============ Public API ============

pub mod error;

pub use pipelines::pll;
