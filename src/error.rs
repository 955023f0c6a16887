//! Error types for this crate.
//!
//! All fallible operations return [`Result<T>`] which uses [`PipelineError`] as the error type.

use thiserror::Error;

/// A [`Result`](std::result::Result) alias using [`PipelineError`] as the error type.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The unified error type for all crate errors.
///
/// Input validation failures (markup, blanks, lengths) are detected before any
/// forward pass runs, so matching on them never means a model call was wasted.
///
/// # Example
///
/// ```rust,no_run
/// use candle_pll::error::PipelineError;
///
/// fn handle_error(e: PipelineError) {
///     match &e {
///         PipelineError::MalformedMarkup(reason) => {
///             // Bad `<span>` markup - fix the sentence
///             eprintln!("{reason}");
///         }
///         PipelineError::InvalidSentence { ordinal, .. } => {
///             eprintln!("Fix sentence #{ordinal}: {e}");
///         }
///         PipelineError::LengthExceeded { .. } | PipelineError::BatchLimitExceeded { .. } => {
///             // Shorten the sentence
///         }
///         PipelineError::Download(_) => {
///             // Network issue - retry with backoff
///         }
///         _ => {
///             eprintln!("Error: {e}");
///         }
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PipelineError {
    /// Network or download failure. Retry may help.
    #[error("{0}")]
    Download(String),

    /// Tokenization failure. Check input text.
    #[error("{0}")]
    Tokenization(String),

    /// Device initialization failure. Fall back to CPU.
    #[error("{0}")]
    Device(String),

    /// No sentence or template was given.
    #[error("A sentence must be entered")]
    EmptyInput,

    /// The sentence's `<span>` markup was rejected.
    #[error("Malformed sentence: {0}")]
    MalformedMarkup(MarkupRejection),

    /// One sentence of a sentence set was rejected.
    #[error("Sentence #{ordinal} is not correctly formatted: {reason}")]
    InvalidSentence {
        /// 1-based position of the sentence in the input.
        ordinal: usize,
        /// Why it was rejected.
        reason: MarkupRejection,
    },

    /// A substitution template must contain exactly one `*` blank.
    #[error("The template must contain exactly one '*' blank, found {found}")]
    BlankCount {
        /// Number of blanks found.
        found: usize,
    },

    /// The tokenized sentence is longer than the model accepts.
    #[error("The sentence has {tokens} tokens, more than the model maximum of {max}")]
    LengthExceeded {
        /// Tokens in the assembled sequence, sentinels included.
        tokens: usize,
        /// Model input limit.
        max: usize,
    },

    /// The sentence would need more masked queries than one batch may hold.
    #[error("The sentence needs {queries} masked queries, more than the configured maximum of {max}")]
    BatchLimitExceeded {
        /// Masked queries required.
        queries: usize,
        /// Configured batch bound.
        max: usize,
    },

    /// A mandatory sentence of a sentence set was blank.
    #[error("Sentence #{ordinal} cannot be empty")]
    MandatorySentenceMissing {
        /// 1-based position of the missing sentence.
        ordinal: usize,
    },

    /// More sentences than a sentence set accepts.
    #[error("At most {max} sentences can be compared, got {given}")]
    TooManySentences {
        /// Sentences supplied.
        given: usize,
        /// Accepted maximum.
        max: usize,
    },

    /// Internal error. Report if seen.
    #[error("{0}")]
    Unexpected(String),
}

/// Reason a marked sentence was rejected by the markup validator.
///
/// Checked in declaration order; the first failing rule wins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupRejection {
    /// No `<` or `>` at all.
    #[error("no '<' '>' marked words found")]
    NoMarkers,

    /// `<` and `>` counts differ.
    #[error("found {opening} '<' but {closing} '>'")]
    UnbalancedMarkers {
        /// Count of `<`.
        opening: usize,
        /// Count of `>`.
        closing: usize,
    },

    /// `<<` or `>>` present.
    #[error("doubled markers ('<<' or '>>') are not allowed")]
    DoubledMarkers,

    /// A `>` with no open `<` before it.
    #[error("'>' at byte {offset} closes nothing")]
    UnmatchedCloser {
        /// Byte offset of the closer.
        offset: usize,
    },

    /// A `<` never closed.
    #[error("'<' at byte {offset} is never closed")]
    UnclosedOpener {
        /// Byte offset of the opener.
        offset: usize,
    },

    /// `< >` with nothing but whitespace inside.
    #[error("marked span at byte {offset} is empty")]
    EmptySpan {
        /// Byte offset of the span's opener.
        offset: usize,
    },

    /// A marker inside another span.
    #[error("marked span at byte {offset} contains another marker")]
    NestedSpan {
        /// Byte offset of the span's opener.
        offset: usize,
    },

    /// Every word of the sentence is marked.
    #[error("at least one word must be left outside the marked spans")]
    NoContext,
}

impl From<MarkupRejection> for PipelineError {
    fn from(value: MarkupRejection) -> Self {
        PipelineError::MalformedMarkup(value)
    }
}

impl From<hf_hub::api::sync::ApiError> for PipelineError {
    fn from(value: hf_hub::api::sync::ApiError) -> Self {
        PipelineError::Download(format!("HuggingFace API error: {}", value))
    }
}

impl From<candle_core::Error> for PipelineError {
    fn from(value: candle_core::Error) -> Self {
        PipelineError::Unexpected(value.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(value: std::io::Error) -> Self {
        PipelineError::Unexpected(value.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(value: serde_json::Error) -> Self {
        PipelineError::Unexpected(value.to_string())
    }
}
