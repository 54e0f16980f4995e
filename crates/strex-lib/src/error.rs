use thiserror::Error;

/// Errors raised by misuse of the library API or an invalid configuration.
///
/// Sparse or degenerate data never produces an error; extractors return empty
/// output instead.
#[derive(Debug, Error)]
pub enum StrexError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("percentile must lie strictly between 0 and 1, got {0}")]
    InvalidPercentile(f64),

    #[error("vector sample has {found} values but stream `{name}` expects {expected}")]
    WidthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("stream `{0}` has no usable sampling frequency")]
    MissingFrequency(String),

    #[error("unknown channel `{0}`")]
    UnknownChannel(String),

    #[error("unknown output key `{0}`")]
    UnknownKey(String),
}

pub type Result<T> = std::result::Result<T, StrexError>;
