use thiserror::Error;

/// Errors raised while building an index or mapping peptides against it.
#[derive(Debug, Error)]
pub enum MapperError {
    /// A reference sequence was empty, too long, or contained a rejected symbol.
    #[error("invalid sequence '{id}': {reason}")]
    InvalidSequence { id: String, reason: String },

    /// The concatenated corpus does not fit the index address space.
    #[error("corpus of {len} residues exceeds the index capacity of {max}")]
    CorpusTooLarge { len: usize, max: usize },

    /// The query holds a symbol outside the alphabet or an out-of-range budget.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The caller cancelled the search before it finished.
    #[error("search cancelled")]
    SearchCancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// A deserialized index whose parts do not fit together.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),
}

impl MapperError {
    pub(crate) fn invalid_sequence(id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSequence { id: id.to_string(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, MapperError>;
