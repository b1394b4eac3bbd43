#![doc = include_str!("../README.md")]

mod bits;
pub mod headers;
mod packed_array;
pub mod reader;
pub mod trie;
pub mod vocab;

pub use trie::Trie;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid ARPA input: {0}")]
    InvalidArpa(String),
    #[error("token {0:?} has no vocabulary entry")]
    UnknownToken(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("snapshot ended unexpectedly while reading its {0} section")]
    TruncatedSnapshot(String),
    #[error("ngram count mismatch: expected {expected}, found {found}")]
    CountMismatch { expected: u64, found: u64 },
    #[error("query token is out of vocabulary")]
    OutOfVocabularyQuery,
    #[error("top_k requested more children than the context has")]
    EmptyChildRange,
    #[error("snapshot does not start with the expected magic bytes")]
    BadMagic,
    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u16),
    #[error("failed to parse ARPA input")]
    Arpa(#[from] reader::arpa::ArpaReadError),
}
