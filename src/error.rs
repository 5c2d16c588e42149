//! Error type shared by the training and bias-analysis code.

use ndarray::ShapeError;
use ndarray_npy::{ReadNpyError, WriteNpyError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("word '{0}' is not in the embedding table")]
    UnknownWord(String),

    #[error("index {index} is out of range for vocabulary of size {vocab_size}")]
    IndexOutOfRange { index: usize, vocab_size: usize },

    #[error("size mismatch: {what} ({left} != {right})")]
    SizeMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    #[error("dimension mismatch: expected {expected}, actual {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot project onto zero vector")]
    ZeroVector,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("npy read error: {0}")]
    ReadNpy(#[from] ReadNpyError),

    #[error("npy write error: {0}")]
    WriteNpy(#[from] WriteNpyError),

    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),
}

impl EmbeddingError {
    pub fn unknown_word(word: impl Into<String>) -> Self {
        Self::UnknownWord(word.into())
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub fn size_mismatch(what: &'static str, left: usize, right: usize) -> Self {
        Self::SizeMismatch { what, left, right }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let e = EmbeddingError::unknown_word("zyzzyva");
        assert_eq!(e.to_string(), "word 'zyzzyva' is not in the embedding table");

        let e = EmbeddingError::IndexOutOfRange { index: 12, vocab_size: 10 };
        assert!(e.to_string().contains("12"));

        let e = EmbeddingError::size_mismatch("target sets X and Y", 3, 2);
        assert_eq!(e.to_string(), "size mismatch: target sets X and Y (3 != 2)");

        assert_eq!(EmbeddingError::ZeroVector.to_string(), "cannot project onto zero vector");
    }
}
