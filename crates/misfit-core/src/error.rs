// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors surfaced by misfit accumulation, persistence and ranking.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MisfitError {
    /// A persisted or requested size disagrees with the table shape.
    #[error("size mismatch: {0}")]
    SizeMismatch(String),
    /// A ranking or observation key is not present.
    #[error("missing key: {0}")]
    MissingKey(String),
    /// A permutation was requested before the ranking was sorted.
    #[error("uninitialized ranking: {0}")]
    UninitializedRanking(String),
    /// A persisted byte stream is truncated or corrupt.
    #[error("malformed buffer: {0}")]
    MalformedBuffer(String),
    #[error("storage write failure: {0}")]
    StorageWriteFailure(String),
    #[error("storage read failure: {0}")]
    StorageReadFailure(String),
    /// A scalar accessor produced a value that cannot be ranked.
    #[error("unsupported value type: {0}")]
    UnsupportedValueType(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The chi-square collaborator failed for an observation key.
    #[error("chi-square evaluation failed: {0}")]
    Evaluation(String),
}

impl MisfitError {
    pub fn size_mismatch(message: impl Into<String>) -> Self {
        Self::SizeMismatch(message.into())
    }

    pub fn missing_key(message: impl Into<String>) -> Self {
        Self::MissingKey(message.into())
    }

    pub fn uninitialized_ranking(message: impl Into<String>) -> Self {
        Self::UninitializedRanking(message.into())
    }

    pub fn malformed_buffer(message: impl Into<String>) -> Self {
        Self::MalformedBuffer(message.into())
    }

    pub fn storage_write(message: impl Into<String>) -> Self {
        Self::StorageWriteFailure(message.into())
    }

    pub fn storage_read(message: impl Into<String>) -> Self {
        Self::StorageReadFailure(message.into())
    }

    pub fn unsupported_value_type(message: impl Into<String>) -> Self {
        Self::UnsupportedValueType(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }
}
