// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bildwerk.

use thiserror::Error;

/// Top-level error type for all Bildwerk operations.
///
/// Every variant is a deterministic data-transform failure: the same input
/// always produces the same error, so none of them are worth retrying.
#[derive(Debug, Error)]
pub enum BildwerkError {
    // -- Lookup errors --
    #[error("{0} does not exist")]
    AssetNotFound(String),

    #[error("project archive unreadable: {0}")]
    Archive(String),

    // -- Conversion errors --
    #[error("malformed vector markup: {0}")]
    MalformedVector(String),

    #[error("image decoding failed: {0}")]
    Decode(String),

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("invalid scale: {0}")]
    InvalidScale(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BildwerkError>;
