//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Regatta operations
#[derive(Error, Debug)]
pub enum RegattaError {
    /// I/O errors bubbled up from the underlying file handles
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A store artifact is missing or the prefix cannot be opened
    #[error("cannot open store '{prefix}': {message}")]
    StoreOpen { prefix: PathBuf, message: String },

    /// Malformed on-disk data (bad magic, truncated record, missing `_row`)
    #[error("format error: {message}")]
    Format { message: String },

    /// A region string that does not parse against the contig dictionary
    #[error("bad region '{region}'")]
    BadRegion { region: String },

    /// A variant key that does not parse as `chr:pos:ref:alt` or `chr:pos:rlen:alt`
    #[error("malformed allele key '{key}'")]
    MalformedKey { key: String },

    /// A sample predicate expression that does not parse
    #[error("bad sample expression: {message}")]
    BadExpr { message: String },

    /// More sample groups than fit in the per-sample mask byte
    #[error("too many sample groups (limit {limit})")]
    TooManyGroups { limit: usize },

    /// Parse errors in text inputs (sample table, BED, name lists)
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// File not found errors
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },
}

/// Type alias for Results using RegattaError
pub type Result<T> = std::result::Result<T, RegattaError>;

impl RegattaError {
    /// Create a store-open error for a prefix
    pub fn store_open(prefix: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StoreOpen {
            prefix: prefix.into(),
            message: message.into(),
        }
    }

    /// Create a format error with a message
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create a bad-region error
    pub fn bad_region(region: impl Into<String>) -> Self {
        Self::BadRegion {
            region: region.into(),
        }
    }

    /// Create a malformed-key error
    pub fn malformed_key(key: impl Into<String>) -> Self {
        Self::MalformedKey { key: key.into() }
    }

    /// Create a bad-expression error
    pub fn bad_expr(message: impl Into<String>) -> Self {
        Self::BadExpr {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
