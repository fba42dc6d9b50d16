//! Error types for wdbc

use thiserror::Error;

/// Main error type for wdbc operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No format string found for table: {0}")]
    FormatNotFound(String),

    #[error("Invalid format character '{ch}' at position {position}")]
    InvalidFormatChar { ch: char, position: usize },

    #[error("Invalid signature {found:?}, expected \"WDBC\"")]
    BadSignature { found: [u8; 4] },

    #[error("Truncated header: need 20 bytes, got {0}")]
    TruncatedHeader(usize),

    #[error("Truncated body: need {expected} bytes, file has {actual}")]
    TruncatedBody { expected: u64, actual: u64 },

    #[error(
        "Layout mismatch: format expects {expected_fields} fields / {expected_size} bytes per record, \
         file has {actual_fields} fields / {actual_size} bytes"
    )]
    LayoutMismatch {
        expected_fields: u32,
        actual_fields: u32,
        expected_size: u32,
        actual_size: u32,
    },

    #[error("String offset {offset} outside string block of {size} bytes")]
    BadStringOffset { offset: u32, size: u32 },

    #[error("Row index {index} out of range ({count} records)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Invalid column {index} (table has {field_count} fields)")]
    InvalidColumn { index: usize, field_count: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid catalog data: {0}")]
    Catalog(String),
}

impl Error {
    /// Stable machine-readable code for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::FormatNotFound(_) => "format_not_found",
            Error::InvalidFormatChar { .. } => "invalid_format_char",
            Error::BadSignature { .. } => "bad_signature",
            Error::TruncatedHeader(_) => "truncated_header",
            Error::TruncatedBody { .. } => "truncated_body",
            Error::LayoutMismatch { .. } => "layout_mismatch",
            Error::BadStringOffset { .. } => "bad_string_offset",
            Error::IndexOutOfRange { .. } => "index_out_of_range",
            Error::InvalidColumn { .. } => "invalid_column",
            Error::NotFound(_) => "not_found",
            Error::InvalidFilter(_) => "invalid_filter",
            Error::Catalog(_) => "catalog",
        }
    }

    /// Whether the error was caused by the caller's request rather than the data
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Error::IndexOutOfRange { .. } | Error::InvalidColumn { .. } | Error::InvalidFilter(_)
        )
    }
}

/// Result type alias for wdbc operations
pub type Result<T> = std::result::Result<T, Error>;
