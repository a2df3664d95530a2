//! Error taxonomy for the row parser, the schema reader and the dialects.
//!
//! Every variant is fatal to the current parse attempt. Callers that want an
//! explanation re-run the failing row through the diagnostic re-parser, which
//! never produces one of these.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    /// Structural violation: bad delimiter, header/type count mismatch,
    /// declared type differing from the target schema, unparsable value.
    #[error("Incorrect data: {0}")]
    IncorrectData(String),

    /// Input header names a column the target schema does not define.
    #[error("Unknown column '{0}' in input header")]
    UnknownColumn(String),

    /// Two input columns resolve to the same target column.
    #[error("Duplicate column '{0}' in input header")]
    DuplicateColumn(String),

    /// Wire value denotes NULL but the target column type is not nullable.
    #[error("{0}")]
    NullValueInNonNullable(String),

    #[error("Reading input: {0}")]
    Io(#[from] io::Error),
}

impl FormatError {
    pub fn incorrect(message: impl Into<String>) -> Self {
        FormatError::IncorrectData(message.into())
    }

    pub fn null_in_non_nullable(type_name: &str) -> Self {
        FormatError::NullValueInNonNullable(format!(
            "Cannot insert NULL into non-nullable column of type {type_name}"
        ))
    }

    /// Rewrites the message of a data error, keeping its variant. Header
    /// errors and I/O errors are returned unchanged.
    pub fn map_message(self, f: impl FnOnce(String) -> String) -> Self {
        match self {
            FormatError::IncorrectData(message) => FormatError::IncorrectData(f(message)),
            FormatError::NullValueInNonNullable(message) => {
                FormatError::NullValueInNonNullable(f(message))
            }
            other => other,
        }
    }

    /// Stable code printed with CLI errors.
    pub fn kind(&self) -> &'static str {
        match self {
            FormatError::IncorrectData(_) => "incorrect_data",
            FormatError::UnknownColumn(_) => "unknown_column",
            FormatError::DuplicateColumn(_) => "duplicate_column",
            FormatError::NullValueInNonNullable(_) => "null_value_in_non_nullable",
            FormatError::Io(_) => "io",
        }
    }
}

pub type FormatResult<T> = std::result::Result<T, FormatError>;
