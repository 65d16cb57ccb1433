//! Error types for DMAP decoding and encoding

use thiserror::Error;

use crate::formats::FieldSchemaError;

/// Coarse classification of a [`DmapError`].
///
/// Useful when a caller only needs to branch on the kind of failure,
/// e.g. to tell an empty file apart from a corrupted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EmptyInput,
    CorruptStructure,
    UnknownTypeTag,
    ArrayBounds,
    TruncatedText,
    InvalidField,
    InvalidRecord,
    NothingToWrite,
    FieldSchema,
    Io,
}

/// Errors that can occur when reading or writing DMAP data
#[derive(Error, Debug)]
pub enum DmapError {
    /// File is missing or has no bytes, or an empty stream was supplied
    #[error("Empty input: {source_name} contains no data")]
    EmptyInput { source_name: String },

    /// A size, count or cursor invariant of the record framing was violated
    #[error("Corrupt structure in record {record} at byte {offset}: {message}")]
    CorruptStructure {
        record: usize,
        offset: usize,
        message: String,
    },

    /// Type tag byte outside the closed tag set
    #[error("Unknown type tag {tag} for field '{name}' in record {record}")]
    UnknownTypeTag {
        record: usize,
        name: String,
        tag: u8,
    },

    /// Rank, dimension or element count of an array is out of bounds
    #[error("Array '{name}' in record {record} out of bounds: {message}")]
    ArrayBounds {
        record: usize,
        name: String,
        message: String,
    },

    /// No null terminator before the end of the enclosing record
    #[error("Truncated text in record {record}: no terminator after byte {offset}")]
    TruncatedText { record: usize, offset: usize },

    /// A field value cannot be encoded (empty, ragged or mixed sequence, bad override)
    #[error("Invalid field '{name}': {message}")]
    InvalidField { name: String, message: String },

    /// A record the decoder would not be able to read back
    #[error("Invalid record {record}: {message}")]
    InvalidRecord { record: usize, message: String },

    /// Encoder was given no records
    #[error("No records to write")]
    NothingToWrite,

    /// Record does not match its file type's field dictionary
    #[error(transparent)]
    Schema(#[from] FieldSchemaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DmapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DmapError::EmptyInput { .. } => ErrorKind::EmptyInput,
            DmapError::CorruptStructure { .. } => ErrorKind::CorruptStructure,
            DmapError::UnknownTypeTag { .. } => ErrorKind::UnknownTypeTag,
            DmapError::ArrayBounds { .. } => ErrorKind::ArrayBounds,
            DmapError::TruncatedText { .. } => ErrorKind::TruncatedText,
            DmapError::InvalidField { .. } => ErrorKind::InvalidField,
            DmapError::InvalidRecord { .. } => ErrorKind::InvalidRecord,
            DmapError::NothingToWrite => ErrorKind::NothingToWrite,
            DmapError::Schema(_) => ErrorKind::FieldSchema,
            DmapError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid_field(name: impl Into<String>, message: impl Into<String>) -> Self {
        DmapError::InvalidField {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DmapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = DmapError::EmptyInput {
            source_name: "stream".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::EmptyInput);

        let err = DmapError::UnknownTypeTag {
            record: 2,
            name: "stid".to_string(),
            tag: 7,
        };
        assert_eq!(err.kind(), ErrorKind::UnknownTypeTag);
        assert_eq!(
            err.to_string(),
            "Unknown type tag 7 for field 'stid' in record 2"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: DmapError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
