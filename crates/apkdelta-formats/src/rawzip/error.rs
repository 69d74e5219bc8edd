//! Raw ZIP parsing error types

use thiserror::Error;

/// Errors raised while parsing ZIP structures byte-exactly
#[derive(Debug, Error)]
pub enum RawZipError {
    /// File is smaller than the minimum end-of-central-directory record
    #[error("file too small to be a ZIP archive: {size} bytes")]
    TooSmall {
        /// Actual file size
        size: u64,
    },

    /// No end-of-central-directory record found
    #[error("no end of central directory record found")]
    MissingEocd,

    /// A structure signature did not match
    #[error("bad {structure} signature at offset {offset}: 0x{actual:08X}")]
    BadSignature {
        /// Which structure was being read
        structure: &'static str,
        /// File offset of the signature field
        offset: u64,
        /// Value actually read
        actual: u32,
    },

    /// Central directory walked past its declared record count or size
    #[error("central directory truncated: expected {expected} records, read {read}")]
    TruncatedCentralDirectory {
        /// Records declared by the end record
        expected: u64,
        /// Records successfully read
        read: u64,
    },

    /// A local record's bytes extend past end of file
    #[error("local record for '{name}' truncated at offset {offset}")]
    TruncatedRecord {
        /// Entry name
        name: String,
        /// Offset where the read failed
        offset: u64,
    },

    /// Entry sizes require a Zip64 extra field that is absent or malformed
    #[error("entry '{name}' requires a Zip64 extra field that is missing or malformed")]
    BadZip64Extra {
        /// Entry name
        name: String,
    },

    /// Named entry does not exist in the archive
    #[error("entry not found: {name}")]
    EntryNotFound {
        /// Requested entry name
        name: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for raw ZIP operations
pub type RawZipResult<T> = Result<T, RawZipError>;
