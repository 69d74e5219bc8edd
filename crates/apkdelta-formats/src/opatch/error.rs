//! opatch error types

use thiserror::Error;

/// Errors raised while building or applying `opatch-1` patches
#[derive(Debug, Error)]
pub enum OpatchError {
    /// Patch does not start with the `OPATCH1\0` magic
    #[error("bad patch magic: {actual:02X?}")]
    BadMagic {
        /// Bytes actually read
        actual: [u8; 8],
    },

    /// Unknown opcode in the op stream
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    /// Op stream ended before its END marker
    #[error("truncated patch while reading {context}")]
    Truncated {
        /// What was being read
        context: &'static str,
    },

    /// Baseline file size differs from the patch header
    #[error("baseline size mismatch: patch expects {expected} bytes, file has {actual}")]
    BaselineSizeMismatch {
        /// Size recorded in the patch
        expected: u64,
        /// Actual baseline size
        actual: u64,
    },

    /// Baseline digest differs from the patch header
    #[error("baseline sha256 mismatch: patch expects {expected}, file is {actual}")]
    BaselineDigestMismatch {
        /// Digest recorded in the patch
        expected: String,
        /// Actual baseline digest
        actual: String,
    },

    /// A COPY op reaches outside the baseline
    #[error("copy range {offset}+{length} exceeds baseline size {old_size}")]
    CopyOutOfRange {
        /// Copy source offset
        offset: u64,
        /// Copy length
        length: u64,
        /// Baseline size
        old_size: u64,
    },

    /// Total written output differs from the declared target size
    #[error("output size mismatch: expected {expected} bytes, wrote {actual}")]
    OutputSizeMismatch {
        /// Size recorded in the patch
        expected: u64,
        /// Bytes actually written
        actual: u64,
    },

    /// Output digest differs from the declared target digest
    #[error("target sha256 mismatch: expected {expected}, produced {actual}")]
    TargetDigestMismatch {
        /// Digest recorded in the patch
        expected: String,
        /// Digest of the produced output
        actual: String,
    },

    /// Block size of zero is not usable
    #[error("block size must be non-zero")]
    ZeroBlockSize,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for opatch operations
pub type OpatchResult<T> = Result<T, OpatchError>;
