//! Error types for ZPAQ archive operations.
//!
//! This module provides the [`Error`] enum, covering every failure mode
//! described by the container format, the ZPAQL virtual machine, the
//! predictor/coder pipeline, the crypto envelope, and the journaling
//! layer, along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! ```rust,no_run
//! use zpaqrs::{Archive, Result};
//!
//! fn open(path: &str) -> Result<()> {
//!     let archive = Archive::open_path(path)?;
//!     println!("{} live paths", archive.len());
//!     Ok(())
//! }
//! ```

use std::io;

/// Convenience alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes produced by this crate.
///
/// Matches the error kinds enumerated in the container/VM/coder/crypto/
/// journaling design: `Truncated`, `BadMagic`, `BadHeader`, `VmRuntime`,
/// `CoderRange`, `ChecksumMismatch`, `BadKey`, `BadVersion`,
/// `UnknownMethod`, and `Io`.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading or writing the archive stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read ended earlier than the surrounding structure required.
    ///
    /// Raised by C1 on a short read at an expected boundary (e.g. a
    /// segment header promises a filename length the stream doesn't
    /// have), and by the container framer when a block or segment is
    /// cut off mid-structure.
    #[error("truncated archive: expected {expected} more byte(s) at offset {offset:#x}")]
    Truncated {
        /// Bytes that were expected but not available.
        expected: usize,
        /// Archive offset at which the short read occurred.
        offset: u64,
    },

    /// A block did not begin with the 13-byte block magic where one was
    /// expected.
    #[error("bad block magic at offset {offset:#x}")]
    BadMagic {
        /// Archive offset where the magic was expected.
        offset: u64,
    },

    /// A structural field (bytecode length, program header, component
    /// count, segment header) violated the format's invariants.
    #[error("bad header: {0}")]
    BadHeader(String),

    /// The ZPAQL virtual machine could not execute the supplied
    /// bytecode: an illegal opcode, an out-of-range memory access, or an
    /// instruction-count overrun past the configured ceiling.
    ///
    /// Division by zero is *not* an error (it yields zero, matching the
    /// reference); this variant is reserved for genuine faults.
    #[error("ZPAQL runtime error: {0}")]
    VmRuntime(String),

    /// The arithmetic coder reached a `low`/`high` state that cannot
    /// occur under correct renormalization. Indicates either a bug or a
    /// corrupted/adversarial input being decoded.
    #[error("arithmetic coder in an impossible range state")]
    CoderRange,

    /// A segment's stored SHA-1 trailer did not match the SHA-1 of the
    /// reconstructed bytes.
    #[error("checksum mismatch for segment {path:?}")]
    ChecksumMismatch {
        /// The named stream the checksum was attached to, if any.
        path: Option<String>,
    },

    /// The supplied password did not unlock the archive (the first
    /// block's magic did not decrypt correctly), or no password was
    /// supplied for an encrypted archive.
    #[error("wrong password or missing key")]
    BadKey,

    /// A requested version number exceeds the committed tail of the
    /// archive.
    #[error("version {requested} requested but only {committed} committed")]
    BadVersion {
        /// The version the caller asked for.
        requested: u32,
        /// The highest committed version in the archive.
        committed: u32,
    },

    /// `compress` was asked for a method preset this build does not
    /// implement. Encoder-only; a decoder never needs to know the
    /// method, only how to run the embedded bytecode.
    #[error("unknown method preset: {0}")]
    UnknownMethod(u8),

    /// A resource limit configured via [`crate::safety`] was exceeded:
    /// the VM instruction ceiling, the scrypt cost ceiling, or a
    /// fragment/chunk size clamp.
    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    /// An archive-relative path failed validation (see
    /// [`crate::archive_path`]).
    #[error("invalid archive path: {0}")]
    InvalidPath(String),

    /// A long-running operation was cooperatively cancelled via a
    /// [`crate::safety::CancellationFlag`] before it completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for constructing [`Error::BadHeader`] from a `&str` or
    /// `String`.
    pub fn bad_header(msg: impl Into<String>) -> Self {
        Error::BadHeader(msg.into())
    }

    /// Shorthand for constructing [`Error::VmRuntime`] from a `&str` or
    /// `String`.
    pub fn vm_runtime(msg: impl Into<String>) -> Self {
        Error::VmRuntime(msg.into())
    }

    /// Returns `true` for errors that are fatal to the *whole* archive
    /// read rather than just the current block/segment (per the
    /// propagation rules in the design: corruption is resync-and-
    /// continue, `BadKey` is terminal).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::BadKey | Error::Io(_) | Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let e = Error::BadMagic { offset: 0x20 };
        assert_eq!(e.to_string(), "bad block magic at offset 0x20");

        let e = Error::BadVersion {
            requested: 5,
            committed: 3,
        };
        assert_eq!(e.to_string(), "version 5 requested but only 3 committed");
    }

    #[test]
    fn terminal_classification() {
        assert!(Error::BadKey.is_terminal());
        assert!(!Error::CoderRange.is_terminal());
        assert!(!Error::UnknownMethod(9).is_terminal());
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
