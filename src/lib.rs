//! # zpaqrs
//!
//! A pure-Rust implementation of the ZPAQ level 2 archive format: a
//! self-describing, journaling, content-deduplicating archiver. Every
//! block carries its own decompression bytecode, so a reader never
//! needs anything beyond the archive bytes themselves to reconstruct
//! any version of any file it has ever held.
//!
//! ## Quick Start
//!
//! ### Extracting an Archive
//!
//! ```rust,no_run
//! use zpaqrs::{Archive, ExtractOptions, MemorySink, Result, Selector};
//!
//! fn main() -> Result<()> {
//!     let archive = Archive::open_path("archive.zpaq")?;
//!
//!     for entry in archive.list(None)? {
//!         println!("{}: {} bytes", entry.path.as_str(), entry.size);
//!     }
//!
//!     let mut sink = MemorySink::default();
//!     archive.extract(&Selector::All, &mut sink, &ExtractOptions::default(), None)?;
//!     Ok(())
//! }
//! ```
//!
//! ### Creating and Updating an Archive
//!
//! ```rust,no_run
//! use zpaqrs::{Archive, ArchivePath, PendingFile, Timestamp, Result};
//!
//! fn main() -> Result<()> {
//!     let mut archive = Archive::create_path("new.zpaq")?;
//!
//!     let file = PendingFile {
//!         path: ArchivePath::new("hello.txt")?,
//!         data: b"Hello, World!".to_vec(),
//!         mtime: Timestamp::from_system_time(std::time::SystemTime::now())?,
//!         attributes: 0,
//!     };
//!     let version = archive.add(vec![file], Timestamp::default())?;
//!     println!("committed version {version}");
//!     Ok(())
//! }
//! ```
//!
//! ### Password-Protected Archives
//!
//! ```rust,ignore
//! # #[cfg(feature = "crypto")]
//! use zpaqrs::{Archive, ExtractOptions, Password, Result};
//!
//! # #[cfg(feature = "crypto")]
//! fn main() -> Result<()> {
//!     let archive = Archive::open_path_with_password("encrypted.zpaq", Password::new("secret"))?;
//!     println!("{} live paths", archive.len());
//!     Ok(())
//! }
//! # #[cfg(not(feature = "crypto"))]
//! # fn main() {}
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `crypto` | Yes | Archive-level AES-256-CTR encryption with scrypt key derivation |
//! | `parallel` | Yes | Multi-threaded fragment compression with Rayon |
//!
//! ### Disabling Default Features
//!
//! ```toml
//! [dependencies]
//! zpaqrs = { version = "0.1", default-features = false }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`; see [`error::Error`] for every
//! failure mode the container, VM, crypto envelope, and journaling
//! layer can report.
//!
//! ## Safety and Resource Limits
//!
//! [`safety::ResourceLimits`] bounds ZPAQL instruction counts, scrypt's
//! cost parameter, and the size of any single fragment, so that
//! opening a hostile or corrupt archive fails cleanly rather than
//! spinning or exhausting memory.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

/// Default buffer size for read operations (8 KiB).
pub(crate) const READ_BUFFER_SIZE: usize = 8192;

pub mod archive_path;
pub mod checksum;
pub mod codec;
pub mod coder;
pub mod error;
pub mod format;
pub mod journal;
pub mod predictor;
pub mod read;
pub mod safety;
pub mod streaming;
pub mod telemetry;
pub mod timestamp;
pub mod write;
pub mod zpaql;

#[cfg(feature = "crypto")]
#[cfg_attr(docsrs, doc(cfg(feature = "crypto")))]
pub mod crypto;

#[allow(unused)]
mod s3fifo;

pub use archive_path::ArchivePath;
pub use error::{Error, Result};
pub use read::{Archive, Entry, ExtractOptions, ExtractSink, FilesystemSink, MemorySink, OverwritePolicy, Selector};
pub use timestamp::Timestamp;
pub use write::{PendingFile, Writer};

#[cfg(feature = "crypto")]
#[cfg_attr(docsrs, doc(cfg(feature = "crypto")))]
pub use crypto::Password;

use crate::codec::presets;
use crate::format::block::Block;
use crate::format::reader;
use crate::format::segment::Segment;
use crate::checksum::{Checksum, Sha1};
use crate::safety::ResourceLimits;

/// Compresses `input` as a single, non-journaling block using `method`
/// (`0` for verbatim storage, `1`-[`codec::presets::MAX_METHOD`] for a
/// context-modeled preset), writing the resulting container bytes to
/// `output`. This is the one-shot counterpart to the journaling
/// [`Archive`]/[`Writer`] API, for callers who just want to compress a
/// single buffer without any version history.
pub fn compress(input: &[u8], output: &mut Vec<u8>, method: u8) -> Result<()> {
    compress_with_limits(input, output, method, &ResourceLimits::default())
}

/// Like [`compress`], with caller-supplied [`ResourceLimits`].
pub fn compress_with_limits(input: &[u8], output: &mut Vec<u8>, method: u8, limits: &ResourceLimits) -> Result<()> {
    let block = build_single_segment_block(input, method, limits)?;
    output.extend(block.write());
    Ok(())
}

fn build_single_segment_block(input: &[u8], method: u8, limits: &ResourceLimits) -> Result<Block> {
    let encoded = codec::encode_segment(input, method, limits)?;
    let segment = Segment {
        filename: None,
        comment: Some(input.len().to_string()),
        reserved: 0,
        payload: encoded.coded,
        checksum: Some(Sha1::compute(input)),
        is_last: true,
    };
    let program = presets::build(method)?;
    Ok(Block {
        hcomp_bytes: program.write(),
        pcomp_bytes: None,
        method,
        segments: vec![segment],
    })
}

/// Decompresses a container produced by [`compress`] (or the first
/// block of a larger container) into `output`.
pub fn decompress(input: &[u8], output: &mut Vec<u8>) -> Result<()> {
    decompress_with_limits(input, output, &ResourceLimits::default())
}

/// Like [`decompress`], with caller-supplied [`ResourceLimits`].
pub fn decompress_with_limits(input: &[u8], output: &mut Vec<u8>, limits: &ResourceLimits) -> Result<()> {
    let (blocks, _skipped) = reader::read_all(input);
    let block = blocks
        .first()
        .ok_or_else(|| Error::bad_header("no block found in container"))?;
    let segment = block
        .segments
        .first()
        .ok_or_else(|| Error::bad_header("block has no segments"))?;

    let output_len: usize = segment
        .comment
        .as_deref()
        .ok_or_else(|| Error::bad_header("segment is missing its decoded-length comment"))?
        .parse()
        .map_err(|e| Error::bad_header(format!("bad decoded-length comment: {e}")))?;

    let payload = codec::decode_segment(&block.hcomp_bytes, &segment.payload, output_len, limits)?;
    if let Some(expected) = segment.checksum {
        if Sha1::compute(&payload) != expected {
            return Err(Error::ChecksumMismatch { path: None });
        }
    }
    output.extend(payload);
    Ok(())
}

/// Compresses `input` exactly as [`compress`] does, then encrypts the
/// resulting container under `password` using a freshly generated
/// random salt (see [`crypto::seal`]).
#[cfg(feature = "crypto")]
#[cfg_attr(docsrs, doc(cfg(feature = "crypto")))]
pub fn compress_with_password(input: &[u8], output: &mut Vec<u8>, method: u8, password: &Password) -> Result<()> {
    let limits = ResourceLimits::default();
    let block = build_single_segment_block(input, method, &limits)?;
    let sealed = crypto::seal(&block.write(), password, &limits)?;
    output.extend(sealed);
    Ok(())
}

/// Decrypts a container produced by [`compress_with_password`] under
/// `password`, then decompresses it exactly as [`decompress`] does.
#[cfg(feature = "crypto")]
#[cfg_attr(docsrs, doc(cfg(feature = "crypto")))]
pub fn decompress_with_password(input: &[u8], output: &mut Vec<u8>, password: &Password) -> Result<()> {
    let limits = ResourceLimits::default();
    let cache = crypto::KeyCache::new(1);
    let (derived, consumed) = crypto::unlock(input, password, &limits, &cache)?;
    let mut container = input[consumed..].to_vec();
    crypto::cipher::apply_keystream(&derived.encryption_key, &derived.iv_high(), 0, &mut container);
    decompress_with_limits(&container, output, &limits)
}
