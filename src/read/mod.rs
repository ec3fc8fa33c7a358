//! Opening, listing, verifying, and extracting a journaling archive.
//!
//! [`Archive::open_bytes`]/[`Archive::open_path`] decrypt (if needed),
//! walk the container with [`crate::format::reader::read_all`], decode
//! every recognized journal segment, and fold the result with
//! [`crate::journal::transaction::replay`]. Everything else —
//! [`Archive::list`], [`Archive::extract`], [`Archive::versions`],
//! [`Archive::verify`] — is a read against the already-replayed,
//! in-memory logical view; none of it touches the container bytes
//! again.
//!
//! # Decoded-length framing
//!
//! [`crate::codec::decode_segment`] needs the plaintext length up
//! front, but a container [`crate::format::segment::Segment`] only
//! carries the *coded* payload. `original_source/` retrieved nothing
//! for this format, so there is no external convention to match: this
//! crate stores the decoded length as a decimal ASCII string in the
//! segment's free-form `comment` field, which the c/d/h/i journaling
//! segments otherwise never use. [`crate::write`] is responsible for
//! writing it; this module is responsible for reading it back.

pub mod entry;
pub mod options;

pub use entry::{Entry, Selector};
pub use options::{ExtractOptions, OverwritePolicy};

use std::collections::HashMap;
use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::archive_path::ArchivePath;
use crate::checksum::{Checksum, Sha1};
use crate::codec;
use crate::error::{Error, Result};
use crate::format::block::Block;
use crate::format::reader;
use crate::format::segment::Segment;
use crate::journal::fragment::{FragmentId, FragmentTable};
use crate::journal::transaction::{self, FileIndexRecord, JournalSegment};
use crate::journal::version::{LogicalView, Version, VersionId};
use crate::safety::ResourceLimits;
use crate::timestamp::Timestamp;
use crate::write::{self, PendingFile};

#[cfg(feature = "crypto")]
use crate::crypto::{self, Password};

/// A decrypted, replayed journaling archive held in memory.
///
/// Fragment content is fully materialized at open time (see module
/// docs) rather than decoded lazily on extraction, since the archive
/// must be walked in full once anyway to fold its transaction log.
///
/// An archive opened via [`Archive::open_path`] or created via
/// [`Archive::create_path`] remembers its backing file, so
/// [`Archive::add`]/[`Archive::remove`] can append the new
/// transaction's bytes there as well as updating the in-memory view;
/// an archive opened from an in-memory buffer only updates in memory.
pub struct Archive {
    versions: Vec<Version>,
    fragments: FragmentTable,
    fragment_bytes: HashMap<FragmentId, Vec<u8>>,
    resync_skipped_bytes: u64,
    incomplete_tail_bytes: u64,
    segment_count: u64,
    path: Option<PathBuf>,
    method: u8,
    limits: ResourceLimits,
}

impl Archive {
    /// Opens an archive already held in memory. Fails with
    /// [`Error::BadKey`] if the bytes are encrypted — use
    /// [`Archive::open_bytes_with_password`] for those.
    pub fn open_bytes(bytes: &[u8]) -> Result<Self> {
        #[cfg(feature = "crypto")]
        if crypto::Preamble::is_encrypted(bytes) {
            return Err(Error::BadKey);
        }
        Self::from_plaintext(bytes, &ResourceLimits::default(), None)
    }

    /// Opens an archive from `bytes`, which may or may not be
    /// encrypted; `password` is only consulted if [`crypto::Preamble`]
    /// detects the encrypted-archive magic.
    #[cfg(feature = "crypto")]
    pub fn open_bytes_with_password(bytes: &[u8], password: Password) -> Result<Self> {
        let limits = ResourceLimits::default();
        if !crypto::Preamble::is_encrypted(bytes) {
            return Self::from_plaintext(bytes, &limits, None);
        }
        let cache = crypto::KeyCache::new(1);
        let (derived, consumed) = crypto::unlock(bytes, &password, &limits, &cache)?;
        let mut container = bytes[consumed..].to_vec();
        crypto::cipher::apply_keystream(&derived.encryption_key, &derived.iv_high(), 0, &mut container);
        Self::from_plaintext(&container, &limits, None)
    }

    /// Reads `path` from disk and opens it via [`Archive::open_bytes`],
    /// remembering `path` so later [`Archive::add`]/[`Archive::remove`]
    /// calls append new transactions there.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        #[cfg(feature = "crypto")]
        if crypto::Preamble::is_encrypted(&bytes) {
            return Err(Error::BadKey);
        }
        Self::from_plaintext(&bytes, &ResourceLimits::default(), Some(path.as_ref().to_path_buf()))
    }

    /// Reads `path` from disk and opens it via
    /// [`Archive::open_bytes_with_password`], remembering `path` the
    /// same way [`Archive::open_path`] does.
    #[cfg(feature = "crypto")]
    pub fn open_path_with_password(path: impl AsRef<Path>, password: Password) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let limits = ResourceLimits::default();
        if !crypto::Preamble::is_encrypted(&bytes) {
            return Self::from_plaintext(&bytes, &limits, Some(path.as_ref().to_path_buf()));
        }
        let cache = crypto::KeyCache::new(1);
        let (derived, consumed) = crypto::unlock(&bytes, &password, &limits, &cache)?;
        let mut container = bytes[consumed..].to_vec();
        crypto::cipher::apply_keystream(&derived.encryption_key, &derived.iv_high(), 0, &mut container);
        Self::from_plaintext(&container, &limits, Some(path.as_ref().to_path_buf()))
    }

    /// Creates a new, empty archive backed by `path`, truncating any
    /// existing file there. Use [`Archive::add`] to commit the first
    /// version.
    pub fn create_path(path: impl AsRef<Path>) -> Result<Self> {
        fs::write(path.as_ref(), [])?;
        Ok(Self {
            versions: Vec::new(),
            fragments: FragmentTable::default(),
            fragment_bytes: HashMap::new(),
            resync_skipped_bytes: 0,
            incomplete_tail_bytes: 0,
            segment_count: 0,
            path: Some(path.as_ref().to_path_buf()),
            method: write::DEFAULT_METHOD,
            limits: ResourceLimits::default(),
        })
    }

    fn from_plaintext(plaintext: &[u8], limits: &ResourceLimits, path: Option<PathBuf>) -> Result<Self> {
        let (journal_segments, resync_skipped_bytes, segment_count) =
            collect_journal_segments(plaintext, limits)?;
        let replay = transaction::replay(&journal_segments)?;

        Ok(Self {
            versions: replay.versions,
            fragments: replay.fragments,
            fragment_bytes: replay.fragment_bytes,
            resync_skipped_bytes,
            incomplete_tail_bytes: replay.incomplete_tail_bytes,
            segment_count,
            path,
            method: write::DEFAULT_METHOD,
            limits: limits.clone(),
        })
    }

    /// Commits a new version adding or updating `files`, deduplicating
    /// their content-defined chunks against every fragment already
    /// known to this archive. If the archive was opened from (or
    /// created at) a path, the new transaction's bytes are appended to
    /// that file as well as folded into the in-memory view.
    pub fn add(&mut self, files: Vec<PendingFile>, timestamp: Timestamp) -> Result<VersionId> {
        let (file_records, fresh) = write::intern_pending_files(&mut self.fragments, &self.limits, &files)?;
        self.commit(file_records, fresh, timestamp, None)
    }

    /// Commits a new version recording `paths` as deleted.
    pub fn remove(&mut self, paths: Vec<ArchivePath>, timestamp: Timestamp) -> Result<VersionId> {
        let file_records = paths
            .into_iter()
            .map(|path| FileIndexRecord {
                path,
                tombstone: true,
                size: 0,
                mtime: timestamp,
                attributes: 0,
                fragments: Vec::new(),
            })
            .collect();
        self.commit(file_records, Vec::new(), timestamp, None)
    }

    fn commit(
        &mut self,
        file_records: Vec<FileIndexRecord>,
        fresh: Vec<(FragmentId, Vec<u8>)>,
        timestamp: Timestamp,
        comment: Option<String>,
    ) -> Result<VersionId> {
        let version = self.versions.last().map(|v| v.id + 1).unwrap_or(0);
        let (block_bytes, segments_in_tx, version_record) = write::build_transaction_block(
            self.method,
            &self.limits,
            version,
            timestamp,
            comment,
            file_records,
            &fresh,
            self.segment_count,
        )?;

        if let Some(path) = &self.path {
            let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(&block_bytes)?;
            file.flush()?;
        }

        for (id, bytes) in fresh {
            self.fragment_bytes.insert(id, bytes);
        }
        self.versions.push(version_record);
        self.segment_count += segments_in_tx;
        Ok(version)
    }

    /// Every committed version, in ascending id order.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// The highest committed version id, or `0` for a fresh archive
    /// with no committed transactions.
    pub fn latest_version(&self) -> VersionId {
        self.versions.last().map(|v| v.id).unwrap_or(0)
    }

    /// Bytes skipped while resynchronizing past damaged block framing.
    pub fn resync_skipped_bytes(&self) -> u64 {
        self.resync_skipped_bytes
    }

    /// Bytes belonging to an unterminated trailing transaction, ignored
    /// on open.
    pub fn incomplete_tail_bytes(&self) -> u64 {
        self.incomplete_tail_bytes
    }

    /// Lists every live path as of `version` (the latest committed
    /// version if `None`), sorted by path.
    pub fn list(&self, version: Option<VersionId>) -> Result<Vec<Entry>> {
        let target = version.unwrap_or_else(|| self.latest_version());
        let view = LogicalView::at(&self.versions, target)?;
        Ok(view
            .entries()
            .map(|(path, metadata)| Entry {
                path: path.clone(),
                size: metadata.size,
                mtime: metadata.mtime,
                attributes: metadata.attributes,
                fragments: metadata.fragments.clone(),
            })
            .collect())
    }

    /// Number of live paths as of the latest committed version.
    pub fn len(&self) -> usize {
        LogicalView::at(&self.versions, self.latest_version())
            .map(|view| view.len())
            .unwrap_or(0)
    }

    /// Whether the archive (at its latest version) has no live paths.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reconstructs `path`'s bytes from its ordered fragment list.
    fn reconstruct(&self, fragments: &[FragmentId], verify_checksums: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for &id in fragments {
            let bytes = self
                .fragment_bytes
                .get(&id)
                .ok_or_else(|| Error::bad_header(format!("no content recorded for fragment {id}")))?;
            if verify_checksums {
                if let Some(record) = self.fragments.record(id) {
                    if Sha1::compute(bytes) != record.sha1 {
                        return Err(Error::ChecksumMismatch { path: None });
                    }
                }
            }
            out.extend_from_slice(bytes);
        }
        Ok(out)
    }

    /// Extracts every entry matched by `selector` as of `version` (the
    /// latest committed version if `None`) into `sink`.
    pub fn extract(
        &self,
        selector: &Selector,
        sink: &mut dyn ExtractSink,
        options: &ExtractOptions,
        version: Option<VersionId>,
    ) -> Result<()> {
        for entry in self.list(version)? {
            if !selector.matches(&entry.path) {
                continue;
            }
            let data = self.reconstruct(&entry.fragments, options.verify_checksums)?;
            sink.write_entry(&entry, &data)?;
        }
        Ok(())
    }

    /// Verifies every interned fragment's recorded SHA-1 and size
    /// against its materialized content.
    pub fn verify(&self) -> Result<()> {
        for record in self.fragments.iter() {
            let bytes = self
                .fragment_bytes
                .get(&record.id)
                .ok_or_else(|| Error::bad_header(format!("no content recorded for fragment {}", record.id)))?;
            if bytes.len() as u64 != record.size || Sha1::compute(bytes) != record.sha1 {
                return Err(Error::ChecksumMismatch { path: None });
            }
        }
        Ok(())
    }
}

/// Walks every block in `plaintext`, decodes each recognized `c`/`d`/
/// `h`/`i` segment's payload, and tags it with a monotonically
/// increasing sequence counter used as [`JournalSegment::end_offset`]
/// (see `journal::transaction`'s doc comment: this is an internally
/// consistent bookkeeping value, not a literal container byte offset).
/// Returns the segments, how many container bytes were skipped while
/// resynchronizing past damaged block framing, and the final sequence
/// count across every segment seen (recognized or not) — the value
/// [`crate::write`] must continue counting from for the next
/// transaction it appends.
pub(crate) fn collect_journal_segments(
    plaintext: &[u8],
    limits: &ResourceLimits,
) -> Result<(Vec<JournalSegment>, u64, u64)> {
    let (blocks, skipped) = reader::read_all(plaintext);
    let mut out = Vec::new();
    let mut sequence = 0u64;

    for block in &blocks {
        for segment in &block.segments {
            sequence += 1;
            let Some(filename) = segment.filename.clone() else {
                continue;
            };
            if transaction::parse_segment_filename(&filename).is_none() {
                continue;
            }
            out.push(decode_journal_segment(block, segment, &filename, sequence, limits)?);
        }
    }

    Ok((out, skipped, sequence))
}

fn decode_journal_segment(
    block: &Block,
    segment: &Segment,
    filename: &str,
    sequence: u64,
    limits: &ResourceLimits,
) -> Result<JournalSegment> {
    let output_len: usize = segment
        .comment
        .as_deref()
        .ok_or_else(|| Error::bad_header(format!("segment {filename:?} is missing its decoded-length comment")))?
        .parse()
        .map_err(|e| Error::bad_header(format!("bad decoded-length comment on {filename:?}: {e}")))?;

    let payload = codec::decode_segment(&block.hcomp_bytes, &segment.payload, output_len, limits)?;

    if let Some(expected) = segment.checksum {
        if Sha1::compute(&payload) != expected {
            return Err(Error::ChecksumMismatch {
                path: Some(filename.to_string()),
            });
        }
    }

    Ok(JournalSegment {
        filename: filename.to_string(),
        payload,
        end_offset: sequence,
    })
}

/// Where [`Archive::extract`] delivers each selected entry's bytes.
///
/// Grounded in the teacher's `read::destination::ExtractDestination`
/// trait, collapsed from a streaming `create_writer`/`on_complete`
/// pair to a single whole-buffer call: every fragment an entry
/// references is already materialized in memory by the time
/// `extract` runs (see the module doc comment), so there is nothing
/// left to stream incrementally.
pub trait ExtractSink {
    /// Delivers one entry's fully reconstructed bytes.
    fn write_entry(&mut self, entry: &Entry, data: &[u8]) -> Result<()>;
}

/// Extracts to files under a root directory, mirroring archive paths.
pub struct FilesystemSink {
    root: PathBuf,
    overwrite: OverwritePolicy,
}

impl FilesystemSink {
    /// Creates a sink rooted at `root`, applying `options.overwrite`
    /// to every entry it writes.
    pub fn new(root: impl Into<PathBuf>, options: &ExtractOptions) -> Self {
        Self {
            root: root.into(),
            overwrite: options.overwrite,
        }
    }
}

impl ExtractSink for FilesystemSink {
    fn write_entry(&mut self, entry: &Entry, data: &[u8]) -> Result<()> {
        let dest = self.root.join(entry.path.as_str());
        if dest.exists() {
            match self.overwrite {
                OverwritePolicy::Error => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} already exists", dest.display()),
                    )));
                }
                OverwritePolicy::Skip => return Ok(()),
                OverwritePolicy::Overwrite => {}
            }
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, data)?;
        Ok(())
    }
}

/// Extracts into an in-memory map, keyed by archive path. Useful for
/// tests and for callers that want the bytes without touching a
/// filesystem.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Every entry written so far.
    pub files: HashMap<crate::archive_path::ArchivePath, Vec<u8>>,
}

impl ExtractSink for MemorySink {
    fn write_entry(&mut self, entry: &Entry, data: &[u8]) -> Result<()> {
        self.files.insert(entry.path.clone(), data.to_vec());
        Ok(())
    }
}
