//! Building and appending transactions to a journaling archive.
//!
//! [`intern_pending_files`] chunks and deduplicates a batch of files
//! against a [`FragmentTable`], [`build_transaction_block`] turns the
//! result into one self-contained container [`Block`], and [`Writer`]
//! ties the two together into an append-only file-backed archive.
//! [`crate::read::Archive::add`]/[`crate::read::Archive::remove`] build
//! on these same free functions so an already-open, in-memory archive
//! and a dedicated [`Writer`] commit transactions identically.
//!
//! The decoded-length comment convention documented in
//! [`crate::read`]'s module doc is written here: every segment's
//! `comment` carries its plaintext length as a decimal ASCII string,
//! and its `checksum` carries the plaintext's SHA-1.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::archive_path::ArchivePath;
use crate::checksum::{Checksum, Sha1};
use crate::codec::{self, presets};
use crate::error::Result;
use crate::format::block::Block;
use crate::format::segment::Segment;
use crate::journal::chunking::{self, ChunkConfig};
use crate::journal::fragment::{FragmentId, FragmentTable};
use crate::journal::transaction::{
    self, encode_file_index, encode_fragment_index, segment_filename, FileIndexRecord,
    FragmentIndexRecord, SegmentKind, TransactionHeader,
};
use crate::journal::version::{FileMetadata, Version, VersionId, VersionOp};
use crate::safety::ResourceLimits;
use crate::timestamp::Timestamp;

/// The compression method newly created archives use unless told
/// otherwise. Method 1 is the cheapest context-modeled preset (see
/// [`presets::build`]) rather than plain storage, so a default
/// [`Writer`] gets real compression without the caller picking a
/// method by hand.
pub const DEFAULT_METHOD: u8 = 1;

/// One file queued for [`Writer::add`]/[`crate::read::Archive::add`].
#[derive(Debug, Clone)]
pub struct PendingFile {
    /// Archive-relative destination path.
    pub path: ArchivePath,
    /// Full file content.
    pub data: Vec<u8>,
    /// Last-modified time to record.
    pub mtime: Timestamp,
    /// Opaque platform attribute bits to record.
    pub attributes: u32,
}

/// Chunks and interns every file's content against `fragments`,
/// returning one [`FileIndexRecord`] per file (referencing every
/// chunk, fresh or deduplicated) and the bytes of only the chunks that
/// were not already known to `fragments`.
pub(crate) fn intern_pending_files(
    fragments: &mut FragmentTable,
    limits: &ResourceLimits,
    files: &[PendingFile],
) -> Result<(Vec<FileIndexRecord>, Vec<(FragmentId, Vec<u8>)>)> {
    let config = ChunkConfig::default();
    let mut file_records = Vec::with_capacity(files.len());
    let mut fresh = Vec::new();

    for file in files {
        let pieces = chunking::chunks(&file.data, &config);
        let mut fragment_ids = Vec::with_capacity(pieces.len());
        for piece in pieces {
            limits.check_fragment_bytes(piece.len() as u64)?;
            let sha1 = Sha1::compute(piece);
            let (id, is_fresh) = fragments.intern(sha1, piece.len() as u64);
            if is_fresh {
                fresh.push((id, piece.to_vec()));
            }
            fragment_ids.push(id);
        }
        file_records.push(FileIndexRecord {
            path: file.path.clone(),
            tombstone: false,
            size: file.data.len() as u64,
            mtime: file.mtime,
            attributes: file.attributes,
            fragments: fragment_ids,
        });
    }

    Ok((file_records, fresh))
}

fn encode_plain_segment(filename: String, plaintext: Vec<u8>, method: u8, limits: &ResourceLimits) -> Result<Segment> {
    let checksum = Sha1::compute(&plaintext);
    let length_comment = plaintext.len().to_string();
    let encoded = codec::encode_segment(&plaintext, method, limits)?;
    Ok(Segment {
        filename: Some(filename),
        comment: Some(length_comment),
        reserved: 0,
        payload: encoded.coded,
        checksum: Some(checksum),
        is_last: false,
    })
}

/// Builds one self-contained transaction [`Block`] out of an already
/// `intern`ed set of file records and the caller's fresh fragment
/// bytes, plus the [`Version`] it represents.
///
/// `segment_count` is the running per-archive segment count *before*
/// this transaction (see [`crate::read::collect_journal_segments`]'s
/// doc comment for why this is a sequence count, not a byte offset);
/// the returned `u64` is how many segments this transaction adds to
/// that count, for the caller to carry forward into the next call.
pub(crate) fn build_transaction_block(
    method: u8,
    limits: &ResourceLimits,
    version: VersionId,
    timestamp: Timestamp,
    comment: Option<String>,
    file_records: Vec<FileIndexRecord>,
    fresh: &[(FragmentId, Vec<u8>)],
    segment_count: u64,
) -> Result<(Vec<u8>, u64, Version)> {
    let data_present = !fresh.is_empty();
    let segments_in_tx = 1 + if data_present { 2 } else { 0 } + 1;
    let expected_end = segment_count + segments_in_tx;

    let mut body = Vec::new();
    if data_present {
        let mut concatenated = Vec::new();
        let mut records = Vec::with_capacity(fresh.len());
        for (_, bytes) in fresh {
            records.push(FragmentIndexRecord {
                sha1: Sha1::compute(bytes),
                size: bytes.len() as u64,
            });
            concatenated.extend_from_slice(bytes);
        }
        let first_id = fresh[0].0;
        body.push(encode_plain_segment(
            segment_filename(SegmentKind::Data, first_id),
            concatenated,
            method,
            limits,
        )?);
        body.push(encode_plain_segment(
            segment_filename(SegmentKind::FragmentIndex, first_id),
            encode_fragment_index(&records),
            method,
            limits,
        )?);
    }
    body.push(encode_plain_segment(
        segment_filename(SegmentKind::FileIndex, version as u64),
        encode_file_index(&file_records),
        method,
        limits,
    )?);

    let header = TransactionHeader {
        version,
        created: timestamp,
        expected_end,
        comment: comment.clone(),
    };
    let mut segments = vec![encode_plain_segment(
        segment_filename(SegmentKind::TransactionHeader, version as u64),
        header.encode(),
        method,
        limits,
    )?];
    segments.extend(body);
    segments.last_mut().expect("file index segment always present").is_last = true;

    let program = presets::build(method)?;
    let block = Block {
        hcomp_bytes: program.write(),
        pcomp_bytes: None,
        method,
        segments,
    };

    let ops = file_records
        .into_iter()
        .map(|record| {
            if record.tombstone {
                VersionOp::Delete { path: record.path }
            } else {
                VersionOp::Add {
                    path: record.path,
                    metadata: FileMetadata {
                        size: record.size,
                        mtime: record.mtime,
                        attributes: record.attributes,
                        fragments: record.fragments,
                    },
                }
            }
        })
        .collect();

    let version_record = Version {
        id: version,
        created: timestamp,
        comment,
        ops,
    };

    Ok((block.write(), segments_in_tx, version_record))
}

/// An append-only handle to a journaling archive on disk.
///
/// Unlike [`crate::read::Archive`], a `Writer` does not keep fragment
/// content in memory beyond what it needs to deduplicate the next
/// batch of files — it only tracks the [`FragmentTable`] and the
/// bookkeeping needed to frame the next transaction. Use
/// [`crate::read::Archive`] when both read and write access to the
/// same handle are wanted.
pub struct Writer {
    path: PathBuf,
    segment_count: u64,
    next_version: VersionId,
    fragments: FragmentTable,
    method: u8,
    limits: ResourceLimits,
}

impl Writer {
    /// Creates a new, empty archive at `path`, truncating any existing
    /// file there.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        std::fs::write(path.as_ref(), [])?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            segment_count: 0,
            next_version: 0,
            fragments: FragmentTable::default(),
            method: DEFAULT_METHOD,
            limits: ResourceLimits::default(),
        })
    }

    /// Opens an existing archive at `path` for further appends,
    /// replaying its transaction log to rebuild the fragment table and
    /// resume the version/segment sequence where it left off.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let limits = ResourceLimits::default();
        let (journal_segments, _skipped, segment_count) =
            crate::read::collect_journal_segments(&bytes, &limits)?;
        let replay = transaction::replay(&journal_segments)?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            segment_count,
            next_version: replay.versions.last().map(|v| v.id + 1).unwrap_or(0),
            fragments: replay.fragments,
            method: DEFAULT_METHOD,
            limits,
        })
    }

    /// Commits a new version adding or updating `files`.
    pub fn add(&mut self, files: Vec<PendingFile>, timestamp: Timestamp) -> Result<VersionId> {
        let (file_records, fresh) = intern_pending_files(&mut self.fragments, &self.limits, &files)?;
        self.commit(file_records, &fresh, timestamp, None)
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
        self.commit(file_records, &[], timestamp, None)
    }

    fn commit(
        &mut self,
        file_records: Vec<FileIndexRecord>,
        fresh: &[(FragmentId, Vec<u8>)],
        timestamp: Timestamp,
        comment: Option<String>,
    ) -> Result<VersionId> {
        let version = self.next_version;
        let (block_bytes, segments_in_tx, _version_record) = build_transaction_block(
            self.method,
            &self.limits,
            version,
            timestamp,
            comment,
            file_records,
            fresh,
            self.segment_count,
        )?;

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&block_bytes)?;
        file.flush()?;

        self.segment_count += segments_in_tx;
        self.next_version += 1;
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::Archive;

    fn file(path: &str, data: &[u8]) -> PendingFile {
        PendingFile {
            path: ArchivePath::new(path).unwrap(),
            data: data.to_vec(),
            mtime: Timestamp::default(),
            attributes: 0,
        }
    }

    #[test]
    fn writer_round_trips_through_archive_open() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("test.zpaq");

        let mut writer = Writer::create(&archive_path).unwrap();
        writer.add(vec![file("a.txt", b"hello, world")], Timestamp::default()).unwrap();

        let archive = Archive::open_path(&archive_path).unwrap();
        assert_eq!(archive.len(), 1);
        let entries = archive.list(None).unwrap();
        assert_eq!(entries[0].path.as_str(), "a.txt");
        assert_eq!(entries[0].size, 12);
    }

    #[test]
    fn deduplicates_identical_content_across_files_in_one_transaction() {
        let mut fragments = FragmentTable::default();
        let limits = ResourceLimits::default();
        let block = vec![0x41u8; 1024 * 1024];
        let files = vec![file("a.txt", &block), file("b.txt", &block)];

        let (records, fresh) = intern_pending_files(&mut fragments, &limits, &files).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fragments, records[1].fragments);
        // Identical 1 MiB of a single repeated byte cuts to the same
        // chunk boundaries each time, so only the first file's chunks
        // are fresh.
        assert!(!fresh.is_empty());
    }

    #[test]
    fn rewriting_a_file_with_identical_bytes_writes_no_fresh_fragments() {
        let mut fragments = FragmentTable::default();
        let limits = ResourceLimits::default();
        let data = vec![0u8; 10 * 1024];

        let (_, fresh_first) = intern_pending_files(&mut fragments, &limits, &[file("x", &data)]).unwrap();
        assert!(!fresh_first.is_empty());

        let (_, fresh_second) = intern_pending_files(&mut fragments, &limits, &[file("x", &data)]).unwrap();
        assert!(fresh_second.is_empty());
    }

    #[test]
    fn remove_records_a_tombstone_with_no_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("test.zpaq");

        let mut writer = Writer::create(&archive_path).unwrap();
        writer.add(vec![file("a.txt", b"hi")], Timestamp::default()).unwrap();
        writer.remove(vec![ArchivePath::new("a.txt").unwrap()], Timestamp::default()).unwrap();

        let archive = Archive::open_path(&archive_path).unwrap();
        assert!(archive.is_empty());
        assert_eq!(archive.versions().len(), 2);
    }
}
