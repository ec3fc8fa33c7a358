//! Transaction segment kinds and commit replay.
//!
//! Per spec.md §4.8 the journaling archive is a sequence of four
//! segment kinds, distinguished here by a one-letter filename prefix
//! followed by a zero-padded decimal id (the exact string form has no
//! reference to match — `original_source/` retrieved 0 files for this
//! format — so it is a local, internally consistent convention):
//!
//! - `c<version>`  transaction header: version id, creation timestamp,
//!   and the archive offset expected just past this transaction's last
//!   segment.
//! - `d<first_fragment_id>`  data: concatenated fragment bytes (opaque
//!   to this module; only [`crate::journal::fragment`] and the codec
//!   layer touch the bytes themselves).
//! - `h<first_fragment_id>`  fragment index: `(SHA-1, length)` records
//!   for the fragments carried by the preceding `d` segment.
//! - `i<version>`  file index: per-path metadata records, with a
//!   tombstone flag marking deletions.
//!
//! A transaction is committed iff a header's declared `expected_end`
//! is reached exactly by the running archive offset after folding all
//! of its `d`/`h`/`i` segments. Falling short — truncated mid-write —
//! means the transaction (and anything physically written after it) is
//! ignored on read, which is what makes append-only writes crash-safe.

use crate::archive_path::ArchivePath;
use crate::error::{Error, Result};
use crate::journal::fragment::{FragmentId, FragmentTable};
use crate::journal::version::{FileMetadata, Version, VersionId, VersionOp};
use crate::timestamp::Timestamp;

/// Which of the four journaling roles a segment's filename encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// `c<version>`
    TransactionHeader,
    /// `d<first_fragment_id>`
    Data,
    /// `h<first_fragment_id>`
    FragmentIndex,
    /// `i<version>`
    FileIndex,
}

impl SegmentKind {
    fn prefix(self) -> char {
        match self {
            SegmentKind::TransactionHeader => 'c',
            SegmentKind::Data => 'd',
            SegmentKind::FragmentIndex => 'h',
            SegmentKind::FileIndex => 'i',
        }
    }
}

/// Builds the reserved filename for a journaling segment.
pub fn segment_filename(kind: SegmentKind, id: u64) -> String {
    format!("{}{id:016}", kind.prefix())
}

/// Parses a reserved journaling filename back into its kind and id.
/// Returns `None` for any filename that doesn't match one of the four
/// reserved patterns (ordinary, non-journaling archives never see
/// this — it is only consulted by [`replay`]).
pub fn parse_segment_filename(name: &str) -> Option<(SegmentKind, u64)> {
    let (prefix, rest) = name.split_at_checked(1)?;
    let kind = match prefix {
        "c" => SegmentKind::TransactionHeader,
        "d" => SegmentKind::Data,
        "h" => SegmentKind::FragmentIndex,
        "i" => SegmentKind::FileIndex,
        _ => return None,
    };
    let id = rest.parse().ok()?;
    Some((kind, id))
}

/// Decoded payload of a `c` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHeader {
    /// This transaction's version id.
    pub version: VersionId,
    /// When this transaction was opened.
    pub created: Timestamp,
    /// Archive offset expected immediately after this transaction's
    /// last segment, if committed.
    pub expected_end: u64,
    /// Optional writer-supplied comment.
    pub comment: Option<String>,
}

impl TransactionHeader {
    /// Serializes this header to a segment payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(self.version.to_le_bytes());
        out.extend(self.created.as_decimal().to_le_bytes());
        out.extend(self.expected_end.to_le_bytes());
        match &self.comment {
            Some(s) => out.extend(s.as_bytes()),
            None => {}
        }
        out.push(0);
        out
    }

    /// Parses a segment payload produced by [`TransactionHeader::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let version = read_u32(bytes, 0)?;
        let created = Timestamp::from_decimal(read_u64(bytes, 4)?)?;
        let expected_end = read_u64(bytes, 12)?;
        let rest = bytes
            .get(20..)
            .ok_or_else(|| Error::bad_header("truncated transaction header"))?;
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::bad_header("unterminated transaction comment"))?;
        let comment = if end == 0 {
            None
        } else {
            Some(
                std::str::from_utf8(&rest[..end])
                    .map_err(|e| Error::bad_header(format!("non-UTF-8 comment: {e}")))?
                    .to_string(),
            )
        };
        Ok(Self {
            version,
            created,
            expected_end,
            comment,
        })
    }
}

/// One `(SHA-1, length)` record from an `h` segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentIndexRecord {
    /// Content hash of the fragment.
    pub sha1: [u8; 20],
    /// Length of the fragment's bytes.
    pub size: u64,
}

const FRAGMENT_RECORD_LEN: usize = 28; // 20-byte SHA-1 + 8-byte length

/// Serializes fragment index records for an `h` segment payload.
pub fn encode_fragment_index(records: &[FragmentIndexRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * FRAGMENT_RECORD_LEN);
    for record in records {
        out.extend(record.sha1);
        out.extend(record.size.to_le_bytes());
    }
    out
}

/// Parses an `h` segment payload into fragment index records.
pub fn decode_fragment_index(bytes: &[u8]) -> Result<Vec<FragmentIndexRecord>> {
    if bytes.len() % FRAGMENT_RECORD_LEN != 0 {
        return Err(Error::bad_header(format!(
            "fragment index payload length {} is not a multiple of {FRAGMENT_RECORD_LEN}",
            bytes.len()
        )));
    }
    let mut out = Vec::with_capacity(bytes.len() / FRAGMENT_RECORD_LEN);
    for chunk in bytes.chunks_exact(FRAGMENT_RECORD_LEN) {
        let mut sha1 = [0u8; 20];
        sha1.copy_from_slice(&chunk[..20]);
        let size = u64::from_le_bytes(chunk[20..28].try_into().unwrap());
        out.push(FragmentIndexRecord { sha1, size });
    }
    Ok(out)
}

/// One path record from an `i` segment, before being folded into a
/// [`VersionOp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIndexRecord {
    /// Archive-relative path.
    pub path: ArchivePath,
    /// Whether this record deletes `path` rather than adding it.
    pub tombstone: bool,
    /// Reconstructed size; `0` for tombstones.
    pub size: u64,
    /// Last-modified time; ignored for tombstones.
    pub mtime: Timestamp,
    /// Opaque attribute bits; ignored for tombstones.
    pub attributes: u32,
    /// Ordered fragment list; empty for tombstones.
    pub fragments: Vec<FragmentId>,
}

/// Serializes file index records for an `i` segment payload.
pub fn encode_file_index(records: &[FileIndexRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        out.extend(record.path.as_str().as_bytes());
        out.push(0);
        out.push(record.tombstone as u8);
        out.extend(record.size.to_le_bytes());
        out.extend(record.mtime.as_decimal().to_le_bytes());
        out.extend(record.attributes.to_le_bytes());
        out.extend((record.fragments.len() as u32).to_le_bytes());
        for fragment_id in &record.fragments {
            out.extend(fragment_id.to_le_bytes());
        }
    }
    out
}

/// Parses an `i` segment payload into file index records.
pub fn decode_file_index(bytes: &[u8]) -> Result<Vec<FileIndexRecord>> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        let end = bytes[pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::bad_header("unterminated file index path"))?;
        let path_str = std::str::from_utf8(&bytes[pos..pos + end])
            .map_err(|e| Error::bad_header(format!("non-UTF-8 path: {e}")))?;
        let path = ArchivePath::new(path_str)?;
        pos += end + 1;

        let tombstone = read_u8(bytes, pos)? != 0;
        pos += 1;
        let size = read_u64(bytes, pos)?;
        pos += 8;
        let mtime = Timestamp::from_decimal(read_u64(bytes, pos)?)?;
        pos += 8;
        let attributes = read_u32(bytes, pos)?;
        pos += 4;
        let fragment_count = read_u32(bytes, pos)? as usize;
        pos += 4;

        let mut fragments = Vec::with_capacity(fragment_count);
        for _ in 0..fragment_count {
            fragments.push(read_u64(bytes, pos)?);
            pos += 8;
        }

        out.push(FileIndexRecord {
            path,
            tombstone,
            size,
            mtime,
            attributes,
            fragments,
        });
    }
    Ok(out)
}

fn read_u8(bytes: &[u8], pos: usize) -> Result<u8> {
    bytes
        .get(pos)
        .copied()
        .ok_or_else(|| Error::bad_header("truncated file index record"))
}

fn read_u32(bytes: &[u8], pos: usize) -> Result<u32> {
    let slice = bytes
        .get(pos..pos + 4)
        .ok_or_else(|| Error::bad_header("truncated record (expected u32)"))?;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_u64(bytes: &[u8], pos: usize) -> Result<u64> {
    let slice = bytes
        .get(pos..pos + 8)
        .ok_or_else(|| Error::bad_header("truncated record (expected u64)"))?;
    Ok(u64::from_le_bytes(slice.try_into().unwrap()))
}

/// One journaling segment as seen by [`replay`]: its reserved
/// filename, its raw payload, and the archive offset immediately
/// following it. Assembled by the container-walking caller
/// ([`crate::read`]), which is the layer that actually knows absolute
/// offsets.
#[derive(Debug, Clone)]
pub struct JournalSegment {
    /// The segment's filename (one of the four reserved patterns).
    pub filename: String,
    /// The segment's payload bytes.
    pub payload: Vec<u8>,
    /// Archive offset immediately after this segment's trailer.
    pub end_offset: u64,
}

/// Result of folding a journaling archive's segments into versions.
#[derive(Debug)]
pub struct ReplayResult {
    /// Every committed version, in ascending `id` order.
    pub versions: Vec<Version>,
    /// The fragment table built from every committed transaction's
    /// `h` segments.
    pub fragments: FragmentTable,
    /// Raw content bytes for every interned fragment, sliced out of
    /// the transaction's `d` segment(s) according to its `h` segment's
    /// `(sha1, size)` records, in order. A transaction's `d` payloads
    /// are concatenated before slicing, so a transaction may split one
    /// logical run of fragments across several `d` segments as long as
    /// their bytes are contiguous in emission order.
    pub fragment_bytes: std::collections::HashMap<FragmentId, Vec<u8>>,
    /// Bytes belonging to an unterminated trailing transaction (or any
    /// stray segment preceding the first header), ignored on read.
    pub incomplete_tail_bytes: u64,
}

/// Replays a journaling archive's segments into committed versions and
/// a fragment table, stopping at (and discarding) the first
/// unterminated transaction.
pub fn replay(segments: &[JournalSegment]) -> Result<ReplayResult> {
    let mut fragments = FragmentTable::default();
    let mut fragment_bytes = std::collections::HashMap::new();
    let mut versions = Vec::new();
    let mut incomplete_tail_bytes = 0u64;
    let mut i = 0;

    while i < segments.len() {
        let (kind, _) = parse_segment_filename(&segments[i].filename).ok_or_else(|| {
            Error::bad_header(format!(
                "unrecognized journal segment filename {:?}",
                segments[i].filename
            ))
        })?;
        if kind != SegmentKind::TransactionHeader {
            // A stray d/h/i segment with no governing header can only
            // be leftover from a transaction whose header itself never
            // landed; treat it as incomplete tail and stop.
            incomplete_tail_bytes += segments[i..]
                .iter()
                .map(|s| s.payload.len() as u64)
                .sum::<u64>();
            break;
        }

        let header = TransactionHeader::decode(&segments[i].payload)?;
        let mut ops = Vec::new();
        let mut pending_data: Vec<u8> = Vec::new();
        let mut j = i + 1;
        let mut committed = false;

        while j < segments.len() {
            match parse_segment_filename(&segments[j].filename) {
                Some((SegmentKind::TransactionHeader, _)) => break,
                Some((SegmentKind::FragmentIndex, _)) => {
                    let mut cursor = 0usize;
                    for record in decode_fragment_index(&segments[j].payload)? {
                        let (id, _) = fragments.intern(record.sha1, record.size);
                        let end = cursor + record.size as usize;
                        if let Some(slice) = pending_data.get(cursor..end) {
                            fragment_bytes.entry(id).or_insert_with(|| slice.to_vec());
                        }
                        cursor = end;
                    }
                    pending_data.clear();
                }
                Some((SegmentKind::FileIndex, _)) => {
                    for record in decode_file_index(&segments[j].payload)? {
                        ops.push(if record.tombstone {
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
                        });
                    }
                }
                Some((SegmentKind::Data, _)) => {
                    pending_data.extend_from_slice(&segments[j].payload);
                }
                None => {
                    return Err(Error::bad_header(format!(
                        "unrecognized journal segment filename {:?}",
                        segments[j].filename
                    )));
                }
            }

            let reached = segments[j].end_offset;
            j += 1;
            if reached == header.expected_end {
                committed = true;
                break;
            }
        }

        if !committed {
            incomplete_tail_bytes += segments[i..]
                .iter()
                .map(|s| s.payload.len() as u64)
                .sum::<u64>();
            break;
        }

        versions.push(Version {
            id: header.version,
            created: header.created,
            comment: header.comment,
            ops,
        });
        i = j;
    }

    Ok(ReplayResult {
        versions,
        fragments,
        fragment_bytes,
        incomplete_tail_bytes,
    })
}
