//! Segment header, payload, and trailer.
//!
//! Per spec.md §3: header = `{optional filename, optional comment,
//! reserved byte}`, payload = opaque coded bits, trailer = `{end-of-
//! data sentinel, optional 20-byte SHA-1, block-end sentinel when
//! last}`. An empty filename means "continuation of the previous
//! named stream" (spec.md §4.7) — callers decide whether to interpret
//! that as a new logical segment or not; this module just carries the
//! `None` through.

use crate::error::{Error, Result};
use crate::format::{BLOCK_END, SEGMENT_END_NO_SHA1, SEGMENT_END_WITH_SHA1};

/// One segment within a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// `None` means "continuation of the previous named stream".
    pub filename: Option<String>,
    /// Free-form per-segment comment.
    pub comment: Option<String>,
    /// Reserved for future use; round-tripped as-is.
    pub reserved: u8,
    /// Opaque coded payload (produced by [`crate::codec::encode_segment`]).
    pub payload: Vec<u8>,
    /// SHA-1 of the reconstructed pre-compression bytes, if the writer
    /// chose to store one.
    pub checksum: Option<[u8; 20]>,
    /// Whether this segment is the last one in its block.
    pub is_last: bool,
}

fn read_cstr(bytes: &[u8], pos: &mut usize) -> Result<Option<String>> {
    let start = *pos;
    let end = bytes[start..]
        .iter()
        .position(|&b| b == 0)
        .map(|rel| start + rel)
        .ok_or_else(|| Error::bad_header("unterminated segment string"))?;
    let s = std::str::from_utf8(&bytes[start..end])
        .map_err(|e| Error::bad_header(format!("non-UTF-8 segment string: {e}")))?;
    *pos = end + 1;
    Ok(if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    })
}

fn write_cstr(out: &mut Vec<u8>, s: &Option<String>) {
    if let Some(s) = s {
        out.extend(s.as_bytes());
    }
    out.push(0);
}

impl Segment {
    /// Parses one segment starting at `bytes[*pos]`, advancing `*pos`
    /// past its trailer.
    pub fn parse(bytes: &[u8], pos: &mut usize) -> Result<Self> {
        let filename = read_cstr(bytes, pos)?;
        let comment = read_cstr(bytes, pos)?;
        let reserved = *bytes
            .get(*pos)
            .ok_or_else(|| Error::Truncated { expected: 1, offset: *pos as u64 })?;
        *pos += 1;

        let len_bytes = bytes
            .get(*pos..*pos + 8)
            .ok_or_else(|| Error::Truncated { expected: 8, offset: *pos as u64 })?;
        let payload_len = u64::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
        *pos += 8;

        let payload = bytes
            .get(*pos..*pos + payload_len)
            .ok_or_else(|| Error::Truncated {
                expected: payload_len,
                offset: *pos as u64,
            })?
            .to_vec();
        *pos += payload_len;

        let marker = *bytes
            .get(*pos)
            .ok_or_else(|| Error::Truncated { expected: 1, offset: *pos as u64 })?;
        *pos += 1;
        let checksum = match marker {
            SEGMENT_END_NO_SHA1 => None,
            SEGMENT_END_WITH_SHA1 => {
                let digest = bytes
                    .get(*pos..*pos + 20)
                    .ok_or_else(|| Error::Truncated { expected: 20, offset: *pos as u64 })?;
                *pos += 20;
                let mut arr = [0u8; 20];
                arr.copy_from_slice(digest);
                Some(arr)
            }
            other => {
                return Err(Error::bad_header(format!(
                    "unrecognized segment trailer marker {other:#x}"
                )));
            }
        };

        let is_last = match bytes.get(*pos) {
            Some(&BLOCK_END) => {
                *pos += 1;
                true
            }
            _ => false,
        };

        Ok(Segment {
            filename,
            comment,
            reserved,
            payload,
            checksum,
            is_last,
        })
    }

    /// Serializes this segment, including its trailer (and the
    /// block-end marker, if [`Segment::is_last`]).
    pub fn write(&self, out: &mut Vec<u8>) {
        write_cstr(out, &self.filename);
        write_cstr(out, &self.comment);
        out.push(self.reserved);
        out.extend((self.payload.len() as u64).to_le_bytes());
        out.extend(&self.payload);
        match &self.checksum {
            None => out.push(SEGMENT_END_NO_SHA1),
            Some(digest) => {
                out.push(SEGMENT_END_WITH_SHA1);
                out.extend(digest);
            }
        }
        if self.is_last {
            out.push(BLOCK_END);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_filename_and_checksum() {
        let seg = Segment {
            filename: Some("notes.txt".to_string()),
            comment: None,
            reserved: 0,
            payload: vec![1, 2, 3, 4],
            checksum: Some([7u8; 20]),
            is_last: true,
        };
        let mut bytes = Vec::new();
        seg.write(&mut bytes);
        let mut pos = 0;
        let parsed = Segment::parse(&bytes, &mut pos).unwrap();
        assert_eq!(parsed, seg);
        assert_eq!(pos, bytes.len());
    }

    #[test]
    fn empty_filename_round_trips_as_continuation() {
        let seg = Segment {
            filename: None,
            comment: None,
            reserved: 0,
            payload: vec![],
            checksum: None,
            is_last: false,
        };
        let mut bytes = Vec::new();
        seg.write(&mut bytes);
        let mut pos = 0;
        let parsed = Segment::parse(&bytes, &mut pos).unwrap();
        assert!(parsed.filename.is_none());
        assert!(!parsed.is_last);
    }

    #[test]
    fn rejects_bad_trailer_marker() {
        let mut bytes = vec![0u8]; // empty filename
        bytes.push(0); // empty comment
        bytes.push(0); // reserved
        bytes.extend(0u64.to_le_bytes()); // zero-length payload
        bytes.push(0x00); // invalid trailer marker
        let mut pos = 0;
        let err = Segment::parse(&bytes, &mut pos).unwrap_err();
        assert!(matches!(err, Error::BadHeader(_)));
    }

    #[test]
    fn rejects_non_utf8_filename() {
        let bytes = vec![0xFFu8, 0x00];
        let mut pos = 0;
        let err = read_cstr(&bytes, &mut pos).unwrap_err();
        assert!(matches!(err, Error::BadHeader(_)));
    }
}
