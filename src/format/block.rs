//! Block framing: magic, embedded `hcomp` bytecode length, segments.

use crate::error::{Error, Result};
use crate::format::{segment::Segment, BLOCK_MAGIC};

/// One self-contained, independently decodable block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Serialized `hcomp` program (see [`crate::zpaql::program::Program::write`]).
    pub hcomp_bytes: Vec<u8>,
    /// Optional `pcomp` program, present iff this block's coder uses one.
    pub pcomp_bytes: Option<Vec<u8>>,
    /// The method byte this block's segments were coded with.
    pub method: u8,
    /// One or more segments, in order; the last carries `is_last = true`.
    pub segments: Vec<Segment>,
}

impl Block {
    /// Parses one block starting at `bytes[offset]` (which must be the
    /// start of [`BLOCK_MAGIC`]), returning the block and the offset
    /// just past its final segment.
    pub fn parse(bytes: &[u8], offset: usize) -> Result<(Self, usize)> {
        let magic_end = offset + BLOCK_MAGIC.len();
        let magic = bytes
            .get(offset..magic_end)
            .ok_or_else(|| Error::Truncated {
                expected: BLOCK_MAGIC.len(),
                offset: offset as u64,
            })?;
        if magic != BLOCK_MAGIC {
            return Err(Error::BadMagic {
                offset: offset as u64,
            });
        }

        let mut pos = magic_end;
        let method = *bytes
            .get(pos)
            .ok_or_else(|| Error::Truncated { expected: 1, offset: pos as u64 })?;
        pos += 1;

        let hcomp_len = read_u32(bytes, &mut pos)?;
        let hcomp_bytes = take(bytes, &mut pos, hcomp_len)?;

        let has_pcomp = *bytes
            .get(pos)
            .ok_or_else(|| Error::Truncated { expected: 1, offset: pos as u64 })?;
        pos += 1;
        let pcomp_bytes = if has_pcomp == 1 {
            let len = read_u32(bytes, &mut pos)?;
            Some(take(bytes, &mut pos, len)?)
        } else {
            None
        };

        let mut segments = Vec::new();
        loop {
            let segment = Segment::parse(bytes, &mut pos)?;
            let is_last = segment.is_last;
            segments.push(segment);
            if is_last {
                break;
            }
        }

        Ok((
            Block {
                hcomp_bytes,
                pcomp_bytes,
                method,
                segments,
            },
            pos,
        ))
    }

    /// Serializes this block, including the leading magic.
    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(BLOCK_MAGIC);
        out.push(self.method);
        out.extend((self.hcomp_bytes.len() as u32).to_le_bytes());
        out.extend(&self.hcomp_bytes);
        match &self.pcomp_bytes {
            None => out.push(0),
            Some(bytes) => {
                out.push(1);
                out.extend((bytes.len() as u32).to_le_bytes());
                out.extend(bytes);
            }
        }
        for segment in &self.segments {
            segment.write(&mut out);
        }
        out
    }
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    let slice = bytes
        .get(*pos..*pos + 4)
        .ok_or_else(|| Error::Truncated { expected: 4, offset: *pos as u64 })?;
    *pos += 4;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn take(bytes: &[u8], pos: &mut usize, len: u32) -> Result<Vec<u8>> {
    let len = len as usize;
    let slice = bytes
        .get(*pos..*pos + len)
        .ok_or_else(|| Error::Truncated { expected: len, offset: *pos as u64 })?;
    *pos += len;
    Ok(slice.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_segment(last: bool) -> Segment {
        Segment {
            filename: Some("a.txt".to_string()),
            comment: None,
            reserved: 0,
            payload: vec![9, 9, 9],
            checksum: Some([1u8; 20]),
            is_last: last,
        }
    }

    #[test]
    fn round_trips_a_single_segment_block() {
        let block = Block {
            hcomp_bytes: vec![1, 2, 3],
            pcomp_bytes: None,
            method: 2,
            segments: vec![sample_segment(true)],
        };
        let bytes = block.write();
        let (parsed, consumed) = Block::parse(&bytes, 0).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, block);
    }

    #[test]
    fn round_trips_with_pcomp_and_multiple_segments() {
        let block = Block {
            hcomp_bytes: vec![4, 5],
            pcomp_bytes: Some(vec![6, 7, 8]),
            method: 4,
            segments: vec![sample_segment(false), sample_segment(true)],
        };
        let bytes = block.write();
        let (parsed, consumed) = Block::parse(&bytes, 0).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, block);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut bytes = BLOCK_MAGIC.to_vec();
        bytes[0] ^= 0xFF;
        bytes.push(0);
        let err = Block::parse(&bytes, 0).unwrap_err();
        assert!(matches!(err, Error::BadMagic { .. }));
    }

    #[test]
    fn parse_at_nonzero_offset_reports_offset_on_truncation() {
        let err = Block::parse(&[0u8; 5], 3).unwrap_err();
        assert!(matches!(err, Error::Truncated { offset: 3, .. }));
    }
}
