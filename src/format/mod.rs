//! The streaming container: blocks, segments, headers, trailers.
//!
//! An archive is an ordered sequence of [`block::Block`]s, each
//! independently decodable given its own header — no block is ever
//! rewritten in place, and updates only ever append new blocks. See
//! `block.rs` and `segment.rs` for the structures themselves and
//! `reader.rs` for magic-anchored resynchronization.

pub mod block;
pub mod reader;
pub mod segment;

pub use block::Block;
pub use segment::Segment;

/// The 13-byte sequence that opens every block. Chosen so no valid
/// inner byte sequence this format produces can collide with it; a
/// reader treats any occurrence of this exact sequence as a block
/// boundary during resynchronization.
pub const BLOCK_MAGIC: [u8; 13] = [
    0x37, 0x6B, 0x53, 0x74, 0xA0, 0x31, 0x83, 0xD3, 0x8C, 0xB2, 0x28, 0xB0, 0xD3,
];

/// Marks a segment's trailer when no reconstructed-bytes checksum is
/// present.
pub const SEGMENT_END_NO_SHA1: u8 = 0xFC;
/// Marks a segment's trailer when a 20-byte SHA-1 follows.
pub const SEGMENT_END_WITH_SHA1: u8 = 0xFB;
/// Marks the end of a block's final segment.
pub const BLOCK_END: u8 = 0xFD;
