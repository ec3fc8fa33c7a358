//! Magic-anchored resynchronization.
//!
//! On a malformed trailer or any other mid-block parse failure, a
//! reader falls back to scanning forward for the next occurrence of
//! [`BLOCK_MAGIC`] rather than giving up, per spec.md §4.7/§7 — this
//! crate's Open Question resolution treats *any* malformed trailer as
//! a resync trigger on read (see `SPEC_FULL.md` §9.2). Previously
//! decoded blocks remain valid; only the damaged block's bytes between
//! the last good block-end and the next magic are lost.

use crate::format::block::Block;
use crate::format::BLOCK_MAGIC;

/// Reads every block out of `bytes`, resynchronizing past any block
/// that fails to parse. Returns the successfully parsed blocks plus
/// how many bytes were skipped while resyncing (useful for
/// [`crate::stats::ReadStats`]).
pub fn read_all(bytes: &[u8]) -> (Vec<Block>, u64) {
    let mut blocks = Vec::new();
    let mut skipped = 0u64;
    let mut pos = match find_magic(bytes, 0) {
        Some(p) => p,
        None => return (blocks, bytes.len() as u64),
    };
    skipped += pos as u64;

    while pos < bytes.len() {
        match Block::parse(bytes, pos) {
            Ok((block, next)) => {
                blocks.push(block);
                pos = next;
            }
            Err(_) => match find_magic(bytes, pos + 1) {
                Some(next_magic) => {
                    skipped += (next_magic - pos) as u64;
                    pos = next_magic;
                }
                None => {
                    skipped += (bytes.len() - pos) as u64;
                    break;
                }
            },
        }
    }

    (blocks, skipped)
}

/// Finds the next occurrence of [`BLOCK_MAGIC`] at or after `from`.
pub fn find_magic(bytes: &[u8], from: usize) -> Option<usize> {
    if from > bytes.len() {
        return None;
    }
    memchr::memmem::find(&bytes[from..], &BLOCK_MAGIC).map(|rel| rel + from)
}
