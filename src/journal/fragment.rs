//! Append-only fragment table.
//!
//! Every distinct content-defined chunk (see [`crate::journal::chunking`])
//! is stored exactly once, keyed by its SHA-1. A version's file index
//! references fragments by [`FragmentId`] rather than embedding bytes
//! directly, which is what makes cross-file and cross-version
//! deduplication free: re-adding an unchanged file produces the same
//! chunk boundaries and the same SHA-1s, so every fragment is found
//! already present and nothing new is written.
//!
//! The table never removes or rewrites an entry — an archive extension
//! only ever appends new fragment records, matching the container's
//! own append-only block sequence (spec.md §3/§4.8). A `HashMap` gives
//! exact lookups across however many extensions have accumulated; an
//! [`S3FifoCache`] sits in front of it as a small working-set cache so a
//! write session that touches the same handful of fragments repeatedly
//! (common in incremental backups of mostly-unchanged trees) doesn't
//! pay a full hash-map probe every time.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use crate::s3fifo::S3FifoCache;

/// Identifies one fragment's position in the table. Fragment IDs are
/// assigned sequentially starting at 0 and never reused.
pub type FragmentId = u64;

/// Default capacity of the in-memory hot-set cache.
pub const DEFAULT_HOT_CAPACITY: usize = 4096;

/// One entry in the fragment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentRecord {
    /// This fragment's id (its index in insertion order).
    pub id: FragmentId,
    /// SHA-1 of the fragment's bytes.
    pub sha1: [u8; 20],
    /// Length of the fragment's bytes.
    pub size: u64,
}

/// The archive-wide table of known fragments.
///
/// Holds only metadata (id, hash, size) — the fragment bytes themselves
/// live in coded segments written by [`crate::codec`]; callers that need
/// the bytes back look them up by the position recorded alongside a
/// version's file index (see [`crate::journal::version`]).
#[derive(Debug)]
pub struct FragmentTable {
    records: Vec<FragmentRecord>,
    by_hash: HashMap<[u8; 20], FragmentId>,
    hot: S3FifoCache<[u8; 20], FragmentId>,
}

impl FragmentTable {
    /// Creates an empty table with the given hot-set capacity.
    pub fn new(hot_capacity: NonZeroUsize) -> Self {
        Self {
            records: Vec::new(),
            by_hash: HashMap::new(),
            hot: S3FifoCache::new(hot_capacity),
        }
    }

    /// Number of fragments recorded so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no fragment has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a fragment by content hash without inserting one.
    pub fn lookup(&mut self, sha1: &[u8; 20]) -> Option<FragmentId> {
        if let Some(&id) = self.hot.get(sha1) {
            return Some(id);
        }
        let id = *self.by_hash.get(sha1)?;
        self.hot.insert(*sha1, id);
        Some(id)
    }

    /// Returns the record for a given id, if it exists.
    pub fn record(&self, id: FragmentId) -> Option<&FragmentRecord> {
        self.records.get(id as usize)
    }

    /// Interns a fragment: if `sha1` is already known, returns its
    /// existing id and `false` (no bytes need to be written); otherwise
    /// appends a new record and returns its fresh id and `true`.
    ///
    /// Callers are expected to only physically write the fragment's
    /// bytes when the second element is `true`.
    pub fn intern(&mut self, sha1: [u8; 20], size: u64) -> (FragmentId, bool) {
        if let Some(id) = self.lookup(&sha1) {
            return (id, false);
        }
        let id = self.records.len() as FragmentId;
        self.records.push(FragmentRecord { id, sha1, size });
        self.by_hash.insert(sha1, id);
        self.hot.insert(sha1, id);
        (id, true)
    }

    /// Iterates every recorded fragment in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FragmentRecord> {
        self.records.iter()
    }
}

impl Default for FragmentTable {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_HOT_CAPACITY).expect("nonzero constant"))
    }
}
