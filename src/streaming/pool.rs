//! The bounded fragment-compression worker pool.
//!
//! Each version's fragments are independent: compressing fragment `i`
//! never depends on fragment `j`'s output, so they can be encoded in
//! any order and reassembled afterward. [`Pool`] does exactly that —
//! hand it a batch of `(sequence, bytes)` pairs, get back
//! [`CompressedFragment`]s in the same sequence order the caller
//! submitted them in, regardless of which worker finished first.

use crate::codec::{self, EncodedSegment};
use crate::error::{Error, Result};
use crate::safety::{CancellationFlag, ResourceLimits};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One fragment queued for compression, tagged with its position in
/// the writer's intended output order.
#[derive(Debug, Clone)]
pub struct CompressionTask {
    /// Position in the caller's submission order; preserved on output
    /// so results can be written in order even though workers may
    /// finish out of order.
    pub sequence: u64,
    /// The fragment's raw bytes.
    pub data: Vec<u8>,
}

/// The result of compressing one [`CompressionTask`].
#[derive(Debug, Clone)]
pub struct CompressedFragment {
    /// Matches the originating task's `sequence`.
    pub sequence: u64,
    /// The compressed segment.
    pub encoded: EncodedSegment,
}

/// Compresses batches of fragments, optionally across a `rayon` thread
/// pool.
///
/// Without the `parallel` feature, [`Pool::compress`] runs every task
/// inline on the calling thread — same API, no threads, so a caller
/// never has to branch on whether the feature is enabled.
pub struct Pool {
    method: u8,
    limits: ResourceLimits,
    cancellation: CancellationFlag,
}

impl Pool {
    /// Creates a pool that compresses every fragment it's given under
    /// `method`, subject to `limits`.
    pub fn new(method: u8, limits: ResourceLimits) -> Self {
        Self {
            method,
            limits,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Attaches a cancellation flag workers check between fragments.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// Returns this pool's cancellation flag, so a caller holding the
    /// pool can cancel it from another thread.
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Compresses every task, returning results ordered by ascending
    /// `sequence`. Stops (returning [`Error::Cancelled`]) as soon as
    /// cancellation is observed, whether that happens before or during
    /// the batch.
    pub fn compress(&self, tasks: Vec<CompressionTask>) -> Result<Vec<CompressedFragment>> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        #[cfg(feature = "parallel")]
        let mut results: Vec<CompressedFragment> = {
            let outcome: Result<Vec<CompressedFragment>> = tasks
                .par_iter()
                .map(|task| self.compress_one(task))
                .collect();
            outcome?
        };

        #[cfg(not(feature = "parallel"))]
        let mut results: Vec<CompressedFragment> = {
            let mut out = Vec::with_capacity(tasks.len());
            for task in &tasks {
                out.push(self.compress_one(task)?);
            }
            out
        };

        results.sort_by_key(|r| r.sequence);
        Ok(results)
    }

    fn compress_one(&self, task: &CompressionTask) -> Result<CompressedFragment> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.limits.check_fragment_bytes(task.data.len() as u64)?;
        let encoded = codec::encode_segment(&task.data, self.method, &self.limits)?;
        Ok(CompressedFragment {
            sequence: task.sequence,
            encoded,
        })
    }
}
