//! The journaling/deduplication layer (C8).
//!
//! Ties together content-defined chunking ([`chunking`]), the
//! append-only fragment table ([`fragment`]), version records and the
//! logical rollback view ([`version`]), and the `c`/`d`/`h`/`i`
//! transaction segment kinds with commit/crash-safety semantics
//! ([`transaction`]).
//!
//! This module owns the *logical* model only — turning a tree of files
//! into fragments, versions, and a fragment table, and folding a
//! replayed segment stream back into the same. Physically reading or
//! writing archive bytes is [`crate::read`]/[`crate::write`]'s job;
//! those modules drive [`transaction::replay`] and [`compact_plan`]
//! against the bytes they hold.

pub mod chunking;
pub mod fragment;
pub mod transaction;
pub mod version;

pub use fragment::{FragmentId, FragmentTable};
pub use transaction::{JournalSegment, ReplayResult};
pub use version::{FileMetadata, LogicalView, Version, VersionId, VersionOp};

use crate::error::Result;

/// The outcome of planning a compaction: which fragments survive and
/// the single version that replaces the archive's entire history.
///
/// Spec.md §4.8 describes "Compact" as an optional out-of-core
/// operation that rewrites a new archive containing only live
/// fragments and the current file index as a single version — this is
/// the logical half of that (which bytes to keep, and what the new
/// version record looks like); the physical rewrite (reading old
/// fragment bytes, re-encoding, writing fresh blocks) belongs to
/// [`crate::write`].
#[derive(Debug)]
pub struct CompactPlan {
    /// Fragment ids referenced by the current logical view, in
    /// ascending order, deduplicated.
    pub live_fragments: Vec<FragmentId>,
    /// The single version a compacted archive should contain.
    pub version: Version,
}

/// Computes a [`CompactPlan`] from a version history, replaying up to
/// `at` (pass the highest committed version to compact the live tail).
pub fn compact_plan(versions: &[Version], at: VersionId) -> Result<CompactPlan> {
    let view = LogicalView::at(versions, at)?;

    let mut live = std::collections::BTreeSet::new();
    let mut ops = Vec::new();
    for (path, metadata) in view.entries() {
        live.extend(metadata.fragments.iter().copied());
        ops.push(VersionOp::Add {
            path: path.clone(),
            metadata: metadata.clone(),
        });
    }

    let created = versions
        .iter()
        .find(|v| v.id == at)
        .map(|v| v.created)
        .unwrap_or_default();

    Ok(CompactPlan {
        live_fragments: live.into_iter().collect(),
        version: Version {
            id: 0,
            created,
            comment: Some("compacted".to_string()),
            ops,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive_path::ArchivePath;
    use crate::timestamp::Timestamp;

    fn meta(fragments: &[FragmentId]) -> FileMetadata {
        FileMetadata {
            size: 1,
            mtime: Timestamp::default(),
            attributes: 0,
            fragments: fragments.to_vec(),
        }
    }

    #[test]
    fn compact_plan_keeps_only_fragments_still_referenced() {
        let v0 = Version {
            id: 0,
            created: Timestamp::default(),
            comment: None,
            ops: vec![VersionOp::Add {
                path: ArchivePath::new("a.txt").unwrap(),
                metadata: meta(&[0, 1]),
            }],
        };
        let v1 = Version {
            id: 1,
            created: Timestamp::default(),
            comment: None,
            ops: vec![
                VersionOp::Delete {
                    path: ArchivePath::new("a.txt").unwrap(),
                },
                VersionOp::Add {
                    path: ArchivePath::new("b.txt").unwrap(),
                    metadata: meta(&[2]),
                },
            ],
        };
        let versions = vec![v0, v1];

        let plan = compact_plan(&versions, 1).unwrap();
        assert_eq!(plan.live_fragments, vec![2]);
        assert_eq!(plan.version.ops.len(), 1);
    }

    #[test]
    fn compact_plan_at_an_earlier_version_ignores_later_history() {
        let v0 = Version {
            id: 0,
            created: Timestamp::default(),
            comment: None,
            ops: vec![VersionOp::Add {
                path: ArchivePath::new("a.txt").unwrap(),
                metadata: meta(&[0]),
            }],
        };
        let v1 = Version {
            id: 1,
            created: Timestamp::default(),
            comment: None,
            ops: vec![VersionOp::Add {
                path: ArchivePath::new("b.txt").unwrap(),
                metadata: meta(&[1]),
            }],
        };
        let versions = vec![v0, v1];

        let plan = compact_plan(&versions, 0).unwrap();
        assert_eq!(plan.live_fragments, vec![0]);
    }
}
