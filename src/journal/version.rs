//! Version records and the logical rollback view.
//!
//! Every write session appends one [`Version`]: a creation timestamp, a
//! set of path additions/updates and deletions, and per-path metadata
//! naming the ordered list of fragments that reconstruct the file.
//! Versions are never edited or removed once committed — rolling back
//! to an earlier version means folding only the versions up to that
//! point, not rewriting history.

use std::collections::BTreeMap;

use crate::archive_path::ArchivePath;
use crate::error::{Error, Result};
use crate::journal::fragment::FragmentId;
use crate::timestamp::Timestamp;

/// Monotonically increasing version identifier. The first committed
/// version is 0.
pub type VersionId = u32;

/// Per-path metadata recorded at the version that last touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Total reconstructed size in bytes.
    pub size: u64,
    /// Last-modified time as recorded by the writer.
    pub mtime: Timestamp,
    /// Opaque platform attribute bits (permissions, DOS attributes, ...);
    /// carried through without interpretation.
    pub attributes: u32,
    /// Ordered list of fragments whose concatenation reconstructs this
    /// file's bytes.
    pub fragments: Vec<FragmentId>,
}

/// One path-level change recorded within a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionOp {
    /// The path is new or its content/metadata changed.
    Add {
        /// Archive-relative path.
        path: ArchivePath,
        /// The new metadata.
        metadata: FileMetadata,
    },
    /// The path no longer exists as of this version.
    Delete {
        /// Archive-relative path.
        path: ArchivePath,
    },
}

/// One committed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// This version's sequence number.
    pub id: VersionId,
    /// When this version was created.
    pub created: Timestamp,
    /// Free-form comment supplied by the writer, if any.
    pub comment: Option<String>,
    /// Path-level changes, applied in order.
    pub ops: Vec<VersionOp>,
}

/// The reconstructed view of "what files exist, with what content" as
/// of some version — a left-fold over [`VersionOp`]s, exactly mirroring
/// how a writer builds up the same state incrementally.
#[derive(Debug, Clone, Default)]
pub struct LogicalView {
    files: BTreeMap<ArchivePath, FileMetadata>,
}

impl LogicalView {
    /// The view before any version has been applied.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Applies one version's operations on top of the current view.
    pub fn apply(&mut self, version: &Version) {
        for op in &version.ops {
            match op {
                VersionOp::Add { path, metadata } => {
                    self.files.insert(path.clone(), metadata.clone());
                }
                VersionOp::Delete { path } => {
                    self.files.remove(path);
                }
            }
        }
    }

    /// Folds a sequence of versions (assumed already in ascending `id`
    /// order) into the view they collectively produce.
    pub fn fold<'a>(versions: impl IntoIterator<Item = &'a Version>) -> Self {
        let mut view = Self::empty();
        for version in versions {
            view.apply(version);
        }
        view
    }

    /// Reconstructs the view as of `target`, i.e. the rollback view:
    /// every version up to and including `target` is folded, later
    /// versions are ignored entirely.
    ///
    /// `versions` must be sorted ascending by `id` with no gaps
    /// starting at 0, which is how [`crate::journal::transaction`]
    /// replays a committed log. Returns [`Error::BadVersion`] if
    /// `target` exceeds the highest available version.
    pub fn at(versions: &[Version], target: VersionId) -> Result<Self> {
        let committed = versions.last().map(|v| v.id).unwrap_or(0);
        if versions.is_empty() || target > committed {
            return Err(Error::BadVersion {
                requested: target,
                committed,
            });
        }
        Ok(Self::fold(versions.iter().filter(|v| v.id <= target)))
    }

    /// Looks up a path's current metadata.
    pub fn get(&self, path: &ArchivePath) -> Option<&FileMetadata> {
        self.files.get(path)
    }

    /// Number of live paths in this view.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether this view has no live paths.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterates live paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &ArchivePath> {
        self.files.keys()
    }

    /// Iterates `(path, metadata)` pairs in sorted order.
    pub fn entries(&self) -> impl Iterator<Item = (&ArchivePath, &FileMetadata)> {
        self.files.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(size: u64, fragments: &[FragmentId]) -> FileMetadata {
        FileMetadata {
            size,
            mtime: Timestamp::default(),
            attributes: 0,
            fragments: fragments.to_vec(),
        }
    }

    fn path(s: &str) -> ArchivePath {
        ArchivePath::new(s).unwrap()
    }

    #[test]
    fn empty_view_has_no_paths() {
        let view = LogicalView::empty();
        assert!(view.is_empty());
        assert_eq!(view.len(), 0);
    }

    #[test]
    fn adding_then_folding_exposes_the_path() {
        let v0 = Version {
            id: 0,
            created: Timestamp::default(),
            comment: None,
            ops: vec![VersionOp::Add {
                path: path("a.txt"),
                metadata: meta(10, &[0, 1]),
            }],
        };
        let view = LogicalView::fold([&v0]);
        assert_eq!(view.get(&path("a.txt")).unwrap().size, 10);
    }

    #[test]
    fn a_later_version_can_delete_a_path_from_an_earlier_one() {
        let v0 = Version {
            id: 0,
            created: Timestamp::default(),
            comment: None,
            ops: vec![VersionOp::Add {
                path: path("a.txt"),
                metadata: meta(10, &[0]),
            }],
        };
        let v1 = Version {
            id: 1,
            created: Timestamp::default(),
            comment: None,
            ops: vec![VersionOp::Delete { path: path("a.txt") }],
        };
        let view = LogicalView::fold([&v0, &v1]);
        assert!(view.get(&path("a.txt")).is_none());
        assert!(view.is_empty());
    }

    #[test]
    fn rollback_view_ignores_versions_after_the_target() {
        let v0 = Version {
            id: 0,
            created: Timestamp::default(),
            comment: None,
            ops: vec![VersionOp::Add {
                path: path("a.txt"),
                metadata: meta(1, &[0]),
            }],
        };
        let v1 = Version {
            id: 1,
            created: Timestamp::default(),
            comment: None,
            ops: vec![VersionOp::Delete { path: path("a.txt") }],
        };
        let versions = vec![v0, v1];

        let at_v0 = LogicalView::at(&versions, 0).unwrap();
        assert!(at_v0.get(&path("a.txt")).is_some());

        let at_v1 = LogicalView::at(&versions, 1).unwrap();
        assert!(at_v1.get(&path("a.txt")).is_none());
    }

    #[test]
    fn requesting_a_version_past_the_committed_tail_is_an_error() {
        let v0 = Version {
            id: 0,
            created: Timestamp::default(),
            comment: None,
            ops: vec![],
        };
        let versions = vec![v0];
        let err = LogicalView::at(&versions, 5).unwrap_err();
        assert!(matches!(
            err,
            Error::BadVersion {
                requested: 5,
                committed: 0
            }
        ));
    }

    #[test]
    fn a_later_add_overwrites_an_earlier_ones_metadata() {
        let v0 = Version {
            id: 0,
            created: Timestamp::default(),
            comment: None,
            ops: vec![VersionOp::Add {
                path: path("a.txt"),
                metadata: meta(1, &[0]),
            }],
        };
        let v1 = Version {
            id: 1,
            created: Timestamp::default(),
            comment: None,
            ops: vec![VersionOp::Add {
                path: path("a.txt"),
                metadata: meta(99, &[1, 2, 3]),
            }],
        };
        let view = LogicalView::fold([&v0, &v1]);
        let metadata = view.get(&path("a.txt")).unwrap();
        assert_eq!(metadata.size, 99);
        assert_eq!(metadata.fragments, vec![1, 2, 3]);
    }

    #[test]
    fn paths_are_iterated_in_sorted_order() {
        let v0 = Version {
            id: 0,
            created: Timestamp::default(),
            comment: None,
            ops: vec![
                VersionOp::Add {
                    path: path("z.txt"),
                    metadata: meta(1, &[]),
                },
                VersionOp::Add {
                    path: path("a.txt"),
                    metadata: meta(1, &[]),
                },
            ],
        };
        let view = LogicalView::fold([&v0]);
        let names: Vec<&str> = view.paths().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "z.txt"]);
    }
}
