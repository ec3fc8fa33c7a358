//! Listed entries and extraction selectors.

use crate::archive_path::ArchivePath;
use crate::journal::fragment::FragmentId;
use crate::timestamp::Timestamp;

/// One live path as of some version, as returned by [`super::Archive::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Archive-relative path.
    pub path: ArchivePath,
    /// Reconstructed size in bytes.
    pub size: u64,
    /// Last-modified time as recorded by the writer.
    pub mtime: Timestamp,
    /// Opaque platform attribute bits.
    pub attributes: u32,
    pub(crate) fragments: Vec<FragmentId>,
}

impl Entry {
    /// Returns the file name (last path component).
    pub fn name(&self) -> &str {
        self.path.file_name()
    }
}

/// Chooses which entries an `extract`/`list` call acts on.
pub enum Selector {
    /// Every live path.
    All,
    /// Exactly the named paths; paths absent from the archive are
    /// silently skipped rather than treated as an error.
    Paths(Vec<ArchivePath>),
    /// Every path starting with the given component prefix (see
    /// [`ArchivePath::starts_with`]).
    Prefix(String),
    /// Caller-supplied predicate.
    Predicate(Box<dyn Fn(&ArchivePath) -> bool>),
}

impl Selector {
    /// Whether `path` is selected.
    pub fn matches(&self, path: &ArchivePath) -> bool {
        match self {
            Selector::All => true,
            Selector::Paths(paths) => paths.contains(path),
            Selector::Prefix(prefix) => path.starts_with(prefix),
            Selector::Predicate(f) => f(path),
        }
    }
}
