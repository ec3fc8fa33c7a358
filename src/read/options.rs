//! Extraction options.

/// What to do when an extraction target path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Fail the extraction of that entry (the default).
    #[default]
    Error,
    /// Leave the existing path untouched and move on.
    Skip,
    /// Replace the existing path.
    Overwrite,
}

/// Options controlling [`super::Archive::extract`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Policy applied when a [`FilesystemSink`](super::FilesystemSink) finds
    /// an existing path at the destination.
    pub overwrite: OverwritePolicy,
    /// Whether to recompute and check each fragment's SHA-1 against the
    /// journal's fragment table before handing bytes to the sink.
    pub verify_checksums: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            overwrite: OverwritePolicy::default(),
            verify_checksums: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_fail_closed_on_overwrite_but_verify_checksums() {
        let options = ExtractOptions::default();
        assert_eq!(options.overwrite, OverwritePolicy::Error);
        assert!(options.verify_checksums);
    }
}
