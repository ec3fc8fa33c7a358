//! Byte-level I/O helpers and incremental SHA-1.
//!
//! Every segment trailer in the container carries a SHA-1 of the
//! reconstructed stream, so the codec and journal layers both need a
//! cheap, incremental way to accumulate one while they read or write.
//! This module also carries the small `ByteReader`/`ByteWriter`
//! extension traits used throughout the container framer, since plain
//! `Read`/`Write` don't track the current stream offset and every error
//! site (`Error::Truncated`, `Error::BadMagic`) wants to report one.
//!
//! # Example
//!
//! ```rust
//! use zpaqrs::checksum::{Sha1, Checksum};
//!
//! let mut hasher = Sha1::new();
//! hasher.update(b"Hello, ");
//! hasher.update(b"World!");
//! let digest = hasher.finalize();
//! assert_eq!(digest.len(), 20);
//! ```

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::READ_BUFFER_SIZE;

/// Common trait for checksum computation.
pub trait Checksum: Default + Clone {
    /// The output type of this checksum.
    type Output: Copy + Eq + std::fmt::Debug;

    /// Creates a new checksum calculator.
    fn new() -> Self;

    /// Updates the checksum with additional data.
    fn update(&mut self, data: &[u8]);

    /// Finishes the checksum computation and returns the value.
    fn finalize(&self) -> Self::Output;

    /// Resets the checksum to its initial state.
    fn reset(&mut self);

    /// Computes the checksum of a single slice in one call.
    fn compute(data: &[u8]) -> Self::Output {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Computes the checksum by reading from a reader.
    fn compute_reader<R: Read>(reader: &mut R) -> io::Result<Self::Output> {
        let mut hasher = Self::new();
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hasher.finalize())
    }
}

/// SHA-1 checksum calculator, incrementally updatable.
///
/// Every segment trailer stores one of these over the reconstructed
/// segment bytes; a mismatch surfaces as
/// [`crate::error::Error::ChecksumMismatch`].
#[derive(Clone)]
pub struct Sha1 {
    hasher: sha1::Sha1,
}

impl Default for Sha1 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sha1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sha1").finish_non_exhaustive()
    }
}

impl Checksum for Sha1 {
    type Output = [u8; 20];

    fn new() -> Self {
        use sha1::Digest;
        Self {
            hasher: sha1::Sha1::new(),
        }
    }

    fn update(&mut self, data: &[u8]) {
        use sha1::Digest;
        self.hasher.update(data);
    }

    fn finalize(&self) -> [u8; 20] {
        use sha1::Digest;
        self.hasher.clone().finalize().into()
    }

    fn reset(&mut self) {
        use sha1::Digest;
        self.hasher = sha1::Sha1::new();
    }
}

/// A writer wrapper that computes SHA-1 while writing.
pub struct Sha1Writer<W> {
    inner: W,
    hash: Sha1,
    bytes_written: u64,
}

impl<W> Sha1Writer<W> {
    /// Creates a new SHA-1 writer wrapping the given writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hash: Sha1::new(),
            bytes_written: 0,
        }
    }

    /// Returns the current SHA-1 digest.
    pub fn digest(&self) -> [u8; 20] {
        self.hash.finalize()
    }

    /// Returns the number of bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Consumes the wrapper and returns the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for Sha1Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hash.update(&buf[..n]);
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A reader wrapper that computes SHA-1 while reading.
pub struct Sha1Reader<R> {
    inner: R,
    hash: Sha1,
    bytes_read: u64,
}

impl<R> Sha1Reader<R> {
    /// Creates a new SHA-1 reader wrapping the given reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hash: Sha1::new(),
            bytes_read: 0,
        }
    }

    /// Returns the current SHA-1 digest.
    pub fn digest(&self) -> [u8; 20] {
        self.hash.finalize()
    }

    /// Returns the number of bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Consumes the wrapper and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for Sha1Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hash.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// Verify result for a checksum comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyResult {
    /// Checksum matches the expected value.
    Match,
    /// Checksum does not match.
    Mismatch,
    /// No checksum was present for comparison.
    NoChecksum,
}

impl VerifyResult {
    /// Returns true if verification passed or was skipped (no checksum).
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Match | Self::NoChecksum)
    }

    /// Returns true if verification failed.
    pub fn is_err(&self) -> bool {
        matches!(self, Self::Mismatch)
    }
}

/// Verifies a SHA-1 digest against an expected value.
pub fn verify_sha1(data: &[u8], expected: Option<&[u8; 20]>) -> VerifyResult {
    match expected {
        Some(expected) => {
            let actual = Sha1::compute(data);
            if &actual == expected {
                VerifyResult::Match
            } else {
                VerifyResult::Mismatch
            }
        }
        None => VerifyResult::NoChecksum,
    }
}

/// Extension trait giving offset-aware reads to any `Read + Seek`.
///
/// The container framer needs the current stream offset on every
/// short-read error (`Error::Truncated { offset, .. }`), which plain
/// [`Read`] can't answer cheaply.
pub trait ByteReader: Read + Seek {
    /// Returns the current stream position.
    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    /// Reads exactly `buf.len()` bytes, reporting the starting offset on
    /// a short read via the caller-supplied mapping closure.
    fn read_exact_at(&mut self, buf: &mut [u8]) -> crate::error::Result<()> {
        let offset = self.tell()?;
        self.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                crate::error::Error::Truncated {
                    expected: buf.len(),
                    offset,
                }
            } else {
                crate::error::Error::Io(e)
            }
        })
    }

    /// Seeks to an absolute offset from the start of the stream.
    fn seek_to(&mut self, offset: u64) -> io::Result<u64> {
        self.seek(SeekFrom::Start(offset))
    }
}

impl<T: Read + Seek + ?Sized> ByteReader for T {}

/// Extension trait giving offset-aware writes to any `Write + Seek`.
pub trait ByteWriter: Write + Seek {
    /// Returns the current stream position.
    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    /// Writes the entire buffer, mapping any I/O failure into
    /// [`crate::error::Error`].
    fn write_all_at(&mut self, buf: &[u8]) -> crate::error::Result<()> {
        self.write_all(buf).map_err(crate::error::Error::Io)
    }
}

impl<T: Write + Seek + ?Sized> ByteWriter for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // SHA-1("abc") per FIPS 180-4.
    const ABC_DIGEST: [u8; 20] = [
        0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50, 0xc2,
        0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
    ];

    #[test]
    fn sha1_matches_known_vector() {
        let digest = Sha1::compute(b"abc");
        assert_eq!(digest, ABC_DIGEST);
    }

    #[test]
    fn sha1_incremental_matches_oneshot() {
        let mut hasher = Sha1::new();
        hasher.update(b"ab");
        hasher.update(b"c");
        assert_eq!(hasher.finalize(), ABC_DIGEST);
    }

    #[test]
    fn sha1_reset_clears_state() {
        let mut hasher = Sha1::new();
        hasher.update(b"garbage");
        hasher.reset();
        hasher.update(b"abc");
        assert_eq!(hasher.finalize(), ABC_DIGEST);
    }

    #[test]
    fn sha1_writer_tracks_digest_and_length() {
        let mut buffer = Vec::new();
        let mut writer = Sha1Writer::new(&mut buffer);
        writer.write_all(b"abc").unwrap();
        assert_eq!(writer.digest(), ABC_DIGEST);
        assert_eq!(writer.bytes_written(), 3);
    }

    #[test]
    fn sha1_reader_tracks_digest_and_length() {
        let mut reader = Sha1Reader::new(Cursor::new(b"abc".to_vec()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(reader.digest(), ABC_DIGEST);
        assert_eq!(reader.bytes_read(), 3);
    }

    #[test]
    fn verify_sha1_reports_mismatch() {
        let result = verify_sha1(b"abc", Some(&[0u8; 20]));
        assert!(result.is_err());
        assert_eq!(result, VerifyResult::Mismatch);
    }

    #[test]
    fn verify_sha1_reports_match() {
        let result = verify_sha1(b"abc", Some(&ABC_DIGEST));
        assert!(result.is_ok());
        assert_eq!(result, VerifyResult::Match);
    }

    #[test]
    fn verify_sha1_no_checksum_is_ok() {
        assert_eq!(verify_sha1(b"abc", None), VerifyResult::NoChecksum);
    }

    #[test]
    fn byte_reader_reports_truncation_offset() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        cursor.seek_to(1).unwrap();
        let mut buf = [0u8; 4];
        let err = cursor.read_exact_at(&mut buf).unwrap_err();
        match err {
            crate::error::Error::Truncated { expected, offset } => {
                assert_eq!(expected, 4);
                assert_eq!(offset, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
