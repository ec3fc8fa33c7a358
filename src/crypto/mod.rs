//! The archive-level crypto envelope (C2).
//!
//! Protects an entire archive so that no structure — not even the
//! block magic — is recoverable without the password. A plain-text
//! preamble (magic + salt) precedes the first block; everything after
//! it is the keystream-XORed container. Wrong-password detection comes
//! for free: decrypt the first [`crate::format::BLOCK_MAGIC`]-sized
//! span and compare, per spec.md §4.2's failure modes.

pub mod cipher;
pub mod password;

pub use cipher::{derive_keys, DerivedKeys, SALT_LEN};
pub use password::Password;

use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::format::BLOCK_MAGIC;
use crate::s3fifo::S3FifoCache;
use crate::safety::ResourceLimits;

/// Plain-text magic marking an encrypted archive, distinct from
/// [`BLOCK_MAGIC`] so a reader can tell the two apart before any key
/// is available.
pub const CRYPTO_PREAMBLE_MAGIC: [u8; 8] = *b"ZPAQRSX1";

/// Total length of the plain-text preamble (magic + salt).
pub const PREAMBLE_LEN: usize = CRYPTO_PREAMBLE_MAGIC.len() + SALT_LEN;

/// The plain-text header of an encrypted archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    /// Per-archive salt, the first 32 bytes after the preamble magic.
    pub salt: [u8; SALT_LEN],
}

impl Preamble {
    /// Serializes this preamble.
    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PREAMBLE_LEN);
        out.extend(CRYPTO_PREAMBLE_MAGIC);
        out.extend(self.salt);
        out
    }

    /// Parses a preamble from the start of `bytes`, returning it along
    /// with the number of bytes consumed.
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < PREAMBLE_LEN {
            return Err(Error::Truncated {
                expected: PREAMBLE_LEN - bytes.len(),
                offset: bytes.len() as u64,
            });
        }
        if bytes[..CRYPTO_PREAMBLE_MAGIC.len()] != CRYPTO_PREAMBLE_MAGIC {
            return Err(Error::bad_header("not an encrypted archive (preamble magic mismatch)"));
        }
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[CRYPTO_PREAMBLE_MAGIC.len()..PREAMBLE_LEN]);
        Ok((Self { salt }, PREAMBLE_LEN))
    }

    /// Whether `bytes` begins with the encrypted-archive magic, without
    /// fully parsing the preamble.
    pub fn is_encrypted(bytes: &[u8]) -> bool {
        bytes.len() >= CRYPTO_PREAMBLE_MAGIC.len() && bytes[..CRYPTO_PREAMBLE_MAGIC.len()] == CRYPTO_PREAMBLE_MAGIC
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("crypto KeyCache mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    password_fingerprint: [u8; 20],
    salt: [u8; SALT_LEN],
}

/// Caches derived keys so repeated opens of the same archive+password
/// don't re-run the expensive scrypt derivation.
pub struct KeyCache {
    cache: Mutex<S3FifoCache<CacheKey, DerivedKeys>>,
    stats: Mutex<CacheStats>,
}

/// Hit/miss counters for a [`KeyCache`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (key derivations actually performed).
    pub misses: u64,
}

impl KeyCache {
    /// Creates a cache holding at most `capacity` derived keys.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(S3FifoCache::new(capacity)),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Derives (or returns a cached) key for `password`/`salt`.
    pub fn derive(
        &self,
        password: &Password,
        salt: &[u8; SALT_LEN],
        limits: &ResourceLimits,
    ) -> Result<DerivedKeys> {
        let key = CacheKey {
            password_fingerprint: cipher::password_fingerprint(password),
            salt: *salt,
        };

        {
            let mut cache = lock_or_recover(&self.cache);
            if let Some(hit) = cache.get(&key) {
                lock_or_recover(&self.stats).hits += 1;
                return Ok(hit.clone());
            }
        }

        let derived = derive_keys(password, salt, limits)?;
        let mut cache = lock_or_recover(&self.cache);
        cache.insert(key, derived.clone());
        lock_or_recover(&self.stats).misses += 1;
        Ok(derived)
    }

    /// Returns a snapshot of the cache's hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        *lock_or_recover(&self.stats)
    }

    /// Drops every cached key.
    pub fn clear(&self) {
        lock_or_recover(&self.cache).clear();
    }
}

/// Attempts to unlock an encrypted archive's leading bytes.
///
/// Parses the preamble, derives the key (through `cache`), and checks
/// that decrypting the bytes immediately following the preamble
/// reproduces [`BLOCK_MAGIC`]. Returns the derived keys and the number
/// of preamble bytes consumed on success; [`Error::BadKey`] on a wrong
/// password, [`Error::Truncated`] on a short preamble.
pub fn unlock(
    bytes: &[u8],
    password: &Password,
    limits: &ResourceLimits,
    cache: &KeyCache,
) -> Result<(DerivedKeys, usize)> {
    let (preamble, consumed) = Preamble::parse(bytes)?;
    let derived = cache.derive(password, &preamble.salt, limits)?;

    let first_block = bytes
        .get(consumed..consumed + BLOCK_MAGIC.len())
        .ok_or_else(|| Error::Truncated {
            expected: BLOCK_MAGIC.len(),
            offset: consumed as u64,
        })?;
    let mut probe = first_block.to_vec();
    cipher::apply_keystream(&derived.encryption_key, &derived.iv_high(), 0, &mut probe);
    if probe != BLOCK_MAGIC {
        return Err(Error::BadKey);
    }

    Ok((derived, consumed))
}

/// Encrypts a plaintext container under a freshly generated random
/// salt, returning the full on-disk byte stream (preamble + keystream-
/// XORed container) that [`unlock`] can later reverse.
pub fn seal(container: &[u8], password: &Password, limits: &ResourceLimits) -> Result<Vec<u8>> {
    use rand::RngCore;

    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let derived = derive_keys(password, &salt, limits)?;
    let mut ciphertext = container.to_vec();
    cipher::apply_keystream(&derived.encryption_key, &derived.iv_high(), 0, &mut ciphertext);

    let mut out = Preamble { salt }.write();
    out.extend(ciphertext);
    Ok(out)
}
