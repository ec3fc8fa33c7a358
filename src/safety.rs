//! Resource limit enforcement.
//!
//! Three independent ceilings protect a decoder from an adversarial or
//! merely corrupt archive: the ZPAQL instruction count per block
//! (`VmRuntime` on overrun), the scrypt cost parameter (`N`) used to
//! derive a key, and the size of an individual fragment or
//! content-defined chunk. None of these are format invariants — they
//! are local policy, configurable per [`ResourceLimits`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Default ZPAQL instruction ceiling per block, `2^26`.
pub const DEFAULT_MAX_INSTRUCTIONS: u64 = 1 << 26;

/// Default cap on scrypt's cost parameter `N` (as `log2(N)`), chosen so
/// a single key derivation cannot be made to consume more than a few
/// hundred MiB of memory.
pub const DEFAULT_MAX_SCRYPT_LOG_N: u8 = 20;

/// Default cap on an individual fragment or chunk, 64 MiB.
pub const DEFAULT_MAX_FRAGMENT_BYTES: u64 = 64 * 1024 * 1024;

/// Resource ceilings enforced while reading or writing an archive.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    /// ZPAQL instructions a single `hcomp`/`pcomp` run may execute.
    pub max_instructions: u64,
    /// Upper bound on scrypt's `log2(N)` cost parameter.
    pub max_scrypt_log_n: u8,
    /// Upper bound on the size of any single fragment or chunk.
    pub max_fragment_bytes: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_instructions: DEFAULT_MAX_INSTRUCTIONS,
            max_scrypt_log_n: DEFAULT_MAX_SCRYPT_LOG_N,
            max_fragment_bytes: DEFAULT_MAX_FRAGMENT_BYTES,
        }
    }
}

impl ResourceLimits {
    /// Ceilings with everything set as permissive as this crate allows,
    /// for tests and trusted local archives.
    pub fn unbounded() -> Self {
        Self {
            max_instructions: u64::MAX,
            max_scrypt_log_n: 30,
            max_fragment_bytes: u64::MAX,
        }
    }

    /// Checks a requested scrypt cost parameter against the ceiling.
    pub fn check_scrypt_log_n(&self, log_n: u8) -> Result<()> {
        if log_n > self.max_scrypt_log_n {
            return Err(Error::ResourceLimitExceeded(format!(
                "scrypt log2(N)={log_n} exceeds ceiling {}",
                self.max_scrypt_log_n
            )));
        }
        Ok(())
    }

    /// Checks a fragment/chunk size against the ceiling.
    pub fn check_fragment_bytes(&self, len: u64) -> Result<()> {
        if len > self.max_fragment_bytes {
            return Err(Error::ResourceLimitExceeded(format!(
                "fragment of {len} bytes exceeds ceiling {}",
                self.max_fragment_bytes
            )));
        }
        Ok(())
    }
}

/// Tracks ZPAQL instructions executed by one VM run against a ceiling.
///
/// The VM calls [`InstructionBudget::tick`] after every opcode; a worker
/// pool shares a [`CancellationFlag`] alongside this so a long-running
/// block can also be cut short cooperatively.
#[derive(Debug)]
pub struct InstructionBudget {
    executed: u64,
    max: u64,
}

impl InstructionBudget {
    /// Creates a budget with the given ceiling.
    pub fn new(max: u64) -> Self {
        Self { executed: 0, max }
    }

    /// Accounts for one more executed instruction, failing once the
    /// ceiling is exceeded.
    #[inline]
    pub fn tick(&mut self) -> Result<()> {
        self.executed += 1;
        if self.executed > self.max {
            return Err(Error::vm_runtime(format!(
                "instruction ceiling of {} exceeded",
                self.max
            )));
        }
        Ok(())
    }

    /// Number of instructions executed so far.
    pub fn executed(&self) -> u64 {
        self.executed
    }
}

/// Cooperative cancellation flag shared between a coordinator and its
/// worker threads.
///
/// Workers check this at block boundaries and inside the VM's
/// instruction-budget loop; a set flag discards the in-flight block
/// rather than corrupting the archive, since the coordinator only ever
/// commits blocks it has received in full.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicU64>);

impl CancellationFlag {
    /// Creates a flag in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(1, Ordering::Relaxed);
    }

    /// Returns whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_budget_allows_up_to_ceiling() {
        let mut budget = InstructionBudget::new(3);
        assert!(budget.tick().is_ok());
        assert!(budget.tick().is_ok());
        assert!(budget.tick().is_ok());
        assert!(budget.tick().is_err());
    }

    #[test]
    fn scrypt_ceiling_rejects_excessive_cost() {
        let limits = ResourceLimits::default();
        assert!(limits.check_scrypt_log_n(14).is_ok());
        assert!(limits.check_scrypt_log_n(25).is_err());
    }

    #[test]
    fn fragment_ceiling_rejects_oversized_chunks() {
        let limits = ResourceLimits::default();
        assert!(limits.check_fragment_bytes(1024).is_ok());
        assert!(
            limits
                .check_fragment_bytes(DEFAULT_MAX_FRAGMENT_BYTES + 1)
                .is_err()
        );
    }

    #[test]
    fn cancellation_flag_is_shared_across_clones() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn unbounded_limits_never_reject() {
        let limits = ResourceLimits::unbounded();
        assert!(limits.check_scrypt_log_n(29).is_ok());
        assert!(limits.check_fragment_bytes(u64::MAX).is_ok());
    }
}
