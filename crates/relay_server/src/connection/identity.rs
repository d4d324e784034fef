//! Process-scoped identity allocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identity assigned to a connection and announced to clients as `playerId`.
pub type PlayerId = u64;

/// Monotonic identity counter.
///
/// Starts at 1 and only ever increments, so an identity is never handed to a
/// second connection within the lifetime of the allocator. Safe to share
/// between the accept loop and connection tasks.
#[derive(Debug)]
pub struct IdentityAllocator {
    next: AtomicU64,
}

impl IdentityAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns the next unused identity.
    pub fn next(&self) -> PlayerId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of identities handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for IdentityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
