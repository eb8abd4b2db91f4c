//! Process-wide logical clock used for policy cache invalidation.
//!
//! Every call to [`Timestamp::now`] returns a value strictly greater than any
//! value returned before it, on any thread. Wall-clock time would allow two
//! mutations within the same tick to compare equal.

use std::sync::atomic::{AtomicU64, Ordering};

static CLOCK: AtomicU64 = AtomicU64::new(0);

/// Monotonic logical timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Timestamp preceding every value returned by [`Timestamp::now`].
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn now() -> Self {
        Timestamp(CLOCK.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Strictly after `other`.
    pub fn is_after(self, other: Timestamp) -> bool {
        self.0 > other.0
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn strictly_increasing() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(b.is_after(a));
        assert!(!a.is_after(a));
        assert!(a.is_after(Timestamp::ZERO));
    }
}
