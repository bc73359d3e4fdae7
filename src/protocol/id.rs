//! Outbound packet ID allocation.
//!
//! IDs are signed 32-bit, start above 0, and wrap back to 1 before reaching
//! `i32::MAX`. IDs in the session's restricted set are skipped so client
//! packets never collide with server-reserved channels.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::error::{RconError, Result};

/// Per-session counter producing the next legal outbound packet ID.
pub(crate) struct IdAllocator {
    next: AtomicI32,
    restricted: HashSet<i32>,
}

impl IdAllocator {
    pub(crate) fn new(restricted: impl IntoIterator<Item = i32>) -> Self {
        Self::starting_at(0, restricted)
    }

    fn starting_at(start: i32, restricted: impl IntoIterator<Item = i32>) -> Self {
        Self {
            next: AtomicI32::new(start),
            restricted: restricted.into_iter().collect(),
        }
    }

    /// Allocate the next ID.
    ///
    /// The result is always in `[1, i32::MAX - 1]` and never a member of the
    /// restricted set. Fails with [`RconError::IdExhaustion`] if the
    /// restricted set swallows every candidate.
    pub(crate) fn next(&self) -> Result<i32> {
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let candidate = self.first_free_after(current)?;
            match self.next.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(candidate),
                Err(observed) => current = observed,
            }
        }
    }

    fn first_free_after(&self, mut id: i32) -> Result<i32> {
        let mut skipped = 0;
        loop {
            id = if id == i32::MAX - 1 { 1 } else { id + 1 };
            if !self.restricted.contains(&id) {
                return Ok(id);
            }
            skipped += 1;
            if skipped > self.restricted.len() {
                return Err(RconError::IdExhaustion);
            }
        }
    }
}
