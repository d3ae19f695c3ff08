//! Process-wide identifiers.
//!
//! Hooks and sources draw from one counter, so an ID is never reused
//! within a process, whatever it identifies.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next() -> u64 {
    NEXT.fetch_add(1, Ordering::Relaxed)
}
