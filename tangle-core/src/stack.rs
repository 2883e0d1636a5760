//! Stack growth for the recursive passes over node trees.
//!
//! A linked list of `n` shared objects nests `2n` nodes deep, so parsing,
//! encoding, resolving and mapping all recurse in proportion to the data.

/// Space left on the current stack below which a new segment is allocated.
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated stack segment.
const SEGMENT: usize = 2 * 1024 * 1024;

/// Runs `f`, switching to a fresh stack segment when the current one is
/// nearly exhausted.
#[inline]
pub(crate) fn grow<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT, f)
}
