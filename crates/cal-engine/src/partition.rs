//! Even work partitioning over candidate index ranges.
//!
//! The same split rule serves both levels of the worker topology: first the
//! candidate range is sliced across peer processes, then each peer's slice is
//! sliced again across its worker threads.

use std::ops::Range;

/// Split `range` into `workers` contiguous half-open slices.
///
/// Worker `k` receives `[start + k*R/W, start + (k+1)*R/W)` with integer
/// division, so remainder indices accumulate in the later workers. The slices
/// are disjoint and their union is exactly `range`.
pub fn split_evenly(range: Range<usize>, workers: usize) -> Vec<Range<usize>> {
    let size = range.end.saturating_sub(range.start);
    (0..workers)
        .map(|k| {
            let lo = range.start + k * size / workers;
            let hi = range.start + (k + 1) * size / workers;
            lo..hi
        })
        .collect()
}
