//! Range partitioning and worker-count policy.

use crate::schema::{MAX_WORKERS, ScanRequest};

/// Scans below this size run serially; fan-out overhead is not worth it.
const PARALLEL_MIN_COUNT: u32 = 1 << 16;

/// One worker's slice of the scan index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRange {
    /// First seed of this slice.
    pub start_seed: u32,
    /// Number of seeds in this slice.
    pub count: u32,
    /// Step between consecutive seeds (inherited from the request).
    pub stride: u32,
}

impl SubRange {
    /// Seed at index `i` within this slice, with modular wraparound.
    #[inline]
    pub fn seed_at(&self, i: u32) -> u32 {
        self.start_seed.wrapping_add(i.wrapping_mul(self.stride))
    }
}

/// Split a scan request into `workers` disjoint, exhaustive sub-ranges.
///
/// The split is as even as possible (sizes differ by at most one) and
/// preserves the global stride. Concatenating the sub-ranges in order
/// reproduces the exact seed sequence of a serial scan, so the set of seeds
/// each worker owns is fixed by the partition alone.
pub fn partition(request: &ScanRequest, workers: u32) -> Vec<SubRange> {
    let workers = workers.min(request.count).max(1);
    if request.count == 0 {
        return Vec::new();
    }

    let base = request.count / workers;
    let remainder = request.count % workers;

    let mut ranges = Vec::with_capacity(workers as usize);
    let mut offset = 0u32;

    for w in 0..workers {
        let count = if w < remainder { base + 1 } else { base };
        ranges.push(SubRange {
            start_seed: request.seed_at(offset),
            count,
            stride: request.stride,
        });
        offset = offset.wrapping_add(count);
    }

    ranges
}

/// Pick a worker count for a request.
///
/// Advisory heuristic: small scans and strided scans run serially; dense
/// large scans use the budget, or available hardware parallelism when the
/// budget is 0 (auto), capped by [`MAX_WORKERS`] to avoid oversubscription.
pub fn decide_worker_count(request: &ScanRequest, worker_budget: u32) -> u32 {
    if worker_budget == 1 {
        return 1;
    }
    if request.count < PARALLEL_MIN_COUNT || request.stride > 1 {
        return 1;
    }

    let budget = if worker_budget == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1)
    } else {
        worker_budget
    };

    budget.min(MAX_WORKERS).min(request.count).max(1)
}
