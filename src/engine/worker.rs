//! Worker task: evaluates one sub-range and reports events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use super::{SubRange, SurvivalModel};

/// Seeds tested between progress reports, bounding event-channel traffic.
pub const PROGRESS_BATCH: u32 = 10_000;

/// Event emitted by a worker to the scan aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// A seed survived every check.
    Winner(u32),
    /// Seeds tested since the last report.
    Progress(u32),
    /// One seed failed to evaluate; the worker continued.
    Fault { seed: u32, message: String },
    /// The worker finished its sub-range. Sent exactly once.
    Finished { worker: usize },
    /// The worker terminated abnormally mid-range.
    Aborted { worker: usize },
}

/// Evaluate one sub-range, in increasing index order.
///
/// Winners are emitted as found; progress is batched every
/// [`PROGRESS_BATCH`] seeds. A per-seed evaluation error becomes a
/// [`WorkerEvent::Fault`] diagnostic and the scan of the sub-range
/// continues: one bad seed must not void the rest of the range. The stop
/// flag (raised on cancellation or a fatal sink failure) is checked between
/// evaluations; stopping keeps already-emitted winners. `Finished` is sent
/// exactly once, even when the sub-range is empty or stopped early.
pub fn run_worker<M: SurvivalModel>(
    worker: usize,
    range: SubRange,
    model: &M,
    stop: &AtomicBool,
    tx: &Sender<WorkerEvent>,
) {
    let mut since_report = 0u32;

    for i in 0..range.count {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let seed = range.seed_at(i);
        match model.evaluate(seed) {
            Ok(true) => {
                if tx.send(WorkerEvent::Winner(seed)).is_err() {
                    return;
                }
            }
            Ok(false) => {}
            Err(e) => {
                log::warn!("worker {}: {}", worker, e);
                let fault = WorkerEvent::Fault {
                    seed,
                    message: e.to_string(),
                };
                if tx.send(fault).is_err() {
                    return;
                }
            }
        }

        since_report += 1;
        if since_report == PROGRESS_BATCH {
            if tx.send(WorkerEvent::Progress(since_report)).is_err() {
                return;
            }
            since_report = 0;
        }
    }

    if since_report > 0 {
        let _ = tx.send(WorkerEvent::Progress(since_report));
    }
    let _ = tx.send(WorkerEvent::Finished { worker });
}
