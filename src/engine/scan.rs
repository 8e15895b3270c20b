//! Scan engine - drives serial and parallel seed scans.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use crate::schema::{ConfigError, Model, ScanConfig, ScanRequest};
use crate::sink::WinnerSink;

use super::{
    CheckModel, PROGRESS_BATCH, SurvivalModel, WorkerEvent, decide_worker_count, partition,
    run_worker,
};

/// Fatal scan errors.
///
/// Per-seed faults and worker aborts are not in this taxonomy: they degrade
/// the result and are reported through [`ScanOutcome`], but the run itself
/// completes. Losing the output sink is the one failure worth dying for.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle of a scan run.
///
/// `Running -> Closed` only happens once the active worker count reaches
/// zero; that transition is the sole synchronization barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Partitioning,
    Running,
    Draining,
    Closed,
}

/// Why the scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every requested seed was tested.
    Completed,
    /// The cancellation flag was raised mid-scan.
    Cancelled,
}

/// Advisory progress snapshot passed to the run callback.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    /// Seeds tested so far, aggregated across workers.
    pub seeds_tested: u64,
    /// Seeds requested.
    pub total_seeds: u64,
    pub winners_found: u64,
    pub active_workers: usize,
    pub elapsed_seconds: f64,
}

/// Final statistics for a scan run.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub seeds_tested: u64,
    pub winners_found: u64,
    pub worker_count: u32,
    /// Workers that terminated abnormally; their sub-ranges are partial.
    pub aborted_workers: u32,
    /// Per-seed evaluation faults (each seed treated as a non-winner).
    pub faults: u64,
    pub elapsed_seconds: f64,
    pub seeds_per_second: f64,
    pub stop_reason: StopReason,
}

impl ScanOutcome {
    /// True when every requested seed was actually tested.
    pub fn is_complete(&self) -> bool {
        self.stop_reason == StopReason::Completed && self.aborted_workers == 0
    }
}

/// Seed scan engine.
///
/// Owns the validated request and predicate; each [`run`](Self::run) call
/// partitions the range, fans evaluation out across workers, funnels their
/// events into the sink on a single thread, and closes the sink once every
/// worker has signaled completion. The predicate is generic so that
/// replacement [`SurvivalModel`] implementations run through the same
/// partitioning, fault isolation, and sink machinery as the built-in
/// [`CheckModel`].
pub struct ScanEngine<M: SurvivalModel = CheckModel> {
    request: ScanRequest,
    worker_budget: u32,
    /// Model parameters as configured; describes the run in the header.
    params: Model,
    model: M,
    cancelled: Arc<AtomicBool>,
}

impl ScanEngine<CheckModel> {
    /// Create an engine running the built-in check predicate.
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        Self::with_model(config, CheckModel::new(config.model.clone()))
    }
}

impl<M: SurvivalModel> ScanEngine<M> {
    /// Create an engine running a custom survival predicate.
    pub fn with_model(config: &ScanConfig, model: M) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            request: config.request(),
            worker_budget: config.worker_budget,
            params: config.model.clone().clamped(),
            model,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle. Cooperative: a raised flag stops workers
    /// between evaluations and keeps already-emitted winners.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Run the scan, discarding progress reports.
    pub fn run<W: Write>(&self, sink: &mut WinnerSink<W>) -> Result<ScanOutcome, ScanError> {
        self.run_with_callback(sink, |_| {})
    }

    /// Run the scan, reporting progress through `callback`.
    pub fn run_with_callback<W, F>(
        &self,
        sink: &mut WinnerSink<W>,
        callback: F,
    ) -> Result<ScanOutcome, ScanError>
    where
        W: Write,
        F: Fn(&ScanProgress),
    {
        let start = Instant::now();

        sink.write_header(&self.params, &self.request)?;

        let workers = decide_worker_count(&self.request, self.worker_budget);
        log::info!(
            "scanning {} seeds from {} (stride {}) with {} worker(s), model: {} checks at p={}",
            self.request.count,
            self.request.start_seed,
            self.request.stride,
            workers,
            self.params.num_checks,
            self.params.kill_probability,
        );

        let mut run = RunState {
            start,
            total_seeds: self.request.count as u64,
            phase: ScanPhase::Partitioning,
            seeds_tested: 0,
            winners_found: 0,
            faults: 0,
            aborted_workers: 0,
            active_workers: 0,
        };
        callback(&run.progress());

        if workers <= 1 {
            self.run_serial(sink, &mut run, &callback)?;
        } else {
            self.run_parallel(sink, &mut run, workers, &callback)?;
        }

        run.phase = ScanPhase::Closed;
        sink.finish(run.seeds_tested)?;
        callback(&run.progress());

        let elapsed = start.elapsed().as_secs_f64();
        let stop_reason = if self.cancelled.load(Ordering::Relaxed) {
            StopReason::Cancelled
        } else {
            StopReason::Completed
        };

        if run.aborted_workers > 0 {
            log::warn!(
                "{} worker(s) aborted; winner list is partial",
                run.aborted_workers
            );
        }

        Ok(ScanOutcome {
            seeds_tested: run.seeds_tested,
            winners_found: run.winners_found,
            worker_count: workers,
            aborted_workers: run.aborted_workers,
            faults: run.faults,
            elapsed_seconds: elapsed,
            seeds_per_second: if elapsed > 0.0 {
                run.seeds_tested as f64 / elapsed
            } else {
                0.0
            },
            stop_reason,
        })
    }

    /// Single-threaded pass over the whole range.
    fn run_serial<W, F>(
        &self,
        sink: &mut WinnerSink<W>,
        run: &mut RunState,
        callback: &F,
    ) -> Result<(), ScanError>
    where
        W: Write,
        F: Fn(&ScanProgress),
    {
        run.phase = ScanPhase::Running;
        run.active_workers = 1;

        let mut since_report = 0u32;
        for i in 0..self.request.count {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }

            let seed = self.request.seed_at(i);
            match self.model.evaluate(seed) {
                Ok(true) => {
                    sink.append_winner(seed)?;
                    run.winners_found += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    log::warn!("{}", e);
                    run.faults += 1;
                }
            }
            run.seeds_tested += 1;

            since_report += 1;
            if since_report == PROGRESS_BATCH {
                since_report = 0;
                callback(&run.progress());
            }
        }

        run.active_workers = 0;
        Ok(())
    }

    /// Partitioned parallel scan: rayon fan-out, channel fan-in.
    ///
    /// Workers share nothing mutable; every event funnels into this thread,
    /// which is the only writer the sink ever sees.
    fn run_parallel<W, F>(
        &self,
        sink: &mut WinnerSink<W>,
        run: &mut RunState,
        workers: u32,
        callback: &F,
    ) -> Result<(), ScanError>
    where
        W: Write,
        F: Fn(&ScanProgress),
    {
        let ranges = partition(&self.request, workers);
        run.phase = ScanPhase::Running;
        run.active_workers = ranges.len();
        callback(&run.progress());

        let (tx, rx) = mpsc::channel();
        let mut io_error: Option<std::io::Error> = None;

        // Run-local stop flag: seeded from the cancellation handle and also
        // raised on a fatal sink failure. Workers watch only this flag, so
        // aborting one run never leaves the engine's handle poisoned for
        // the next.
        let stop = AtomicBool::new(self.cancelled.load(Ordering::Relaxed));

        rayon::in_place_scope(|s| {
            for (worker, range) in ranges.iter().copied().enumerate() {
                let tx = tx.clone();
                let model = &self.model;
                let stop = &stop;
                s.spawn(move |_| {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        run_worker(worker, range, model, stop, &tx);
                    }));
                    if result.is_err() {
                        let _ = tx.send(WorkerEvent::Aborted { worker });
                    }
                });
            }
            drop(tx);

            // Single-writer drain loop; ends when every sender is gone.
            for event in rx.iter() {
                if self.cancelled.load(Ordering::Relaxed) {
                    stop.store(true, Ordering::Relaxed);
                }
                match event {
                    WorkerEvent::Winner(seed) => {
                        if let Err(e) = sink.append_winner(seed) {
                            // Sink loss is fatal; stop the workers and bail.
                            io_error = Some(e);
                            stop.store(true, Ordering::Relaxed);
                            break;
                        }
                        run.winners_found += 1;
                    }
                    WorkerEvent::Progress(n) => {
                        run.seeds_tested += n as u64;
                        callback(&run.progress());
                    }
                    WorkerEvent::Fault { .. } => {
                        // Already logged at the worker.
                        run.faults += 1;
                    }
                    WorkerEvent::Finished { .. } => {
                        run.worker_done();
                    }
                    WorkerEvent::Aborted { worker } => {
                        log::error!("worker {} terminated abnormally", worker);
                        run.aborted_workers += 1;
                        run.worker_done();
                    }
                }
            }
        });

        match io_error {
            Some(e) => Err(ScanError::Io(e)),
            None => Ok(()),
        }
    }
}

/// Mutable bookkeeping for one run.
struct RunState {
    start: Instant,
    total_seeds: u64,
    phase: ScanPhase,
    seeds_tested: u64,
    winners_found: u64,
    faults: u64,
    aborted_workers: u32,
    active_workers: usize,
}

impl RunState {
    fn progress(&self) -> ScanProgress {
        ScanProgress {
            phase: self.phase,
            seeds_tested: self.seeds_tested,
            total_seeds: self.total_seeds,
            winners_found: self.winners_found,
            active_workers: self.active_workers,
            elapsed_seconds: self.start.elapsed().as_secs_f64(),
        }
    }

    fn worker_done(&mut self) {
        self.active_workers = self.active_workers.saturating_sub(1);
        if self.active_workers == 1 {
            self.phase = ScanPhase::Draining;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EvalError;
    use crate::schema::{KillRule, Model};

    fn config(count: u32, model: Model, worker_budget: u32) -> ScanConfig {
        ScanConfig {
            start_seed: 0,
            count,
            stride: 1,
            worker_budget,
            model,
            ..ScanConfig::default()
        }
    }

    fn unkillable() -> Model {
        Model {
            num_checks: 1,
            kill_probability: 0.0,
            kill_rule: KillRule::Below,
        }
    }

    fn certain_death() -> Model {
        Model {
            num_checks: 1,
            kill_probability: 1.0,
            kill_rule: KillRule::Below,
        }
    }

    /// Run a scan into memory and return (winners, outcome).
    fn scan_to_vec(config: &ScanConfig) -> (Vec<u32>, ScanOutcome) {
        let engine = ScanEngine::new(config).unwrap();
        let mut sink = WinnerSink::from_writer(Vec::new());
        let outcome = engine.run(&mut sink).unwrap();
        let winners = parse_winners(&sink.into_writer());
        (winners, outcome)
    }

    fn parse_winners(bytes: &[u8]) -> Vec<u32> {
        String::from_utf8_lossy(bytes)
            .lines()
            .filter(|l| !l.starts_with('#') && !l.is_empty())
            .map(|l| l.parse().unwrap())
            .collect()
    }

    #[test]
    fn test_zero_probability_yields_every_seed() {
        let (winners, outcome) = scan_to_vec(&config(10, unkillable(), 1));
        assert_eq!(winners, (0..10).collect::<Vec<u32>>());
        assert_eq!(outcome.seeds_tested, 10);
        assert_eq!(outcome.winners_found, 10);
        assert!(outcome.is_complete());
    }

    #[test]
    fn test_certain_death_yields_no_seed() {
        let (winners, outcome) = scan_to_vec(&config(10, certain_death(), 1));
        assert!(winners.is_empty());
        assert_eq!(outcome.seeds_tested, 10);
        assert_eq!(outcome.winners_found, 0);
    }

    #[test]
    fn test_empty_request_closes_cleanly() {
        let (winners, outcome) = scan_to_vec(&config(0, Model::default(), 1));
        assert!(winners.is_empty());
        assert_eq!(outcome.seeds_tested, 0);
        assert_eq!(outcome.stop_reason, StopReason::Completed);
    }

    #[test]
    fn test_serial_parallel_same_winner_set() {
        // Large enough to clear the serial-policy threshold; lenient enough
        // that the winner sets are non-trivial (~1/64 survival).
        let count = 100_000;
        let lenient = Model {
            num_checks: 6,
            kill_probability: 0.5,
            kill_rule: KillRule::Below,
        };
        let (serial, serial_outcome) = scan_to_vec(&config(count, lenient.clone(), 1));
        let (parallel, parallel_outcome) = scan_to_vec(&config(count, lenient, 4));

        assert_eq!(serial_outcome.worker_count, 1);
        assert_eq!(parallel_outcome.worker_count, 4);
        assert_eq!(serial_outcome.seeds_tested, count as u64);
        assert_eq!(parallel_outcome.seeds_tested, count as u64);

        let mut parallel_sorted = parallel;
        parallel_sorted.sort_unstable();
        // Serial emission order is numeric order already.
        assert!(!serial.is_empty());
        assert_eq!(serial, parallel_sorted);
    }

    #[test]
    fn test_default_model_is_reproducible() {
        let cfg = config(200_000, Model::default(), 4);
        let (mut first, first_outcome) = scan_to_vec(&cfg);
        let (mut second, second_outcome) = scan_to_vec(&cfg);
        first.sort_unstable();
        second.sort_unstable();
        assert_eq!(first, second);
        assert_eq!(first_outcome.winners_found, second_outcome.winners_found);
        assert_eq!(first_outcome.seeds_tested, 200_000);
    }

    #[test]
    fn test_winners_reported_at_most_once() {
        // ~1/16 survival rate gives thousands of winners across workers.
        let lenient = Model {
            num_checks: 4,
            kill_probability: 0.5,
            kill_rule: KillRule::Below,
        };
        let (winners, outcome) = scan_to_vec(&config(100_000, lenient, 4));
        assert!(outcome.winners_found > 1000);

        let mut sorted = winners.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), winners.len());
    }

    #[test]
    fn test_cancellation_before_start() {
        let cfg = config(100_000, Model::default(), 4);
        let engine = ScanEngine::new(&cfg).unwrap();
        engine.cancel_handle().store(true, Ordering::Relaxed);

        let mut sink = WinnerSink::from_writer(Vec::new());
        let outcome = engine.run(&mut sink).unwrap();
        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert!(outcome.seeds_tested < 100_000);
    }

    #[test]
    fn test_invalid_config_rejected_before_scan() {
        let mut cfg = config(10, Model::default(), 1);
        cfg.stride = 0;
        assert!(matches!(
            ScanEngine::new(&cfg),
            Err(ScanError::Config(ConfigError::ZeroStride))
        ));
    }

    /// Predicate that panics on one seed and otherwise passes every
    /// thousandth seed.
    struct PanickyModel {
        panic_seed: u32,
    }

    impl SurvivalModel for PanickyModel {
        fn evaluate(&self, seed: u32) -> Result<bool, EvalError> {
            if seed == self.panic_seed {
                panic!("synthetic worker crash");
            }
            Ok(seed % 1000 == 0)
        }
    }

    #[test]
    fn test_worker_panic_yields_partial_result() {
        let cfg = config(100_000, Model::default(), 4);
        let engine = ScanEngine::with_model(&cfg, PanickyModel { panic_seed: 30_000 }).unwrap();
        let mut sink = WinnerSink::from_writer(Vec::new());
        let outcome = engine.run(&mut sink).unwrap();

        assert_eq!(outcome.aborted_workers, 1);
        assert!(!outcome.is_complete());
        assert!(outcome.seeds_tested < 100_000);
        assert_eq!(outcome.stop_reason, StopReason::Completed);

        // Sub-ranges are [0, 25k), [25k, 50k), [50k, 75k), [75k, 100k);
        // only the second is cut short at the crashing seed, the others
        // keep all their winners.
        let mut winners = parse_winners(&sink.into_writer());
        winners.sort_unstable();
        let expected: Vec<u32> = (0..100u32)
            .map(|k| k * 1000)
            .filter(|s| !(30_000..50_000).contains(s))
            .collect();
        assert_eq!(winners, expected);
    }

    /// Predicate that fails on every seed ending in 3.
    struct FlakyModel;

    impl SurvivalModel for FlakyModel {
        fn evaluate(&self, seed: u32) -> Result<bool, EvalError> {
            if seed % 10 == 3 {
                Err(EvalError {
                    seed,
                    message: "decode failed".into(),
                })
            } else {
                Ok(true)
            }
        }
    }

    #[test]
    fn test_faulty_seeds_counted_and_skipped_parallel() {
        let cfg = config(100_000, Model::default(), 4);
        let engine = ScanEngine::with_model(&cfg, FlakyModel).unwrap();
        let mut sink = WinnerSink::from_writer(Vec::new());
        let outcome = engine.run(&mut sink).unwrap();

        assert_eq!(outcome.seeds_tested, 100_000);
        assert_eq!(outcome.faults, 10_000);
        assert_eq!(outcome.winners_found, 90_000);
        assert!(outcome.is_complete());
    }

    #[test]
    fn test_faulty_seeds_counted_and_skipped_serial() {
        let cfg = config(10, Model::default(), 1);
        let engine = ScanEngine::with_model(&cfg, FlakyModel).unwrap();
        let mut sink = WinnerSink::from_writer(Vec::new());
        let outcome = engine.run(&mut sink).unwrap();

        assert_eq!(outcome.faults, 1);
        assert_eq!(outcome.winners_found, 9);
        let winners = parse_winners(&sink.into_writer());
        assert!(!winners.contains(&3));
    }

    /// Writer that errors once a byte budget is spent, standing in for a
    /// full disk.
    struct FailingWriter {
        budget: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if buf.len() > self.budget {
                Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "out of space",
                ))
            } else {
                self.budget -= buf.len();
                Ok(buf.len())
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_does_not_poison_engine() {
        let cfg = config(100_000, unkillable(), 4);
        let engine = ScanEngine::new(&cfg).unwrap();

        // Enough budget for the header, not for the winner stream.
        let mut sink = WinnerSink::from_writer(FailingWriter { budget: 512 });
        assert!(matches!(engine.run(&mut sink), Err(ScanError::Io(_))));

        // The same engine must still run to completion afterwards.
        let mut sink = WinnerSink::from_writer(Vec::new());
        let outcome = engine.run(&mut sink).unwrap();
        assert_eq!(outcome.stop_reason, StopReason::Completed);
        assert_eq!(outcome.seeds_tested, 100_000);
        assert_eq!(outcome.winners_found, 100_000);
    }

    #[test]
    fn test_phases_reach_closed() {
        use std::sync::Mutex;

        let cfg = config(100_000, certain_death(), 4);
        let engine = ScanEngine::new(&cfg).unwrap();
        let mut sink = WinnerSink::from_writer(Vec::new());

        let phases = Mutex::new(Vec::new());
        engine
            .run_with_callback(&mut sink, |p| phases.lock().unwrap().push(p.phase))
            .unwrap();

        let phases = phases.into_inner().unwrap();
        assert_eq!(phases.first(), Some(&ScanPhase::Partitioning));
        assert_eq!(phases.last(), Some(&ScanPhase::Closed));
        assert!(phases.contains(&ScanPhase::Running));
    }
}
