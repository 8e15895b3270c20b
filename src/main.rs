//! seed-sieve CLI - Run seed scans from JSON configuration.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use seed_sieve::{
    engine::{ScanEngine, ScanPhase},
    schema::ScanConfig,
    sink::WinnerSink,
};

/// Console progress line roughly every this many seeds.
const PRINT_EVERY: u64 = 100_000;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json>", args[0]);
        eprintln!();
        eprintln!("Scan a 32-bit seed range for survivors of a check model.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to scan configuration file");
        eprintln!();
        eprintln!("Example configuration is printed with --example.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: ScanConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let engine = ScanEngine::new(&config).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let mut sink = WinnerSink::create(&config.output).unwrap_or_else(|e| {
        eprintln!("Error opening output {}: {}", config.output.display(), e);
        std::process::exit(1);
    });

    println!("Seed Sieve");
    println!("==========");
    println!(
        "Range: {} seeds from {} (stride {})",
        config.count, config.start_seed, config.stride
    );
    println!(
        "Model: {} checks, kill probability {}",
        config.model.num_checks, config.model.kill_probability
    );
    println!("Output: {}", config.output.display());
    println!();

    println!("Scanning...");
    let last_printed = AtomicU64::new(0);
    let outcome = engine
        .run_with_callback(&mut sink, |progress| {
            let printed = last_printed.load(Ordering::Relaxed);
            let due = progress.seeds_tested >= printed + PRINT_EVERY
                || progress.phase == ScanPhase::Closed;
            if due && progress.elapsed_seconds > 0.0 {
                last_printed.store(progress.seeds_tested, Ordering::Relaxed);
                println!(
                    "  {}/{} seeds, {} winners, {:.0} seeds/s",
                    progress.seeds_tested,
                    progress.total_seeds,
                    progress.winners_found,
                    progress.seeds_tested as f64 / progress.elapsed_seconds
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    println!();
    println!("Done ({:?}):", outcome.stop_reason);
    println!("  Seeds tested: {}", outcome.seeds_tested);
    println!("  Winners: {}", outcome.winners_found);
    if outcome.faults > 0 {
        println!("  Evaluation faults: {}", outcome.faults);
    }
    println!(
        "  Time: {:.2}s ({:.0} seeds/s, {} workers)",
        outcome.elapsed_seconds, outcome.seeds_per_second, outcome.worker_count
    );

    if outcome.aborted_workers > 0 {
        eprintln!(
            "Warning: {} worker(s) aborted; winner list is partial",
            outcome.aborted_workers
        );
        std::process::exit(2);
    }
}

fn print_example_config() {
    let config = ScanConfig::default();
    println!("Example configuration (config.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
}
