//! Result sink - durable, line-oriented winner output.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::schema::{KillRule, Model, ScanRequest};

/// Sentinel written when a finished scan found no winner.
const NO_WINNERS_SENTINEL: &str = "# no winners found";

/// Append-only winner stream.
///
/// Writes a `#`-prefixed human-readable header once, then one decimal seed
/// per line in arrival order. Arrival order across workers is not numeric
/// order and is not meant to be; the contract is that every winner appears
/// exactly once. Memory use grows only with the number of winners buffered
/// by the underlying writer, never with the number of seeds scanned.
pub struct WinnerSink<W: Write> {
    writer: W,
    winners: u64,
}

impl WinnerSink<BufWriter<File>> {
    /// Create a sink writing to a file, truncating any existing contents.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }
}

impl<W: Write> WinnerSink<W> {
    /// Wrap an arbitrary writer.
    pub fn from_writer(writer: W) -> Self {
        Self { writer, winners: 0 }
    }

    /// Write the run header: model, timestamp, requested range.
    pub fn write_header(&mut self, model: &Model, request: &ScanRequest) -> io::Result<()> {
        let rule = match model.kill_rule {
            KillRule::Below => "below",
            KillRule::AtOrBelow => "at_or_below",
        };
        writeln!(self.writer, "# seed-sieve winner list")?;
        writeln!(
            self.writer,
            "# generated: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(
            self.writer,
            "# model: checks={} kill_probability={} kill_rule={}",
            model.num_checks, model.kill_probability, rule
        )?;
        writeln!(
            self.writer,
            "# requested: start_seed={} count={} stride={}",
            request.start_seed, request.count, request.stride
        )?;
        Ok(())
    }

    /// Append one winner seed.
    pub fn append_winner(&mut self, seed: u32) -> io::Result<()> {
        writeln!(self.writer, "{}", seed)?;
        self.winners += 1;
        Ok(())
    }

    /// Winners written so far.
    pub fn winners_written(&self) -> u64 {
        self.winners
    }

    /// Write the seeds-tested trailer (and the sentinel when no winner was
    /// found), then flush. Call once, after the last worker has finished.
    pub fn finish(&mut self, seeds_tested: u64) -> io::Result<()> {
        if self.winners == 0 {
            writeln!(self.writer, "{}", NO_WINNERS_SENTINEL)?;
        }
        writeln!(self.writer, "# seeds tested: {}", seeds_tested)?;
        self.writer.flush()
    }

    /// Unwrap the underlying writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Model;

    fn request() -> ScanRequest {
        ScanRequest {
            start_seed: 7,
            count: 100,
            stride: 2,
        }
    }

    fn render(winners: &[u32], seeds_tested: u64) -> String {
        let mut sink = WinnerSink::from_writer(Vec::new());
        sink.write_header(&Model::default(), &request()).unwrap();
        for &w in winners {
            sink.append_winner(w).unwrap();
        }
        sink.finish(seeds_tested).unwrap();
        String::from_utf8(sink.into_writer()).unwrap()
    }

    #[test]
    fn test_header_lines_are_comments() {
        let out = render(&[], 100);
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("# seed-sieve winner list"));
        assert!(out.lines().take(4).all(|l| l.starts_with('#')));
        assert!(out.contains("checks=35"));
        assert!(out.contains("start_seed=7 count=100 stride=2"));
    }

    #[test]
    fn test_winners_one_per_line_in_arrival_order() {
        let out = render(&[42, 7, 99], 100);
        let seeds: Vec<u32> = out
            .lines()
            .filter(|l| !l.starts_with('#'))
            .map(|l| l.parse().unwrap())
            .collect();
        assert_eq!(seeds, vec![42, 7, 99]);
        assert!(!out.contains("no winners"));
    }

    #[test]
    fn test_sentinel_when_empty() {
        let out = render(&[], 100);
        assert!(out.contains(NO_WINNERS_SENTINEL));
        assert!(out.contains("# seeds tested: 100"));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("winners.txt");

        let mut sink = WinnerSink::create(&path).unwrap();
        sink.write_header(&Model::default(), &request()).unwrap();
        sink.append_winner(123456789).unwrap();
        sink.finish(100).unwrap();
        drop(sink);

        let out = std::fs::read_to_string(&path).unwrap();
        assert!(out.lines().any(|l| l == "123456789"));
        assert!(out.ends_with("# seeds tested: 100\n"));
    }
}
