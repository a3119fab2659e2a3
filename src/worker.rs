//! Single-owner actor around `TelemetryAggregator`.
//!
//! The aggregator lives on its own thread and is only reachable through the
//! line channel, so any number of producers can feed it without locking.

use crate::engine::{AggregatorEvent, AggregatorStats, TelemetryAggregator};
use crate::error::TelemetryError;
use crossbeam_channel::{Receiver, Sender};
use std::io::BufRead;
use std::thread;
use tracing::{error, info};

pub struct AggregatorWorker {
    aggregator: TelemetryAggregator,
    lines: Receiver<String>,
    events: Sender<AggregatorEvent>,
}

impl AggregatorWorker {
    /// Runs until the line channel closes (returns final stats) or the first
    /// hard error (returns the error).
    pub fn spawn(
        aggregator: TelemetryAggregator,
        lines: Receiver<String>,
        events: Sender<AggregatorEvent>,
    ) -> std::io::Result<thread::JoinHandle<Result<AggregatorStats, TelemetryError>>> {
        thread::Builder::new()
            .name("telemetry-aggregator".into())
            .spawn(move || {
                AggregatorWorker {
                    aggregator,
                    lines,
                    events,
                }
                .run()
            })
    }

    fn run(mut self) -> Result<AggregatorStats, TelemetryError> {
        info!(variant = ?self.aggregator.variant(), "Aggregator worker active.");

        while let Ok(line) = self.lines.recv() {
            if let Err(e) = self.aggregator.ingest_line_into(&line, &mut self.events) {
                error!(error = %e, "Aggregator worker halted.");
                return Err(e);
            }
        }

        let stats = self.aggregator.stats().clone();
        info!(
            samples = stats.samples_accepted,
            cycles = stats.cycles_completed,
            dropped = stats.lines_dropped,
            "Aggregator worker stopped."
        );
        Ok(stats)
    }
}

/// Pump newline-terminated lines from `reader` into `lines`.
///
/// Invalid UTF-8 is decoded lossily so a corrupt line reaches the aggregator
/// and is dropped there. Returns the number of lines forwarded; stops early
/// if the receiving side hangs up.
pub fn forward_lines<R: BufRead>(mut reader: R, lines: &Sender<String>) -> std::io::Result<u64> {
    let mut buf = Vec::with_capacity(128);
    let mut forwarded = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(forwarded);
        }
        let line = String::from_utf8_lossy(&buf).into_owned();
        if lines.send(line).is_err() {
            return Ok(forwarded);
        }
        forwarded += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolVariant;
    use crossbeam_channel::{bounded, unbounded};
    use std::sync::{Arc, Mutex};

    const SAMPLE: &str = "120,80,40,512,0.5,-0.25,1.0,0.0,1.5,0.2,2.5,0.1\n";

    #[test]
    fn test_worker_drains_and_reports_stats() {
        let (line_tx, line_rx) = bounded::<String>(64);
        let (event_tx, event_rx) = unbounded();
        let aggregator = TelemetryAggregator::new(ProtocolVariant::Basic).unwrap();
        let handle = AggregatorWorker::spawn(aggregator, line_rx, event_tx).unwrap();

        let mut input = SAMPLE.repeat(10);
        input.push_str("garbage\n");
        input.push_str("640.0,2048\n");
        let forwarded = forward_lines(input.as_bytes(), &line_tx).unwrap();
        assert_eq!(forwarded, 12);
        drop(line_tx);

        let stats = handle.join().unwrap().unwrap();
        assert_eq!(stats.samples_accepted, 10);
        assert_eq!(stats.lines_dropped, 1);
        assert_eq!(stats.cycles_completed, 1);

        let events: Vec<AggregatorEvent> = event_rx.iter().collect();
        assert_eq!(events.len(), 11);
        assert!(matches!(events[10], AggregatorEvent::SummaryReady(_)));
    }

    #[test]
    fn test_worker_serializes_concurrent_producers() {
        let (line_tx, line_rx) = bounded::<String>(8);
        let (event_tx, event_rx) = unbounded();
        let aggregator = TelemetryAggregator::new(ProtocolVariant::Basic).unwrap();
        let handle = AggregatorWorker::spawn(aggregator, line_rx, event_tx).unwrap();

        // Producers take turns per cycle; lines within a cycle must stay together.
        let cycle_guard = Arc::new(Mutex::new(()));
        let producers: Vec<_> = [1024_i64, 2048]
            .into_iter()
            .map(|memory| {
                let tx = line_tx.clone();
                let guard = Arc::clone(&cycle_guard);
                thread::spawn(move || {
                    for _ in 0..5 {
                        let _turn = guard.lock().unwrap();
                        for _ in 0..10 {
                            tx.send(SAMPLE.to_string()).unwrap();
                        }
                        tx.send(format!("500.0,{memory}\n")).unwrap();
                    }
                })
            })
            .collect();
        drop(line_tx);
        for p in producers {
            p.join().unwrap();
        }

        let stats = handle.join().unwrap().unwrap();
        assert_eq!(stats.samples_accepted, 100);
        assert_eq!(stats.cycles_completed, 10);
        assert_eq!(stats.lines_dropped, 0);

        let memory: Vec<i64> = event_rx
            .iter()
            .filter_map(|e| match e {
                AggregatorEvent::SummaryReady(s) => Some(s.memory_usage()),
                _ => None,
            })
            .collect();
        assert_eq!(memory.iter().filter(|&&m| m == 1024).count(), 5);
        assert_eq!(memory.iter().filter(|&&m| m == 2048).count(), 5);
    }

    #[test]
    fn test_worker_stops_on_hard_error() {
        let (line_tx, line_rx) = unbounded::<String>();
        let (event_tx, _event_rx) = unbounded();
        let aggregator = TelemetryAggregator::new(ProtocolVariant::Basic).unwrap();
        let handle = AggregatorWorker::spawn(aggregator, line_rx, event_tx).unwrap();

        line_tx
            .send("-1,80,40,512,0.5,-0.25,1.0,0.0,1.5,0.2,2.5,0.1".to_string())
            .unwrap();

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(TelemetryError::OutOfDomainValue { .. })));
    }

    #[test]
    fn test_forward_lines_handles_invalid_utf8() {
        let (tx, rx) = unbounded();
        let bytes: &[u8] = b"1,2\n\xff\xfe\nlast-without-newline";
        assert_eq!(forward_lines(bytes, &tx).unwrap(), 3);
        let lines: Vec<String> = rx.try_iter().collect();
        assert_eq!(lines[0], "1,2\n");
        assert!(lines[1].contains('\u{FFFD}'));
        assert_eq!(lines[2], "last-without-newline");
    }
}
