use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::client::Status;
use crate::workload::Operation;

#[derive(Default, Clone)]
pub struct Metrics {
    latencies: BTreeMap<Operation, Vec<Duration>>,
    statuses: BTreeMap<Operation, BTreeMap<Status, u64>>,
}

#[derive(Default, Clone)]
pub struct ConcurrentMetrics {
    metrics: Arc<Mutex<Metrics>>,
}

impl ConcurrentMetrics {
    pub async fn record(&self, op: Operation, status: Status, duration: Duration) {
        self.metrics.lock().await.record(op, status, duration);
    }

    pub async fn get_metrics(&self) -> Metrics {
        self.metrics.lock().await.clone()
    }
}

/// Latency summary of one operation type, in microseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationStats {
    pub operation: Operation,
    pub count: u64,
    pub min_us: f64,
    pub max_us: f64,
    pub avg_us: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub statuses: BTreeMap<Status, u64>,
}

impl Metrics {
    pub fn record(&mut self, op: Operation, status: Status, duration: Duration) {
        self.latencies.entry(op).or_default().push(duration);
        *self
            .statuses
            .entry(op)
            .or_default()
            .entry(status)
            .or_insert(0) += 1;
    }

    pub fn count(&self, op: Operation) -> u64 {
        self.latencies.get(&op).map_or(0, |l| l.len() as u64)
    }

    pub fn total_operations(&self) -> u64 {
        self.latencies.values().map(|l| l.len() as u64).sum()
    }

    pub fn status_count(&self, op: Operation, status: Status) -> u64 {
        self.statuses
            .get(&op)
            .and_then(|s| s.get(&status))
            .copied()
            .unwrap_or(0)
    }

    pub fn failures(&self) -> u64 {
        self.statuses
            .values()
            .flat_map(|s| s.iter())
            .filter(|(status, _)| !status.is_ok())
            .map(|(_, count)| count)
            .sum()
    }

    pub fn stats(&self) -> Vec<OperationStats> {
        self.latencies
            .iter()
            .filter(|(_, latencies)| !latencies.is_empty())
            .map(|(op, latencies)| {
                let mut stats = Self::calculate_stats(*op, latencies);
                stats.statuses = self.statuses.get(op).cloned().unwrap_or_default();
                stats
            })
            .collect()
    }

    fn format_duration(nanos: f64) -> String {
        if nanos < 1_000.0 {
            format!("{:.2} ns", nanos)
        } else if nanos < 1_000_000.0 {
            format!("{:.2} µs", nanos / 1_000.0)
        } else if nanos < 1_000_000_000.0 {
            format!("{:.2} ms", nanos / 1_000_000.0)
        } else {
            format!("{:.2} s", nanos / 1_000_000_000.0)
        }
    }

    fn calculate_stats(op: Operation, latencies: &[Duration]) -> OperationStats {
        let count = latencies.len() as u64;
        let micros = |d: &Duration| d.as_nanos() as f64 / 1_000.0;

        // Streaming mean avoids overflow on long runs
        let mut avg = 0.0;
        for (i, d) in latencies.iter().enumerate() {
            avg += (micros(d) - avg) / (i + 1) as f64;
        }

        let mut sorted: Vec<_> = latencies.to_vec();
        sorted.sort_unstable();
        let at = |pct: u64| micros(&sorted[((count - 1) * pct / 100) as usize]);

        OperationStats {
            operation: op,
            count,
            min_us: micros(&sorted[0]),
            max_us: micros(&sorted[sorted.len() - 1]),
            avg_us: avg,
            p50_us: at(50),
            p95_us: at(95),
            p99_us: at(99),
            statuses: BTreeMap::new(),
        }
    }
}

impl Display for Metrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let us = |v: f64| Self::format_duration(v * 1_000.0);

        writeln!(f, "\nDetailed Latency Statistics:")?;
        writeln!(
            f,
            "{:<20} {:<10} {:<12} {:<12} {:<12} {:<12} {:<12} {:<12}",
            "Operation", "Count", "Min", "Max", "Avg", "Median", "P95", "P99"
        )?;
        writeln!(f, "{:-<110}", "")?;

        let stats = self.stats();
        for s in &stats {
            writeln!(
                f,
                "{:<20} {:<10} {:<12} {:<12} {:<12} {:<12} {:<12} {:<12}",
                s.operation.name(),
                s.count,
                us(s.min_us),
                us(s.max_us),
                us(s.avg_us),
                us(s.p50_us),
                us(s.p95_us),
                us(s.p99_us)
            )?;
        }

        writeln!(f)?;
        for s in &stats {
            for (status, count) in &s.statuses {
                writeln!(f, "[{}], Return={}, {}", s.operation.name(), status, count)?;
            }
        }

        Ok(())
    }
}
