use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::info;

use crate::args::Phase;
use crate::database::ClientFactory;
use crate::metrics::{ConcurrentMetrics, Metrics, OperationStats};
use crate::workload::CoreWorkload;

/// Outcome of one phase across all clients.
pub struct PhaseResult {
    pub phase: Phase,
    pub elapsed: Duration,
    pub metrics: Metrics,
}

impl PhaseResult {
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.metrics.total_operations() as f64 / secs
        } else {
            0.0
        }
    }

    pub fn report(&self) -> PhaseReport {
        PhaseReport {
            phase: self.phase,
            runtime_ms: self.elapsed.as_millis() as u64,
            operations: self.metrics.total_operations(),
            failures: self.metrics.failures(),
            throughput_ops_sec: self.throughput(),
            operations_detail: self.metrics.stats(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub runtime_ms: u64,
    pub operations: u64,
    pub failures: u64,
    pub throughput_ops_sec: f64,
    pub operations_detail: Vec<OperationStats>,
}

/// Split `total` into `parts` contiguous `(start, len)` ranges, the first
/// ranges taking the remainder.
pub fn partition(total: u64, parts: u32) -> Vec<(u64, u64)> {
    let parts = parts.max(1) as u64;
    let base = total / parts;
    let extra = total % parts;

    let mut start = 0;
    (0..parts)
        .map(|i| {
            let len = base + u64::from(i < extra);
            let range = (start, len);
            start += len;
            range
        })
        .collect()
}

/// Insert `record_count` records, each client loading its own key range.
pub async fn run_load(
    factory: Arc<dyn ClientFactory>,
    workload: Arc<CoreWorkload>,
    num_clients: u32,
) -> Result<PhaseResult> {
    let record_count = workload.config().record_count;
    info!(record_count, num_clients, "starting load phase");

    let metrics = ConcurrentMetrics::default();
    let started = Instant::now();
    // Dropping the set aborts workers still running when one fails.
    let mut workers = JoinSet::new();

    for (client_id, (start, len)) in partition(record_count, num_clients).into_iter().enumerate() {
        let factory = factory.clone();
        let workload = workload.clone();
        let metrics = metrics.clone();

        workers.spawn(async move {
            let client = factory
                .create()
                .await
                .with_context(|| format!("client {} failed to connect", client_id))?;
            let mut rng = StdRng::from_entropy();

            for (i, keynum) in (start..start + len).enumerate() {
                if i % 1000 == 0 && i > 0 {
                    info!(client_id, done = i, total = len, "load progress");
                }
                workload
                    .do_insert(client.as_ref(), keynum, &mut rng, &metrics)
                    .await;
            }
            Ok::<_, anyhow::Error>(())
        });
    }

    while let Some(joined) = workers.join_next().await {
        joined??;
    }

    Ok(PhaseResult {
        phase: Phase::Load,
        elapsed: started.elapsed(),
        metrics: metrics.get_metrics().await,
    })
}

/// Execute `operation_count` transactions spread over the clients.
pub async fn run_transactions(
    factory: Arc<dyn ClientFactory>,
    workload: Arc<CoreWorkload>,
    num_clients: u32,
) -> Result<PhaseResult> {
    let operation_count = workload.config().operation_count;
    info!(operation_count, num_clients, "starting run phase");

    let metrics = ConcurrentMetrics::default();
    let started = Instant::now();
    let mut workers = JoinSet::new();

    for (client_id, (_, ops)) in partition(operation_count, num_clients).into_iter().enumerate() {
        let factory = factory.clone();
        let workload = workload.clone();
        let metrics = metrics.clone();

        workers.spawn(async move {
            let client = factory
                .create()
                .await
                .with_context(|| format!("client {} failed to connect", client_id))?;
            let mut rng = StdRng::from_entropy();

            for i in 0..ops {
                if i % 1000 == 0 && i > 0 {
                    info!(
                        client_id,
                        done = i,
                        total = ops,
                        "run progress {:.1}%",
                        (i as f64 / ops as f64) * 100.0
                    );
                }
                workload
                    .do_transaction(client.as_ref(), &mut rng, &metrics)
                    .await;
            }
            Ok::<_, anyhow::Error>(())
        });
    }

    while let Some(joined) = workers.join_next().await {
        joined??;
    }

    Ok(PhaseResult {
        phase: Phase::Run,
        elapsed: started.elapsed(),
        metrics: metrics.get_metrics().await,
    })
}
