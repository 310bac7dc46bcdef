mod args;
mod client;
mod database;
mod logging;
mod metrics;
mod properties;
mod riak;
mod runner;
mod workload;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::error;

use crate::args::Args;
use crate::database::{ClientFactory, Database, DatabaseFactory};
use crate::properties::Properties;
use crate::runner::{PhaseReport, PhaseResult};
use crate::workload::{CoreWorkload, OperationMix, SizeDistribution, WorkloadConfig, WorkloadType};

#[derive(Serialize)]
struct BenchmarkReport {
    database: Database,
    workload: WorkloadType,
    started_at: String,
    config: WorkloadConfig,
    phases: Vec<PhaseReport>,
}

fn main() {
    let args = Args::parse();
    logging::init(args.log_format);

    let runtime = match configure_runtime(&args) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_bench(&args)) {
        error!(error = ?e, "benchmark failed");
        std::process::exit(1);
    }
}

fn configure_runtime(args: &Args) -> std::io::Result<tokio::runtime::Runtime> {
    let worker_threads = args.worker_threads.unwrap_or_else(num_cpus::get).max(1);

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
}

fn load_properties(args: &Args) -> Result<Properties> {
    let mut props = match &args.properties_file {
        Some(path) => Properties::load(path)?,
        None => Properties::new(),
    };
    let mut overrides = Properties::new();
    for pair in &args.properties {
        overrides.set_pair(pair)?;
    }
    props.merge(overrides);
    Ok(props)
}

fn create_workload_config(args: &Args) -> Result<WorkloadConfig> {
    let field_length = SizeDistribution::parse(&args.field_length)
        .with_context(|| format!("invalid --field-length `{}`", args.field_length))?;

    let mut mix = OperationMix::for_workload(args.workload);
    if let Some(read) = args.read_proportion {
        if !(0.0..=1.0).contains(&read) {
            bail!("--read-proportion must be between 0 and 1, got {}", read);
        }
        mix = mix.with_read_proportion(read);
    }

    let request_distribution = args.request_distribution.unwrap_or(match args.workload {
        WorkloadType::D => workload::RequestDistribution::Latest,
        WorkloadType::Mixed => workload::RequestDistribution::Uniform,
        _ => workload::RequestDistribution::Zipfian,
    });

    Ok(WorkloadConfig {
        table: args.table.clone(),
        record_count: args.record_count,
        operation_count: args.operation_count,
        field_count: args.field_count,
        field_length,
        max_scan_length: args.max_scan_length,
        read_all_fields: args.read_all_fields,
        write_all_fields: args.write_all_fields,
        mix,
        request_distribution,
        load_pattern: args.load_pattern,
    })
}

fn print_phase(result: &PhaseResult) {
    println!("\n{:?} phase complete", result.phase);
    println!("Runtime: {:.3} s", result.elapsed.as_secs_f64());
    println!("Total Operations: {}", result.metrics.total_operations());
    println!("Throughput: {:.2} ops/sec", result.throughput());
    println!("{}", result.metrics);
}

async fn run_bench(args: &Args) -> Result<()> {
    let started_at = chrono::Utc::now();
    let properties = load_properties(args)?;
    let config = create_workload_config(args)?;
    let workload = Arc::new(CoreWorkload::new(config.clone())?);
    let factory: Arc<dyn ClientFactory> = Arc::new(DatabaseFactory::new(args.database, properties));

    println!(
        "Starting {:?} workload {:?} against {:?} with {} clients",
        args.phase, args.workload, args.database, args.num_clients
    );

    let mut phases = Vec::new();
    if args.phase.includes_load() {
        let result = runner::run_load(factory.clone(), workload.clone(), args.num_clients).await?;
        print_phase(&result);
        phases.push(result.report());
    }
    if args.phase.includes_run() {
        let result = runner::run_transactions(factory, workload, args.num_clients).await?;
        print_phase(&result);
        phases.push(result.report());
    }

    if let Some(path) = &args.export {
        let report = BenchmarkReport {
            database: args.database,
            workload: args.workload,
            started_at: started_at.to_rfc3339(),
            config,
            phases,
        };
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        serde_json::to_writer_pretty(file, &report)?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}
