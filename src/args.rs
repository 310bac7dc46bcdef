use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;
use serde::Serialize;

use crate::database::Database;
use crate::logging::LogFormat;
use crate::workload::{LoadPattern, RequestDistribution, WorkloadType};

#[derive(Parser, Debug)]
#[command(name = "ycsb-riak", term_width = 0)]
pub struct Args {
    /// The database to benchmark
    #[arg(short, long, default_value = "riak")]
    pub database: Database,

    /// Which phase to execute
    #[arg(long, default_value = "both")]
    pub phase: Phase,

    /// YCSB workload type
    #[arg(long, default_value = "a")]
    pub workload: WorkloadType,

    /// Number of records to load initially
    #[arg(long, default_value = "1000")]
    pub record_count: u64,

    /// Number of operations to perform in the run phase
    #[arg(long, default_value = "1000")]
    pub operation_count: u64,

    /// Override the workload's proportion of read operations
    #[arg(long)]
    pub read_proportion: Option<f64>,

    /// Number of concurrent clients, each with its own connection
    #[arg(long, default_value = "1")]
    pub num_clients: u32,

    /// Table name prefixed to every key
    #[arg(long, default_value = "usertable")]
    pub table: String,

    /// Number of fields per record
    #[arg(long, default_value = "10")]
    pub field_count: usize,

    /// Field value length (N, MIN:MAX or MEAN~STDDEV)
    #[arg(long, default_value = "100")]
    pub field_length: String,

    /// Maximum number of records per scan
    #[arg(long, default_value = "100")]
    pub max_scan_length: usize,

    /// How key names are derived from key numbers
    #[arg(long, default_value = "sequential")]
    pub load_pattern: LoadPattern,

    /// Key popularity for reads, updates, scans and deletes
    #[arg(long)]
    pub request_distribution: Option<RequestDistribution>,

    /// Read every field rather than a single one
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub read_all_fields: bool,

    /// Update every field rather than a single one
    #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
    pub write_all_fields: bool,

    /// Binding property, repeatable (e.g. -p riak.host=10.0.0.1)
    #[arg(short = 'p', long = "property", value_name = "KEY=VALUE")]
    pub properties: Vec<String>,

    /// Properties file with one key=value per line
    #[arg(short = 'P', long = "properties-file", env = "YCSB_PROPERTIES")]
    pub properties_file: Option<PathBuf>,

    /// Write a JSON report of every phase to this path
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Tokio worker threads (defaults to the number of CPUs)
    #[arg(long)]
    pub worker_threads: Option<usize>,

    /// Log output format
    #[arg(long, default_value = "pretty")]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Load,
    Run,
    Both,
}

impl Phase {
    pub fn includes_load(&self) -> bool {
        matches!(self, Phase::Load | Phase::Both)
    }

    pub fn includes_run(&self) -> bool {
        matches!(self, Phase::Run | Phase::Both)
    }
}
