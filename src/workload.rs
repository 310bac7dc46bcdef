use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{bail, Result};
use clap::ValueEnum;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::{Normal, Zipf};
use serde::Serialize;

use crate::client::{Client, Record, Status};
use crate::metrics::ConcurrentMetrics;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkloadType {
    A, // 50% read, 50% update
    B, // 95% read, 5% update
    C, // 100% read
    D, // 95% read, 5% insert latest
    E, // 95% scan, 5% insert
    F, // 50% read, 50% read-modify-write

    /// 25% each of insert, read, update and delete
    Mixed,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadPattern {
    /// Keys are `user0`, `user1`, ... in insertion order
    Sequential,
    /// Key numbers are hashed so inserts scatter across the key space
    Random,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestDistribution {
    Uniform,
    Zipfian,
    /// Zipfian skewed towards the most recently inserted keys
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Operation {
    Insert,
    Read,
    Update,
    Scan,
    ReadModifyWrite,
    Delete,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Read => "READ",
            Operation::Update => "UPDATE",
            Operation::Scan => "SCAN",
            Operation::ReadModifyWrite => "READ-MODIFY-WRITE",
            Operation::Delete => "DELETE",
        }
    }
}

/// Proportions of each transaction type. They need not sum to one; the
/// chooser normalises by their total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationMix {
    pub read: f64,
    pub update: f64,
    pub insert: f64,
    pub scan: f64,
    pub read_modify_write: f64,
    pub delete: f64,
}

impl OperationMix {
    pub fn for_workload(workload: WorkloadType) -> Self {
        let none = Self {
            read: 0.0,
            update: 0.0,
            insert: 0.0,
            scan: 0.0,
            read_modify_write: 0.0,
            delete: 0.0,
        };
        match workload {
            WorkloadType::A => Self {
                read: 0.5,
                update: 0.5,
                ..none
            },
            WorkloadType::B => Self {
                read: 0.95,
                update: 0.05,
                ..none
            },
            WorkloadType::C => Self { read: 1.0, ..none },
            WorkloadType::D => Self {
                read: 0.95,
                insert: 0.05,
                ..none
            },
            WorkloadType::E => Self {
                scan: 0.95,
                insert: 0.05,
                ..none
            },
            WorkloadType::F => Self {
                read: 0.5,
                read_modify_write: 0.5,
                ..none
            },
            WorkloadType::Mixed => Self {
                insert: 0.25,
                read: 0.25,
                update: 0.25,
                delete: 0.25,
                ..none
            },
        }
    }

    /// Set the read share and give the rest to the workload's write operation.
    pub fn with_read_proportion(mut self, read: f64) -> Self {
        let others = self.update + self.insert + self.scan + self.read_modify_write + self.delete;
        let remaining = (1.0 - read).max(0.0);
        if others > 0.0 {
            let scale = remaining / others;
            self.update *= scale;
            self.insert *= scale;
            self.scan *= scale;
            self.read_modify_write *= scale;
            self.delete *= scale;
        }
        self.read = read;
        self
    }

    fn entries(&self) -> [(Operation, f64); 6] {
        [
            (Operation::Read, self.read),
            (Operation::Update, self.update),
            (Operation::Insert, self.insert),
            (Operation::Scan, self.scan),
            (Operation::ReadModifyWrite, self.read_modify_write),
            (Operation::Delete, self.delete),
        ]
    }

    pub fn total(&self) -> f64 {
        self.entries().iter().map(|(_, p)| p).sum()
    }

    /// Map `sample` in `[0, 1)` onto an operation.
    pub fn choose(&self, sample: f64) -> Operation {
        let mut remaining = sample * self.total();
        let mut last = Operation::Read;
        for (op, proportion) in self.entries() {
            if proportion <= 0.0 {
                continue;
            }
            if remaining < proportion {
                return op;
            }
            remaining -= proportion;
            last = op;
        }
        last
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SizeDistribution {
    Fixed(usize),
    Uniform { min: usize, max: usize },
    Gaussian { mean: f64, std_dev: f64 },
}

impl SizeDistribution {
    /// `N`, `MIN:MAX` or `MEAN~STDDEV`.
    pub fn parse(spec: &str) -> Result<Self> {
        if let Some((mean, std_dev)) = spec.split_once('~') {
            let mean: f64 = mean.trim().parse()?;
            let std_dev: f64 = std_dev.trim().parse()?;
            if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
                bail!("invalid gaussian size `{}`", spec);
            }
            Ok(SizeDistribution::Gaussian { mean, std_dev })
        } else if let Some((min, max)) = spec.split_once(':') {
            let min: usize = min.trim().parse()?;
            let max: usize = max.trim().parse()?;
            if min > max {
                bail!("size range `{}` has min above max", spec);
            }
            Ok(SizeDistribution::Uniform { min, max })
        } else {
            Ok(SizeDistribution::Fixed(spec.trim().parse()?))
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match self {
            SizeDistribution::Fixed(size) => *size,
            SizeDistribution::Uniform { min, max } => {
                Uniform::new_inclusive(*min, *max).sample(rng)
            }
            SizeDistribution::Gaussian { mean, std_dev } => Normal::new(*mean, *std_dev)
                .map(|normal| normal.sample(rng))
                .unwrap_or(*mean)
                .round()
                .max(1.0) as usize,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkloadConfig {
    pub table: String,
    pub record_count: u64,
    pub operation_count: u64,
    pub field_count: usize,
    pub field_length: SizeDistribution,
    pub max_scan_length: usize,
    pub read_all_fields: bool,
    pub write_all_fields: bool,
    pub mix: OperationMix,
    pub request_distribution: RequestDistribution,
    pub load_pattern: LoadPattern,
}

const ZIPFIAN_CONSTANT: f64 = 0.99;

// FNV-1a over the eight little-endian bytes of `value`.
fn fnv_hash64(value: u64) -> u64 {
    const OFFSET_BASIS: u64 = 0xCBF2_9CE4_8422_2325;
    const PRIME: u64 = 1_099_511_628_211;

    let mut hash = OFFSET_BASIS;
    let mut value = value;
    for _ in 0..8 {
        hash ^= value & 0xff;
        hash = hash.wrapping_mul(PRIME);
        value >>= 8;
    }
    (hash as i64).wrapping_abs() as u64
}

fn random_alphanumeric<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..62);
            match idx {
                0..=9 => (b'0' + idx) as char,
                10..=35 => (b'A' + (idx - 10)) as char,
                _ => (b'a' + (idx - 36)) as char,
            }
        })
        .collect()
}

/// Generates keys, records and the operation stream shared by all workers.
pub struct CoreWorkload {
    config: WorkloadConfig,
    field_names: Vec<String>,
    /// Next key number handed to a run-phase insert.
    insert_sequence: AtomicU64,
}

impl CoreWorkload {
    pub fn new(config: WorkloadConfig) -> Result<Self> {
        if config.field_count == 0 {
            bail!("field count must be at least 1");
        }
        if let Some((op, p)) = config
            .mix
            .entries()
            .into_iter()
            .find(|(_, p)| !p.is_finite() || *p < 0.0)
        {
            bail!("invalid {:?} proportion {}", op, p);
        }
        if config.mix.total() <= 0.0 {
            bail!("operation proportions sum to zero");
        }

        let field_names = (0..config.field_count)
            .map(|i| format!("field{}", i))
            .collect();
        let insert_sequence = AtomicU64::new(config.record_count);

        Ok(Self {
            config,
            field_names,
            insert_sequence,
        })
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    pub fn build_key_name(&self, keynum: u64) -> String {
        let keynum = match self.config.load_pattern {
            LoadPattern::Sequential => keynum,
            LoadPattern::Random => fnv_hash64(keynum),
        };
        format!("user{}", keynum)
    }

    /// A full record, one value per field.
    pub fn build_values<R: Rng + ?Sized>(&self, rng: &mut R) -> Record {
        self.field_names
            .iter()
            .map(|name| {
                let len = self.config.field_length.sample(rng);
                (name.clone(), random_alphanumeric(rng, len))
            })
            .collect()
    }

    /// The fields an update writes: all of them or a single random one.
    pub fn build_update<R: Rng + ?Sized>(&self, rng: &mut R) -> Record {
        if self.config.write_all_fields {
            return self.build_values(rng);
        }
        let name = &self.field_names[rng.gen_range(0..self.field_names.len())];
        let len = self.config.field_length.sample(rng);
        Record::from([(name.clone(), random_alphanumeric(rng, len))])
    }

    /// `None` asks for every field.
    pub fn read_fields<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<HashSet<String>> {
        if self.config.read_all_fields {
            return None;
        }
        let name = &self.field_names[rng.gen_range(0..self.field_names.len())];
        Some(HashSet::from([name.clone()]))
    }

    pub fn choose_operation<R: Rng + ?Sized>(&self, rng: &mut R) -> Operation {
        self.config.mix.choose(rng.gen::<f64>())
    }

    /// Pick an existing key number according to the request distribution.
    pub fn next_keynum<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let inserted = self.insert_sequence.load(Ordering::Relaxed).max(1);
        match self.config.request_distribution {
            RequestDistribution::Uniform => rng.gen_range(0..inserted),
            RequestDistribution::Zipfian => Self::zipf_rank(rng, inserted),
            RequestDistribution::Latest => inserted - 1 - Self::zipf_rank(rng, inserted),
        }
    }

    // Zero-based rank in `[0, n)`, rank 0 the most popular.
    fn zipf_rank<R: Rng + ?Sized>(rng: &mut R, n: u64) -> u64 {
        match Zipf::new(n, ZIPFIAN_CONSTANT) {
            Ok(zipf) => (zipf.sample(rng) as u64).clamp(1, n) - 1,
            Err(_) => rng.gen_range(0..n),
        }
    }

    /// Insert the record for `keynum` during the load phase.
    pub async fn do_insert<R: Rng + ?Sized + Send>(
        &self,
        client: &dyn Client,
        keynum: u64,
        rng: &mut R,
        metrics: &ConcurrentMetrics,
    ) -> Status {
        let key = self.build_key_name(keynum);
        let values = self.build_values(rng);

        let start = Instant::now();
        let result = client.insert(&self.config.table, &key, &values).await;
        let status = Status::from(&result);
        metrics
            .record(Operation::Insert, status, start.elapsed())
            .await;
        status
    }

    /// Run one operation of the transaction mix.
    pub async fn do_transaction<R: Rng + ?Sized + Send>(
        &self,
        client: &dyn Client,
        rng: &mut R,
        metrics: &ConcurrentMetrics,
    ) -> (Operation, Status) {
        let op = self.choose_operation(rng);
        let table = self.config.table.as_str();
        let start = Instant::now();

        let status = match op {
            Operation::Read => {
                let key = self.build_key_name(self.next_keynum(rng));
                let fields = self.read_fields(rng);
                Status::from(&client.read(table, &key, fields.as_ref()).await)
            }
            Operation::Update => {
                let key = self.build_key_name(self.next_keynum(rng));
                let values = self.build_update(rng);
                Status::from(&client.update(table, &key, &values).await)
            }
            Operation::Insert => {
                let keynum = self.insert_sequence.fetch_add(1, Ordering::Relaxed);
                let key = self.build_key_name(keynum);
                let values = self.build_values(rng);
                Status::from(&client.insert(table, &key, &values).await)
            }
            Operation::Scan => {
                let key = self.build_key_name(self.next_keynum(rng));
                let length = rng.gen_range(1..=self.config.max_scan_length.max(1));
                let fields = self.read_fields(rng);
                Status::from(&client.scan(table, &key, length, fields.as_ref()).await)
            }
            Operation::ReadModifyWrite => {
                let key = self.build_key_name(self.next_keynum(rng));
                let fields = self.read_fields(rng);
                let values = self.build_update(rng);
                match client.read(table, &key, fields.as_ref()).await {
                    Ok(_) => Status::from(&client.update(table, &key, &values).await),
                    Err(err) => Status::from(&err),
                }
            }
            Operation::Delete => {
                let key = self.build_key_name(self.next_keynum(rng));
                Status::from(&client.delete(table, &key).await)
            }
        };

        metrics.record(op, status, start.elapsed()).await;
        (op, status)
    }
}
