//! Benchmark Driver
//!
//! Runs many trials per configuration point on a worker pool and stops each point adaptively. Workers claim
//! batches of trials from a shared tally and commit their outcomes back to it; a point stops claiming new batches
//! once `max_trials` trials are claimed, or once at least `min_trials` trials are executed and either
//! `target_errors` failures are observed or the time budget is spent. Batches already claimed always finish.
//!
//! Rows are produced in the order of the input points.
//!

use super::code::{BoundaryCondition, CodeVariant, FailureCriterion, Lattice};
use super::decoder::DecoderType;
use super::decoding_graph::{DecodingGraph, WeightFunction};
use super::error::{ConfigError, SimulationError};
use super::noise::NoiseModel;
use super::simulator::TrialRunner;
use super::util::*;
use crate::chrono::Local;
use crate::parking_lot::Mutex;
use crate::rand_xoshiro::rand_core::SeedableRng;
use pbr::ProgressBar;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Stderr, Write};
use std::sync::Arc;
use std::time::Instant;

/// the first line of the result table
pub const RESULT_HEADER: &str = "# format: <p> <d> <T> <total_trials> <failures> <error_rate> <relative_error> <confidence_interval_95_percent> <bias_eta> <pe> <status>";

/// seeds of different configuration points never overlap as long as there are fewer workers than this
pub const POINT_SEED_STRIDE: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkPoint {
    pub distance: usize,
    pub p: f64,
    pub bias_eta: f64,
    /// noisy measurement rounds `T`, 0 for code capacity
    pub noisy_measurements: usize,
    /// erasure probability of each data qubit
    #[serde(default)]
    pub pe: f64,
}

impl BenchmarkPoint {
    pub fn new(distance: usize, p: f64, bias_eta: f64, noisy_measurements: usize) -> Self {
        Self {
            distance,
            p,
            bias_eta,
            noisy_measurements,
            pe: 0.,
        }
    }

    pub fn with_erasure_rate(mut self, pe: f64) -> Self {
        self.pe = pe;
        self
    }

    /// the cartesian product ordered by bias, then distance, then probability; `noisy_measurements[k]` is the
    /// number of noisy rounds of `distances[k]` and `pes[k]` is the erasure probability paired with `ps[k]`
    pub fn grid(
        distances: &[usize],
        ps: &[f64],
        pes: &[f64],
        bias_etas: &[f64],
        noisy_measurements: &[usize],
    ) -> Result<Vec<Self>, ConfigError> {
        if noisy_measurements.len() != distances.len() {
            return Err(ConfigError::MismatchedLength {
                name: "noisy_measurements",
                expected: distances.len(),
                actual: noisy_measurements.len(),
            });
        }
        if pes.len() != ps.len() {
            return Err(ConfigError::MismatchedLength {
                name: "pes",
                expected: ps.len(),
                actual: pes.len(),
            });
        }
        let mut points = Vec::with_capacity(bias_etas.len() * distances.len() * ps.len());
        for &bias_eta in bias_etas.iter() {
            for (&distance, &rounds) in distances.iter().zip(noisy_measurements.iter()) {
                for (&p, &pe) in ps.iter().zip(pes.iter()) {
                    points.push(Self::new(distance, p, bias_eta, rounds).with_erasure_rate(pe));
                }
            }
        }
        Ok(points)
    }
}

impl std::fmt::Display for BenchmarkPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "d={} p={} eta={} T={}",
            self.distance, self.p, self.bias_eta, self.noisy_measurements
        )?;
        if self.pe > 0. {
            write!(f, " pe={}", self.pe)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkConfig {
    /// run at least this number of trials per point
    #[serde(default = "benchmark_default_configs::min_trials")]
    pub min_trials: usize,
    /// never run more than this number of trials per point
    #[serde(default = "benchmark_default_configs::max_trials")]
    pub max_trials: usize,
    /// stop a point once this number of logical failures is observed
    #[serde(default = "benchmark_default_configs::target_errors")]
    pub target_errors: usize,
    /// number of worker threads, 0 for automatic
    #[serde(default = "benchmark_default_configs::workers")]
    pub workers: usize,
    /// trials claimed by a worker at a time
    #[serde(default = "benchmark_default_configs::batch_size")]
    pub batch_size: usize,
    /// base seed, randomly chosen when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// seconds per point, checked only after `min_trials`
    #[serde(default)]
    pub time_budget: Option<f64>,
    #[serde(default = "benchmark_default_configs::code_variant")]
    pub code_variant: CodeVariant,
    #[serde(default = "benchmark_default_configs::boundary")]
    pub boundary: BoundaryCondition,
    #[serde(default = "benchmark_default_configs::decoder")]
    pub decoder: DecoderType,
    #[serde(default = "benchmark_default_configs::decoder_config")]
    pub decoder_config: serde_json::Value,
    #[serde(default)]
    pub weight_function: WeightFunction,
    #[serde(default = "benchmark_default_configs::max_half_weight")]
    pub max_half_weight: Weight,
    /// measurement error rate relative to `p`
    #[serde(default = "benchmark_default_configs::measurement_error_scale")]
    pub measurement_error_scale: f64,
    #[serde(default)]
    pub shallow_error_on_bottom: bool,
    #[serde(default)]
    pub no_y_error: bool,
    #[serde(default)]
    pub failure_criterion: FailureCriterion,
    #[serde(default)]
    pub disable_progress_bar: bool,
    /// JSON lines file recording the configuration and per-point statistics
    #[serde(default)]
    pub log_runtime_statistics: Option<String>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        serde_json::from_value(json!({})).unwrap()
    }
}

pub mod benchmark_default_configs {
    use super::*;
    pub fn min_trials() -> usize {
        0
    }
    pub fn max_trials() -> usize {
        100_000_000
    }
    pub fn target_errors() -> usize {
        10_000
    }
    pub fn workers() -> usize {
        0
    }
    pub fn batch_size() -> usize {
        100
    }
    pub fn code_variant() -> CodeVariant {
        CodeVariant::Css
    }
    pub fn boundary() -> BoundaryCondition {
        BoundaryCondition::Planar
    }
    pub fn decoder() -> DecoderType {
        DecoderType::Mwpm
    }
    pub fn decoder_config() -> serde_json::Value {
        json!({})
    }
    pub fn max_half_weight() -> Weight {
        500
    }
    pub fn measurement_error_scale() -> f64 {
        1.
    }
}

impl BenchmarkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_trials == 0 || self.min_trials > self.max_trials {
            return Err(ConfigError::InvalidTrialBudget {
                min_trials: self.min_trials,
                max_trials: self.max_trials,
            });
        }
        if self.max_half_weight <= 0 {
            return Err(ConfigError::InvalidMaxHalfWeight(self.max_half_weight));
        }
        Ok(())
    }

    pub fn noise_model(&self, point: &BenchmarkPoint) -> Result<NoiseModel, ConfigError> {
        let noise_model = NoiseModel::new(point.p, point.bias_eta)?
            .with_noisy_measurements(point.noisy_measurements)
            .with_measurement_error_scale(self.measurement_error_scale)
            .with_shallow_error_on_bottom(self.shallow_error_on_bottom)
            .with_no_y_error(self.no_y_error)
            .with_erasure_rate(point.pe);
        noise_model.validate()?;
        Ok(noise_model)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowStatus {
    Ok,
    /// the point stopped before observing `target_errors` failures
    Insufficient,
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Insufficient => write!(f, "insufficient"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub point: BenchmarkPoint,
    pub total_trials: usize,
    pub failures: usize,
    pub error_rate: f64,
    /// `1 / sqrt(failures)`, the relative standard deviation of a Poisson count
    pub relative_error: f64,
    pub confidence_interval_95_percent: f64,
    pub status: RowStatus,
}

impl ResultRow {
    pub fn new(point: BenchmarkPoint, total_trials: usize, failures: usize, target_errors: usize) -> Self {
        debug_assert!(total_trials > 0 && failures <= total_trials);
        let error_rate = failures as f64 / total_trials as f64;
        let relative_error = 1. / (failures as f64).sqrt();
        let confidence_interval_95_percent = 1.96 * ((1. - error_rate) / (total_trials as f64 * error_rate)).sqrt();
        let status = if failures >= target_errors {
            RowStatus::Ok
        } else {
            RowStatus::Insufficient
        };
        Self {
            point,
            total_trials,
            failures,
            error_rate,
            relative_error,
            confidence_interval_95_percent,
            status,
        }
    }
}

impl std::fmt::Display for ResultRow {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {:.1e} {:.1e} {} {} {}",
            self.point.p,
            self.point.distance,
            self.point.noisy_measurements,
            self.total_trials,
            self.failures,
            self.error_rate,
            self.relative_error,
            self.confidence_interval_95_percent,
            self.point.bias_eta,
            self.point.pe,
            self.status
        )
    }
}

/// everything shared read-only by the workers of a point
struct PreparedPoint {
    lattice: Arc<Lattice>,
    noise_model: NoiseModel,
    graph: Arc<DecodingGraph>,
}

/// the only mutable state shared by the workers of a point
struct Tally {
    claimed: usize,
    executed: usize,
    failures: usize,
    error: Option<SimulationError>,
    profiler: BenchmarkProfiler,
    progress_bar: Option<ProgressBar<Stderr>>,
}

impl Tally {
    fn should_stop(&self, config: &BenchmarkConfig, begin: &Instant) -> bool {
        if self.error.is_some() || self.claimed >= config.max_trials {
            return true;
        }
        if self.executed < config.min_trials.max(1) {
            return false;
        }
        if self.failures >= config.target_errors {
            return true;
        }
        match config.time_budget {
            Some(time_budget) => begin.elapsed().as_secs_f64() >= time_budget,
            None => false,
        }
    }
}

pub struct BenchmarkDriver {
    pub config: BenchmarkConfig,
    seed: u64,
    pool: rayon::ThreadPool,
    disable_progress_bar: bool,
}

impl BenchmarkDriver {
    pub fn new(config: BenchmarkConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new().num_threads(config.workers).build()?;
        let seed = match config.seed {
            Some(seed) => seed,
            None => rand::thread_rng().gen::<u64>(),
        };
        info!("base seed {}, {} workers", seed, pool.current_num_threads());
        // whether to disable progress bar, useful when running jobs in background
        let disable_progress_bar = config.disable_progress_bar || std::env::var("DISABLE_PROGRESS_BAR").is_ok();
        Ok(Self {
            config,
            seed,
            pool,
            disable_progress_bar,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn worker_num(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn prepare(&self, point: &BenchmarkPoint) -> Result<PreparedPoint, ConfigError> {
        let lattice = Lattice::build(point.distance, self.config.code_variant, self.config.boundary)?;
        let noise_model = self.config.noise_model(point)?;
        let graph = DecodingGraph::build(
            &lattice,
            &noise_model,
            self.config.weight_function,
            self.config.max_half_weight,
        )?;
        debug_assert_eq!(lattice.sanity_check(), Ok(()));
        debug_assert_eq!(graph.sanity_check(), Ok(()));
        let graph = Arc::new(graph);
        // reject a bad decoder configuration before any trial runs
        self.config.decoder.build(graph.clone(), self.config.decoder_config.clone())?;
        Ok(PreparedPoint {
            lattice: Arc::new(lattice),
            noise_model,
            graph,
        })
    }

    pub fn run(&self, points: &[BenchmarkPoint]) -> Result<Vec<ResultRow>, SimulationError> {
        let mut rows = Vec::with_capacity(points.len());
        self.run_with(points, |row| rows.push(row.clone()))?;
        Ok(rows)
    }

    /// run every point in order, handing each row to `on_row` as soon as it is final; a fatal error stops the run
    pub fn run_with<F: FnMut(&ResultRow)>(&self, points: &[BenchmarkPoint], mut on_row: F) -> Result<(), SimulationError> {
        // every configuration error surfaces before the first trial
        let prepared = points
            .iter()
            .map(|point| self.prepare(point))
            .collect::<Result<Vec<_>, _>>()?;
        let mut statistics_file = match self.config.log_runtime_statistics.as_ref() {
            Some(path) => {
                let mut file = File::create(path)?;
                writeln!(file, "{}", serde_json::to_string(&self.config).map_err(std::io::Error::from)?)?;
                Some(file)
            }
            None => None,
        };
        for (point_index, (point, prepared)) in points.iter().zip(prepared.iter()).enumerate() {
            let begin = Instant::now();
            let (row, profiler) = self.run_point(point_index, point, prepared)?;
            let elapsed = begin.elapsed().as_secs_f64();
            info!(
                "{}: {} trials, {} failures, error rate {:.3e}, {:.2}s, decoding {}",
                point,
                row.total_trials,
                row.failures,
                row.error_rate,
                elapsed,
                profiler.brief()
            );
            if row.status == RowStatus::Insufficient {
                warn!(
                    "{}: only {} of {} target failures observed, the error rate has lower confidence",
                    point, row.failures, self.config.target_errors
                );
            }
            if let Some(file) = statistics_file.as_mut() {
                let statistics = json!({
                    "point": point,
                    "row": row,
                    "elapsed": elapsed,
                    "timestamp": Local::now().to_rfc3339(),
                    "time_per_trial": profiler.time_per_trial(),
                    "time_per_defect": profiler.time_per_defect(),
                    "defects_per_trial": profiler.sum_defect as f64 / (profiler.decoded.max(1) as f64),
                });
                writeln!(file, "{}", statistics)?;
                file.flush()?;
            }
            on_row(&row);
        }
        Ok(())
    }

    fn run_point(
        &self,
        point_index: usize,
        point: &BenchmarkPoint,
        prepared: &PreparedPoint,
    ) -> Result<(ResultRow, BenchmarkProfiler), SimulationError> {
        let config = &self.config;
        let progress_bar = if self.disable_progress_bar {
            None
        } else {
            let mut pb = ProgressBar::on(std::io::stderr(), config.max_trials as u64);
            pb.message(format!("{point} ").as_str());
            Some(pb)
        };
        let tally = Mutex::new(Tally {
            claimed: 0,
            executed: 0,
            failures: 0,
            error: None,
            profiler: BenchmarkProfiler::new(point.noisy_measurements),
            progress_bar,
        });
        let begin = Instant::now();
        let batch_size = config.batch_size.max(1);
        let point_seed = self.seed.wrapping_add((point_index as u64).wrapping_mul(POINT_SEED_STRIDE));
        self.pool.install(|| {
            (0..self.worker_num()).into_par_iter().for_each(|worker_index| {
                let mut rng = DeterministicRng::seed_from_u64(point_seed.wrapping_add(worker_index as u64));
                let decoder = match config.decoder.build(prepared.graph.clone(), config.decoder_config.clone()) {
                    Ok(decoder) => decoder,
                    Err(error) => {
                        tally.lock().error.get_or_insert(error.into());
                        return;
                    }
                };
                let mut runner = TrialRunner::new(
                    prepared.lattice.clone(),
                    prepared.noise_model,
                    config.failure_criterion,
                    decoder,
                );
                loop {
                    let batch = {
                        let mut tally = tally.lock();
                        if tally.should_stop(config, &begin) {
                            break;
                        }
                        let batch = batch_size.min(config.max_trials - tally.claimed);
                        tally.claimed += batch;
                        batch
                    };
                    let mut executed = 0;
                    let mut failures = 0;
                    let mut error = None;
                    for _ in 0..batch {
                        match runner.run_trial(&mut rng) {
                            Ok(outcome) => {
                                executed += 1;
                                if outcome.is_failure() {
                                    failures += 1;
                                }
                            }
                            Err(err) => {
                                error = Some(err);
                                break;
                            }
                        }
                    }
                    let mut tally = tally.lock();
                    tally.executed += executed;
                    tally.failures += failures;
                    if let Some(error) = error {
                        tally.error.get_or_insert(error);
                    }
                    let executed = tally.executed as u64;
                    if let Some(pb) = tally.progress_bar.as_mut() {
                        pb.set(executed);
                    }
                }
                tally.lock().profiler.merge(&runner.profiler);
            });
        });
        let Tally {
            executed,
            failures,
            error,
            profiler,
            progress_bar,
            ..
        } = tally.into_inner();
        if let Some(mut pb) = progress_bar {
            pb.finish();
            eprintln!();
        }
        if let Some(error) = error {
            error!("{}: aborted after {} trials: {}", point, executed, error);
            return Err(error);
        }
        Ok((ResultRow::new(*point, executed, failures, config.target_errors), profiler))
    }
}
