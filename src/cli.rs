use crate::benchmark::*;
use crate::code::*;
use crate::decoder::DecoderType;
use crate::decoding_graph::{DecodingGraph, WeightFunction};
use crate::error::{ConfigError, SimulationError};
use crate::noise::NoiseModel;
use crate::rand_xoshiro::rand_core::SeedableRng;
use crate::simulator::classify;
use crate::syndrome;
use crate::util::*;
use clap::{Parser, Subcommand};
use pbr::ProgressBar;
use rand::Rng;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser, Clone)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Logical error rate benchmark of matching and union-find decoders on surface and XZZX codes")]
#[clap(color = clap::ColorChoice::Auto)]
#[clap(propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
pub struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
#[allow(clippy::large_enum_variant)]
enum Commands {
    /// estimate the logical error rate of every configuration point
    Benchmark(BenchmarkParameters),
    /// built-in tests
    Test {
        #[clap(subcommand)]
        command: TestCommands,
    },
}

#[derive(Parser, Clone, Debug)]
pub struct BenchmarkParameters {
    /// code distances, e.g. `[3,5,7]`
    #[clap(value_parser)]
    dis: String,
    /// physical error rates, e.g. `[0.01,0.02,0.03]`
    #[clap(value_parser)]
    ps: String,
    /// erasure probability paired with each physical error rate, e.g. `[0.1,0.1,0.2]`; no erasures by default
    #[clap(long)]
    pes: Option<String>,
    /// noisy measurement rounds of each distance, e.g. `[3,5,7]`; code capacity by default
    #[clap(long = "noisy_measurements", conflicts_with = "fault-tolerant")]
    noisy_measurements: Option<String>,
    /// use `d` noisy measurement rounds for distance `d`
    #[clap(long = "fault_tolerant", action)]
    fault_tolerant: bool,
    /// bias ratios `pz / (px + py)`; 0.5 is depolarizing noise and `inf` is pure Z noise
    #[clap(long = "bias_eta", default_value = "[0.5]")]
    bias_eta: String,
    /// maximum number of trials of each point
    #[clap(short = 'm', long = "max_trials", default_value_t = 100000000)]
    max_trials: usize,
    /// minimum number of trials of each point
    #[clap(long = "min_N", default_value_t = 0)]
    min_trials: usize,
    /// stop a point after this number of logical failures
    #[clap(short = 'e', long = "target_errors", default_value_t = 10000)]
    target_errors: usize,
    /// number of worker threads, 0 for one per core
    #[clap(short = 'p', long = "threads", default_value_t = 0)]
    threads: usize,
    /// trials claimed by a worker at a time
    #[clap(short = 'b', long = "batch_size", default_value_t = 100)]
    batch_size: usize,
    #[clap(long = "use_xzzx_code", action)]
    use_xzzx_code: bool,
    /// periodic boundaries with two logical qubits
    #[clap(long = "use_toric_code", action)]
    use_toric_code: bool,
    #[clap(long, value_enum, default_value_t = DecoderType::Mwpm)]
    decoder: DecoderType,
    /// decoder specific configuration, e.g. `{"growth_policy":"uniform"}`
    #[clap(long = "decoder_config", default_value_t = json!({}), value_parser = parse_json)]
    decoder_config: serde_json::Value,
    /// maximum half weight of an edge in the decoding graph
    #[clap(long = "max_half_weight", default_value_t = 500)]
    max_half_weight: Weight,
    /// the bottom round carries data errors but measures perfectly
    #[clap(long = "shallow_error_on_bottom", action)]
    shallow_error_on_bottom: bool,
    /// measurement error rate relative to `p`
    #[clap(long = "extra_measurement_error", default_value_t = 1.)]
    extra_measurement_error: f64,
    #[clap(long = "no_y_error", action)]
    no_y_error: bool,
    /// only count failures of the Z logical operators
    #[clap(long = "only_count_logical_x", action)]
    only_count_logical_x: bool,
    /// only count failures of the X logical operators
    #[clap(long = "only_count_logical_z", action, conflicts_with = "only-count-logical-x")]
    only_count_logical_z: bool,
    /// every possible edge weighs the same
    #[clap(long = "no_autotune", action)]
    no_autotune: bool,
    /// weigh edges by `ln(1/p)` instead of `ln((1-p)/p)`
    #[clap(long = "disable_autotune_minus_no_error", action)]
    disable_autotune_minus_no_error: bool,
    /// seconds per point, checked only after the minimum number of trials
    #[clap(long = "time_budget")]
    time_budget: Option<f64>,
    /// JSON lines file recording the configuration and per-point statistics
    #[clap(long = "log_runtime_statistics")]
    log_runtime_statistics: Option<String>,
    /// base seed of the random number generators, random when absent
    #[clap(long)]
    seed: Option<u64>,
    #[clap(long = "disable_progress_bar", action)]
    disable_progress_bar: bool,
}

#[derive(Subcommand, Clone, Debug)]
pub enum TestCommands {
    /// decode random errors with both decoders and check that every correction clears the syndrome
    Consistency {
        /// code distances, e.g. `[3,5,7]`
        #[clap(value_parser)]
        dis: String,
        /// physical error rates, e.g. `[0.01,0.02,0.03]`
        #[clap(value_parser)]
        ps: String,
        #[clap(long = "bias_eta", default_value = "[0.5]")]
        bias_eta: String,
        #[clap(long = "noisy_measurements", default_value_t = 0)]
        noisy_measurements: usize,
        /// erasure probability of each data qubit
        #[clap(long, default_value_t = 0.)]
        pe: f64,
        #[clap(long = "use_xzzx_code", action)]
        use_xzzx_code: bool,
        #[clap(long = "use_toric_code", action)]
        use_toric_code: bool,
        /// trials of each point
        #[clap(short = 'r', long = "rounds", default_value_t = 1000)]
        rounds: usize,
        #[clap(long)]
        seed: Option<u64>,
        #[clap(long = "disable_progress_bar", action)]
        disable_progress_bar: bool,
    },
}

fn parse_json(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|error| format!("should be like {{\"a\":1}}, parse error: {error}"))
}

/// parse a bracketed list like `[3,5,7]`; the brackets are optional and `inf` is a valid float
pub fn parse_list<T: FromStr>(value: &str) -> Result<Vec<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let trimmed = value.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    let mut list = vec![];
    for item in inner.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        list.push(item.parse::<T>().map_err(|error| ConfigError::InvalidList {
            value: value.to_string(),
            reason: format!("`{item}`: {error}"),
        })?);
    }
    if list.is_empty() {
        return Err(ConfigError::InvalidList {
            value: value.to_string(),
            reason: "empty list".to_string(),
        });
    }
    Ok(list)
}

fn code_layout(use_xzzx_code: bool, use_toric_code: bool) -> (CodeVariant, BoundaryCondition) {
    let variant = if use_xzzx_code { CodeVariant::Xzzx } else { CodeVariant::Css };
    let boundary = if use_toric_code {
        BoundaryCondition::Toric
    } else {
        BoundaryCondition::Planar
    };
    (variant, boundary)
}

impl BenchmarkParameters {
    pub fn build_config(&self) -> BenchmarkConfig {
        let (code_variant, boundary) = code_layout(self.use_xzzx_code, self.use_toric_code);
        let failure_criterion = if self.only_count_logical_x {
            FailureCriterion::OnlyX
        } else if self.only_count_logical_z {
            FailureCriterion::OnlyZ
        } else {
            FailureCriterion::All
        };
        let weight_function = if self.no_autotune {
            WeightFunction::Uniform
        } else if self.disable_autotune_minus_no_error {
            WeightFunction::LogInverse
        } else {
            WeightFunction::LogOdds
        };
        BenchmarkConfig {
            min_trials: self.min_trials,
            max_trials: self.max_trials,
            target_errors: self.target_errors,
            workers: self.threads,
            batch_size: self.batch_size,
            seed: self.seed,
            time_budget: self.time_budget,
            code_variant,
            boundary,
            decoder: self.decoder,
            decoder_config: self.decoder_config.clone(),
            weight_function,
            max_half_weight: self.max_half_weight,
            measurement_error_scale: self.extra_measurement_error,
            shallow_error_on_bottom: self.shallow_error_on_bottom,
            no_y_error: self.no_y_error,
            failure_criterion,
            disable_progress_bar: self.disable_progress_bar,
            log_runtime_statistics: self.log_runtime_statistics.clone(),
        }
    }

    pub fn build_points(&self) -> Result<Vec<BenchmarkPoint>, ConfigError> {
        let distances = parse_list::<usize>(&self.dis)?;
        let ps = parse_list::<f64>(&self.ps)?;
        let bias_etas = parse_list::<f64>(&self.bias_eta)?;
        let noisy_measurements = if self.fault_tolerant {
            distances.clone()
        } else {
            match self.noisy_measurements.as_ref() {
                Some(value) => parse_list::<usize>(value)?,
                None => vec![0; distances.len()],
            }
        };
        let pes = match self.pes.as_ref() {
            Some(value) => parse_list::<f64>(value)?,
            None => vec![0.; ps.len()],
        };
        BenchmarkPoint::grid(&distances, &ps, &pes, &bias_etas, &noisy_measurements)
    }
}

impl Cli {
    pub fn run(self) -> Result<(), SimulationError> {
        match self.command {
            Commands::Benchmark(parameters) => {
                let points = parameters.build_points()?;
                let driver = BenchmarkDriver::new(parameters.build_config())?;
                println!("{RESULT_HEADER}");
                driver.run_with(&points, |row| println!("{row}"))
            }
            Commands::Test { command } => match command {
                TestCommands::Consistency {
                    dis,
                    ps,
                    bias_eta,
                    noisy_measurements,
                    pe,
                    use_xzzx_code,
                    use_toric_code,
                    rounds,
                    seed,
                    disable_progress_bar,
                } => {
                    let distances = parse_list::<usize>(&dis)?;
                    let ps = parse_list::<f64>(&ps)?;
                    let bias_etas = parse_list::<f64>(&bias_eta)?;
                    let (variant, boundary) = code_layout(use_xzzx_code, use_toric_code);
                    let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
                    info!("consistency test seed {}", seed);
                    let disable_progress_bar = disable_progress_bar || std::env::var("DISABLE_PROGRESS_BAR").is_ok();
                    for &bias_eta in bias_etas.iter() {
                        for &d in distances.iter() {
                            for &p in ps.iter() {
                                let point = BenchmarkPoint::new(d, p, bias_eta, noisy_measurements).with_erasure_rate(pe);
                                let lattice = Lattice::build(d, variant, boundary)?;
                                let noise_model = NoiseModel::new(p, bias_eta)?
                                    .with_noisy_measurements(noisy_measurements)
                                    .with_erasure_rate(pe);
                                noise_model.validate()?;
                                let graph = Arc::new(DecodingGraph::build(&lattice, &noise_model, WeightFunction::LogOdds, 500)?);
                                let mut decoders = vec![];
                                for decoder_type in [DecoderType::Mwpm, DecoderType::UnionFind] {
                                    decoders.push((decoder_type, decoder_type.build(graph.clone(), json!({}))?));
                                }
                                let mut pb = if disable_progress_bar {
                                    None
                                } else {
                                    let mut pb = ProgressBar::on(std::io::stderr(), rounds as u64);
                                    pb.message(format!("{point} ").as_str());
                                    Some(pb)
                                };
                                let mut rng = DeterministicRng::seed_from_u64(seed);
                                for round in 0..rounds {
                                    if let Some(pb) = pb.as_mut() {
                                        pb.set(round as u64);
                                    }
                                    let error_pattern = noise_model.sample(&lattice, &mut rng);
                                    let syndrome_pattern = syndrome::extract(&lattice, &error_pattern);
                                    for (decoder_type, decoder) in decoders.iter_mut() {
                                        let correction = decoder.decode(&syndrome_pattern)?;
                                        if let Err(error) = classify(&lattice, &error_pattern, &correction, FailureCriterion::All) {
                                            error!("{} decoder fails on round {} of {}", decoder_type, round, point);
                                            return Err(error);
                                        }
                                    }
                                }
                                if let Some(mut pb) = pb {
                                    pb.finish();
                                    eprintln!();
                                }
                                info!("{}: {} rounds consistent", point, rounds);
                            }
                        }
                    }
                    Ok(())
                }
            },
        }
    }
}
