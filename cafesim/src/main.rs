use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use cafesim::{Config, RunError};
use clap::Parser;
use eyre::WrapErr;
use simcore::Collector;

/// Runs the coffee shop simulation and prints a summary of the results.
#[derive(Parser)]
#[clap(version, author)]
struct Opt {
    /// Path to a JSON file with the simulation configuration.
    /// Missing fields, or the entire file, default to the classic two-station coffee shop.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Overrides the random seed.
    #[clap(long)]
    seed: Option<u64>,

    /// Overrides the simulation horizon.
    #[clap(long)]
    horizon: Option<f64>,

    /// Verbosity.
    #[clap(short, long, parse(from_occurrences))]
    verbose: i32,

    /// Store the logs this file.
    #[clap(long)]
    log_output: Option<PathBuf>,

    /// Do not log to the stderr.
    #[clap(long)]
    no_stderr: bool,

    /// Print the report in JSON format.
    #[clap(long)]
    json: bool,

    /// Write all recorded samples to this file in JSON format.
    #[clap(long)]
    samples_output: Option<PathBuf>,
}

impl TryFrom<&Opt> for Config {
    type Error = eyre::Error;
    fn try_from(opt: &Opt) -> eyre::Result<Self> {
        let mut config = if let Some(path) = &opt.config {
            let file = File::open(path)
                .wrap_err_with(|| format!("unable to read config: {}", path.display()))?;
            Config::from_json(BufReader::new(file)).wrap_err("unable to parse config")?
        } else {
            Config::default()
        };
        if let Some(seed) = opt.seed {
            config.seed = seed;
        }
        if let Some(horizon) = opt.horizon {
            config.horizon = horizon;
        }
        Ok(config)
    }
}

/// Log levels of the scenario and of the engine for the given verbosity.
///
/// A single `-v` shows the customer trace; engine internals need `-vv` and more.
fn log_levels(verbose: i32) -> (log::LevelFilter, log::LevelFilter) {
    use log::LevelFilter::{Debug, Info, Trace, Warn};
    match verbose {
        i32::MIN..=0 => (Warn, Warn),
        1 => (Info, Warn),
        2 => (Debug, Debug),
        _ => (Trace, Trace),
    }
}

fn set_up_logger(opt: &Opt) -> Result<(), fern::InitError> {
    let (scenario_level, engine_level) = log_levels(opt.verbose);
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .level(scenario_level)
        .level_for("simcore", engine_level);
    let dispatch = match &opt.log_output {
        Some(path) => dispatch.chain(
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?,
        ),
        None => dispatch,
    };
    let dispatch = if opt.no_stderr {
        dispatch
    } else {
        dispatch.chain(std::io::stderr())
    };
    dispatch.apply()?;
    Ok(())
}

fn write_samples(opt: &Opt, samples: &Collector) -> eyre::Result<()> {
    if let Some(path) = &opt.samples_output {
        let file = File::create(path)
            .wrap_err_with(|| format!("unable to create samples file: {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), samples)
            .wrap_err("unable to write samples")?;
    }
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::parse();
    set_up_logger(&opt)?;
    let config = Config::try_from(&opt)?;
    match cafesim::run(&config) {
        Ok(outcome) => {
            write_samples(&opt, &outcome.samples)?;
            if opt.json {
                println!("{}", serde_json::to_string_pretty(&outcome.report)?);
            } else {
                println!("{}", outcome.report);
            }
            Ok(())
        }
        Err(RunError::Failed {
            source,
            samples,
            time,
        }) => {
            write_samples(&opt, &samples)?;
            Err(eyre::Report::new(source)
                .wrap_err(format!("simulation failed at {:.2}", time)))
        }
        Err(err) => Err(err.into()),
    }
}
