//! Planet-evolve CLI - coupled rocky-planet evolution.
//!
//! Run a simulation from a TOML configuration, inspect the status of an
//! output directory, or validate a configuration file.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use planet_evolve::adapter::AdapterSet;
use planet_evolve::config::{Config, ToleranceParams};
use planet_evolve::coupler::{Coupler, RunDirs, SummaryObserver};
use planet_evolve::record::History;
use planet_evolve::termination::read_status;

/// Coupled interior/atmosphere evolution of rocky planets.
#[derive(Parser)]
#[command(name = "planet-evolve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new simulation, or resume an existing one.
    Start {
        /// Path to the TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,

        /// Continue from the history already in the output directory.
        #[arg(long)]
        resume: bool,

        /// Take over the output directory even if a keepalive file exists.
        #[arg(long)]
        force: bool,
    },

    /// Print the status and latest state of an output directory.
    Status {
        /// Output directory of a run.
        dir: PathBuf,
    },

    /// Validate a configuration file without running it.
    Check {
        /// Path to the TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "planet_evolve=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config,
            resume,
            force,
        } => run_start(&config, resume, force),
        Commands::Status { dir } => run_status(&dir),
        Commands::Check { config } => run_check(&config),
    }
}

fn load_config(path: &Path) -> Config {
    match Config::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_start(config_path: &Path, resume: bool, force: bool) {
    let config = load_config(config_path);

    println!("Planet-evolve - Coupled Planet Evolution");
    println!("========================================");
    println!("Config: {}", config_path.display());
    println!("Output: {}", config.params.out.path.display());
    println!(
        "Modules: interior={} atmos={} outgas={} escape={} star={} orbit={}",
        config.interior.module.name(),
        config.atmos.module.name(),
        config.outgas.module.name(),
        config.escape.module.name(),
        config.star.module.name(),
        config.orbit.module.name(),
    );

    let adapters = match AdapterSet::from_config(&config) {
        Ok(adapters) => adapters,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut coupler = Coupler::new(config, adapters).with_observer(SummaryObserver);

    let prepared = if resume {
        println!("\nResuming run...");
        coupler.resume(force)
    } else {
        println!("\nStarting run...");
        coupler.start(force)
    };
    if let Err(e) = prepared {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let start = Instant::now();
    match coupler.run() {
        Ok(status) => {
            let elapsed = start.elapsed();
            println!("\nRun finished: {}", status);
            println!("  Iterations: {}", coupler.counters().total);
            if let Some(last) = coupler.history().last() {
                println!("  Simulated time: {:.4e} yr", last.time());
            }
            println!("  Wall time: {:.2?}", elapsed);
            println!("  Summary: {}", coupler.dirs().summary().display());
        }
        Err(e) => {
            eprintln!("Error: {} (status {})", e, e.status());
            std::process::exit(1);
        }
    }
}

fn run_status(dir: &Path) {
    let dirs = RunDirs::new(dir);

    let status = match read_status(&dirs.status()) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", dirs.status().display(), e);
            std::process::exit(1);
        }
    };
    println!("Status: {}", status);
    println!("Running: {}", dirs.keepalive().exists());

    let history = match History::load(&dirs.helpfile(), ToleranceParams::default().mass_rel) {
        Ok(history) => history,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    println!("Rows: {}", history.len());

    if let Some(last) = history.last() {
        println!("\nLatest state:");
        println!("  Time:       {:.6e} yr", last.time());
        println!("  T_magma:    {:.2} K", last["T_magma"]);
        println!("  Phi_global: {:.4}", last["Phi_global"]);
        println!("  F_atm:      {:.4e} W/m^2", last["F_atm"]);
        println!("  P_surf:     {:.4e} bar", last["P_surf"]);
        println!("  M_atm:      {:.4e} kg", last["M_atm"]);
    }
}

fn run_check(config_path: &Path) {
    let config = load_config(config_path);
    if let Err(e) = AdapterSet::from_config(&config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    println!("Configuration OK: {}", config_path.display());
    println!("  Output: {}", config.params.out.path.display());
    println!("  Max iterations: {}", config.params.stop.iters.maximum);
    println!("  Max time: {:.3e} yr", config.params.stop.time.maximum);
}
