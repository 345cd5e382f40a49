//! Headless flocking run.
//!
//! ```text
//! flock-grid [N blockSize] [naive|scattered|coherent] [seconds]
//! ```
//!
//! Set `FLOCK_CONFIG` to a TOML file to override the simulation parameters
//! and `RUST_LOG` to change log verbosity.

use std::process::ExitCode;
use std::time::Duration;

use flock_grid::perf::PerfMonitor;
use flock_grid::{Boids, SimulationConfig, StepMethod};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_N: usize = 100_000;
const DEFAULT_BLOCK_SIZE: usize = 128;
const DEFAULT_SECONDS: u64 = 20;
const DT: f32 = 0.2;

struct Args {
    agents: usize,
    block_size: usize,
    method: StepMethod,
    duration: Duration,
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let (agents, block_size) = match args.as_slice() {
        [n, block, ..] => (
            n.parse::<usize>().map_err(|_| format!("invalid agent count '{n}'"))?,
            block.parse::<usize>().map_err(|_| format!("invalid block size '{block}'"))?,
        ),
        _ => (DEFAULT_N, DEFAULT_BLOCK_SIZE),
    };
    let method = match args.get(2) {
        Some(m) => m.parse::<StepMethod>().map_err(|e| e.to_string())?,
        None => StepMethod::CoherentGrid,
    };
    let seconds = match args.get(3) {
        Some(s) => s.parse::<u64>().map_err(|_| format!("invalid duration '{s}'"))?,
        None => DEFAULT_SECONDS,
    };

    Ok(Args {
        agents,
        block_size,
        method,
        duration: Duration::from_secs(seconds),
    })
}

fn load_config() -> flock_grid::Result<SimulationConfig> {
    match std::env::var_os("FLOCK_CONFIG") {
        Some(path) => SimulationConfig::load(path),
        None => Ok(SimulationConfig::default()),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            error!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "could not load configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(agents = args.agents, block_size = args.block_size, method = %args.method, "starting");

    let mut boids = Boids::new(config);
    if !boids.unit_test() {
        error!("self test failed");
    }
    if let Err(err) = boids.init_simulation(args.agents, args.block_size) {
        error!(%err, "initialization failed");
        return ExitCode::FAILURE;
    }

    // stand-in for the display buffers a renderer would map
    let mut positions = vec![0.0f32; args.agents * 4];
    let mut velocities = vec![0.0f32; args.agents * 4];

    let mut perf = PerfMonitor::new();
    while perf.elapsed() < args.duration {
        boids.step(args.method, DT);
        if let Err(err) = boids.copy_boids_to_vbo(&mut positions, &mut velocities) {
            error!(%err, "display hand-off failed");
            break;
        }
        if let Some(rate) = perf.record_step() {
            info!(steps_per_second = format_args!("{rate:.1}"), "measuring");
        }
    }

    info!(
        final_rate = format_args!("{:.1}", perf.rate()),
        average_rate = format_args!("{:.1}", perf.average_rate()),
        steps = perf.total_steps(),
        "measurement complete"
    );

    boids.end_simulation();
    ExitCode::SUCCESS
}
