//! # Interlocking Controller Binary
//!
//! Loads the controller configuration and lever layout, brings up the bus and
//! runs the polling loop until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Run against the configured transport
//! ilock_controller --config config/controller.toml
//!
//! # Simulate one lever module per configured device address; each module
//! # throws its next unlocked lever every two seconds
//! ilock_controller --config config/controller.toml --simulate
//!
//! # Verbose JSON logging
//! ilock_controller -c config/controller.toml -s -v --json
//! ```

#![deny(warnings)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use clap::Parser;
use ilock_bus::transports::default_registry;
use ilock_bus::transports::loopback::LoopbackBus;
use ilock_common::config::{ConfigLoader, ControllerConfig};
use ilock_common::consts::DEFAULT_CONFIG_PATH;
use ilock_common::types::DeviceId;
use ilock_controller::{Controller, LeverModuleSim};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Time between scripted lever throws in simulation mode.
const SIM_THROW_INTERVAL: Duration = Duration::from_secs(2);

/// Interlocking controller - lever frame locking over a module bus
#[derive(Parser, Debug)]
#[command(name = "ilock_controller")]
#[command(version)]
#[command(about = "Interlocking controller with remote lever module synchronization")]
#[command(long_about = None)]
struct Args {
    /// Path to controller configuration file (controller.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run against simulated lever modules on an in-memory bus
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Controller startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // The config log level seeds tracing, so load before reporting errors.
    let config = ControllerConfig::load(&args.config);
    setup_tracing(&args, config.as_ref().ok());
    let config = config.inspect_err(|_| error!("Failed to load {:?}", args.config))?;

    info!(
        "Interlocking controller v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let base_dir = args.config.parent().unwrap_or(Path::new("."));
    let mut controller = Controller::from_config(&config, base_dir)?;

    let bus = LoopbackBus::new();
    let registry = default_registry(&bus)?;

    let mut sims = Vec::new();
    if args.simulate {
        info!("Simulation mode enabled");
        controller.force_loopback();
        for (address, slots) in module_slots(&controller) {
            let mut sim = LeverModuleSim::new(address, slots);
            sim.start(Box::new(bus.endpoint()))?;
            info!("  Simulated lever module {} with {} slots", address, slots);
            sims.push(sim);
        }
    }

    let running = controller.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    controller.start_with_registry(&registry)?;
    let mut last_throw = Instant::now();
    controller.run_with(|| {
        for sim in &mut sims {
            sim.poll_all();
        }
        if !sims.is_empty() && last_throw.elapsed() >= SIM_THROW_INTERVAL {
            last_throw = Instant::now();
            for sim in &mut sims {
                if let Err(e) = sim.throw_next_unlocked() {
                    warn!("Simulated module {} failed to report: {}", sim.address(), e);
                }
            }
        }
    });

    info!("Interlocking controller shutdown complete");
    Ok(())
}

/// Slot count per module address, from the highest bound slot.
fn module_slots(controller: &Controller) -> BTreeMap<DeviceId, usize> {
    let mut slots = BTreeMap::new();
    for binding in controller.bindings() {
        let count = slots.entry(binding.slot.address).or_insert(0usize);
        *count = (*count).max(usize::from(binding.slot.slot) + 1);
    }
    slots
}

/// Setup tracing subscriber based on CLI arguments and the loaded config.
fn setup_tracing(args: &Args, config: Option<&ControllerConfig>) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        config
            .and_then(|c| c.shared.log_level.as_directive().parse().ok())
            .unwrap_or(Level::INFO)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
