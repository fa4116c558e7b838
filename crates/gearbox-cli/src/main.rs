//! `gearbox` – simulated robot runner
//!
//! 1. Initialises logging (and OTLP export when configured).
//! 2. Loads `~/.gearbox/config.toml` (or `$GEARBOX_CONFIG`), falling back to
//!    defaults.
//! 3. Builds the robot on simulated motor channels and runs the autonomous
//!    routine at the configured loop period.
//! 4. Stops early on **Ctrl-C**, ends every behavior, and prints the final
//!    telemetry snapshot as JSON.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use gearbox_runtime::{RobotConfig, RobotLoop, config, init_tracing};
use gearbox_types::GearError;
use tracing::{info, warn};

fn main() {
    let _guard = init_tracing("gearbox");

    print_banner();

    if let Err(e) = run() {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), GearError> {
    let cfg = load_config();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping robot …".yellow().bold());
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the run can only end on its own");
    }

    // ── Robot ─────────────────────────────────────────────────────────────
    let mut robot = RobotLoop::simulated(cfg)?;
    println!(
        "  Running autonomous for {}s at {} ms/tick …",
        robot.config().autonomous_seconds.to_string().bold(),
        robot.config().period_ms.to_string().bold()
    );

    robot.start_autonomous();
    let ticks = robot.run_while(&shutdown, |r| r.autonomous_running());
    let interrupted = shutdown.load(Ordering::SeqCst);

    robot.stop();
    // One more cycle so the final state reaches the telemetry store.
    robot.step();

    info!(ticks, interrupted, overruns = robot.scheduler().overrun_count(), "run finished");
    if interrupted {
        println!("  {} after {} ticks.", "Interrupted".yellow(), ticks);
    } else {
        println!("  {} after {} ticks.", "✓ Autonomous complete".green(), ticks);
    }
    let overruns = robot.scheduler().overrun_count();
    if overruns > 0 {
        println!("  {} loop overrun(s)", overruns.to_string().yellow());
    }

    let snapshot = serde_json::to_string_pretty(&robot.snapshot())
        .map_err(|e| GearError::Config(format!("failed to encode telemetry: {e}")))?;
    println!();
    println!("{}", "  Telemetry".bold());
    println!("{snapshot}");
    Ok(())
}

fn load_config() -> RobotConfig {
    match config::load() {
        Ok(cfg) => {
            println!(
                "  Config: {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = RobotConfig::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "Gearbox".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Cooperative robot control loop (simulated)");
    println!();
}
