//! `roamsense` – live perception monitor.
//!
//! 1. Loads `~/.roamsense/config.toml` (or `--config`), writing defaults on
//!    first run.
//! 2. Starts the configured odometry and LIDAR providers.
//! 3. Prints the robot's pose and safe movement directions every interval.
//! 4. Stops the providers cleanly on Ctrl-C.

mod args;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use colored::Colorize;
use roamsense_runtime::config::{self, Config};
use roamsense_runtime::{PerceptionStack, StackStatus, telemetry};
use tracing::{error, info, warn};

use crate::args::{CliArgs, USAGE};

fn main() -> ExitCode {
    let tracer = telemetry::init_tracing("roamsense");
    info!(otlp = tracer.exporting(), "tracing initialised");

    let args = match CliArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}: {msg}\n\n{USAGE}", "error".red().bold());
            return ExitCode::from(2);
        }
    };
    if args.help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    if !args.json {
        print_banner();
    }

    let cfg = match load_or_init_config(args.config.clone()) {
        Ok((cfg, origin)) => {
            // stdout carries only status lines in JSON mode.
            if !args.json {
                origin.print();
            }
            cfg
        }
        Err(e) => {
            error!(error = %e, "configuration rejected");
            eprintln!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – stopping providers …".yellow().bold());
        shutdown_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let stack = PerceptionStack::from_config(&cfg);
    stack.start();

    loop {
        report(&stack.status(), args.json);
        if args.once || wait_or_shutdown(&shutdown, args.interval) {
            break;
        }
    }

    stack.stop();
    if !args.json {
        println!("{}", "  ✓ Providers stopped.".green());
    }
    ExitCode::SUCCESS
}

/// Where the running configuration came from.
#[derive(Debug, Clone, PartialEq)]
enum ConfigOrigin {
    Loaded(PathBuf),
    DefaultsWritten(PathBuf),
    /// Defaults in memory only; the file could not be written.
    Defaults,
}

impl ConfigOrigin {
    fn print(&self) {
        match self {
            ConfigOrigin::Loaded(path) => {
                println!("  Config loaded from {}", path.display().to_string().bold());
            }
            ConfigOrigin::DefaultsWritten(path) => println!(
                "  {} Default config written to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            ),
            ConfigOrigin::Defaults => println!("  {}", "Using built-in defaults.".dimmed()),
        }
    }
}

/// Load the config file, or write and return defaults when it is absent.
fn load_or_init_config(path: Option<PathBuf>) -> Result<(Config, ConfigOrigin), roamsense_types::RoamError> {
    let path = path.unwrap_or_else(config::config_path);
    if let Some(cfg) = config::load_from(&path)? {
        return Ok((cfg, ConfigOrigin::Loaded(path)));
    }

    let defaults = Config::default();
    let origin = match config::save_to(&defaults, &path) {
        Ok(()) => {
            info!(path = %path.display(), "wrote default configuration");
            ConfigOrigin::DefaultsWritten(path)
        }
        Err(e) => {
            warn!(error = %e, "could not write default configuration");
            ConfigOrigin::Defaults
        }
    };
    let mut cfg = defaults;
    config::apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok((cfg, origin))
}

/// Sleep for `interval`, returning early (with `true`) on shutdown.
fn wait_or_shutdown(shutdown: &AtomicBool, interval: Duration) -> bool {
    let deadline = Instant::now() + interval;
    while Instant::now() < deadline {
        if shutdown.load(Ordering::SeqCst) {
            return true;
        }
        thread::sleep(Duration::from_millis(50).min(interval));
    }
    shutdown.load(Ordering::SeqCst)
}

fn report(status: &StackStatus, json: bool) {
    if json {
        match serde_json::to_string(status) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to serialise status"),
        }
        return;
    }

    if let Some(odom) = &status.odometry {
        let p = &odom.position;
        let state = if !odom.running {
            "idle".dimmed()
        } else if p.moving {
            "moving".green().bold()
        } else {
            "still".normal()
        };
        let mut line = format!(
            "  {} x={:.2} y={:.2} yaw={:.1}° ({:.1}° cw) {}",
            format!("[{}]", odom.robot).bold(),
            p.odom_x,
            p.odom_y,
            p.odom_yaw_m180_p180,
            p.odom_yaw_0_360,
            state
        );
        if let Some(attitude) = p.body_attitude {
            line.push_str(&format!(" body={attitude} ({} cm)", p.body_height_cm));
        }
        println!("{line}");
    }

    if let Some(lidar) = &status.lidar {
        let text = lidar.lidar_string.trim_end();
        let text = if text.contains("DO NOT MOVE") {
            text.red().bold()
        } else {
            text.cyan()
        };
        println!("  {} {text}", "[lidar]".bold());
    }

    if status.odometry.is_none() && status.lidar.is_none() {
        println!("  {}", "No providers enabled.".dimmed());
    }
}

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "roamsense".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Robot odometry and LIDAR path-safety monitor");
    println!();
}
