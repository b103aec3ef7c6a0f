//! `odosim` – synthetic odometry simulator.
//!
//! This binary:
//!
//! 1. Loads the simulation description (see [`config`]) or falls back to a
//!    built-in demo.
//! 2. Builds the scripted world and one odometry sensor per `[[odometry]]`
//!    table, all publishing into one bounded output queue.
//! 3. Streams every released odometry message to stdout as one JSON line.
//! 4. Intercepts **Ctrl-C** to stop the simulation between steps and print
//!    a summary.
//!
//! Usage: `odosim [CONFIG]` or `odosim --init [PATH]` to write the demo
//! configuration to disk.

mod config;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use odosim_middleware::{Channel, QueueSink};
use odosim_runtime::{LoopStats, SimulationLoop};
use odosim_types::OdomError;
use tracing::{info, warn};

use crate::config::SimConfig;

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries measurement JSON only.
    let _guard = odosim_runtime::init_tracing("odosim");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--init") {
        return write_demo(args.get(1).map(String::as_str));
    }

    print_banner();

    let path = config::resolve_path(args.first().map(String::as_str));
    let cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            eprintln!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            eprintln!(
                "  No config at {}; running the built-in demo.",
                path.display().to_string().dimmed()
            );
            let mut cfg = SimConfig::demo();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – stopping after the current step …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the run can only end on its own");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg, shutdown, std::io::stdout())) {
        Ok((stats, printed, _)) => {
            print_summary(&stats, printed);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Simulation failed".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Released odometry messages buffered between the loop and the printer.
const OUTPUT_CAPACITY: usize = 256;

/// Run the simulation on a blocking thread while an async task writes every
/// released odometry message to `out` as one JSON line.  The queue between
/// them is lossless: a slow writer throttles the loop.  Returns the loop
/// counters, the number of lines written and the writer.
async fn run<W>(
    cfg: SimConfig,
    shutdown: Arc<AtomicBool>,
    mut out: W,
) -> Result<(LoopStats, u64, W), OdomError>
where
    W: Write + Send + 'static,
{
    let (sink, mut odometry_rx) = QueueSink::new(OUTPUT_CAPACITY, &[Channel::Odometry]);

    let printer = tokio::spawn(async move {
        let mut printed = 0u64;
        while let Some(event) = odometry_rx.recv().await {
            let line = match serde_json::to_string(&event) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "failed to serialise odometry event");
                    continue;
                }
            };
            if let Err(e) = writeln!(out, "{line}") {
                warn!(error = %e, "stopped writing odometry output");
                break;
            }
            printed += 1;
        }
        if let Err(e) = out.flush() {
            warn!(error = %e, "failed to flush odometry output");
        }
        (printed, out)
    });

    let mut sim = SimulationLoop::new(cfg.build_world(), cfg.step_size)?;
    for sensor in &cfg.odometry {
        sim.add_plugin(sensor, sink.clone())?;
    }
    // The plugins hold the only senders from here on; the printer exits once
    // the loop is dropped.
    drop(sink);
    info!(
        links = cfg.world.links.len(),
        sensors = cfg.odometry.len(),
        iterations = cfg.iterations,
        "starting simulation"
    );

    let iterations = cfg.iterations;
    let stats = tokio::task::spawn_blocking(move || sim.run(iterations, &shutdown))
        .await
        .map_err(|e| OdomError::Config(format!("simulation task failed: {e}")))??;

    let (printed, out) = printer
        .await
        .map_err(|e| OdomError::Config(format!("printer task failed: {e}")))?;
    Ok((stats, printed, out))
}

fn write_demo(path: Option<&str>) -> ExitCode {
    let path = std::path::PathBuf::from(path.unwrap_or(config::DEFAULT_CONFIG_FILE));
    match config::save_to(&SimConfig::demo(), &path) {
        Ok(()) => {
            eprintln!(
                "  {} Demo config written to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error saving config".red(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner / summary
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    eprintln!();
    eprintln!(
        "  {} {}",
        "odosim".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    eprintln!("  Synthetic odometry simulator");
    eprintln!();
}

fn print_summary(stats: &LoopStats, printed: u64) {
    eprintln!();
    eprintln!("{}", "  Simulation summary".bold());
    eprintln!("    steps              {}", stats.steps.to_string().bold());
    eprintln!("    released           {}", stats.released.to_string().green());
    eprintln!("    printed            {}", printed);
    if stats.publish_failures > 0 {
        eprintln!(
            "    publish failures   {}",
            stats.publish_failures.to_string().yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odosim_types::{Event, EventPayload};

    /// More releases than the output queue holds, all of them printed.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn every_release_is_printed() {
        let mut cfg = SimConfig::demo();
        cfg.iterations = 3_000;
        cfg.odometry[0].measurement_divisor = 1;
        cfg.odometry[0].random_engine_seed = Some(5);
        let mut second = cfg.odometry[0].clone();
        second.child_frame_id = "second".to_string();
        cfg.odometry.push(second);

        let shutdown = Arc::new(AtomicBool::new(false));
        let (stats, printed, out) = run(cfg, shutdown, Vec::new()).await.expect("run");

        assert_eq!(stats.steps, 3_000);
        assert!(stats.released > OUTPUT_CAPACITY as u64);
        assert_eq!(printed, stats.released);
        assert_eq!(stats.publish_failures, 0);

        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len() as u64, stats.released);
        let first: Event = serde_json::from_str(lines[0]).expect("json line");
        assert_eq!(first.source, "demo/base_link/odometry");
        assert!(matches!(first.payload, EventPayload::Odometry(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_before_start_prints_nothing() {
        let shutdown = Arc::new(AtomicBool::new(true));
        let (stats, printed, out) = run(SimConfig::demo(), shutdown, Vec::new())
            .await
            .expect("run");
        assert_eq!(stats.steps, 0);
        assert_eq!(printed, 0);
        assert!(out.is_empty());
    }
}
