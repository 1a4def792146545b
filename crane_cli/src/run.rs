//! Backend assembly and the `run` / `self-check` commands.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crane_core::{BusCfg, Crane, RunSummary, StaticPerception, Target, TargetKind};
use crane_hardware::{SIM_COMMAND_ID, SIM_TELEMETRY_ID, SimulatedGantry};
use eyre::WrapErr;

/// How far behind "now" the static scene stamps its observations.
const SCENE_LATENCY: Duration = Duration::from_millis(10);
/// Simulated effector speed unless `CRANE_SIM_SPEED` (mm/s) says otherwise.
const DEFAULT_SIM_SPEED_MM_S: f64 = 500.0;

pub struct RunOpts {
    pub cycles: Option<u64>,
    pub sim: bool,
    pub weight_at: (f64, f64),
}

fn scene(weight_at: (f64, f64)) -> StaticPerception {
    let (x, y) = weight_at;
    StaticPerception::new(vec![Target::new(x, y, TargetKind::Weight)]).with_latency(SCENE_LATENCY)
}

fn sim_speed() -> f64 {
    std::env::var("CRANE_SIM_SPEED")
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(DEFAULT_SIM_SPEED_MM_S)
}

/// The simulator speaks the default identifiers; keep everything else from config.
fn sim_bus(cfg: &crane_config::Config) -> BusCfg {
    let mut bus: BusCfg = cfg.into();
    if bus.command_id != SIM_COMMAND_ID || bus.telemetry_id != SIM_TELEMETRY_ID {
        tracing::warn!(
            command_id = bus.command_id,
            telemetry_id = bus.telemetry_id,
            "simulator uses fixed frame ids; overriding configured ids"
        );
        bus.command_id = SIM_COMMAND_ID;
        bus.telemetry_id = SIM_TELEMETRY_ID;
    }
    bus
}

fn build_sim(cfg: &crane_config::Config, weight_at: (f64, f64)) -> eyre::Result<Crane> {
    let gantry = SimulatedGantry::new()
        .with_speed(sim_speed())
        .with_z_scale(cfg.wire.z_scale);
    let (cmd, telemetry) = gantry.split();
    Crane::builder()
        .with_config(cfg)
        .with_bus(sim_bus(cfg))
        .with_command_sink(cmd)
        .with_telemetry_source(telemetry)
        .with_perception(scene(weight_at))
        .build()
        .wrap_err("assemble simulated crane")
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn build_hw(cfg: &crane_config::Config, weight_at: (f64, f64)) -> eyre::Result<Crane> {
    use crane_hardware::socketcan::SocketCan;

    let (tx, rx) = SocketCan::open(&cfg.bus.interface)
        .and_then(SocketCan::split)
        .map_err(eyre::Report::new)
        .wrap_err_with(|| format!("open bus interface {}", cfg.bus.interface))?;
    tracing::warn!("no camera integration in this binary; using a static scene");
    Crane::builder()
        .with_config(cfg)
        .with_command_sink(tx)
        .with_telemetry_source(rx)
        .with_perception(scene(weight_at))
        .build()
        .wrap_err("assemble crane")
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn build_hw(_cfg: &crane_config::Config, _weight_at: (f64, f64)) -> eyre::Result<Crane> {
    eyre::bail!("bus backend not compiled in; rebuild with --features hardware or pass --sim")
}

pub fn run_crane(
    cfg: &crane_config::Config,
    opts: &RunOpts,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<RunSummary> {
    let mut crane = if opts.sim {
        build_sim(cfg, opts.weight_at)?
    } else {
        build_hw(cfg, opts.weight_at)?
    };
    tracing::info!(
        backend = if opts.sim { "sim" } else { "bus" },
        cycles = ?opts.cycles,
        "crane start"
    );
    let summary = crane.run(&shutdown, opts.cycles)?;
    if crane.telemetry_stalled_ms() > 1000 {
        tracing::warn!(
            stalled_ms = crane.telemetry_stalled_ms(),
            "no telemetry received recently"
        );
    }
    Ok(summary)
}

/// Run a short simulated session with the loaded config and check the loop produced commands.
pub fn self_check(cfg: &crane_config::Config) -> eyre::Result<RunSummary> {
    let mut crane = build_sim(cfg, (0.7, 0.1))?;
    let shutdown = AtomicBool::new(false);
    let summary = crane.run(&shutdown, Some(10))?;
    if summary.sent == 0 {
        eyre::bail!(
            "control loop sent no commands in {} cycles (skipped {})",
            summary.cycles,
            summary.skipped
        );
    }
    if summary.receiver.decoded == 0 {
        eyre::bail!("no telemetry decoded from simulator");
    }
    Ok(summary)
}

/// Print receive and loop counters to stderr.
pub fn print_stats(s: &RunSummary) {
    eprintln!("\n--- Crane Stats ---");
    eprintln!("Cycles: {}", s.cycles);
    eprintln!("Commands sent/failed: {} / {}", s.sent, s.send_errors);
    eprintln!("Skipped cycles: {}", s.skipped);
    eprintln!(
        "Telemetry decoded/ignored/errors: {} / {} / {}",
        s.receiver.decoded, s.receiver.ignored, s.receiver.transport_errors
    );
    eprintln!("State: {} (cycle {})", s.final_state, s.circle_count);
    eprintln!("-------------------\n");
}
