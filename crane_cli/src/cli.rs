//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "crane", version, about = "Gantry effector control CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/crane_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop until Ctrl-C or the cycle limit
    Run {
        /// Stop after this many decision cycles
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Drive the simulated gantry instead of the bus interface
        #[arg(long, action = ArgAction::SetTrue)]
        sim: bool,
        /// Static weight detection in the map frame, as `x,y` meters
        #[arg(long = "weight-at", value_name = "X,Y", value_parser = parse_xy, default_value = "0.7,0.1")]
        weight_at: (f64, f64),
        /// Print receive and loop counters on completion
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Validate the config and exercise the control loop against the simulator
    SelfCheck,
    /// Decode an 8-byte frame payload given as hex (telemetry and command views)
    Decode {
        /// Payload bytes, e.g. `04b0fd0dfefc0000` or `04 b0 fd 0d fe fc 00 00`
        #[arg(value_name = "HEX")]
        hex: String,
    },
}

pub fn parse_xy(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x `{x}`: {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y `{y}`: {e}"))?;
    if !(x.is_finite() && y.is_finite()) {
        return Err("coordinates must be finite".into());
    }
    Ok((x, y))
}

/// Parse a hex payload, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex_payload(s: &str) -> eyre::Result<Vec<u8>> {
    let cleaned: String = s
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if !cleaned.is_ascii() {
        eyre::bail!("hex payload contains non-hex characters");
    }
    if cleaned.len() % 2 != 0 {
        eyre::bail!("hex payload has an odd number of digits");
    }
    if cleaned.len() > 16 {
        eyre::bail!("hex payload longer than 8 bytes");
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .map_err(|e| eyre::eyre!("invalid hex byte `{}`: {e}", &cleaned[i..i + 2]))
        })
        .collect()
}
