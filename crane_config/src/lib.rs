#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the gantry controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Waypoint tables accept either tuple or table notation.
use serde::Deserialize;
use serde::de::Deserializer;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Short,
    Tall,
}

/// One placement slot (a wooden post) in the map frame.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct PlaceSlot {
    pub x: f64,
    pub y: f64,
    pub kind: SlotKind,
}

#[derive(Debug, Deserialize)]
pub struct DeciderCfg {
    /// Travel height, clear of every obstacle.
    pub safe_height: f64,
    /// Height at which the gripper can close around a weight.
    pub crawl_height: f64,
    pub short_place_height: f64,
    pub tall_place_height: f64,
    /// Camera-to-gripper offset along x (m).
    #[serde(alias = "x_bias")]
    pub x_cam2gripper: f64,
    /// Camera-to-gripper offset along y (m).
    #[serde(alias = "y_bias")]
    pub y_cam2gripper: f64,
    #[serde(default = "default_judge_distance")]
    pub judge_distance: f64,
    #[serde(default = "default_count")]
    pub min_shift_count: u32,
    #[serde(default = "default_count")]
    pub servo_confirm_count: u32,
    /// Approach waypoints, one per cycle. Accepts:
    /// - array of tuples: [[0.6375, 0.0], ...]
    /// - array of tables: [{ x = 0.6375, y = 0.0 }, ...]
    #[serde(
        default = "default_approach_waypoints",
        deserialize_with = "de_waypoints"
    )]
    pub approach_waypoints: Vec<(f64, f64)>,
    #[serde(default = "default_place_slots")]
    pub place_slots: Vec<PlaceSlot>,
}

fn default_judge_distance() -> f64 {
    0.02
}

fn default_count() -> u32 {
    5
}

fn default_approach_waypoints() -> Vec<(f64, f64)> {
    vec![(0.6375, 0.0), (0.9188, -0.4874)]
}

fn default_place_slots() -> Vec<PlaceSlot> {
    vec![
        PlaceSlot {
            x: 1.2,
            y: 0.0,
            kind: SlotKind::Short,
        },
        PlaceSlot {
            x: 2.205,
            y: -0.755,
            kind: SlotKind::Tall,
        },
    ]
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WaypointToml {
    Tuple((f64, f64)),
    Table { x: f64, y: f64 },
}

fn de_waypoints<'de, D>(deserializer: D) -> Result<Vec<(f64, f64)>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<WaypointToml> = Vec::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .map(|w| match w {
            WaypointToml::Tuple(p) => p,
            WaypointToml::Table { x, y } => (x, y),
        })
        .collect())
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnTimeout {
    /// Hold the last known position.
    #[default]
    LastKnown,
    /// Report a timeout to the control loop.
    Fail,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EstimatorCfg {
    /// Telemetry samples buffered between the receive thread and the control loop.
    pub buffer_capacity: usize,
    /// How long a pose query may wait for a bracketing sample.
    pub query_timeout_ms: u64,
    pub on_timeout: OnTimeout,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            buffer_capacity: 5000,
            query_timeout_ms: 50,
            on_timeout: OnTimeout::LastKnown,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusCfg {
    pub interface: String,
    pub command_id: u32,
    pub telemetry_id: u32,
    /// Max wait per bus read in the receive thread (ms).
    pub recv_timeout_ms: u64,
}

impl Default for BusCfg {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
            command_id: 0x100,
            telemetry_id: 0x101,
            recv_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WireCfg {
    /// Multiplier applied to x/y/z (m) before packing into i16 command fields.
    pub position_scale: f64,
    /// Multiplier for the height field. The board reads it as a raw cast, so 1.0.
    pub z_scale: f64,
}

impl Default for WireCfg {
    fn default() -> Self {
        Self {
            position_scale: 1000.0,
            z_scale: 1.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    /// Decision cycles per second.
    pub rate_hz: u32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self { rate_hz: 50 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub decider: DeciderCfg,
    #[serde(default)]
    pub estimator: EstimatorCfg,
    #[serde(default)]
    pub bus: BusCfg,
    #[serde(default)]
    pub wire: WireCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration {:?}: {}", path, e))?;
    cfg.validate()
        .map_err(|e| eyre::eyre!("invalid configuration {:?}: {}", path, e))?;
    Ok(cfg)
}

fn finite(name: &str, v: f64) -> eyre::Result<()> {
    if !v.is_finite() {
        eyre::bail!("{name} must be finite");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Decider
        let d = &self.decider;
        finite("decider.safe_height", d.safe_height)?;
        finite("decider.crawl_height", d.crawl_height)?;
        finite("decider.short_place_height", d.short_place_height)?;
        finite("decider.tall_place_height", d.tall_place_height)?;
        finite("decider.x_cam2gripper", d.x_cam2gripper)?;
        finite("decider.y_cam2gripper", d.y_cam2gripper)?;
        if !(d.judge_distance.is_finite() && d.judge_distance > 0.0) {
            eyre::bail!("decider.judge_distance must be > 0");
        }
        if d.judge_distance > 1.0 {
            eyre::bail!("decider.judge_distance is unreasonably large (>1 m)");
        }
        for (i, (x, y)) in d.approach_waypoints.iter().enumerate() {
            if !(x.is_finite() && y.is_finite()) {
                eyre::bail!("decider.approach_waypoints[{i}] must be finite");
            }
        }
        for (i, s) in d.place_slots.iter().enumerate() {
            if !(s.x.is_finite() && s.y.is_finite()) {
                eyre::bail!("decider.place_slots[{i}] must be finite");
            }
        }

        // Estimator
        if self.estimator.buffer_capacity == 0 {
            eyre::bail!("estimator.buffer_capacity must be >= 1");
        }
        if self.estimator.query_timeout_ms == 0 {
            eyre::bail!("estimator.query_timeout_ms must be >= 1");
        }

        // Bus
        if self.bus.interface.trim().is_empty() {
            eyre::bail!("bus.interface must not be empty");
        }
        if self.bus.command_id > 0x1FFF_FFFF || self.bus.telemetry_id > 0x1FFF_FFFF {
            eyre::bail!("bus identifiers must fit in 29 bits");
        }
        if self.bus.command_id == self.bus.telemetry_id {
            eyre::bail!("bus.command_id and bus.telemetry_id must differ");
        }
        if self.bus.recv_timeout_ms == 0 {
            eyre::bail!("bus.recv_timeout_ms must be >= 1");
        }

        // Wire
        if !(self.wire.position_scale.is_finite() && self.wire.position_scale > 0.0) {
            eyre::bail!("wire.position_scale must be > 0");
        }
        if !(self.wire.z_scale.is_finite() && self.wire.z_scale > 0.0) {
            eyre::bail!("wire.z_scale must be > 0");
        }

        // Control
        if self.control.rate_hz == 0 {
            eyre::bail!("control.rate_hz must be > 0");
        }
        if self.control.rate_hz > 1000 {
            eyre::bail!("control.rate_hz must be <= 1000");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[decider]
safe_height = 0.0
crawl_height = -0.26
short_place_height = -0.06
tall_place_height = -0.16
x_cam2gripper = 0.01
y_cam2gripper = -0.02
"#;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = load_toml(MINIMAL).expect("parse");
        assert_eq!(cfg.decider.min_shift_count, 5);
        assert_eq!(cfg.decider.servo_confirm_count, 5);
        assert!((cfg.decider.judge_distance - 0.02).abs() < 1e-12);
        assert_eq!(cfg.decider.approach_waypoints.len(), 2);
        assert_eq!(cfg.decider.place_slots[1].kind, SlotKind::Tall);
        assert_eq!(cfg.estimator.buffer_capacity, 5000);
        assert_eq!(cfg.bus.command_id, 0x100);
        assert_eq!(cfg.bus.telemetry_id, 0x101);
        cfg.validate().expect("defaults validate");
    }

    #[test]
    fn waypoints_accept_tables_and_tuples() {
        let toml = format!(
            "{MINIMAL}approach_waypoints = [[0.5, 0.1], {{ x = 0.7, y = -0.2 }}]\n"
        );
        let cfg = load_toml(&toml).expect("parse");
        assert_eq!(cfg.decider.approach_waypoints, vec![(0.5, 0.1), (0.7, -0.2)]);
    }

    #[test]
    fn bias_aliases_are_accepted() {
        let toml = r#"
[decider]
safe_height = 0.0
crawl_height = -0.26
short_place_height = -0.06
tall_place_height = -0.16
x_bias = 0.03
y_bias = 0.04
"#;
        let cfg = load_toml(toml).expect("parse");
        assert!((cfg.decider.x_cam2gripper - 0.03).abs() < 1e-12);
        assert!((cfg.decider.y_cam2gripper - 0.04).abs() < 1e-12);
    }
}
