//! Runtime configuration types for the control core.
//!
//! These are the structs consumed by `Decider`, `PoseEstimator` and `Crane`.
//! They are separate from the TOML-deserialized config in `crane_config`.

use nalgebra::Vector2;

use crate::types::{Target, TargetKind};

/// Task decider configuration.
#[derive(Debug, Clone)]
pub struct DeciderCfg {
    /// Travel height (m).
    pub safe_height: f64,
    /// Height at which the gripper closes on a weight (m).
    pub crawl_height: f64,
    /// Release height over a short post (m).
    pub short_place_height: f64,
    /// Release height over a tall post (m).
    pub tall_place_height: f64,
    /// Camera-to-gripper offset. Carried for callers; not applied by the decider.
    pub x_bias: f64,
    pub y_bias: f64,
    /// Distance readiness threshold (m). Default: 0.02.
    pub judge_distance: f64,
    /// Consecutive ready verdicts required beyond this count before a state switch.
    pub min_shift_count: u32,
    /// Fine-positioning calls required beyond this count before a servo verdict.
    pub servo_confirm_count: u32,
    /// Approach waypoint per cycle, map frame. Index = cycle - 1.
    pub approach_waypoints: Vec<Vector2<f64>>,
    /// Placement slot per cycle, map frame. Index = cycle - 1.
    pub place_slots: Vec<Target>,
}

impl Default for DeciderCfg {
    fn default() -> Self {
        Self {
            safe_height: 0.0,
            crawl_height: -0.26,
            short_place_height: -0.06,
            tall_place_height: -0.16,
            x_bias: 0.0,
            y_bias: 0.0,
            judge_distance: 0.02,
            min_shift_count: 5,
            servo_confirm_count: 5,
            approach_waypoints: vec![Vector2::new(0.6375, 0.0), Vector2::new(0.9188, -0.4874)],
            place_slots: vec![
                Target::new(1.2, 0.0, TargetKind::ShortWood),
                Target::new(2.205, -0.755, TargetKind::TallWood),
            ],
        }
    }
}

/// What a bounded pose query does when no bracketing sample arrives in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Return the most recent estimate (or the newest raw sample).
    #[default]
    LastKnown,
    /// Return `CraneError::Timeout`.
    Fail,
}

/// Pose estimator configuration.
#[derive(Debug, Clone)]
pub struct EstimatorCfg {
    /// Bounded buffer size in samples. Default: 5000.
    pub capacity: usize,
    /// Deadline for a bounded query (ms).
    pub query_timeout_ms: u64,
    pub stale_policy: StalePolicy,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            capacity: 5000,
            query_timeout_ms: 50,
            stale_policy: StalePolicy::LastKnown,
        }
    }
}

/// Bus identifiers, timeouts and command scaling.
#[derive(Debug, Clone)]
pub struct BusCfg {
    pub command_id: u32,
    pub telemetry_id: u32,
    /// Max wait per read in the receive thread (ms).
    pub recv_timeout_ms: u64,
    /// Meter-to-field multiplier for command x/y.
    pub position_scale: f64,
    /// Multiplier for the height field; 1.0 sends it as a raw cast.
    pub z_scale: f64,
}

impl Default for BusCfg {
    fn default() -> Self {
        Self {
            command_id: crate::codec::COMMAND_ID,
            telemetry_id: crate::codec::TELEMETRY_ID,
            recv_timeout_ms: 100,
            position_scale: crate::fixed_point::MM_PER_M,
            z_scale: crate::fixed_point::RAW_Z_SCALE,
        }
    }
}

/// Control loop pacing.
#[derive(Debug, Clone)]
pub struct ControlCfg {
    pub rate_hz: u32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self { rate_hz: 50 }
    }
}
