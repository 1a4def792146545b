//! `From` implementations bridging `crane_config` types to `crane_core` types.

use nalgebra::Vector2;

use crate::config::{BusCfg, ControlCfg, DeciderCfg, EstimatorCfg, StalePolicy};
use crate::types::{Target, TargetKind};

// ── DeciderCfg ───────────────────────────────────────────────────────────────

impl From<crane_config::SlotKind> for TargetKind {
    fn from(k: crane_config::SlotKind) -> Self {
        match k {
            crane_config::SlotKind::Short => TargetKind::ShortWood,
            crane_config::SlotKind::Tall => TargetKind::TallWood,
        }
    }
}

impl From<&crane_config::DeciderCfg> for DeciderCfg {
    fn from(c: &crane_config::DeciderCfg) -> Self {
        Self {
            safe_height: c.safe_height,
            crawl_height: c.crawl_height,
            short_place_height: c.short_place_height,
            tall_place_height: c.tall_place_height,
            x_bias: c.x_cam2gripper,
            y_bias: c.y_cam2gripper,
            judge_distance: c.judge_distance,
            min_shift_count: c.min_shift_count,
            servo_confirm_count: c.servo_confirm_count,
            approach_waypoints: c
                .approach_waypoints
                .iter()
                .map(|&(x, y)| Vector2::new(x, y))
                .collect(),
            place_slots: c
                .place_slots
                .iter()
                .map(|s| Target::new(s.x, s.y, s.kind.into()))
                .collect(),
        }
    }
}

// ── EstimatorCfg ─────────────────────────────────────────────────────────────

impl From<crane_config::OnTimeout> for StalePolicy {
    fn from(o: crane_config::OnTimeout) -> Self {
        match o {
            crane_config::OnTimeout::LastKnown => StalePolicy::LastKnown,
            crane_config::OnTimeout::Fail => StalePolicy::Fail,
        }
    }
}

impl From<&crane_config::EstimatorCfg> for EstimatorCfg {
    fn from(c: &crane_config::EstimatorCfg) -> Self {
        Self {
            capacity: c.buffer_capacity,
            query_timeout_ms: c.query_timeout_ms,
            stale_policy: c.on_timeout.into(),
        }
    }
}

// ── BusCfg ───────────────────────────────────────────────────────────────────

impl From<&crane_config::Config> for BusCfg {
    fn from(c: &crane_config::Config) -> Self {
        Self {
            command_id: c.bus.command_id,
            telemetry_id: c.bus.telemetry_id,
            recv_timeout_ms: c.bus.recv_timeout_ms,
            position_scale: c.wire.position_scale,
            z_scale: c.wire.z_scale,
        }
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&crane_config::ControlCfg> for ControlCfg {
    fn from(c: &crane_config::ControlCfg) -> Self {
        Self { rate_hz: c.rate_hz }
    }
}
