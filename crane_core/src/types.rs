//! Value types shared by the estimator, the decider and the codec.

use std::time::Instant;

use nalgebra::{Vector2, Vector3};

/// First-coordinate value the localizer reports when it has no fix.
pub const LOCALIZATION_SENTINEL: f64 = 1e6;

/// One decoded telemetry frame: effector position (m) at receive time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub position: Vector3<f64>,
    pub timestamp: Instant,
}

impl PoseSample {
    pub fn new(position: Vector3<f64>, timestamp: Instant) -> Self {
        Self {
            position,
            timestamp,
        }
    }
}

/// Detection / waypoint category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetKind {
    Center,
    Weight,
    ShortWood,
    TallWood,
    #[default]
    None,
}

impl TargetKind {
    pub fn name(self) -> &'static str {
        match self {
            TargetKind::Center => "CENTER",
            TargetKind::Weight => "WEIGHT",
            TargetKind::ShortWood => "SHORT_WOOD",
            TargetKind::TallWood => "TALL_WOOD",
            TargetKind::None => "NONE",
        }
    }
}

/// A target in the map frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub position: Vector2<f64>,
    pub kind: TargetKind,
}

impl Target {
    pub fn new(x: f64, y: f64, kind: TargetKind) -> Self {
        Self {
            position: Vector2::new(x, y),
            kind,
        }
    }

    /// The degraded target used when nothing suitable is available: origin, `NONE`.
    pub fn none() -> Self {
        Self {
            position: Vector2::zeros(),
            kind: TargetKind::None,
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::none()
    }
}

/// Logical motion command: odom-frame offset, height and gripper state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Command {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub grip: bool,
}

impl Command {
    /// All-zero command with the gripper open.
    pub const NEUTRAL: Command = Command {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        grip: false,
    };

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Convert a localizer output that may carry the `1e6` sentinel into an `Option`.
pub fn localization_from_raw(raw: Vector2<f64>) -> Option<Vector2<f64>> {
    if raw.x == LOCALIZATION_SENTINEL {
        None
    } else {
        Some(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_means_unavailable() {
        assert_eq!(localization_from_raw(Vector2::new(1e6, 3.0)), None);
        assert_eq!(
            localization_from_raw(Vector2::new(0.1, 1e6)),
            Some(Vector2::new(0.1, 1e6))
        );
    }

    #[test]
    fn none_target_sits_at_origin() {
        let t = Target::none();
        assert_eq!(t.kind, TargetKind::None);
        assert_eq!(t.position, Vector2::zeros());
        assert_eq!(Target::default(), t);
    }
}
