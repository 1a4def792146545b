//! Seam for the vision and localization collaborators.
//!
//! Detection, odom-to-map localization and fine alignment are produced outside
//! this crate. The control loop only needs one snapshot per cycle.

use std::time::Instant;

use crane_traits::clock::Clock;
use nalgebra::Vector2;

use crate::types::{Target, localization_from_raw};

/// Everything the decider needs from the outside world for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Capture time of the image the detections came from.
    pub timestamp: Instant,
    pub targets: Vec<Target>,
    /// `None` while the localizer has no fix.
    pub odom_to_map: Option<Vector2<f64>>,
    pub fine_aligned: bool,
}

impl Observation {
    /// Build from a raw localizer output that may carry the `1e6` sentinel.
    pub fn from_raw(
        timestamp: Instant,
        targets: Vec<Target>,
        odom_to_map_raw: Vector2<f64>,
        fine_aligned: bool,
    ) -> Self {
        Self {
            timestamp,
            targets,
            odom_to_map: localization_from_raw(odom_to_map_raw),
            fine_aligned,
        }
    }
}

pub trait Perception {
    /// Latest snapshot, stamped on `clock` (the timeline telemetry is stamped on).
    /// Errors are reported to the caller, who skips the cycle.
    fn observe(
        &mut self,
        clock: &dyn Clock,
    ) -> Result<Observation, Box<dyn std::error::Error + Send + Sync>>;
}

impl<P: Perception + ?Sized> Perception for Box<P> {
    fn observe(
        &mut self,
        clock: &dyn Clock,
    ) -> Result<Observation, Box<dyn std::error::Error + Send + Sync>> {
        (**self).observe(clock)
    }
}

/// Fixed scene stamped with the current time on every call.
///
/// Used by the simulator and by tests that drive the loop without a camera.
#[derive(Debug, Clone)]
pub struct StaticPerception {
    pub targets: Vec<Target>,
    pub odom_to_map: Option<Vector2<f64>>,
    pub fine_aligned: bool,
    /// Subtracted from the clock's `now()` so queries land inside received telemetry.
    pub latency: std::time::Duration,
}

impl StaticPerception {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets,
            odom_to_map: Some(Vector2::zeros()),
            fine_aligned: true,
            latency: std::time::Duration::ZERO,
        }
    }

    pub fn with_odom_to_map(mut self, odom_to_map: Option<Vector2<f64>>) -> Self {
        self.odom_to_map = odom_to_map;
        self
    }

    pub fn with_fine_aligned(mut self, fine_aligned: bool) -> Self {
        self.fine_aligned = fine_aligned;
        self
    }

    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Perception for StaticPerception {
    fn observe(
        &mut self,
        clock: &dyn Clock,
    ) -> Result<Observation, Box<dyn std::error::Error + Send + Sync>> {
        let now = clock.now();
        Ok(Observation {
            timestamp: now.checked_sub(self.latency).unwrap_or(now),
            targets: self.targets.clone(),
            odom_to_map: self.odom_to_map,
            fine_aligned: self.fine_aligned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TargetKind;
    use crane_traits::clock::{ManualClock, MonotonicClock};
    use std::time::Duration;

    #[test]
    fn raw_sentinel_maps_to_none() {
        let obs = Observation::from_raw(Instant::now(), vec![], Vector2::new(1e6, 0.0), false);
        assert_eq!(obs.odom_to_map, None);
    }

    #[test]
    fn static_scene_is_repeated() {
        let w = Target::new(0.5, 0.5, TargetKind::Weight);
        let mut p = StaticPerception::new(vec![w]).with_fine_aligned(false);
        let clock = MonotonicClock::new();
        let a = p.observe(&clock).unwrap();
        let b = p.observe(&clock).unwrap();
        assert_eq!(a.targets, vec![w]);
        assert_eq!(b.targets, vec![w]);
        assert!(!b.fine_aligned);
        assert!(b.timestamp >= a.timestamp);
    }

    #[test]
    fn observations_are_stamped_on_the_given_clock() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_millis(100));
        let mut p = StaticPerception::new(vec![]).with_latency(Duration::from_millis(30));
        let obs = p.observe(&clock).unwrap();
        assert_eq!(obs.timestamp, clock.origin() + Duration::from_millis(70));
    }
}
