//! Task sequencer for the pick-and-place cycle.
//!
//! The decider is called once per control cycle with the estimated gripper
//! position, the odom-to-map offset, the current detections and the
//! fine-alignment flag. It picks a target, decides whether the effector is
//! ready to move on, advances the nine-state cycle and emits a [`Command`].
//!
//! Two levels of hysteresis guard every transition:
//! - per call, `judge` only reports ready once the distance is within
//!   `judge_distance` (or, in the gripping states, after more than
//!   `servo_confirm_count` calls with the alignment flag set);
//! - per state, more than `min_shift_count` ready verdicts are needed before
//!   the state actually changes.
//!
//! The decider never fails. Missing detections or exhausted waypoint tables
//! degrade to [`Target::none`] and the cycle keeps running.

use nalgebra::{Vector2, Vector3};

use crate::config::DeciderCfg;
use crate::types::{Command, Target, TargetKind};

/// One stage of the task cycle. `AfterPlace` wraps to `ForApprox`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskState {
    /// Travel to the approach waypoint for this cycle.
    #[default]
    ForApprox,
    /// Center over the detected weight.
    ForWeights,
    /// Descend to crawl height.
    BeforeCrawl,
    /// Close the gripper.
    Crawling,
    /// Lift the weight to travel height.
    AfterCrawl,
    /// Carry the weight over the placement slot.
    ForWood,
    /// Descend to the release height.
    BeforePlace,
    /// Open the gripper.
    Placing,
    /// Lift clear of the post.
    AfterPlace,
}

impl TaskState {
    pub const ALL: [TaskState; 9] = [
        TaskState::ForApprox,
        TaskState::ForWeights,
        TaskState::BeforeCrawl,
        TaskState::Crawling,
        TaskState::AfterCrawl,
        TaskState::ForWood,
        TaskState::BeforePlace,
        TaskState::Placing,
        TaskState::AfterPlace,
    ];

    /// Successor in the fixed cycle.
    pub fn next(self) -> TaskState {
        match self {
            TaskState::ForApprox => TaskState::ForWeights,
            TaskState::ForWeights => TaskState::BeforeCrawl,
            TaskState::BeforeCrawl => TaskState::Crawling,
            TaskState::Crawling => TaskState::AfterCrawl,
            TaskState::AfterCrawl => TaskState::ForWood,
            TaskState::ForWood => TaskState::BeforePlace,
            TaskState::BeforePlace => TaskState::Placing,
            TaskState::Placing => TaskState::AfterPlace,
            TaskState::AfterPlace => TaskState::ForApprox,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TaskState::ForApprox => "FOR_APPROX",
            TaskState::ForWeights => "FOR_WEIGHTS",
            TaskState::BeforeCrawl => "BEFORE_CRAWL",
            TaskState::Crawling => "CRAWLING",
            TaskState::AfterCrawl => "AFTER_CRAWL",
            TaskState::ForWood => "FOR_WOOD",
            TaskState::BeforePlace => "BEFORE_PLACE",
            TaskState::Placing => "PLACING",
            TaskState::AfterPlace => "AFTER_PLACE",
        }
    }

    /// Gripper closed while in this state.
    pub fn grips(self) -> bool {
        matches!(
            self,
            TaskState::Crawling
                | TaskState::AfterCrawl
                | TaskState::ForWood
                | TaskState::BeforePlace
        )
    }

    /// Readiness is confirmed by the fine-alignment signal rather than by distance.
    pub fn uses_servo_confirmation(self) -> bool {
        self.grips()
    }

    /// Targets the detected weight rather than a fixed waypoint.
    pub fn tracks_weight(self) -> bool {
        matches!(
            self,
            TaskState::ForWeights
                | TaskState::BeforeCrawl
                | TaskState::Crawling
                | TaskState::AfterCrawl
        )
    }
}

impl core::fmt::Display for TaskState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

pub struct Decider {
    cfg: DeciderCfg,
    state: TaskState,
    shift_count: u32,
    servo_count: u32,
    circle_count: u32,
}

impl core::fmt::Debug for Decider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Decider")
            .field("state", &self.state)
            .field("shift_count", &self.shift_count)
            .field("servo_count", &self.servo_count)
            .field("circle_count", &self.circle_count)
            .finish()
    }
}

impl Decider {
    pub fn new(cfg: DeciderCfg) -> Self {
        Self {
            cfg,
            state: TaskState::ForApprox,
            shift_count: 0,
            servo_count: 0,
            circle_count: 1,
        }
    }

    pub fn config(&self) -> &DeciderCfg {
        &self.cfg
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    /// Current cycle number, starting at 1. Incremented when leaving `ForApprox`.
    pub fn circle_count(&self) -> u32 {
        self.circle_count
    }

    pub fn shift_count(&self) -> u32 {
        self.shift_count
    }

    pub fn servo_count(&self) -> u32 {
        self.servo_count
    }

    /// Camera-to-gripper offset as configured. Not applied to commands.
    pub fn bias(&self) -> Vector2<f64> {
        Vector2::new(self.cfg.x_bias, self.cfg.y_bias)
    }

    /// Target for the current state, or `None` when nothing suitable exists.
    pub fn choose_target(&self, targets: &[Target]) -> Option<Target> {
        let slot = self.circle_count.checked_sub(1).map(|i| i as usize);
        match self.state {
            TaskState::ForApprox => slot
                .and_then(|i| self.cfg.approach_waypoints.get(i))
                .map(|p| Target {
                    position: *p,
                    kind: TargetKind::Center,
                }),
            s if s.tracks_weight() => targets
                .iter()
                .find(|t| t.kind == TargetKind::Weight)
                .copied(),
            _ => slot.and_then(|i| self.cfg.place_slots.get(i)).copied(),
        }
    }

    /// Commanded height for `target` in the current state.
    pub fn target_z(&self, target: &Target) -> f64 {
        self.height_for(self.state, target)
    }

    fn height_for(&self, state: TaskState, target: &Target) -> f64 {
        match state {
            TaskState::ForApprox
            | TaskState::ForWeights
            | TaskState::AfterCrawl
            | TaskState::ForWood
            | TaskState::AfterPlace => self.cfg.safe_height,
            TaskState::BeforeCrawl | TaskState::Crawling => self.cfg.crawl_height,
            TaskState::BeforePlace | TaskState::Placing => {
                if target.kind == TargetKind::ShortWood {
                    self.cfg.short_place_height
                } else {
                    self.cfg.tall_place_height
                }
            }
        }
    }

    /// Odom-frame offset of `target`. `ForApprox` treats odom as map.
    fn offset_in_odom(&self, target: &Target, odom_to_map: Vector2<f64>) -> Vector2<f64> {
        if self.state == TaskState::ForApprox {
            target.position
        } else {
            target.position - odom_to_map
        }
    }

    /// Target pose for the current state without touching any counter.
    ///
    /// `None` when localization is unavailable.
    pub fn target_pose(
        &self,
        odom_to_map: Option<Vector2<f64>>,
        targets: &[Target],
    ) -> Option<Vector3<f64>> {
        let odom_to_map = odom_to_map?;
        let target = self.choose_target(targets).unwrap_or_else(Target::none);
        let xy = self.offset_in_odom(&target, odom_to_map);
        Some(Vector3::new(xy.x, xy.y, self.target_z(&target)))
    }

    /// Readiness verdict for this call.
    ///
    /// Gripping states count calls and report ready only when the count is
    /// past `servo_confirm_count` and `fine_aligned` is set on the same call;
    /// the count resets on success only. Other states compare the distance to
    /// `judge_distance`.
    pub fn judge(
        &mut self,
        gripper: &Vector3<f64>,
        target: &Vector3<f64>,
        fine_aligned: bool,
    ) -> bool {
        if self.state.uses_servo_confirmation() {
            self.servo_count = self.servo_count.saturating_add(1);
            tracing::debug!(servo_count = self.servo_count, fine_aligned, "judge by servo");
            if self.servo_count > self.cfg.servo_confirm_count && fine_aligned {
                self.servo_count = 0;
                return true;
            }
            return false;
        }

        let error = (gripper - target).norm();
        if error <= self.cfg.judge_distance {
            return true;
        }
        tracing::info!(error, "judge error");
        false
    }

    /// Commit a readiness verdict. Returns the new state when a switch happened.
    pub fn state_machine(&mut self, ready: bool) -> Option<TaskState> {
        if !ready {
            return None;
        }
        self.shift_count = self.shift_count.saturating_add(1);
        if self.shift_count <= self.cfg.min_shift_count {
            return None;
        }
        self.shift_count = 0;
        if self.state == TaskState::ForApprox {
            self.circle_count = self.circle_count.saturating_add(1);
        }
        self.state = self.state.next();
        tracing::debug!(state = %self.state, circle = self.circle_count, "switch state");
        Some(self.state)
    }

    /// Run one decision cycle.
    ///
    /// With no localization the neutral command is returned and nothing changes.
    pub fn decide(
        &mut self,
        gripper: &Vector3<f64>,
        odom_to_map: Option<Vector2<f64>>,
        targets: &[Target],
        fine_aligned: bool,
    ) -> Command {
        let Some(odom_to_map) = odom_to_map else {
            tracing::trace!("no localization; neutral command");
            return Command::NEUTRAL;
        };

        let target = self.choose_target(targets).unwrap_or_else(|| {
            tracing::debug!(state = %self.state, circle = self.circle_count, "no target; using NONE");
            Target::none()
        });
        let xy = self.offset_in_odom(&target, odom_to_map);
        let pose = Vector3::new(xy.x, xy.y, self.target_z(&target));

        let ready = self.judge(gripper, &pose, fine_aligned);
        tracing::debug!(
            target_x = pose.x,
            target_y = pose.y,
            target_z = pose.z,
            gripper_x = gripper.x,
            gripper_y = gripper.y,
            gripper_z = gripper.z,
            kind = target.kind.name(),
            "decide"
        );
        self.state_machine(ready);

        Command {
            x: xy.x,
            y: xy.y,
            z: self.height_for(self.state, &target),
            grip: self.state.grips(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decider() -> Decider {
        Decider::new(DeciderCfg::default())
    }

    #[test]
    fn cycle_is_closed() {
        let mut s = TaskState::ForApprox;
        for _ in 0..TaskState::ALL.len() {
            s = s.next();
        }
        assert_eq!(s, TaskState::ForApprox);
        for (i, st) in TaskState::ALL.iter().enumerate() {
            assert_eq!(st.next(), TaskState::ALL[(i + 1) % 9]);
        }
    }

    #[rstest]
    #[case(TaskState::ForApprox, false)]
    #[case(TaskState::BeforeCrawl, false)]
    #[case(TaskState::Crawling, true)]
    #[case(TaskState::AfterCrawl, true)]
    #[case(TaskState::ForWood, true)]
    #[case(TaskState::BeforePlace, true)]
    #[case(TaskState::Placing, false)]
    fn grip_states(#[case] s: TaskState, #[case] grips: bool) {
        assert_eq!(s.grips(), grips);
    }

    #[test]
    fn approach_waypoint_follows_circle_count() {
        let mut d = decider();
        let t = d.choose_target(&[]).expect("first waypoint");
        assert_eq!(t.position, Vector2::new(0.6375, 0.0));
        assert_eq!(t.kind, TargetKind::Center);
        d.circle_count = 2;
        let t = d.choose_target(&[]).expect("second waypoint");
        assert_eq!(t.position, Vector2::new(0.9188, -0.4874));
        d.circle_count = 3;
        assert_eq!(d.choose_target(&[]), None);
    }

    #[test]
    fn weight_states_pick_first_weight() {
        let mut d = decider();
        d.state = TaskState::Crawling;
        let targets = [
            Target::new(9.0, 9.0, TargetKind::ShortWood),
            Target::new(1.0, 2.0, TargetKind::Weight),
            Target::new(3.0, 4.0, TargetKind::Weight),
        ];
        assert_eq!(d.choose_target(&targets), Some(targets[1]));
    }

    #[test]
    fn place_states_use_slot_table() {
        let mut d = decider();
        d.state = TaskState::Placing;
        let t = d.choose_target(&[]).expect("slot");
        assert_eq!(t.kind, TargetKind::ShortWood);
        assert_eq!(d.target_z(&t), -0.06);
        d.circle_count = 2;
        let t = d.choose_target(&[]).expect("slot");
        assert_eq!(t.kind, TargetKind::TallWood);
        assert_eq!(d.target_z(&t), -0.16);
        // NONE target falls to the tall height.
        assert_eq!(d.target_z(&Target::none()), -0.16);
    }

    #[test]
    fn heights_by_state() {
        let mut d = decider();
        let t = Target::none();
        for s in TaskState::ALL {
            d.state = s;
            let z = d.target_z(&t);
            match s {
                TaskState::BeforeCrawl | TaskState::Crawling => assert_eq!(z, -0.26),
                TaskState::BeforePlace | TaskState::Placing => assert_eq!(z, -0.16),
                _ => assert_eq!(z, 0.0),
            }
        }
    }

    #[test]
    fn offset_subtracts_localization_after_approach() {
        let mut d = decider();
        let loc = Vector2::new(0.1, -0.2);
        let p = d.target_pose(Some(loc), &[]).expect("pose");
        assert_eq!(p, Vector3::new(0.6375, 0.0, 0.0));
        d.state = TaskState::ForWeights;
        let w = [Target::new(1.0, 1.0, TargetKind::Weight)];
        let p = d.target_pose(Some(loc), &w).expect("pose");
        assert!((p - Vector3::new(0.9, 1.2, 0.0)).norm() < 1e-12);
        assert_eq!(d.target_pose(None, &w), None);
    }

    #[test]
    fn distance_judge_is_inclusive() {
        let mut d = decider();
        let target = Vector3::zeros();
        assert!(d.judge(&Vector3::new(0.02, 0.0, 0.0), &target, false));
        assert!(!d.judge(&Vector3::new(0.0201, 0.0, 0.0), &target, true));
        assert_eq!(d.servo_count(), 0);
    }

    #[test]
    fn shift_needs_more_than_min_count() {
        let mut d = decider();
        for _ in 0..5 {
            assert_eq!(d.state_machine(true), None);
        }
        assert_eq!(d.state_machine(false), None);
        assert_eq!(d.shift_count(), 5);
        assert_eq!(d.state_machine(true), Some(TaskState::ForWeights));
        assert_eq!(d.shift_count(), 0);
        assert_eq!(d.circle_count(), 2);
    }

    #[test]
    fn bias_is_reported_not_applied() {
        let cfg = DeciderCfg {
            x_bias: 0.05,
            y_bias: -0.01,
            ..DeciderCfg::default()
        };
        let mut d = Decider::new(cfg);
        assert_eq!(d.bias(), Vector2::new(0.05, -0.01));
        let cmd = d.decide(&Vector3::new(5.0, 5.0, 5.0), Some(Vector2::zeros()), &[], false);
        assert_eq!((cmd.x, cmd.y), (0.6375, 0.0));
    }
}
