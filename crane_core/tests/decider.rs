use crane_core::types::LOCALIZATION_SENTINEL;
use crane_core::{
    Command, Decider, DeciderCfg, Target, TargetKind, TaskState, localization_from_raw,
};
use nalgebra::{Vector2, Vector3};
use rstest::{fixture, rstest};

fn loc() -> Vector2<f64> {
    Vector2::new(0.05, -0.02)
}

#[fixture]
fn decider() -> Decider {
    Decider::new(DeciderCfg::default())
}

fn scene() -> Vec<Target> {
    vec![
        Target::new(3.0, 3.0, TargetKind::ShortWood),
        Target::new(0.7, 0.1, TargetKind::Weight),
    ]
}

/// Feed perfect readiness until the state changes; returns the number of calls.
fn drive_one_state(d: &mut Decider, targets: &[Target]) -> usize {
    let start = d.state();
    for calls in 1..=500 {
        let pose = d.target_pose(Some(loc()), targets).expect("localized");
        d.decide(&pose, Some(loc()), targets, true);
        if d.state() != start {
            return calls;
        }
    }
    panic!("stuck in {start}");
}

fn drive_to(d: &mut Decider, targets: &[Target], state: TaskState) {
    while d.state() != state {
        drive_one_state(d, targets);
    }
}

#[rstest]
fn sentinel_short_circuits_without_mutation(mut decider: Decider) {
    let targets = scene();
    drive_to(&mut decider, &targets, TaskState::BeforeCrawl);
    // Leave some partial debounce state behind.
    let pose = decider.target_pose(Some(loc()), &targets).unwrap();
    decider.decide(&pose, Some(loc()), &targets, true);
    let before = format!("{decider:?}");

    let raw = Vector2::new(LOCALIZATION_SENTINEL, 42.0);
    let cmd = decider.decide(&pose, localization_from_raw(raw), &targets, true);
    assert_eq!(cmd, Command::NEUTRAL);
    assert_eq!(
        cmd,
        Command {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            grip: false
        }
    );
    assert_eq!(format!("{decider:?}"), before);
    assert_eq!(decider.shift_count(), 1);
}

#[rstest]
fn full_cycle_returns_to_approach_and_counts_once(mut decider: Decider) {
    let targets = scene();
    assert_eq!(decider.circle_count(), 1);

    let mut visited = vec![decider.state()];
    for _ in 0..9 {
        let calls = drive_one_state(&mut decider, &targets);
        let left = *visited.last().unwrap();
        // Distance states need min_shift_count + 1 ready calls; servo states
        // need that many servo confirmations of servo_confirm_count + 1 calls each.
        let expected = if left.uses_servo_confirmation() { 36 } else { 6 };
        assert_eq!(calls, expected, "leaving {left}");
        visited.push(decider.state());
    }

    assert_eq!(visited, {
        let mut v = TaskState::ALL.to_vec();
        v.push(TaskState::ForApprox);
        v
    });
    assert_eq!(decider.state(), TaskState::ForApprox);
    assert_eq!(decider.circle_count(), 2);
    assert_eq!(decider.shift_count(), 0);
    assert_eq!(decider.servo_count(), 0);
}

#[rstest]
fn servo_confirmation_fires_on_sixth_call(mut decider: Decider) {
    let targets = scene();
    drive_to(&mut decider, &targets, TaskState::Crawling);
    let g = Vector3::zeros();

    for call in 1..=5 {
        assert!(!decider.judge(&g, &g, true), "call {call} fired early");
    }
    assert_eq!(decider.servo_count(), 5);
    assert!(decider.judge(&g, &g, true));
    assert_eq!(decider.servo_count(), 0);
}

#[rstest]
fn false_signal_mid_run_does_not_reset(mut decider: Decider) {
    let targets = scene();
    drive_to(&mut decider, &targets, TaskState::Crawling);
    let g = Vector3::zeros();

    for signal in [true, true, true, false, true] {
        assert!(!decider.judge(&g, &g, signal));
    }
    assert_eq!(decider.servo_count(), 5);
    // Sixth call counts from the uninterrupted total.
    assert!(decider.judge(&g, &g, true));
}

#[rstest]
fn servo_needs_signal_on_the_confirming_call(mut decider: Decider) {
    let targets = scene();
    drive_to(&mut decider, &targets, TaskState::ForWood);
    let g = Vector3::zeros();
    for _ in 0..8 {
        assert!(!decider.judge(&g, &g, false));
    }
    assert_eq!(decider.servo_count(), 8);
    assert!(decider.judge(&g, &g, true));
}

#[rstest]
fn missing_weight_degrades_to_none_target(mut decider: Decider) {
    let targets = scene();
    drive_to(&mut decider, &targets, TaskState::ForWeights);

    let only_wood = [Target::new(1.0, 1.0, TargetKind::TallWood)];
    assert_eq!(decider.choose_target(&only_wood), None);
    assert_eq!(decider.choose_target(&[]), None);

    let cmd = decider.decide(&Vector3::new(0.3, 0.2, 0.0), Some(loc()), &[], true);
    assert!(cmd.is_finite());
    // NONE sits at the map origin, so the offset is just the negated localization.
    assert!((cmd.x + loc().x).abs() < 1e-12);
    assert!((cmd.y + loc().y).abs() < 1e-12);
    assert_eq!(cmd.z, 0.0);
    assert!(!cmd.grip);
    assert_eq!(decider.state(), TaskState::ForWeights);
}

#[rstest]
fn grip_and_height_follow_the_new_state(mut decider: Decider) {
    let targets = scene();
    drive_to(&mut decider, &targets, TaskState::BeforeCrawl);
    // Five ready calls keep BEFORE_CRAWL; the sixth switches to CRAWLING and
    // that same command already closes the gripper.
    let pose = decider.target_pose(Some(loc()), &targets).unwrap();
    for _ in 0..5 {
        let cmd = decider.decide(&pose, Some(loc()), &targets, true);
        assert!(!cmd.grip);
        assert_eq!(cmd.z, -0.26);
    }
    let cmd = decider.decide(&pose, Some(loc()), &targets, true);
    assert_eq!(decider.state(), TaskState::Crawling);
    assert!(cmd.grip);
    assert_eq!(cmd.z, -0.26);
}

#[rstest]
fn second_cycle_uses_second_waypoint(mut decider: Decider) {
    let targets = scene();
    for _ in 0..9 {
        drive_one_state(&mut decider, &targets);
    }
    let t = decider.choose_target(&targets).unwrap();
    assert_eq!(t.position, Vector2::new(0.9188, -0.4874));
    // Leaving FOR_APPROX again exhausts the default tables.
    drive_one_state(&mut decider, &targets);
    assert_eq!(decider.circle_count(), 3);
    drive_to(&mut decider, &targets, TaskState::ForWood);
    assert_eq!(decider.choose_target(&targets), None);
}
